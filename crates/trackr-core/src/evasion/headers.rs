//! Browser-like request headers for target requests.

use crate::registry::PayloadFormat;
use crate::subject::encode_subject;

const SEC_CH_UA: &str = r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#;
const ORIGIN: &str = "https://tracker.gg";

/// Headers for a request as the site's own page would send them.
///
/// JSON targets get the XHR set (CORS, same-site); HTML targets get a
/// top-level navigation set. `referer_template` may contain `{subject}`.
pub fn request_headers(
    format: PayloadFormat,
    subject: &str,
    identity: &str,
    referer_template: &str,
) -> Vec<(String, String)> {
    let referer = referer_template.replace("{subject}", &encode_subject(subject));
    let mut headers: Vec<(&str, String)> = match format {
        PayloadFormat::Json => vec![
            ("accept", "application/json, text/plain, */*".into()),
            ("origin", ORIGIN.into()),
            ("priority", "u=1, i".into()),
            ("sec-fetch-dest", "empty".into()),
            ("sec-fetch-mode", "cors".into()),
            ("sec-fetch-site", "same-site".into()),
        ],
        PayloadFormat::Html => vec![
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"
                    .into(),
            ),
            ("sec-fetch-dest", "document".into()),
            ("sec-fetch-mode", "navigate".into()),
            ("sec-fetch-site", "none".into()),
            ("sec-fetch-user", "?1".into()),
            ("upgrade-insecure-requests", "1".into()),
        ],
    };
    headers.extend([
        ("accept-language", "en-US,en;q=0.9".into()),
        ("cache-control", "no-cache".into()),
        ("dnt", "1".into()),
        ("pragma", "no-cache".into()),
        ("referer", referer),
        ("sec-ch-ua", SEC_CH_UA.into()),
        ("sec-ch-ua-mobile", "?0".into()),
        ("sec-ch-ua-platform", r#""Windows""#.into()),
        ("user-agent", identity.into()),
    ]);
    headers
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn json_headers_are_cors_with_referer() {
        let h = request_headers(
            PayloadFormat::Json,
            "alpha#1",
            "ua-0",
            "https://tracker.gg/valorant/profile/riot/{subject}/overview",
        );
        assert_eq!(get(&h, "sec-fetch-mode"), Some("cors"));
        assert_eq!(get(&h, "user-agent"), Some("ua-0"));
        assert_eq!(
            get(&h, "referer"),
            Some("https://tracker.gg/valorant/profile/riot/alpha%231/overview")
        );
    }

    #[test]
    fn html_headers_navigate() {
        let h = request_headers(PayloadFormat::Html, "alpha#1", "ua-1", "https://tracker.gg/");
        assert_eq!(get(&h, "sec-fetch-mode"), Some("navigate"));
        assert_eq!(get(&h, "origin"), None);
        assert!(get(&h, "accept").unwrap().starts_with("text/html"));
    }
}
