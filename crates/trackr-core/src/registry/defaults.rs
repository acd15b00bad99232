//! Built-in target tables written to a fresh `config.toml`.

use crate::config::TargetConfig;

use super::{Category, PayloadFormat};

const API_BASE: &str = "https://api.tracker.gg/api";
const WEB_BASE: &str = "https://tracker.gg";

const HOUR: u64 = 60 * 60;

fn aggregated(playlist: &str) -> String {
    format!(
        "{API_BASE}/v1/valorant/standard/profile/riot/{{subject}}/aggregated?playlist={playlist}&source=web"
    )
}

fn playlist_segments(playlist: &str) -> String {
    format!(
        "{API_BASE}/v2/valorant/standard/profile/riot/{{subject}}/segments/playlist?playlist={playlist}&source=web"
    )
}

fn entry(id: &str, url: String, category: Category, staleness_secs: u64) -> TargetConfig {
    TargetConfig {
        id: id.to_string(),
        url,
        category,
        staleness_secs,
        format: PayloadFormat::Json,
    }
}

/// The tracker profile endpoints, most important first.
pub fn default_targets() -> Vec<TargetConfig> {
    vec![
        entry(
            "v1_competitive_aggregated",
            aggregated("competitive"),
            Category::Critical,
            2 * HOUR,
        ),
        entry(
            "v1_premier_aggregated",
            aggregated("premier"),
            Category::Critical,
            2 * HOUR,
        ),
        entry(
            "v2_competitive_playlist",
            playlist_segments("competitive"),
            Category::Standard,
            6 * HOUR,
        ),
        entry(
            "v2_premier_playlist",
            playlist_segments("premier"),
            Category::Standard,
            6 * HOUR,
        ),
        entry(
            "v1_unrated_aggregated",
            aggregated("unrated"),
            Category::Casual,
            24 * HOUR,
        ),
        entry(
            "v2_unrated_playlist",
            playlist_segments("unrated"),
            Category::Casual,
            24 * HOUR,
        ),
        entry(
            "v2_deathmatch_playlist",
            playlist_segments("deathmatch"),
            Category::Casual,
            24 * HOUR,
        ),
        entry(
            "v2_loadout_segments",
            format!("{API_BASE}/v2/valorant/standard/profile/riot/{{subject}}/segments/loadout?source=web"),
            Category::Casual,
            24 * HOUR,
        ),
    ]
}

/// Pages fetched in Full mode to check the site's current response shape.
pub fn default_diagnostics() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            id: "profile_page".to_string(),
            url: format!("{WEB_BASE}/valorant/profile/riot/{{subject}}/overview"),
            category: Category::Casual,
            staleness_secs: 0,
            format: PayloadFormat::Html,
        },
        TargetConfig {
            id: "site_root".to_string(),
            url: format!("{WEB_BASE}/"),
            category: Category::Casual,
            staleness_secs: 0,
            format: PayloadFormat::Html,
        },
    ]
}
