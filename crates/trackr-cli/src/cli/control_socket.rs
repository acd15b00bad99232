//! Control socket: server (during `trackr bulk`) and client (for `trackr cancel`).
//! Protocol: one line per command: "cancel <subject>" or "cancel-all".

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use trackr_core::control::RunControl;

/// A parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Cancel(String),
    CancelAll,
}

impl ControlCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "cancel-all" {
            return Some(ControlCommand::CancelAll);
        }
        let subject = line.strip_prefix("cancel ")?.trim();
        if subject.is_empty() {
            None
        } else {
            Some(ControlCommand::Cancel(subject.to_string()))
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            ControlCommand::Cancel(subject) => format!("cancel {subject}\n"),
            ControlCommand::CancelAll => "cancel-all\n".to_string(),
        }
    }
}

/// Spawns a task that listens on `path` and applies each control line to
/// `control`. Ignores malformed lines.
pub fn spawn_control_listener(
    control: Arc<RunControl>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&control);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            match ControlCommand::parse(&line) {
                                Some(ControlCommand::Cancel(subject)) => {
                                    if !control.request_cancel(&subject) {
                                        tracing::debug!(subject = %subject, "cancel: no running session");
                                    }
                                }
                                Some(ControlCommand::CancelAll) => control.cancel_all(),
                                None => tracing::debug!("control socket: ignoring {:?}", line),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends `command` to the control socket. Returns false if no run is listening.
pub async fn send_command(socket_path: &Path, command: &ControlCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        // Stale socket file from a run that exited.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    stream.write_all(command.to_line().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}
