//! `trackr cancel` – ask a running `trackr bulk` to stop a subject (or all).

use anyhow::Result;

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_cancel(subject: Option<&str>, all: bool) -> Result<()> {
    let command = match subject {
        Some(subject) if !all => ControlCommand::Cancel(subject.to_string()),
        _ => ControlCommand::CancelAll,
    };
    let path = trackr_core::control::default_control_socket_path()?;
    if control_socket::send_command(&path, &command).await? {
        match &command {
            ControlCommand::Cancel(subject) => println!("Cancel requested for {subject}"),
            ControlCommand::CancelAll => println!("Cancel requested for all sessions"),
        }
    } else {
        println!("No bulk run is active.");
    }
    Ok(())
}
