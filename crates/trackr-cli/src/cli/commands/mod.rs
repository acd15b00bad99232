//! CLI command handlers, one file per command.

mod bulk;
mod cancel;
mod status;
mod targets;
mod update;

pub use bulk::run_bulk;
pub use cancel::run_cancel;
pub use status::run_status;
pub use targets::run_targets;
pub use update::run_update;
