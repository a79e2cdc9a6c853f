pub mod layout;
pub mod orchestrator;

pub use layout::{Clock, FixedClock, RemoteLayout, SystemClock};
pub use orchestrator::{BackupRequest, RestoreRequest, Savezone};
