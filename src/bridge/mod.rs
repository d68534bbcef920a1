pub mod host;
pub mod protocol;

pub use host::{HostBridge, HostOutput};
