pub mod debounce;
pub mod pipeline;
pub mod state;

pub use debounce::ChangeDebouncer;
pub use pipeline::{Monitor, PendingChange};
