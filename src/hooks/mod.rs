//! Observer hooks invoked synchronously during a run.

mod manager;
mod traits;

pub use manager::HookManager;
pub use traits::{FnObserver, HookEvent, LoggingObserver, RunEvent, RunObserver};
