//! Loop detection over recently executed tool calls.

mod canonical;
mod config;
mod guard;

pub use canonical::{args_hash, canonical_json};
pub use config::RepetitionConfig;
pub use guard::{CallSignature, RepetitionGuard, Verdict};
