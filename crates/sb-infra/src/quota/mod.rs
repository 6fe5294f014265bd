//! Storage quota guard.

mod guard;

pub use guard::{LargestProject, QuotaGuard, QuotaSummary};
