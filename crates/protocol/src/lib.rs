//! Wire types shared between the log classifier and the report client.
//!
//! Field names match the JSON the reporting service expects, so these
//! structs serialize without renames.

pub mod constants;
pub mod key;
pub mod reports;

// Re-export primary types for convenience.
pub use key::StoredKey;
pub use reports::{DeathEvent, DeathReport, KillMode, KillReport, SuicideReport};
