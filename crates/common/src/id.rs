//! Identifier generation for captured entries.

use rand::Rng;
use uuid::Uuid;

/// Short random hex id, used for log entries where collisions are harmless.
pub fn short_id() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=1_000_000);
    format!("{:x}", value)
}

/// Id that is unique for the lifetime of the process.
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}
