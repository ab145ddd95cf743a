//! Process-wide snowflake id generation.

use once_cell::sync::Lazy;
use snowflaked::sync::Generator;

static GENERATOR: Lazy<Generator> = Lazy::new(|| Generator::new(0));

/// Next unique id; shared across all entity kinds.
pub fn next_id() -> u64 {
    GENERATOR.generate()
}
