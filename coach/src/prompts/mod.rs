//! Coaching prompts and request composition
//!
//! The instruction block, greeting and help text are embedded at compile
//! time from `prompts/*.pmt`.

mod composer;
mod embedded;

pub use composer::build_request;
pub use embedded::{APOLOGY, apology, greeting, help_text, instruction_block};
