//! Process exit codes.
//!
//! - `0`: success
//! - `1`: general error
//! - `2`: invalid command-line usage (reported by clap)
//! - `3..=8`: fatal delivery conditions, one code per condition

pub const SUCCESS: i32 = 0;
pub const ERROR: i32 = 1;
pub const USAGE: i32 = 2;
pub const OUT_OF_CONTROL: i32 = 3;
pub const DIRTY_PROJECT: i32 = 4;
pub const PATCH_EXTRACTION: i32 = 5;
pub const CHECKOUT: i32 = 6;
pub const ANCESTRY_UNREACHABLE: i32 = 7;
pub const TO_TAG_UNRESOLVED: i32 = 8;
