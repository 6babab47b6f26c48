//! registrar-util - value helpers shared by registrar models
//!
//! Change detection in a model compares attribute values by value, not by
//! representation, and treats "absent" as distinct from a stored `null`.
//! The helpers here encode those two rules once.

pub mod json_equal;
pub mod presence;

pub use json_equal::{slot_equal, value_equal};
pub use presence::is_present;
