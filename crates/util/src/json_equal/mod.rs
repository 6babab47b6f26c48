//! Value equality for attribute diffing.

mod value_equal;

pub use value_equal::{slot_equal, value_equal};
