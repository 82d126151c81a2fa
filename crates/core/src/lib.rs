//! `gridpilot-core`: addressing primitives shared by every other crate.
//!
//! No document state lives here: only the A1 address grammar, the
//! rectangular `Region` it resolves to, and formula reference shifting.

pub mod address;
pub mod refs;

pub use address::{col_to_letters, letters_to_col, parse_cell_ref, AddressError, Region, MAX_COLS, MAX_ROWS};
pub use refs::shift_formula;
