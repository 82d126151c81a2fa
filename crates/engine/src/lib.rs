//! Document host for `gridpilot`.
//!
//! [`host::Document`] is the queue-then-sync API the action layer drives;
//! [`workbook::Workbook`] is the in-memory implementation of it.

pub mod cell;
pub mod fill;
pub mod host;
pub mod mutation;
pub mod objects;
pub mod sheet;
pub mod validation;
pub mod workbook;

pub use cell::{Alignment, Border, BorderStyle, CellFormat, CellValue, StylePatch, VerticalAlignment};
pub use host::{Document, HostError, RangeData};
pub use mutation::{Axis, ClearScope, Mutation};
pub use workbook::Workbook;
