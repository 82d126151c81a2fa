//! The document API the action layer drives.
//!
//! Mutations are queued with [`Document::enqueue`] and take effect only at
//! [`Document::sync`], the single synchronization point. [`Document::load`]
//! flushes the queue before reading.

use std::fmt;

use serde::{Deserialize, Serialize};

use gridpilot_core::{AddressError, Region};

use crate::cell::CellFormat;
use crate::mutation::Mutation;

#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// Address text could not be parsed.
    InvalidAddress { address: String, reason: String },
    /// Sheet prefix names a sheet the document does not have.
    UnknownSheet(String),
    /// Target sheet is protected.
    Protected(String),
    /// The host refused the operation.
    Rejected(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::InvalidAddress { address, reason } => {
                write!(f, "invalid address {:?}: {}", address, reason)
            }
            HostError::UnknownSheet(name) => write!(f, "sheet {:?} does not exist", name),
            HostError::Protected(name) => write!(f, "sheet {:?} is protected", name),
            HostError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl HostError {
    pub fn invalid_address(address: &str, err: &AddressError) -> Self {
        HostError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Contents of a region as read from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeData {
    /// Fully qualified address (`Sheet1!A1:B2`).
    pub address: String,
    /// Typed values; empty cells read as `""`.
    pub values: Vec<Vec<serde_json::Value>>,
    /// Formula text for formula cells, the literal otherwise.
    pub formulas: Vec<Vec<String>>,
    pub formats: Vec<Vec<CellFormat>>,
}

impl RangeData {
    pub fn rows(&self) -> usize {
        self.formulas.len()
    }

    pub fn cols(&self) -> usize {
        self.formulas.first().map(|r| r.len()).unwrap_or(0)
    }
}

/// A live spreadsheet document.
pub trait Document {
    /// Resolve an address to a sheet-qualified region.
    fn resolve(&self, address: &str) -> Result<Region, HostError>;

    /// Read a region. Pending mutations are synced first.
    fn load(&mut self, region: &Region) -> Result<RangeData, HostError>;

    /// Bounding box of populated cells on a sheet (`None` = active sheet).
    fn used_range(&mut self, sheet: Option<&str>) -> Result<Option<Region>, HostError>;

    /// Queue a mutation. Nothing changes until [`Document::sync`].
    fn enqueue(&mut self, mutation: Mutation);

    /// Number of queued mutations.
    fn pending(&self) -> usize;

    /// Apply queued mutations in order. On the first failure the rest of the
    /// queue is discarded; mutations applied before it stay applied.
    fn sync(&mut self) -> Result<(), HostError>;
}
