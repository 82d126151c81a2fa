//! Undo snapshots: capture a region before an Action runs, restore it later.
//!
//! Capture is best effort. A snapshot that cannot be taken is logged and
//! skipped; the Action still proceeds, it just cannot be undone.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use gridpilot_engine::cell::CellFormat;
use gridpilot_engine::{Document, Mutation, RangeData};

use crate::error::UndoError;

/// Default cell limit for a single snapshot.
pub const DEFAULT_MAX_SNAPSHOT_CELLS: u64 = 100_000;

/// Prior contents of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoSnapshot {
    /// Fully qualified address, e.g. `Sheet1!A1:B2`.
    pub address: String,
    pub values: Vec<Vec<serde_json::Value>>,
    /// Formula text for formula cells, the literal otherwise.
    pub formulas: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<Vec<CellFormat>>>,
    /// Hash of the region right after the Action succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<u64>,
}

impl UndoSnapshot {
    pub fn rows(&self) -> usize {
        self.formulas.len()
    }

    pub fn cols(&self) -> usize {
        self.formulas.first().map_or(0, Vec::len)
    }

    fn from_range(data: RangeData, with_formats: bool) -> Self {
        Self {
            address: data.address,
            values: data.values,
            formulas: data.formulas,
            formats: with_formats.then_some(data.formats),
            fingerprint: None,
        }
    }
}

/// Snapshot `address` before it is modified. `None` (with a warning) when
/// the address does not resolve, the region exceeds `max_cells` or the read
/// fails.
pub fn capture(doc: &mut dyn Document, address: &str, with_formats: bool, max_cells: u64) -> Option<UndoSnapshot> {
    let region = match doc.resolve(address) {
        Ok(region) => region,
        Err(err) => {
            warn!("undo capture skipped for {}: {}", address, err);
            return None;
        }
    };
    if region.cell_count() > max_cells {
        warn!(
            "undo capture skipped for {}: {} cells exceeds the limit of {}",
            region,
            region.cell_count(),
            max_cells
        );
        return None;
    }
    match doc.load(&region) {
        Ok(data) => {
            debug!("captured {} ({} cells)", data.address, region.cell_count());
            Some(UndoSnapshot::from_range(data, with_formats))
        }
        Err(err) => {
            warn!("undo capture failed for {}: {}", region, err);
            None
        }
    }
}

/// Hash of the region's formulas, plus formats when `with_formats`.
pub fn fingerprint(doc: &mut dyn Document, address: &str, with_formats: bool) -> Result<u64, String> {
    let region = doc.resolve(address).map_err(|e| e.to_string())?;
    let data = doc.load(&region).map_err(|e| e.to_string())?;
    Ok(hash_range(&data.formulas, with_formats.then_some(&data.formats)))
}

fn hash_range(formulas: &[Vec<String>], formats: Option<&Vec<Vec<CellFormat>>>) -> u64 {
    let mut hasher = DefaultHasher::new();
    formulas.hash(&mut hasher);
    if let Some(formats) = formats {
        // CellFormat carries floats, so hash its serialized form
        serde_json::to_string(formats).unwrap_or_default().hash(&mut hasher);
    }
    hasher.finish()
}

/// Record the post-Action fingerprint on `snapshot`. A failed read leaves
/// the snapshot unsealed, which skips the conflict check later.
pub fn seal(doc: &mut dyn Document, snapshot: &mut UndoSnapshot) {
    match fingerprint(doc, &snapshot.address, snapshot.formats.is_some()) {
        Ok(hash) => snapshot.fingerprint = Some(hash),
        Err(err) => warn!("could not fingerprint {}: {}", snapshot.address, err),
    }
}

/// Write a snapshot back. With `verify`, refuse when the region no longer
/// matches the fingerprint taken after the Action.
pub fn restore(doc: &mut dyn Document, snapshot: &UndoSnapshot, verify: bool) -> Result<(), UndoError> {
    let region = doc
        .resolve(&snapshot.address)
        .map_err(|e| UndoError::Apply(e.to_string()))?;
    if region.rows() != snapshot.rows() || region.cols() != snapshot.cols() {
        return Err(UndoError::Apply(format!(
            "snapshot of {} does not match the region shape",
            snapshot.address
        )));
    }

    if verify {
        if let Some(expected) = snapshot.fingerprint {
            let current = fingerprint(doc, &snapshot.address, snapshot.formats.is_some()).map_err(UndoError::Apply)?;
            if current != expected {
                return Err(UndoError::Conflict { address: snapshot.address.clone() });
            }
        }
    }

    doc.enqueue(Mutation::SetFormulas {
        region: region.clone(),
        formulas: snapshot.formulas.clone(),
    });
    if let Some(formats) = &snapshot.formats {
        doc.enqueue(Mutation::RestoreFormats {
            region,
            formats: formats.clone(),
        });
    }
    doc.sync().map_err(|e| UndoError::Apply(e.to_string()))?;
    debug!("restored {}", snapshot.address);
    Ok(())
}
