//! `gridpilot-actions`: turn model-proposed Actions into document edits.
//!
//! Decodes each Action's payload, applies it through the host's
//! queue-then-sync API, captures what undo needs beforehand and keeps a
//! bounded history. No IO or network dependencies.

pub mod action;
pub mod batch;
pub mod catalog;
pub mod chart;
pub mod classify;
pub mod error;
pub mod executor;
pub mod history;
pub mod markup;
pub mod payload;
pub mod preview;
pub mod session;
pub mod undo;

pub use action::Action;
pub use batch::{ActionOutcome, ActionReport, BatchPolicy, BatchReport};
pub use catalog::{ActionKind, Category, UndoPolicy};
pub use classify::{classify, TaskType};
pub use error::{ActionError, UndoError};
pub use executor::{Executor, ExecutorConfig, Plan};
pub use history::{HistoryEntry, HistoryLedger, UndoOutcome};
pub use markup::{parse_response, ParsedResponse};
pub use preview::{has_any_selected, selected_subset, PreviewState};
pub use session::{Session, SessionConfig};
pub use undo::UndoSnapshot;
