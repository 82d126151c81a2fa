use std::fmt;

/// Why a single Action could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// Target is empty or whitespace.
    InvalidTarget,
    /// Target or source address could not be resolved by the host.
    RegionResolution { address: String, reason: String },
    /// Kind needs a `source` and none was given.
    MissingSource { kind: String },
    /// `data` could not be decoded into the kind's payload.
    PayloadDecode { kind: String, reason: String },
    /// The host failed while applying the write; message is the host's.
    Execution(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget => write!(f, "action has no target range"),
            Self::RegionResolution { address, reason } => {
                write!(f, "cannot resolve range '{address}': {reason}")
            }
            Self::MissingSource { kind } => write!(f, "{kind} requires a source range"),
            Self::PayloadDecode { kind, reason } => write!(f, "invalid {kind} data: {reason}"),
            Self::Execution(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl ActionError {
    pub(crate) fn payload(kind: &str, reason: impl Into<String>) -> Self {
        Self::PayloadDecode { kind: kind.to_string(), reason: reason.into() }
    }
}

/// Why an undo did not happen. The history entry is kept in both cases.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoError {
    /// Writing the snapshot back failed.
    Apply(String),
    /// The region changed since the Action was applied.
    Conflict { address: String },
}

impl fmt::Display for UndoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(msg) => write!(f, "undo failed: {msg}"),
            Self::Conflict { address } => {
                write!(f, "undo refused: {address} was modified after the action was applied")
            }
        }
    }
}

impl std::error::Error for UndoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(ActionError::InvalidTarget.to_string(), "action has no target range");
        assert_eq!(
            ActionError::payload("values", "empty array").to_string(),
            "invalid values data: empty array"
        );
        assert_eq!(ActionError::Execution("sheet \"Sheet1\" is protected".into()).to_string(), "sheet \"Sheet1\" is protected");
        assert_eq!(
            UndoError::Conflict { address: "Sheet1!A1".into() }.to_string(),
            "undo refused: Sheet1!A1 was modified after the action was applied"
        );
    }
}
