//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code  | Domain    | Description                               |
//! |-------|-----------|-------------------------------------------|
//! | 0     | Universal | Success                                   |
//! | 1     | Universal | General error (unspecified)               |
//! | 2     | Universal | Usage error (bad args, bad selection)     |
//! | 3     | io        | Cannot read or write a file               |
//! | 4     | parse     | Actions file or CSV cannot be parsed      |
//! | 5     | apply     | At least one Action failed or undo failed |
//! | 10-19 | ai        | AI provider/key/request codes             |

use crate::ai::AskError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, out-of-range selection.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Files and Actions (3-5)
// =============================================================================

/// Input or output file cannot be read or written.
pub const EXIT_IO: u8 = 3;

/// Actions JSON, markup or CSV is malformed.
pub const EXIT_PARSE: u8 = 4;

/// The batch ran but some Actions failed (or an undo was refused).
pub const EXIT_APPLY_FAILED: u8 = 5;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none) or provider not supported by the client.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Network, HTTP or response-format failure talking to the model.
pub const EXIT_AI_REQUEST: u8 = 12;

/// Map a model client error to its exit code.
pub fn ask_exit_code(err: &AskError) -> u8 {
    match err {
        AskError::NotConfigured(_) | AskError::NotImplemented(_) => EXIT_AI_DISABLED,
        AskError::MissingKey => EXIT_AI_MISSING_KEY,
        AskError::NetworkError(_)
        | AskError::ApiError { .. }
        | AskError::ParseError(_)
        | AskError::InvalidResponse(_) => EXIT_AI_REQUEST,
    }
}
