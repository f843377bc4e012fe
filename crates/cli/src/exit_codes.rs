//! CLI Exit Code Registry
//!
//! Every exit code the `seatkeeper` binary can return is defined here.
//! Scripts driving batch imports rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                   |
//! |---------|------------|-----------------------------------------------|
//! | 0       | Universal  | Success                                       |
//! | 1       | Universal  | General error (unspecified)                   |
//! | 2       | Universal  | CLI usage error (bad args, missing file)      |
//! | 3-9     | import     | Tabular source rejected or left undecided     |
//! | 10-19   | data       | Reference data and record store failures      |
//! | 20-29   | config     | Settings file problems                        |
//! | 30-39   | audit      | Seat audit findings                           |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `recon_exit_code` if it comes from the engine

use seatkeeper_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Import (3-9)
// =============================================================================

/// Unknown, duplicate or missing required column.
pub const EXIT_IMPORT_SCHEMA: u8 = 3;

/// A cell value outside the accepted set (bad level, state, flag, date).
/// Nothing was written.
pub const EXIT_IMPORT_VALIDATION: u8 = 4;

/// The write succeeded but some records were left pending because the
/// oracle made no decision on them.
pub const EXIT_IMPORT_PENDING: u8 = 5;

// =============================================================================
// Data (10-19)
// =============================================================================

/// Canonical district file missing or malformed.
pub const EXIT_REFERENCE_DATA: u8 = 10;

/// Store could not be opened or read.
pub const EXIT_STORE: u8 = 11;

/// A bulk write finished with per-record errors.
pub const EXIT_WRITE_PARTIAL: u8 = 12;

// =============================================================================
// Config (20-29)
// =============================================================================

/// Settings file unparseable or invalid.
pub const EXIT_CONFIG: u8 = 20;

// =============================================================================
// Audit (30-39)
// =============================================================================

/// `audit seats --strict` found at least one problem seat.
pub const EXIT_AUDIT_FINDINGS: u8 = 30;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Schema(_) => EXIT_IMPORT_SCHEMA,
        ReconError::Validation { .. } => EXIT_IMPORT_VALIDATION,
        ReconError::ReferenceData(_) => EXIT_REFERENCE_DATA,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::Store(_) => EXIT_STORE,
        ReconError::Io(_) => EXIT_USAGE,
    }
}
