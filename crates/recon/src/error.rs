use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// Unrecognized (or missing required) column in a tabular source.
    Schema(String),
    /// A value outside the accepted set for a field, with its 1-based row.
    Validation { field: String, row: usize },
    /// Canonical district data missing or corrupt.
    ReferenceData(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (field kind mismatch, bad threshold, etc.).
    ConfigValidation(String),
    /// Record store read or write failure.
    Store(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(msg) => write!(f, "schema error: {msg}"),
            Self::Validation { field, row } => write!(f, "bad {field} on row {row}"),
            Self::ReferenceData(msg) => write!(f, "reference data error: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Store(msg) => write!(f, "store error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_field_and_row() {
        let err = ReconError::Validation { field: "state".into(), row: 4 };
        assert_eq!(err.to_string(), "bad state on row 4");
    }
}
