// Record storage and file I/O

pub mod csv;
pub mod sqlite;

pub use sqlite::SqliteStore;

/// SQLite store format version
/// Increment when the document layout changes in a way that old versions can't read
pub const STORE_FORMAT_VERSION: u32 = 2;
