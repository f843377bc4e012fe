//! `seatkeeper-recon`: legislator record reconciliation and merge engine.
//!
//! Pure engine crate: talks to storage through [`RecordStore`] and to a
//! human (or a policy) through [`ResolutionOracle`]. No CLI or file IO.

pub mod audit;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod import;
pub mod listing;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod registry;
pub mod states;
pub mod store;
pub mod template;

pub use config::EngineConfig;
pub use error::ReconError;
pub use import::{import_records, ImportBatch, ImportOptions, TabularSource};
pub use model::{Field, Filter, Level, LegislatorRecord, MergeDecision, ResolutionOutcome, WriteOutcome};
pub use oracle::{ResolutionOracle, ScriptedOracle, ThresholdOracle};
pub use registry::DistrictRegistry;
pub use store::{MemoryStore, RecordStore};
