//! Output module for reporting on harvested data
//!
//! This module handles:
//! - Aggregating typed records into summary statistics
//! - Printing those statistics for `--stats`

pub mod stats;

pub use stats::{print_statistics, summarize, HarvestStatistics, Mean};

use crate::storage::{load_typed, SinkError};
use std::path::Path;

/// Loads the typed file and aggregates it
pub fn load_statistics(typed_path: &Path) -> Result<HarvestStatistics, SinkError> {
    let records = load_typed(typed_path)?;
    Ok(summarize(&records))
}
