use crate::storage::{write_atomic, SinkError, TypedRecord};
use std::path::Path;

/// Writes the typed file as one pretty-printed JSON array
///
/// The same records always produce the same bytes.
pub fn write_typed(path: &Path, records: &[TypedRecord]) -> Result<(), SinkError> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    tracing::info!("Wrote {} typed records to {}", records.len(), path.display());
    Ok(())
}

pub fn load_typed(path: &Path) -> Result<Vec<TypedRecord>, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| SinkError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| SinkError::Malformed {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })
}
