use crate::output::{LeafRecord, OutputError, OutputResult};
use std::path::Path;

/// CSV header, matching the field order of [`LeafRecord`]
pub const CSV_HEADER: [&str; 6] = [
    "state",
    "city",
    "neighborhood",
    "residents",
    "homeowners",
    "url",
];

/// Writes records to `path`, replacing any existing file
///
/// The header row is always written, even with no records.
pub fn write_csv(path: &Path, records: &[LeafRecord]) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }

    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
