//! File formats: CSV tables in, bincode trainval artifacts and CSV reports out.

pub mod artifact;
pub mod csv_table;
pub mod report;

pub use artifact::{load_matrix, save_trainval, ArtifactPaths, LabeledMatrix, TrainvalArtifacts};
pub use csv_table::{
    read_masks, read_metrics, read_observed, read_predictions, read_validity_table,
    read_value_table,
};
pub use report::{
    encode_averaged_metrics, encode_metrics, write_averaged_metrics, write_crossings, write_metrics,
};

use crate::error::{ReserveError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp cell; date-only cells mean midnight.
pub fn parse_timestamp(cell: &str) -> Result<NaiveDateTime> {
    let cell = cell.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ReserveError::Parse(format!("invalid timestamp '{cell}'")))
}

/// Write every file or none of them.
///
/// All payloads are staged next to their targets first; targets are only
/// replaced once every stage succeeded. Staged files are removed on failure.
pub fn write_files_atomic(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());

    for (path, bytes) in files {
        match stage(path, bytes) {
            Ok(temp) => staged.push((temp, path.as_path())),
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        }
    }

    for (i, (temp, path)) in staged.iter().enumerate() {
        if let Err(err) = fs::rename(temp, path) {
            discard(&staged[i..]);
            return Err(ReserveError::io("failed renaming temp file to", path, err));
        }
    }
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            ReserveError::InvalidParameter(format!(
                "output path '{}' must include a file name",
                path.display()
            ))
        })?
        .to_string_lossy();
    fs::create_dir_all(parent)
        .map_err(|err| ReserveError::io("failed creating directory", parent, err))?;

    let temp = parent.join(format!(".{file_name}.tmp-{}", process::id()));
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&temp)
        .map_err(|err| ReserveError::io("failed creating temp file", &temp, err))?;

    if let Err(err) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(&temp);
        return Err(ReserveError::io("failed writing temp file", &temp, err));
    }
    Ok(temp)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        let _ = fs::remove_file(temp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2020-03-01 13:45:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2020-03-01T13:45:00").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2020-03-01 13:45 ").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2020-03-01").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn atomic_write_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("nested/a.bin");
        let b = dir.path().join("b.bin");

        write_files_atomic(&[(a.clone(), vec![1, 2]), (b.clone(), vec![3])]).unwrap();

        assert_eq!(fs::read(&a).unwrap(), vec![1, 2]);
        assert_eq!(fs::read(&b).unwrap(), vec![3]);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_stage_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.bin");
        // A plain file where a parent directory should be makes staging fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let bad = blocker.join("bad.bin");

        let result = write_files_atomic(&[(good.clone(), vec![1]), (bad, vec![2])]);

        assert!(matches!(result, Err(ReserveError::Io(_))));
        assert!(!good.exists());
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["blocker".to_string()]);
    }
}
