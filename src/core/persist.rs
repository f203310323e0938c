//! Atomic JSON document persistence.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::errors::{AuditError, Result};

/// Write `value` as pretty JSON: temp file, fsync, rename over `path`.
///
/// Readers see either the previous document or the new one, never a torn
/// write. The temp file is removed on failure.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AuditError::io(parent, source))?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    let result = (|| {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            opts.mode(0o644);
        }
        let mut file = opts.open(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(AuditError::io(path, source));
    }
    Ok(())
}

/// Read a JSON object document. `Ok(None)` when the file does not exist.
///
/// Every persisted document is a JSON object; any other top-level value is
/// malformed, even when `T` could be built from it.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(AuditError::io(path, source)),
    };
    let malformed = |details: String| AuditError::MalformedDocument {
        path: path.to_path_buf(),
        details,
    };
    let value: Value = serde_json::from_str(&raw).map_err(|err| malformed(err.to_string()))?;
    if !value.is_object() {
        return Err(malformed("top-level value is not an object".to_string()));
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn writes_then_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/doc.json");
        let mut doc = BTreeMap::new();
        doc.insert("k".to_string(), 3u32);

        write_json_atomic(&path, &doc).unwrap();
        let back: Option<BTreeMap<String, u32>> = read_json(&path).unwrap();
        assert_eq!(back, Some(doc));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_is_none_and_malformed_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        assert!(read_json::<serde_json::Value>(&path).unwrap().is_none());

        fs::write(&path, "{ nope").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert_eq!(err.code(), "HYG-2002");
    }

    #[test]
    fn non_object_documents_are_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        for body in ["[]", "[[\"a\"], {\"a\": 4}, 9]", "7", "null"] {
            fs::write(&path, body).unwrap();
            let err = read_json::<BTreeMap<String, u32>>(&path).unwrap_err();
            assert_eq!(err.code(), "HYG-2002", "accepted {body}");
        }
    }

    #[test]
    fn write_into_file_parent_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let err = write_json_atomic(&blocker.join("doc.json"), &1u8).unwrap_err();
        assert_eq!(err.code(), "HYG-3002");
    }
}
