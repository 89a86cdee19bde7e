//! Google Drive entry in the persisted metadata map.
//!
//! Callers persist a flat [`MetadataMap`] next to their local copy. This
//! provider owns exactly one key of it; everything else belongs to sibling
//! providers and is carried through untouched.

use vaultdrive_common::{Error, RemoteFileMetadata, Result};

use crate::provider::MetadataMap;

/// Key under which the Drive snapshot is stored.
pub const METADATA_KEY: &str = "gdrive";

/// Read the Drive snapshot out of a persisted map.
///
/// Returns `None` when the key is absent. The value may be a JSON object or a
/// string holding encoded JSON.
///
/// # Errors
/// - `Serialization` if the stored value is not a valid snapshot
pub fn read_metadata(map: &MetadataMap) -> Result<Option<RemoteFileMetadata>> {
    let Some(value) = map.get(METADATA_KEY) else {
        return Ok(None);
    };

    let metadata = match value {
        serde_json::Value::String(encoded) => serde_json::from_str(encoded),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| Error::Serialization(format!("Invalid stored Drive metadata: {}", e)))?;

    Ok(Some(metadata))
}

/// Store `metadata` in a copy of `base`, keeping every other key.
pub fn write_metadata(
    base: Option<&MetadataMap>,
    metadata: &RemoteFileMetadata,
) -> Result<MetadataMap> {
    let mut map = base.cloned().unwrap_or_default();
    map.insert(METADATA_KEY.to_string(), serde_json::to_value(metadata)?);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(version: &str) -> RemoteFileMetadata {
        RemoteFileMetadata {
            id: "f1".to_string(),
            name: "pwsafe.kdbx".to_string(),
            version: version.to_string(),
            mime_type: "application/octet-stream".to_string(),
            modified_time: None,
            size: Some(10),
            md5_checksum: None,
            parents: vec!["root".to_string()],
        }
    }

    #[test]
    fn test_missing_key_is_none() {
        let mut map = MetadataMap::new();
        map.insert("dropbox".to_string(), json!({"rev": "x"}));
        assert!(read_metadata(&map).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let map = write_metadata(None, &snapshot("5")).unwrap();
        assert_eq!(map[METADATA_KEY]["version"], "5");
        assert_eq!(read_metadata(&map).unwrap(), Some(snapshot("5")));
    }

    #[test]
    fn test_write_preserves_sibling_keys() {
        let mut base = MetadataMap::new();
        base.insert("dropbox".to_string(), json!({"rev": "x"}));
        base.insert(METADATA_KEY.to_string(), serde_json::to_value(snapshot("1")).unwrap());

        let map = write_metadata(Some(&base), &snapshot("2")).unwrap();
        assert_eq!(map["dropbox"], json!({"rev": "x"}));
        assert_eq!(map[METADATA_KEY]["version"], "2");
        // The base map is not modified.
        assert_eq!(base[METADATA_KEY]["version"], "1");
    }

    #[test]
    fn test_read_string_encoded_value() {
        let encoded = serde_json::to_string(&snapshot("9")).unwrap();
        let mut map = MetadataMap::new();
        map.insert(METADATA_KEY.to_string(), json!(encoded));

        assert_eq!(read_metadata(&map).unwrap().unwrap().version, "9");
    }

    #[test]
    fn test_read_invalid_value() {
        let mut map = MetadataMap::new();
        map.insert(METADATA_KEY.to_string(), json!(17));
        assert!(matches!(read_metadata(&map), Err(Error::Serialization(_))));
    }
}
