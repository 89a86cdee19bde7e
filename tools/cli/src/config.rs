//! On-disk configuration and per-file metadata sidecars.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use vaultdrive_storage::gdrive::{GDriveConfig, Tokens};
use vaultdrive_storage::MetadataMap;

/// `<config_dir>/vaultdrive/config.json`
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(dir.join("vaultdrive").join("config.json"))
}

/// Load the Drive configuration written by `login`.
pub fn load_config(path: &Path) -> Result<GDriveConfig> {
    let json = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config {}; run `vaultdrive login` first",
            path.display()
        )
    })?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config {}", path.display()))
}

/// Write the Drive configuration, creating parent directories.
pub fn save_config(path: &Path, config: &GDriveConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Replace the stored tokens with freshly refreshed ones.
pub fn persist_tokens(path: &Path, tokens_json: &str) -> Result<()> {
    let tokens: Tokens = serde_json::from_str(tokens_json).context("Invalid token JSON")?;
    let mut config = load_config(path)?;
    config.tokens = tokens;
    save_config(path, &config)
}

/// Metadata sidecar kept next to a pulled file.
pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// Read the sidecar for `file`, if there is one.
pub fn read_sidecar(file: &Path) -> Result<Option<MetadataMap>> {
    let path = sidecar_path(file);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let map = serde_json::from_str(&json)
        .with_context(|| format!("Invalid metadata in {}", path.display()))?;
    Ok(Some(map))
}

/// Write the sidecar for `file`.
pub fn write_sidecar(file: &Path, metadata: &MetadataMap) -> Result<()> {
    let path = sidecar_path(file);
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config() -> GDriveConfig {
        GDriveConfig {
            tokens: Tokens {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            },
            auth_config: None,
        }
    }

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        save_config(&path, &test_config()).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.tokens.access_token, "access");
        assert!(loaded.auth_config.is_none());
    }

    #[test]
    fn test_missing_config_mentions_login() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("config.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("vaultdrive login"));
    }

    #[test]
    fn test_persist_tokens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        save_config(&path, &test_config()).unwrap();

        let mut refreshed = test_config().tokens;
        refreshed.access_token = "refreshed".to_string();
        persist_tokens(&path, &serde_json::to_string(&refreshed).unwrap()).unwrap();

        assert_eq!(load_config(&path).unwrap().tokens.access_token, "refreshed");
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/pwsafe.kdbx")),
            PathBuf::from("/tmp/pwsafe.kdbx.meta.json")
        );
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pwsafe.kdbx");

        assert!(read_sidecar(&file).unwrap().is_none());

        let mut map = MetadataMap::new();
        map.insert("gdrive".to_string(), json!({"id": "1", "version": "3"}));
        write_sidecar(&file, &map).unwrap();

        assert_eq!(read_sidecar(&file).unwrap(), Some(map));
    }
}
