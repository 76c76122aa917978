use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ConfigError;

/// Load `path`. A missing file is not an error: defaults are written to
/// `path` and returned, so the file exists on first run onward.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(path = %path.display(), "config file absent, writing defaults");
        let config = Config::default();
        save(path, &config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    config.validate()?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Persist `config` to `path` atomically: serialize to a sibling temp file,
/// then rename onto the real path so readers never see a partial write.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    use std::io::Write;
    tmp.write_all(yaml.as_bytes()).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tmp.flush().map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tmp.persist(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e.error,
    })?;
    warn_if_unreadable_back(path);
    Ok(())
}

fn warn_if_unreadable_back(path: &Path) {
    if let Err(e) = std::fs::metadata(path) {
        warn!(path = %path.display(), error = %e, "config file unreadable immediately after write");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        let mut config = Config::default();
        config.health.concurrency = 8;
        save(&path, &config).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn rejects_invalid_config_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk-manager.yaml");
        std::fs::write(&path, "version: \"1\"\nhealth:\n  concurrency: 0\n").unwrap();
        assert!(load(&path).is_err());
    }
}
