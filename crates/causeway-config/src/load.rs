//! Configuration file loading.

use std::path::Path;

use crate::config::Config;
use crate::error::ConfigError;

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults; the loaded result is validated
/// before being returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("causeway.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "listen_port = 9500\nlog_level = \"debug\"").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listen_port, 9500);
        assert_eq!(config.log_level, crate::config::LogLevel::Debug);
        assert_eq!(config.proxy_port, 9221);
    }

    #[test]
    fn load_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("causeway.toml");
        std::fs::write(&path, "listen_port = not-a-number").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_invalid_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("causeway.toml");
        std::fs::write(&path, "discovery_interval_ms = 0").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }
}
