//! TOML configuration loading with validation.

use std::path::Path;

use gom_common::config::GomConfig;
use thiserror::Error;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config validation: {0}")]
    Validation(String),
}

/// Load and validate the controller configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GomConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&text)
}

/// Parse and validate configuration text.
pub fn parse_config(text: &str) -> Result<GomConfig, ConfigError> {
    let cfg: GomConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    cfg.validate().map_err(ConfigError::Validation)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GOOD: &str = r#"
        [backend]
        name = "sim"
        init = "I"

        [traj]
        kinematics = "trivial"
        cycle_time = 0.004
        servo_cycle_time = 0.001

        [[servo]]
        home = 0.0

        [servo.pid]
        p = 100.0
        out_max = 50.0
    "#;

    #[test]
    fn loads_good_config() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(GOOD.as_bytes()).unwrap();
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.joint_num(), 1);
        assert_eq!(cfg.backend.name, "sim");
        assert_eq!(cfg.backend.init, "I");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gomotion.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = parse_config("not = [valid").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_config_is_validation_error() {
        let err = parse_config("").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
