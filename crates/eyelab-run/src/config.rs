use anyhow::{Context, Result};
use eyelab_lib::SessionConfig;
use std::fs;
use std::path::Path;

pub fn read_session_config(path: &Path) -> Result<SessionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read session config {}", path.display()))?;
    let config: SessionConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing session config {}", path.display()))?;
    Ok(config)
}

/// Read `path` when given, otherwise use the built-in defaults.
pub fn load_session_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => read_session_config(path),
        None => Ok(SessionConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn omitted_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(
            &path,
            "request_timeout_ms = 500\ncalibration_points = [[0.5, 0.5], [0.1, 0.9]]\n",
        )
        .unwrap();
        let config = read_session_config(&path).unwrap();
        let defaults = SessionConfig::default();
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.calibration_points, vec![[0.5, 0.5], [0.1, 0.9]]);
        assert_eq!(config.discovery_timeout_ms, defaults.discovery_timeout_ms);
        assert_eq!(config.point_duration_s, defaults.point_duration_s);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_session_config(Path::new("/nonexistent/session.toml")).unwrap_err();
        assert!(err.to_string().contains("session.toml"));
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(load_session_config(None).unwrap(), SessionConfig::default());
    }
}
