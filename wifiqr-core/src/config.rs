//! Input configuration: the JSON record describing one network.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validation::{Credentials, InvalidConfiguration};

/// Used when the SSID cannot name the output file.
pub const DEFAULT_OUTPUT: &str = "out.pdf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    #[serde(default = "default_security_standard")]
    pub security_standard: String,
    #[serde(default)]
    pub hidden: String,
    /// Any other fields; scalar ones are available to templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_security_standard() -> String {
    "WPA".to_string()
}

impl WifiConfig {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            security_standard: default_security_standard(),
            hidden: String::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Validate the enumerated fields.
    pub fn credentials(&self) -> Result<Credentials, InvalidConfiguration> {
        Credentials::new(
            self.ssid.as_str(),
            self.password.as_str(),
            &self.security_standard,
            &self.hidden,
        )
    }

    /// Scalar extra fields as text. Arrays, objects and null are skipped.
    pub fn pass_through(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.extra.iter().filter_map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((name.clone(), text))
        })
    }

    /// `<ssid>.pdf`, with separators replaced so it stays one path component.
    pub fn default_output(&self) -> PathBuf {
        let stem: String = self
            .ssid
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                other => other,
            })
            .collect();

        if stem.is_empty() || stem == "." || stem == ".." {
            PathBuf::from(DEFAULT_OUTPUT)
        } else {
            PathBuf::from(format!("{}.pdf", stem))
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let cfg = WifiConfig::from_json(r#"{"ssid": "net", "password": "pw"}"#).unwrap();
        assert_eq!(cfg.security_standard, "WPA");
        assert_eq!(cfg.hidden, "");
        assert!(cfg.extra.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        assert!(WifiConfig::from_json(r#"{"ssid": "net"}"#).is_err());
    }

    #[test]
    fn test_extra_fields_collected() {
        let cfg = WifiConfig::from_json(
            r#"{"ssid": "n", "password": "p", "floor": 3, "note": "hi", "guest": true, "tags": ["a"], "x": null}"#,
        )
        .unwrap();
        let extras: BTreeMap<_, _> = cfg.pass_through().collect();
        assert_eq!(extras.get("floor").map(String::as_str), Some("3"));
        assert_eq!(extras.get("note").map(String::as_str), Some("hi"));
        assert_eq!(extras.get("guest").map(String::as_str), Some("true"));
        assert!(!extras.contains_key("tags"));
        assert!(!extras.contains_key("x"));
    }

    #[test]
    fn test_credentials_validated() {
        let mut cfg = WifiConfig::new("n", "p");
        cfg.security_standard = "WPA3".to_string();
        let err = cfg.credentials().unwrap_err();
        assert_eq!(err.field, "security_standard");
    }

    #[test]
    fn test_default_output_uses_ssid() {
        assert_eq!(WifiConfig::new("Home", "p").default_output(), PathBuf::from("Home.pdf"));
        assert_eq!(WifiConfig::new("a/b", "p").default_output(), PathBuf::from("a_b.pdf"));
        assert_eq!(WifiConfig::new("", "p").default_output(), PathBuf::from("out.pdf"));
        assert_eq!(WifiConfig::new("..", "p").default_output(), PathBuf::from("out.pdf"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"ssid": "net", "password": "pw", "hidden": "true"}"#).unwrap();

        let cfg = WifiConfig::load(&path).unwrap();
        assert_eq!(cfg.hidden, "true");
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = WifiConfig::load(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/etc/x")), PathBuf::from("/etc/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/cfg.json")), home.join("cfg.json"));
        }
    }
}
