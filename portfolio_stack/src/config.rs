use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "portfolio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}\n{source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file {path:?}\n{source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Who may assume the deployment role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CiConfig {
    pub org: String,
    pub repo: String,
    /// grants the role full control over the services a stack deploy touches.
    /// Turn off once deploys no longer run from CI.
    pub management_grant: bool,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            org: "CarsonDavis".to_string(),
            repo: "code-by-carson".to_string(),
            management_grant: true,
        }
    }
}

/// Everything that varies between deployments of the site stack.
///
/// Read from `portfolio.toml`:
/// ```toml
/// stack_name = "CodeByCarsonStack"
/// domain = "codebycarson.com"
///
/// [ci]
/// org = "CarsonDavis"
/// repo = "code-by-carson"
/// ```
/// Any key left out keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub stack_name: String,
    pub account: String,
    pub region: String,
    /// apex domain. `www.<domain>` is served too.
    pub domain: String,
    /// skips the Route 53 lookup when set.
    pub hosted_zone_id: Option<String>,
    pub ci: CiConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "CodeByCarsonStack".to_string(),
            account: "420665616125".to_string(),
            region: "us-east-1".to_string(),
            domain: "codebycarson.com".to_string(),
            hosted_zone_id: None,
            ci: CiConfig::default(),
        }
    }
}

impl StackConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// like [`StackConfig::load`], but a missing file means all defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn www_domain(&self) -> String {
        format!("www.{}", self.domain)
    }

    pub fn site_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_files_keep_defaults() {
        let config = StackConfig::from_toml_str(
            "domain = \"example.com\"\n[ci]\nmanagement_grant = false\n",
            Path::new("portfolio.toml"),
        )
        .unwrap();
        assert_eq!(config.domain, "example.com");
        assert_eq!(config.stack_name, "CodeByCarsonStack");
        assert_eq!(config.ci.org, "CarsonDavis");
        assert!(!config.ci.management_grant);
        assert_eq!(config.www_domain(), "www.example.com");
        assert_eq!(config.site_url(), "https://example.com");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = StackConfig::from_toml_str("domian = \"typo.com\"", Path::new("portfolio.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::load_or_default(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, StackConfig::default());
        assert!(StackConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hosted_zone_id = \"Z0123456789\"\nregion = \"us-west-2\"").unwrap();
        let config = StackConfig::load(file.path()).unwrap();
        assert_eq!(config.hosted_zone_id.as_deref(), Some("Z0123456789"));
        assert_eq!(config.region, "us-west-2");
    }
}
