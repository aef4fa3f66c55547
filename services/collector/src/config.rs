use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::source::SourceLocation;

/// Merged multi-year extract published alongside the dashboard.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/tovarich86/pesq_rem_CVM/main/dados_cvm_mesclados.csv";

const USER_AGENT: &str = "cvm-remuneracao/0.1 (normalizador de dados publicos da CVM)";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_source: SourceLocation,
    pub raw_fs_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub api_bind: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))?,
            None => 120,
        };

        Ok(Self {
            data_source: SourceLocation::parse(
                &lookup("CVM_DATA_URL").unwrap_or_else(|| DEFAULT_DATA_URL.to_string()),
            ),
            raw_fs_dir: PathBuf::from(lookup("RAW_FS_DIR").unwrap_or_else(|| "./data/raw".to_string())),
            http_timeout_secs,
            api_bind: lookup("API_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
        })
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_source, SourceLocation::Url(DEFAULT_DATA_URL.to_string()));
        assert_eq!(config.raw_fs_dir, PathBuf::from("./data/raw"));
        assert_eq!(config.http_timeout_secs, 120);
        assert_eq!(config.api_bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CVM_DATA_URL", "/srv/cvm/dados.csv"),
            ("RAW_FS_DIR", "/tmp/raw"),
            ("HTTP_TIMEOUT_SECS", " 30 "),
            ("API_BIND", "0.0.0.0:9000"),
        ]))
        .unwrap();
        assert_eq!(config.data_source, SourceLocation::Path(PathBuf::from("/srv/cvm/dados.csv")));
        assert_eq!(config.raw_fs_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.api_bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("HTTP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_http_client_builds() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.http_client().is_ok());
    }
}
