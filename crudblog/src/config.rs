use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cognito::UserPoolConfig;
use crate::connection::ConnectionConfig;
use crate::error::{BlogError, Result};

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "crudblog.toml";
/// Prefix of environment overrides, e.g. `CRUDBLOG_API__API_KEY`
pub const ENV_PREFIX: &str = "CRUDBLOG";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub auth: Auth,
    pub session: SessionFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub endpoint: String,
    pub region: String,
    pub api_key: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionFile {
    pub path: PathBuf,
}

/// Keys of the generated `amplifyconfiguration.json` this client reads
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AmplifyExports {
    #[serde(default)]
    pub aws_project_region: Option<String>,
    #[serde(rename = "aws_appsync_graphqlEndpoint", default)]
    pub appsync_endpoint: Option<String>,
    #[serde(default)]
    pub aws_appsync_region: Option<String>,
    #[serde(rename = "aws_appsync_authenticationType", default)]
    pub appsync_authentication_type: Option<String>,
    #[serde(rename = "aws_appsync_apiKey", default)]
    pub appsync_api_key: Option<String>,
    #[serde(default)]
    pub aws_cognito_region: Option<String>,
    #[serde(default)]
    pub aws_user_pools_id: Option<String>,
    #[serde(default)]
    pub aws_user_pools_web_client_id: Option<String>,
}

impl AmplifyExports {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| BlogError::config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `(settings key, value)` pairs for every key present
    fn entries(&self) -> Vec<(&'static str, String)> {
        let region = self.aws_appsync_region.clone().or_else(|| self.aws_project_region.clone());
        let cognito_region = self.aws_cognito_region.clone().or_else(|| region.clone());

        [
            ("api.endpoint", self.appsync_endpoint.clone()),
            ("api.region", region),
            ("api.api_key", self.appsync_api_key.clone()),
            ("auth.region", cognito_region),
            ("auth.user_pool_id", self.aws_user_pools_id.clone()),
            ("auth.client_id", self.aws_user_pools_web_client_id.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crudblog")
        .join("session.json")
}

impl Settings {
    /// Defaults, then `crudblog.toml` if present, then environment
    pub fn new() -> Result<Self> {
        Self::load(None, None)
    }

    /// Layered load: defaults < Amplify exports < config file < environment
    pub fn load(config_file: Option<&Path>, amplify_file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_file, amplify_file, None)
    }

    /// `load` reading overrides from `env` instead of the process environment
    fn load_with_env(
        config_file: Option<&Path>,
        amplify_file: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api.endpoint", "")?
            .set_default("api.region", "us-east-1")?
            .set_default("api.api_key", "")?
            .set_default("api.connect_timeout_ms", 10_000)?
            .set_default("api.request_timeout_ms", 30_000)?
            .set_default("auth.region", "us-east-1")?
            .set_default("auth.user_pool_id", "")?
            .set_default("auth.client_id", "")?
            .set_default("session.path", default_session_path().to_string_lossy().to_string())?;

        if let Some(path) = amplify_file {
            let exports = AmplifyExports::from_file(path)?;
            if let Some(mode) = &exports.appsync_authentication_type {
                debug!("Amplify default auth mode {} (chosen per call instead)", mode);
            }
            for (key, value) in exports.entries() {
                builder = builder.set_default(key, value)?;
            }
            info!("📄 Loaded Amplify configuration from {}", path.display());
        }

        match config_file {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE))
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.api.connect_timeout_ms == 0 || self.api.request_timeout_ms == 0 {
            return Err(BlogError::config_error("Timeouts must be greater than zero"));
        }
        if self.api.page_size == Some(0) {
            return Err(BlogError::config_error("api.page_size must be greater than zero"));
        }
        Ok(())
    }

    /// Settings required to talk to the hosted API
    pub fn require_remote(&self) -> Result<()> {
        if self.api.endpoint.is_empty() {
            return Err(BlogError::config_error(
                "api.endpoint is not set; use --amplify-config, crudblog.toml or CRUDBLOG_API__ENDPOINT",
            ));
        }
        if self.api.api_key.is_empty() {
            return Err(BlogError::config_error("api.api_key is not set"));
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.api.endpoint.clone(),
            connect_timeout_ms: self.api.connect_timeout_ms,
            request_timeout_ms: self.api.request_timeout_ms,
        }
    }

    /// User-pool settings, or `None` when no app client is configured
    pub fn user_pool_config(&self) -> Option<UserPoolConfig> {
        if self.auth.client_id.is_empty() {
            return None;
        }
        let mut config = UserPoolConfig::new(&self.auth.region, &self.auth.user_pool_id, &self.auth.client_id);
        config.endpoint = self.auth.endpoint.clone();
        config.request_timeout_ms = self.api.request_timeout_ms;
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const AMPLIFY: &str = r#"{
        "aws_project_region": "us-west-2",
        "aws_appsync_graphqlEndpoint": "https://abc.appsync-api.us-west-2.amazonaws.com/graphql",
        "aws_appsync_region": "us-west-2",
        "aws_appsync_authenticationType": "AMAZON_COGNITO_USER_POOLS",
        "aws_appsync_apiKey": "da2-fromamplify",
        "aws_cognito_region": "us-west-2",
        "aws_user_pools_id": "us-west-2_Pool",
        "aws_user_pools_web_client_id": "webclient",
        "oauth": {}
    }"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn test_amplify_exports_fill_settings() {
        let dir = tempfile::tempdir().unwrap();
        let amplify = write(dir.path(), "amplifyconfiguration.json", AMPLIFY);
        let empty = write(dir.path(), "empty.toml", "");

        let settings = Settings::load(Some(&empty), Some(&amplify)).unwrap();
        assert_eq!(
            settings.api.endpoint,
            "https://abc.appsync-api.us-west-2.amazonaws.com/graphql"
        );
        assert_eq!(settings.api.api_key, "da2-fromamplify");
        assert_eq!(settings.api.region, "us-west-2");
        settings.require_remote().unwrap();

        let pool = settings.user_pool_config().unwrap();
        assert_eq!(pool.user_pool_id, "us-west-2_Pool");
        assert_eq!(pool.client_id, "webclient");
        assert_eq!(pool.region, "us-west-2");
    }

    #[test]
    fn test_config_file_beats_amplify_exports() {
        let dir = tempfile::tempdir().unwrap();
        let amplify = write(dir.path(), "amplifyconfiguration.json", AMPLIFY);
        let file = write(
            dir.path(),
            "crudblog.toml",
            "[api]\napi_key = \"da2-override\"\npage_size = 25\n",
        );

        let settings = Settings::load(Some(&file), Some(&amplify)).unwrap();
        assert_eq!(settings.api.api_key, "da2-override");
        assert_eq!(settings.api.page_size, Some(25));
        assert_eq!(settings.auth.client_id, "webclient");
    }

    #[test]
    fn test_defaults_need_an_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write(dir.path(), "empty.toml", "");

        let settings = Settings::load(Some(&empty), None).unwrap();
        assert!(matches!(settings.require_remote(), Err(BlogError::Config(_))));
        assert!(settings.user_pool_config().is_none());
        assert_eq!(settings.connection_config().request_timeout_ms, 30_000);
    }

    #[test]
    fn test_environment_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "crudblog.toml", "[api]\napi_key = \"da2-file\"\n");
        let env = Map::from([
            ("CRUDBLOG_API__API_KEY".to_string(), "da2-from-env".to_string()),
            (
                "CRUDBLOG_API__ENDPOINT".to_string(),
                "https://env.example.com/graphql".to_string(),
            ),
            ("CRUDBLOG_AUTH__CLIENT_ID".to_string(), "env-client".to_string()),
            ("OTHER_API__API_KEY".to_string(), "ignored".to_string()),
        ]);

        let settings = Settings::load_with_env(Some(&file), None, Some(env)).unwrap();
        assert_eq!(settings.api.api_key, "da2-from-env");
        assert_eq!(settings.api.endpoint, "https://env.example.com/graphql");
        assert_eq!(settings.auth.client_id, "env-client");
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "bad.toml", "[api]\npage_size = 0\n");
        assert!(matches!(Settings::load(Some(&file), None), Err(BlogError::Config(_))));
    }

    #[test]
    fn test_missing_amplify_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(None, Some(&dir.path().join("missing.json")));
        assert!(matches!(result, Err(BlogError::Config(_))));
    }

    #[test]
    fn test_amplify_region_falls_back_to_project_region() {
        let exports: AmplifyExports =
            serde_json::from_str(r#"{"aws_project_region":"eu-central-1","aws_user_pools_web_client_id":"c"}"#)
                .unwrap();
        let entries = exports.entries();
        assert!(entries.contains(&("api.region", "eu-central-1".to_string())));
        assert!(entries.contains(&("auth.region", "eu-central-1".to_string())));
        assert!(entries.contains(&("auth.client_id", "c".to_string())));
        assert!(!entries.iter().any(|(key, _)| *key == "api.endpoint"));
    }
}
