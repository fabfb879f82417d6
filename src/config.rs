/// Service configuration.
///
/// Secrets (database credentials, API keys) come from the environment,
/// loaded via dotenv by the binary. Tunable settings come from an
/// optional `flai_service.toml` next to the binary; every field has a
/// default so the file can be partial or absent.
///
/// The SVI domain-description text is loaded here exactly once at startup
/// and handed to the SVI filter as an explicit value — read-only, shared
/// by reference, never module state.

use serde::Deserialize;
use std::env;

use crate::logging::{self, DataSource};

// ---------------------------------------------------------------------------
// Environment-backed configuration
// ---------------------------------------------------------------------------

/// Credentials and keys required to run the pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub postgres_host: String,
    pub postgres_db: String,
    pub postgres_user: String,
    pub postgres_password: String,
    pub openai_api_key: String,
    pub google_maps_api_key: String,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// A missing variable is a configuration error reported once at
    /// startup — nothing downstream retries or falls back for these.
    pub fn from_env() -> Result<AppConfig, String> {
        Ok(AppConfig {
            postgres_host: require_env("POSTGRES_HOST")?,
            postgres_db: require_env("POSTGRES_DB")?,
            postgres_user: require_env("POSTGRES_USER")?,
            postgres_password: require_env("POSTGRES_PASSWORD")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            google_maps_api_key: require_env("GOOGLE_MAPS_API_KEY")?,
        })
    }

    /// Connection string for `postgres::Client::connect`.
    pub fn postgres_connection_string(&self) -> String {
        format!(
            "host={} user={} password={} dbname={}",
            self.postgres_host, self.postgres_user, self.postgres_password, self.postgres_db
        )
    }
}

fn require_env(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("{} not set — check your .env file", name))
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

/// Tunable service settings, overridable via `flai_service.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for JSON results and Markdown reports.
    pub results_dir: String,
    /// SVI release year to query.
    pub svi_release_year: i32,
    /// Forecast hours used when a forecast is requested without a count.
    pub default_forecast_hours: i64,
    /// Timeout applied to every upstream HTTP request.
    pub request_timeout_secs: u64,
    /// Path of the SVI domain-description text used for semantic matching.
    pub svi_context_path: String,
    /// Optional log file; console-only when absent.
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            results_dir: "results".to_string(),
            svi_release_year: 2022,
            default_forecast_hours: 24,
            request_timeout_secs: 30,
            svi_context_path: "prompts/social_vulnerability_index.txt".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file is absent. A present-but-invalid file is an error: silently
    /// ignoring a typo'd settings file hides misconfiguration.
    pub fn load(path: &str) -> Result<Settings, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| format!("invalid settings file {}: {}", path, e)),
            Err(_) => Ok(Settings::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// SVI domain description
// ---------------------------------------------------------------------------

/// Load the SVI description text used to enrich embedding inputs.
///
/// Returns an empty string (with a warning) when the file is missing —
/// the SVI filter degrades to matching bare variable names.
pub fn load_svi_context(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            logging::warn(
                DataSource::System,
                None,
                &format!("SVI context file not found at {}. Using basic understanding.", path),
            );
            String::new()
        }
    }
}
