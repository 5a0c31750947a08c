//! loadgrid.toml configuration parser.
//!
//! The gateway's registry is static: it is built once at startup from the
//! `[[apps]]` list (or the built-in demo list when no file is given), with
//! per-app URL overrides taken from the environment.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LoadgridError, LoadgridResult};

/// Default number of simulated instances at full load.
pub const DEFAULT_MAX_INSTANCES: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Per-call timeout for `/metrics` and other reads.
    pub read_timeout: String,
    /// Per-call timeout for forwarded updates and resets.
    pub write_timeout: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            read_timeout: "5s".to_string(),
            write_timeout: "10s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthSettings {
    /// Path probed on every worker.
    pub endpoint: String,
    pub interval: String,
    pub timeout: String,
    /// Consecutive failures before an app is marked unhealthy.
    pub unhealthy_threshold: u32,
    /// Upper bound for the failure backoff.
    pub max_backoff: String,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            endpoint: "/health".to_string(),
            interval: "5s".to_string(),
            timeout: "2s".to_string(),
            unhealthy_threshold: 1,
            max_backoff: "60s".to_string(),
        }
    }
}

impl HealthSettings {
    pub fn interval(&self) -> Duration {
        parse_duration(&self.interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(2))
    }

    pub fn max_backoff(&self) -> Duration {
        parse_duration(&self.max_backoff).unwrap_or(Duration::from_secs(60))
    }
}

/// One registered business app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Registry key, e.g. `user_management`.
    pub name: String,
    /// Human-readable label for the dashboard.
    pub display_name: Option<String>,
    /// Worker base URL, e.g. `http://127.0.0.1:8001`.
    pub url: String,
}

impl AppConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            url: url.to_string(),
        }
    }

    /// Display name, falling back to a title-cased `name`.
    pub fn display_name(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| {
            self.name
                .split(['_', '-'])
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// Environment variable that overrides this app's URL.
    pub fn url_env_var(&self) -> String {
        format!("LOADGRID_{}_URL", self.name.to_uppercase().replace('-', "_"))
    }
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> LoadgridResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadgridError::Config(format!("read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), apps = config.apps.len(), "gateway config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> LoadgridResult<Self> {
        toml::from_str(content).map_err(|e| LoadgridError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> LoadgridResult<String> {
        toml::to_string_pretty(self).map_err(|e| LoadgridError::Config(e.to_string()))
    }

    /// The four demo business apps on local ports 8001–8004.
    pub fn builtin() -> Self {
        let apps = [
            "user_management",
            "payment_processing",
            "inventory_system",
            "notification_center",
        ]
        .iter()
        .zip(8001u16..)
        .map(|(name, port)| AppConfig::new(name, &format!("http://127.0.0.1:{port}")))
        .collect();

        Self {
            gateway: GatewaySettings::default(),
            health: HealthSettings::default(),
            apps,
        }
    }

    /// Replace app URLs with `LOADGRID_<NAME>_URL` values found in `vars`.
    ///
    /// Takes the variables as an iterator so callers pass `std::env::vars()`
    /// and tests pass a fixed list.
    pub fn apply_env_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        for app in &mut self.apps {
            let key = app.url_env_var();
            if let Some((_, url)) = vars.iter().find(|(k, _)| *k == key) {
                debug!(app = %app.name, %url, "app url overridden from environment");
                app.url = url.clone();
            }
        }
    }

    /// Reject configurations the gateway cannot serve.
    pub fn validate(&self) -> LoadgridResult<()> {
        if self.apps.is_empty() {
            return Err(LoadgridError::Config("no apps configured".to_string()));
        }

        let mut seen = HashSet::new();
        for app in &self.apps {
            if app.name.trim().is_empty() {
                return Err(LoadgridError::Config("app with empty name".to_string()));
            }
            if !seen.insert(app.name.as_str()) {
                return Err(LoadgridError::Config(format!("duplicate app name: {}", app.name)));
            }
            let uri: http::Uri = app
                .url
                .parse()
                .map_err(|e| LoadgridError::Config(format!("app {}: invalid url {}: {e}", app.name, app.url)))?;
            if uri.scheme_str() != Some("http") || uri.authority().is_none() {
                return Err(LoadgridError::Config(format!(
                    "app {}: url must be http://host:port, got {}",
                    app.name, app.url
                )));
            }
        }

        for (field, value) in [
            ("gateway.read_timeout", &self.gateway.read_timeout),
            ("gateway.write_timeout", &self.gateway.write_timeout),
            ("health.interval", &self.health.interval),
            ("health.timeout", &self.health.timeout),
            ("health.max_backoff", &self.health.max_backoff),
        ] {
            if parse_duration(value).is_none() {
                return Err(LoadgridError::Config(format!("{field}: invalid duration {value:?}")));
            }
        }
        if self.health.unhealthy_threshold == 0 {
            return Err(LoadgridError::Config(
                "health.unhealthy_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        parse_duration(&self.gateway.read_timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn write_timeout(&self) -> Duration {
        parse_duration(&self.gateway.write_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Settings for one worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub app_name: String,
    pub port: u16,
    /// Instance count reported at full load.
    pub max_instances: u32,
    /// Instance count reported by the hosting platform, if any.
    pub platform_instance_count: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: "microservice".to_string(),
            port: 8000,
            max_instances: DEFAULT_MAX_INSTANCES,
            platform_instance_count: None,
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
