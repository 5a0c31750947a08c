//! App registry — the gateway's view of every configured worker.
//!
//! Built once from configuration. Entries are never added or removed at
//! runtime; only their last-known levels and health change.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use http::Uri;
use serde::Serialize;
use tokio::sync::RwLock;

use loadgrid_core::{GatewayConfig, HealthStatus, LevelSet, LoadgridError, LoadgridResult};

/// One registered app as reported by `GET /apps`.
#[derive(Debug, Clone, Serialize)]
pub struct AppEntry {
    pub name: String,
    pub display_name: String,
    pub url: String,
    pub status: HealthStatus,
    /// Levels last confirmed by the worker.
    pub levels: LevelSet,
    /// Unix seconds of the last health probe, if any.
    pub last_checked: Option<u64>,
    #[serde(skip)]
    pub base: Uri,
}

/// Shared, cheaply cloneable registry.
#[derive(Clone)]
pub struct AppRegistry {
    apps: Arc<RwLock<BTreeMap<String, AppEntry>>>,
}

impl AppRegistry {
    pub fn from_config(config: &GatewayConfig) -> LoadgridResult<Self> {
        let mut apps = BTreeMap::new();
        for app in &config.apps {
            let base: Uri = app
                .url
                .parse()
                .map_err(|e| LoadgridError::Config(format!("app {}: invalid url: {e}", app.name)))?;
            apps.insert(
                app.name.clone(),
                AppEntry {
                    name: app.name.clone(),
                    display_name: app.display_name(),
                    url: app.url.clone(),
                    status: HealthStatus::Unknown,
                    levels: LevelSet::default(),
                    last_checked: None,
                    base,
                },
            );
        }
        Ok(Self {
            apps: Arc::new(RwLock::new(apps)),
        })
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }

    /// Snapshot of every entry, keyed and sorted by name.
    pub async fn list(&self) -> BTreeMap<String, AppEntry> {
        self.apps.read().await.clone()
    }

    pub async fn get(&self, name: &str) -> LoadgridResult<AppEntry> {
        self.apps
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    /// Base URL of one app.
    pub async fn endpoint(&self, name: &str) -> LoadgridResult<Uri> {
        self.apps
            .read()
            .await
            .get(name)
            .map(|e| e.base.clone())
            .ok_or_else(|| not_found(name))
    }

    /// `(name, base URL)` for every app, sorted by name.
    pub async fn endpoints(&self) -> Vec<(String, Uri)> {
        self.apps
            .read()
            .await
            .values()
            .map(|e| (e.name.clone(), e.base.clone()))
            .collect()
    }

    pub async fn set_levels(&self, name: &str, levels: LevelSet) -> LoadgridResult<()> {
        let mut apps = self.apps.write().await;
        let entry = apps.get_mut(name).ok_or_else(|| not_found(name))?;
        entry.levels = levels;
        Ok(())
    }

    /// Record a health probe outcome and stamp the check time.
    pub async fn record_health(&self, name: &str, status: HealthStatus) -> LoadgridResult<()> {
        let mut apps = self.apps.write().await;
        let entry = apps.get_mut(name).ok_or_else(|| not_found(name))?;
        entry.status = status;
        entry.last_checked = Some(unix_now());
        Ok(())
    }
}

fn not_found(name: &str) -> LoadgridError {
    LoadgridError::NotFound(format!("app {name}"))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgrid_core::ResourceKind;

    fn registry() -> AppRegistry {
        AppRegistry::from_config(&GatewayConfig::builtin()).unwrap()
    }

    #[tokio::test]
    async fn builtin_apps_start_idle_and_unknown() {
        let reg = registry();
        let apps = reg.list().await;
        assert_eq!(apps.len(), 4);
        for entry in apps.values() {
            assert_eq!(entry.levels, LevelSet::default());
            assert_eq!(entry.status, HealthStatus::Unknown);
            assert!(entry.last_checked.is_none());
        }
        assert_eq!(apps["user_management"].display_name, "User Management");
    }

    #[tokio::test]
    async fn listing_is_sorted_by_name() {
        let names: Vec<String> = registry().endpoints().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["inventory_system", "notification_center", "payment_processing", "user_management"]
        );
    }

    #[tokio::test]
    async fn unknown_app_is_not_found() {
        let reg = registry();
        assert!(matches!(reg.get("billing").await, Err(LoadgridError::NotFound(_))));
        assert!(matches!(reg.endpoint("billing").await, Err(LoadgridError::NotFound(_))));
        assert!(reg.set_levels("billing", LevelSet::default()).await.is_err());
    }

    #[tokio::test]
    async fn set_levels_and_health() {
        let reg = registry();
        let mut levels = LevelSet::default();
        levels.set(ResourceKind::Traffic, 70);
        reg.set_levels("payment_processing", levels.clone()).await.unwrap();
        reg.record_health("payment_processing", HealthStatus::Healthy).await.unwrap();

        let entry = reg.get("payment_processing").await.unwrap();
        assert_eq!(entry.levels, levels);
        assert_eq!(entry.status, HealthStatus::Healthy);
        assert!(entry.last_checked.is_some());
    }

    #[tokio::test]
    async fn entry_serializes_without_base() {
        let entry = registry().get("inventory_system").await.unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("base").is_none());
        assert_eq!(value["status"], "unknown");
        assert_eq!(value["url"], "http://127.0.0.1:8003");
        assert_eq!(value["levels"]["orders"], 0);
    }
}
