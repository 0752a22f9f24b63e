//! Per-request query settings
//!
//! Settings do not appear in the generated query but steer how it is
//! planned: routing flags, dry-run explain recording, tenant attribution.
//! The pipeline reads them; only physical processors may adjust the
//! ClickHouse settings map or the resource quota.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the request came from. Subscription requests hard-wire most flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    Http,
    Subscription,
}

/// Resource quota granted to the request by the allocation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub max_threads: u32,
}

/// Tenant identifier value (`project_id`, `organization_id`, `referrer`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantId {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    request_id: Uuid,
    source: SettingsSource,
    pub referrer: String,
    turbo: bool,
    consistent: bool,
    debug: bool,
    dry_run: bool,
    legacy: bool,
    asynchronous: bool,
    tenant_ids: BTreeMap<String, TenantId>,
    flags: BTreeMap<String, bool>,
    resource_quota: Option<ResourceQuota>,
    clickhouse_settings: BTreeMap<String, serde_json::Value>,
}

impl QuerySettings {
    /// Settings for a request received over the HTTP API
    pub fn http(referrer: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            source: SettingsSource::Http,
            referrer: referrer.into(),
            turbo: false,
            consistent: false,
            debug: false,
            dry_run: false,
            legacy: false,
            asynchronous: false,
            tenant_ids: BTreeMap::new(),
            flags: BTreeMap::new(),
            resource_quota: None,
            clickhouse_settings: BTreeMap::new(),
        }
    }

    /// Settings for a subscription query. Consistent by default; dry-run,
    /// debug, turbo, legacy and async are always off.
    pub fn subscription(referrer: impl Into<String>) -> Self {
        Self {
            source: SettingsSource::Subscription,
            consistent: true,
            ..Self::http(referrer)
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_turbo(mut self, turbo: bool) -> Self {
        self.turbo = turbo;
        self
    }

    pub fn with_consistent(mut self, consistent: bool) -> Self {
        self.consistent = consistent;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn with_tenant_id(mut self, key: impl Into<String>, value: TenantId) -> Self {
        self.tenant_ids.insert(key.into(), value);
        self
    }

    /// Sets a custom routing flag read by settings-based storage selectors
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn source(&self) -> SettingsSource {
        self.source
    }

    fn is_http(&self) -> bool {
        self.source == SettingsSource::Http
    }

    pub fn get_turbo(&self) -> bool {
        self.is_http() && self.turbo
    }

    pub fn get_consistent(&self) -> bool {
        self.consistent
    }

    pub fn get_debug(&self) -> bool {
        self.is_http() && self.debug
    }

    pub fn get_dry_run(&self) -> bool {
        self.is_http() && self.dry_run
    }

    pub fn get_legacy(&self) -> bool {
        self.is_http() && self.legacy
    }

    pub fn get_asynchronous(&self) -> bool {
        self.is_http() && self.asynchronous
    }

    pub fn tenant_ids(&self) -> &BTreeMap<String, TenantId> {
        &self.tenant_ids
    }

    /// Resolves a routing flag by name.
    ///
    /// The built-in flags (`turbo`, `consistent`, `debug`, `dry_run`,
    /// `legacy`, `asynchronous`) shadow custom flags of the same name.
    /// Unknown flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "turbo" => self.get_turbo(),
            "consistent" => self.get_consistent(),
            "debug" => self.get_debug(),
            "dry_run" => self.get_dry_run(),
            "legacy" => self.get_legacy(),
            "asynchronous" => self.get_asynchronous(),
            other => self.flags.get(other).copied().unwrap_or(false),
        }
    }

    pub fn get_resource_quota(&self) -> Option<ResourceQuota> {
        self.resource_quota
    }

    /// Subscription queries skip allocation, so the quota is dropped.
    pub fn set_resource_quota(&mut self, quota: ResourceQuota) {
        if self.is_http() {
            self.resource_quota = Some(quota);
        }
    }

    pub fn get_clickhouse_settings(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.clickhouse_settings
    }

    pub fn set_clickhouse_setting(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.clickhouse_settings.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_defaults() {
        let s = QuerySettings::http("api.test");
        assert_eq!(s.referrer, "api.test");
        assert!(!s.get_dry_run());
        assert!(!s.get_consistent());
        assert!(s.get_resource_quota().is_none());
    }

    #[test]
    fn test_subscription_hard_wires_flags() {
        let mut s = QuerySettings::subscription("subscriptions")
            .with_dry_run(true)
            .with_turbo(true)
            .with_debug(true);
        assert!(s.get_consistent());
        assert!(!s.get_dry_run());
        assert!(!s.get_turbo());
        assert!(!s.get_debug());
        s.set_resource_quota(ResourceQuota { max_threads: 4 });
        assert!(s.get_resource_quota().is_none());
    }

    #[test]
    fn test_flag_lookup() {
        let s = QuerySettings::http("r")
            .with_consistent(true)
            .with_flag("use_new_storage", true);
        assert!(s.flag("consistent"));
        assert!(s.flag("use_new_storage"));
        assert!(!s.flag("missing"));
    }

    #[test]
    fn test_clickhouse_settings_are_mutable() {
        let mut s = QuerySettings::http("r");
        s.set_clickhouse_setting("max_threads", serde_json::json!(8));
        assert_eq!(s.get_clickhouse_settings()["max_threads"], 8);
    }
}
