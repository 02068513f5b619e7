// crates/rulewarden-config/src/config.rs
// ============================================================================
// Module: Rulewarden Configuration
// Description: Configuration loading and validation for Rulewarden.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: rulewarden-core, rulewarden-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! The configuration file carries three sections: `[engine]` limits and
//! identities, `[approvals]` with the stage order and approver roster, and
//! `[store]` tuning for the SQLite backend. Loading enforces size and UTF-8
//! limits; validation enforces bounds and roster consistency before any
//! engine is constructed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use rulewarden_core::ApprovalRoster;
use rulewarden_core::EngineSettings;
use rulewarden_core::FINAL_STAGE_GROUP;
use rulewarden_core::GroupName;
use rulewarden_core::UserName;
use rulewarden_store_sqlite::DurabilityProfile;
use rulewarden_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "rulewarden.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "RULEWARDEN_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Minimum scheduler cadence in milliseconds.
pub(crate) const MIN_SCHEDULER_CADENCE_MS: u64 = 1_000;
/// Maximum scheduler cadence in milliseconds.
pub(crate) const MAX_SCHEDULER_CADENCE_MS: u64 = 3_600_000;
/// Default scheduler cadence in milliseconds.
pub(crate) const DEFAULT_SCHEDULER_CADENCE_MS: u64 = 60_000;
/// Minimum lock TTL in milliseconds.
pub(crate) const MIN_LOCK_TTL_MS: i64 = 1_000;
/// Maximum lock TTL in milliseconds.
pub(crate) const MAX_LOCK_TTL_MS: i64 = 24 * 60 * 60 * 1_000;
/// Default lock TTL in milliseconds.
pub(crate) const DEFAULT_LOCK_TTL_MS: i64 = 10 * 60 * 1_000;
/// Maximum validation sample size.
pub(crate) const MAX_VALIDATION_SAMPLE_LIMIT: usize = 10_000;
/// Default validation sample size.
pub(crate) const DEFAULT_VALIDATION_SAMPLE_LIMIT: usize = 500;
/// Maximum number of notification recipients.
pub(crate) const MAX_NOTIFY_RECIPIENTS: usize = 64;
/// Maximum number of approver groups in the stage order.
pub(crate) const MAX_STAGE_GROUPS: usize = 16;
/// Maximum number of approvers per group.
pub(crate) const MAX_APPROVERS_PER_GROUP: usize = 64;
/// Default admin group name.
const DEFAULT_ADMIN_GROUP: &str = "Admin";
/// Default store filename.
const DEFAULT_STORE_PATH: &str = "rulewarden.db";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing the config file failed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The configuration is invalid.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Rulewarden configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RulewardenConfig {
    /// Engine limits and identities.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Approval stage order and roster.
    pub approvals: ApprovalsConfig,
    /// SQLite store tuning.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Engine limits and identities.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Group whose members hold admin privileges.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,
    /// Default lock TTL in milliseconds.
    #[serde(default = "default_lock_ttl_ms")]
    pub default_lock_ttl_ms: i64,
    /// Scheduler cadence in milliseconds.
    #[serde(default = "default_scheduler_cadence_ms")]
    pub scheduler_cadence_ms: u64,
    /// Row cap for sampled validations.
    #[serde(default = "default_validation_sample_limit")]
    pub validation_sample_limit: usize,
    /// Recipients for lifecycle notifications.
    #[serde(default)]
    pub notify_recipients: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_group: DEFAULT_ADMIN_GROUP.to_string(),
            default_lock_ttl_ms: DEFAULT_LOCK_TTL_MS,
            scheduler_cadence_ms: DEFAULT_SCHEDULER_CADENCE_MS,
            validation_sample_limit: DEFAULT_VALIDATION_SAMPLE_LIMIT,
            notify_recipients: Vec::new(),
        }
    }
}

/// Approval stage order and roster.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalsConfig {
    /// Fixed base order of business-group stages.
    #[serde(default = "default_stage_order")]
    pub stage_order: Vec<String>,
    /// Registered approvers per business group.
    #[serde(default)]
    pub approvers: BTreeMap<String, Vec<String>>,
    /// Identity approving the terminal stage.
    pub final_approver: String,
}

/// SQLite store tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the store database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Durability trade-off for the connection pragmas.
    #[serde(default)]
    pub durability: DurabilityProfile,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            busy_timeout_ms: 5_000,
            durability: DurabilityProfile::default(),
        }
    }
}

/// Returns the default admin group name.
fn default_admin_group() -> String {
    DEFAULT_ADMIN_GROUP.to_string()
}

/// Returns the default lock TTL.
const fn default_lock_ttl_ms() -> i64 {
    DEFAULT_LOCK_TTL_MS
}

/// Returns the default scheduler cadence.
const fn default_scheduler_cadence_ms() -> u64 {
    DEFAULT_SCHEDULER_CADENCE_MS
}

/// Returns the default validation sample limit.
const fn default_validation_sample_limit() -> usize {
    DEFAULT_VALIDATION_SAMPLE_LIMIT
}

/// Returns the default base stage order.
fn default_stage_order() -> Vec<String> {
    vec!["BG1".to_string(), "BG2".to_string(), "BG3".to_string()]
}

/// Returns the default store path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Returns the default store busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl RulewardenConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.approvals.validate()?;
        self.store.validate()?;
        Ok(())
    }

    /// Builds the engine settings this configuration describes.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            admin_group: GroupName::new(self.engine.admin_group.clone()),
            default_lock_ttl_ms: self.engine.default_lock_ttl_ms,
            scheduler_cadence_ms: self.engine.scheduler_cadence_ms,
            validation_sample_limit: self.engine.validation_sample_limit,
            notify_recipients: self.engine.notify_recipients.clone(),
        }
    }

    /// Builds the approval roster this configuration describes.
    #[must_use]
    pub fn approval_roster(&self) -> ApprovalRoster {
        let approvers = self
            .approvals
            .approvers
            .iter()
            .map(|(group, users)| {
                (
                    GroupName::new(group.clone()),
                    users.iter().map(|user| UserName::new(user.clone())).collect(),
                )
            })
            .collect();
        ApprovalRoster {
            stage_order: self
                .approvals
                .stage_order
                .iter()
                .map(|group| GroupName::new(group.clone()))
                .collect(),
            approvers,
            final_approver: UserName::new(self.approvals.final_approver.clone()),
        }
    }

    /// Builds the store configuration this configuration describes.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.store.path.clone(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            durability: self.store.durability,
        }
    }
}

/// Resolves the config path from the argument, environment, or default.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(explicit) = path {
        return explicit.to_path_buf();
    }
    if let Ok(from_env) = env::var(CONFIG_ENV_VAR)
        && !from_env.is_empty()
    {
        return PathBuf::from(from_env);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

// ============================================================================
// SECTION: Validation
// ============================================================================

impl EngineConfig {
    /// Validates engine bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a bound is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_group.trim().is_empty() {
            return Err(ConfigError::Invalid("engine.admin_group must not be empty".to_string()));
        }
        if !(MIN_LOCK_TTL_MS..=MAX_LOCK_TTL_MS).contains(&self.default_lock_ttl_ms) {
            return Err(ConfigError::Invalid(format!(
                "engine.default_lock_ttl_ms out of range: {} (expected {MIN_LOCK_TTL_MS}..={MAX_LOCK_TTL_MS})",
                self.default_lock_ttl_ms
            )));
        }
        if !(MIN_SCHEDULER_CADENCE_MS..=MAX_SCHEDULER_CADENCE_MS)
            .contains(&self.scheduler_cadence_ms)
        {
            return Err(ConfigError::Invalid(format!(
                "engine.scheduler_cadence_ms out of range: {} (expected {MIN_SCHEDULER_CADENCE_MS}..={MAX_SCHEDULER_CADENCE_MS})",
                self.scheduler_cadence_ms
            )));
        }
        if self.validation_sample_limit == 0
            || self.validation_sample_limit > MAX_VALIDATION_SAMPLE_LIMIT
        {
            return Err(ConfigError::Invalid(format!(
                "engine.validation_sample_limit out of range: {} (expected 1..={MAX_VALIDATION_SAMPLE_LIMIT})",
                self.validation_sample_limit
            )));
        }
        if self.notify_recipients.len() > MAX_NOTIFY_RECIPIENTS {
            return Err(ConfigError::Invalid(format!(
                "engine.notify_recipients exceeds {MAX_NOTIFY_RECIPIENTS} entries"
            )));
        }
        if self.notify_recipients.iter().any(|recipient| recipient.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "engine.notify_recipients must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

impl ApprovalsConfig {
    /// Validates roster consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the roster is inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.final_approver.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "approvals.final_approver must not be empty".to_string(),
            ));
        }
        if self.stage_order.len() > MAX_STAGE_GROUPS {
            return Err(ConfigError::Invalid(format!(
                "approvals.stage_order exceeds {MAX_STAGE_GROUPS} groups"
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for group in &self.stage_order {
            if group.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "approvals.stage_order must not contain empty groups".to_string(),
                ));
            }
            if group == FINAL_STAGE_GROUP {
                return Err(ConfigError::Invalid(format!(
                    "approvals.stage_order must not name the terminal stage {FINAL_STAGE_GROUP}"
                )));
            }
            if !seen.insert(group) {
                return Err(ConfigError::Invalid(format!(
                    "approvals.stage_order repeats group {group}"
                )));
            }
            let Some(users) = self.approvers.get(group) else {
                return Err(ConfigError::Invalid(format!(
                    "approvals.approvers is missing entries for group {group}"
                )));
            };
            if users.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "approvals.approvers.{group} must list at least one approver"
                )));
            }
            if users.len() > MAX_APPROVERS_PER_GROUP {
                return Err(ConfigError::Invalid(format!(
                    "approvals.approvers.{group} exceeds {MAX_APPROVERS_PER_GROUP} approvers"
                )));
            }
            if users.iter().any(|user| user.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "approvals.approvers.{group} must not contain empty names"
                )));
            }
        }
        Ok(())
    }
}

impl StoreConfig {
    /// Validates store tuning bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a bound is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path must not be empty".to_string()));
        }
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms out of range: {} (expected 1..=60000)",
                self.busy_timeout_ms
            )));
        }
        Ok(())
    }
}
