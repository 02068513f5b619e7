// crates/rulewarden-config/src/lib.rs
// ============================================================================
// Module: Rulewarden Configuration Library
// Description: Strict TOML configuration for the Rulewarden engine.
// Purpose: Load and validate engine, approvals, and store settings.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and a
//! fail-closed validation pass: a missing final approver, an out-of-bounds
//! cadence, or an unparseable file refuses to start the engine rather than
//! degrading silently.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ApprovalsConfig;
pub use config::ConfigError;
pub use config::EngineConfig;
pub use config::RulewardenConfig;
pub use config::StoreConfig;
