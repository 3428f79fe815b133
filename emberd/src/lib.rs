//! # emberd
//!
//! Configuration and storage-rule resolution for the emberd metrics
//! daemon (a carbon-compatible graphite ingestion daemon).
//!
//! This crate is the daemon's startup-time configuration resolver. It
//! owns the operating parameters (listener addresses, storage paths,
//! cache sizing) and resolves two derived rule tables from user-supplied
//! rule files:
//!
//! - the **retention schema table**: which resolution/duration tiers
//!   apply to a metric name;
//! - the **aggregation table**: which statistical method downsamples a
//!   metric's older data, and what fraction of samples must be present.
//!
//! Both tables are ordered, first-match-wins pattern rule sets with a
//! guaranteed default, so resolving a policy for a metric name never
//! fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emberd::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::new();
//! config.whisper.schemas_file = "/etc/emberd/storage-schemas.conf".to_string();
//!
//! // Resolve the rule tables once, before any worker starts.
//! config.load()?;
//!
//! // Post-load the config is read-only shared state.
//! let retention = config.retention_resolver().expect("loaded above");
//! let policy = retention.resolve("carbon.agents.web1.cpu.user");
//! for tier in policy.tiers() {
//!     println!("{}s for {}s", tier.interval.as_secs(), tier.retention.as_secs());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] — all static settings plus the two rule tables; built
//!   with defaults, overlaid from TOML by the host, finalized by one
//!   [`Config::load`] call
//! - [`RuleSet`] — ordered pattern rules with first-match resolution
//! - [`RetentionResolver`] / [`AggregationResolver`] — the read façades
//!   handed to storage and cache components
//! - [`MetricPattern`] — glob or regex matching, chosen at load time
//!
//! ## Modules
//!
//! - [`config`] — daemon configuration aggregate and `load()`
//! - [`rules`] — rule sets and resolvers
//! - [`loader`] — schemas/aggregation file parsing
//! - [`retention`] — retention tiers and compact duration syntax
//! - [`aggregation`] — aggregation methods and x-files-factor
//! - [`pattern`] — metric-name pattern matching
//! - [`error`] — error types

pub mod aggregation;
pub mod config;
pub mod error;
pub mod loader;
pub mod pattern;
pub mod retention;
pub mod rules;

// Re-export primary API types at crate root for convenience.
pub use aggregation::{AggregationMethod, AggregationPolicy};
pub use config::Config;
pub use error::{ConfigError, Result};
pub use pattern::MetricPattern;
pub use retention::{Retention, RetentionPolicy};
pub use rules::{AggregationResolver, RetentionResolver, Rule, RuleSet};
