//! Daemon configuration aggregate and startup-time rule loading.
//!
//! [`Config`] holds every static operating parameter of the daemon —
//! listener addresses, storage paths, cache sizing — plus the two rule
//! tables resolved from the schemas and aggregation files.
//!
//! # Lifecycle
//!
//! A `Config` is constructed once with [`Config::new`], optionally
//! overlaid with user-supplied settings (the section structs all
//! implement serde with the daemon's kebab-case key names, so a host
//! can deserialize a TOML file straight into one), and then finalized
//! with a single [`Config::load`] call before any listener or storage
//! worker starts. After `load` returns the value is treated as
//! read-only and shared by reference with every component; nothing in
//! this module mutates it again, so arbitrarily many reader threads can
//! resolve rules concurrently without locking.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregation::AggregationPolicy;
use crate::error::Result;
use crate::loader;
use crate::retention::RetentionPolicy;
use crate::rules::{AggregationResolver, RetentionResolver, RuleSet};

/// Common daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CommonConfig {
    /// User to drop privileges to after binding listeners. Empty means
    /// stay as the invoking user.
    pub user: String,

    /// Path of the daemon log file.
    pub logfile: String,

    /// Log level name (`debug`, `info`, `warn`, `error`).
    pub log_level: String,

    /// Prefix for the daemon's self-reported metrics. `{host}` is
    /// substituted by the host process.
    pub graph_prefix: String,

    /// Maximum CPUs the daemon will use.
    pub max_cpu: usize,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            logfile: "/var/log/emberd/emberd.log".to_string(),
            log_level: "info".to_string(),
            graph_prefix: "carbon.agents.{host}.".to_string(),
            max_cpu: 1,
        }
    }
}

/// Whisper storage settings, including the rule file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WhisperConfig {
    /// Root directory for whisper data files.
    pub data_dir: String,

    /// Path of the mandatory retention schemas file.
    pub schemas_file: String,

    /// Path of the optional aggregation file. Empty means use the
    /// synthetic default rule (average, x-files-factor 0.5).
    pub aggregation_file: String,

    /// Number of persistence worker threads.
    pub workers: usize,

    /// Throttle on whisper file updates; 0 disables the throttle.
    pub max_updates_per_second: usize,

    /// Whether the storage subsystem is enabled at all. When disabled,
    /// [`Config::load`] skips rule loading entirely.
    pub enabled: bool,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/graphite/whisper/".to_string(),
            schemas_file: "/data/graphite/schemas".to_string(),
            aggregation_file: String::new(),
            workers: 1,
            max_updates_per_second: 0,
            enabled: true,
        }
    }
}

/// In-memory write-back cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Maximum number of cached data points.
    pub max_size: usize,

    /// Size of the input channel between listeners and the cache.
    pub input_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000_000,
            input_buffer: 51_200,
        }
    }
}

/// UDP plaintext listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UdpConfig {
    /// Listen address, `host:port` with an empty host meaning all
    /// interfaces.
    pub listen: String,

    /// Whether the listener is started.
    pub enabled: bool,

    /// Log datagrams whose last line is truncated.
    pub log_incomplete: bool,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            listen: ":2003".to_string(),
            enabled: true,
            log_incomplete: false,
        }
    }
}

/// TCP listener settings, shared by the plaintext and pickle listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TcpConfig {
    /// Listen address, `host:port` with an empty host meaning all
    /// interfaces.
    pub listen: String,

    /// Whether the listener is started.
    pub enabled: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            listen: ":2003".to_string(),
            enabled: true,
        }
    }
}

impl TcpConfig {
    fn pickle_default() -> Self {
        Self {
            listen: ":2004".to_string(),
            enabled: true,
        }
    }
}

/// Carbonlink query listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CarbonlinkConfig {
    /// Listen address for cache queries.
    pub listen: String,

    /// Whether the listener is started.
    pub enabled: bool,

    /// Socket read timeout.
    #[serde(with = "duration_str")]
    pub read_timeout: Duration,

    /// Per-query timeout against the cache.
    #[serde(with = "duration_str")]
    pub query_timeout: Duration,
}

impl Default for CarbonlinkConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7002".to_string(),
            enabled: true,
            read_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_millis(100),
        }
    }
}

/// Diagnostics (pprof-style) listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PprofConfig {
    /// Listen address for the diagnostics endpoint.
    pub listen: String,

    /// Whether the endpoint is started. Off by default.
    pub enabled: bool,
}

impl Default for PprofConfig {
    fn default() -> Self {
        Self {
            listen: "localhost:7007".to_string(),
            enabled: false,
        }
    }
}

/// The daemon configuration: all operating parameters plus the two
/// rule tables.
///
/// The rule tables start out unset and are populated exactly once by
/// [`Config::load`]. A failed load leaves them unset — no partial or
/// best-effort configuration is ever installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Common daemon settings.
    pub common: CommonConfig,

    /// Whisper storage settings.
    pub whisper: WhisperConfig,

    /// Cache sizing.
    pub cache: CacheConfig,

    /// UDP plaintext listener.
    pub udp: UdpConfig,

    /// TCP plaintext listener.
    pub tcp: TcpConfig,

    /// Pickle-protocol listener.
    pub pickle: TcpConfig,

    /// Carbonlink query listener.
    pub carbonlink: CarbonlinkConfig,

    /// Diagnostics listener.
    pub pprof: PprofConfig,

    /// Retention schema rules, populated by [`Config::load`].
    #[serde(skip)]
    whisper_schemas: Option<RuleSet<RetentionPolicy>>,

    /// Aggregation rules, populated by [`Config::load`].
    #[serde(skip)]
    whisper_aggregation: Option<RuleSet<AggregationPolicy>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Returns a configuration holding the hardcoded defaults for every
    /// field. Rule tables are unset until [`Config::load`] runs.
    pub fn new() -> Self {
        Self {
            common: CommonConfig::default(),
            whisper: WhisperConfig::default(),
            cache: CacheConfig::default(),
            udp: UdpConfig::default(),
            tcp: TcpConfig::default(),
            pickle: TcpConfig::pickle_default(),
            carbonlink: CarbonlinkConfig::default(),
            pprof: PprofConfig::default(),
            whisper_schemas: None,
            whisper_aggregation: None,
        }
    }

    /// Resolves the rule tables from their files.
    ///
    /// Runs once, synchronously, before any listener or storage worker
    /// starts; blocking file reads are expected here. If the storage
    /// subsystem is disabled this is a no-op. The schemas file is
    /// mandatory; the aggregation file is optional and an empty path
    /// yields the synthetic default rule set.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::error::ConfigError`] encountered,
    /// leaving both rule tables unset. Errors here abort daemon startup.
    pub fn load(&mut self) -> Result<()> {
        if !self.whisper.enabled {
            return Ok(());
        }

        let schemas = loader::read_retention_rules(&self.whisper.schemas_file)?;

        let aggregation = if self.whisper.aggregation_file.is_empty() {
            loader::default_aggregation_rules()
        } else {
            loader::read_aggregation_rules(&self.whisper.aggregation_file)?
        };

        // Install both tables only after both parsed cleanly.
        self.whisper_schemas = Some(schemas);
        self.whisper_aggregation = Some(aggregation);

        info!(
            schemas_file = %self.whisper.schemas_file,
            aggregation_file = %self.whisper.aggregation_file,
            "configuration loaded"
        );

        Ok(())
    }

    /// The loaded retention schema rules, or `None` before a successful
    /// [`Config::load`] (or when storage is disabled).
    pub fn whisper_schemas(&self) -> Option<&RuleSet<RetentionPolicy>> {
        self.whisper_schemas.as_ref()
    }

    /// The loaded aggregation rules, or `None` before a successful
    /// [`Config::load`] (or when storage is disabled).
    pub fn whisper_aggregation(&self) -> Option<&RuleSet<AggregationPolicy>> {
        self.whisper_aggregation.as_ref()
    }

    /// Read façade over the retention rules for storage and cache
    /// components. `None` until [`Config::load`] has succeeded.
    pub fn retention_resolver(&self) -> Option<RetentionResolver<'_>> {
        self.whisper_schemas.as_ref().map(RetentionResolver::new)
    }

    /// Read façade over the aggregation rules for storage and cache
    /// components. `None` until [`Config::load`] has succeeded.
    pub fn aggregation_resolver(&self) -> Option<AggregationResolver<'_>> {
        self.whisper_aggregation
            .as_ref()
            .map(AggregationResolver::new)
    }
}

/// Serde support for compact duration strings.
///
/// Timeout fields are written the way the daemon's TOML config spells
/// them: `"30s"`, `"100ms"`, `"1m"`. Bare integers mean seconds.
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        format_duration(*duration).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse_duration(&text).map_err(D::Error::custom)
    }

    pub(super) fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1_000 || millis % 1_000 != 0 {
            return format!("{millis}ms");
        }

        let secs = duration.as_secs();
        if secs % 3_600 == 0 {
            format!("{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }

    pub(super) fn parse_duration(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty duration".to_string());
        }

        let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
            Some(pos) => text.split_at(pos),
            None => (text, "s"),
        };

        let amount: u64 = digits
            .parse()
            .map_err(|e| format!("invalid duration '{text}': {e}"))?;

        match unit {
            "ms" => Ok(Duration::from_millis(amount)),
            "s" => Ok(Duration::from_secs(amount)),
            "m" => Ok(Duration::from_secs(amount * 60)),
            "h" => Ok(Duration::from_secs(amount * 3_600)),
            _ => Err(format!("invalid duration '{text}': unknown unit '{unit}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_daemon_literals() {
        let config = Config::new();

        assert_eq!(config.common.log_level, "info");
        assert_eq!(config.common.graph_prefix, "carbon.agents.{host}.");
        assert_eq!(config.common.max_cpu, 1);

        assert_eq!(config.whisper.data_dir, "/data/graphite/whisper/");
        assert_eq!(config.whisper.schemas_file, "/data/graphite/schemas");
        assert_eq!(config.whisper.aggregation_file, "");
        assert!(config.whisper.enabled);
        assert_eq!(config.whisper.workers, 1);
        assert_eq!(config.whisper.max_updates_per_second, 0);

        assert_eq!(config.cache.max_size, 1_000_000);
        assert_eq!(config.cache.input_buffer, 51_200);

        assert_eq!(config.udp.listen, ":2003");
        assert!(config.udp.enabled);
        assert_eq!(config.tcp.listen, ":2003");
        assert!(config.tcp.enabled);
        assert_eq!(config.pickle.listen, ":2004");
        assert!(config.pickle.enabled);

        assert_eq!(config.carbonlink.listen, "127.0.0.1:7002");
        assert!(config.carbonlink.enabled);
        assert_eq!(config.carbonlink.read_timeout, Duration::from_secs(30));
        assert_eq!(config.carbonlink.query_timeout, Duration::from_millis(100));

        assert_eq!(config.pprof.listen, "localhost:7007");
        assert!(!config.pprof.enabled);

        assert!(config.whisper_schemas().is_none());
        assert!(config.whisper_aggregation().is_none());
    }

    #[test]
    fn test_load_noop_when_storage_disabled() {
        let mut config = Config::new();
        config.whisper.enabled = false;
        config.whisper.schemas_file = "/definitely/not/here".to_string();

        config.load().unwrap();
        assert!(config.retention_resolver().is_none());
        assert!(config.aggregation_resolver().is_none());
    }

    #[test]
    fn test_load_missing_schemas_is_fatal() {
        let mut config = Config::new();
        config.whisper.schemas_file = "/definitely/not/here".to_string();

        assert!(config.load().is_err());
        assert!(config.whisper_schemas().is_none());
        assert!(config.whisper_aggregation().is_none());
    }

    #[test]
    fn test_duration_str_round_trip() {
        for (text, expected) in [
            ("30s", Duration::from_secs(30)),
            ("100ms", Duration::from_millis(100)),
            ("2m", Duration::from_secs(120)),
            ("1h", Duration::from_secs(3_600)),
            ("45", Duration::from_secs(45)),
        ] {
            assert_eq!(duration_str::parse_duration(text).unwrap(), expected, "{text}");
        }

        assert_eq!(duration_str::format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(
            duration_str::format_duration(Duration::from_millis(100)),
            "100ms"
        );
        assert_eq!(duration_str::format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(
            duration_str::format_duration(Duration::from_secs(3_600)),
            "1h"
        );

        assert!(duration_str::parse_duration("").is_err());
        assert!(duration_str::parse_duration("10x").is_err());
    }
}
