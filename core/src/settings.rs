//! Transport configuration resolved from the environment.
//!
//! [`BusSettings`] is an immutable snapshot: it is built once by
//! [`BusSettings::from_env`] at process start and passed by reference to every
//! component that needs it. Nothing else in the workspace reads the
//! environment for transport parameters.
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `KAFKA_BOOTSTRAP_SERVERS` | `localhost:9092` |
//! | `KAFKA_GROUP_ID` | `courier-consumer` |
//! | `KAFKA_INPUT_TOPIC` | `courier-input` |
//! | `KAFKA_OUTPUT_TOPIC` | `courier-output` |
//! | `KAFKA_SECURITY_PROTOCOL` | unset |
//! | `KAFKA_SASL_MECHANISM` | unset |
//! | `KAFKA_USERNAME` / `KAFKA_PASSWORD` | unset |
//! | `KAFKA_AUTO_OFFSET_RESET` | `earliest` |
//! | `KAFKA_POLL_TIMEOUT_MS` | `1000` |
//! | `KAFKA_FLUSH_TIMEOUT_MS` | `5000` |
//! | `KAFKA_SESSION_TIMEOUT_MS` | `45000` |
//! | `MESSAGE_BUS_MODE` | `kafka` |
//! | `WORKER_HANDLER_TIMEOUT_MS` | unset (no timeout) |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default SASL security protocol when credentials are supplied without one.
pub const DEFAULT_SASL_PROTOCOL: &str = "SASL_SSL";

/// Default SASL mechanism when credentials are supplied without one.
pub const DEFAULT_SASL_MECHANISM: &str = "PLAIN";

/// Errors raised while interpreting configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// `MESSAGE_BUS_MODE` holds an unknown value
    #[error("Unknown message bus mode '{0}' (expected 'kafka' or 'mock')")]
    UnknownMode(String),
}

/// Which transport implementation the process should run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusMode {
    /// Real broker transport (rdkafka)
    #[default]
    Kafka,
    /// In-memory transport, no network
    Mock,
}

impl FromStr for BusMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" | "redpanda" => Ok(Self::Kafka),
            "mock" | "memory" => Ok(Self::Mock),
            other => Err(SettingsError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for BusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kafka => write!(f, "kafka"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Broker connection, topic and authentication parameters.
///
/// Fields are public for inspection; the struct is never mutated after
/// construction; build a new value for a new configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusSettings {
    /// Comma-separated broker addresses
    pub bootstrap_servers: String,
    /// Consumer group id
    pub group_id: String,
    /// Topic the worker consumes from
    pub input_topic: String,
    /// Topic the worker produces responses to
    pub output_topic: String,
    /// Security protocol: `PLAINTEXT`, `SSL`, `SASL_PLAINTEXT`, `SASL_SSL`
    pub security_protocol: Option<String>,
    /// SASL mechanism: `PLAIN`, `SCRAM-SHA-256`, `SCRAM-SHA-512`
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub sasl_username: Option<String>,
    /// SASL password (never serialized, redacted in `Debug`)
    #[serde(skip_serializing, default)]
    pub sasl_password: Option<String>,
    /// Where a new consumer group starts reading
    pub auto_offset_reset: String,
    /// Upper bound for a single poll
    pub poll_timeout: Duration,
    /// Upper bound for the producer flush at shutdown
    pub flush_timeout: Duration,
    /// Consumer group session timeout in milliseconds
    pub session_timeout_ms: u32,
    /// Selected transport
    pub mode: BusMode,
    /// Optional bound on a single processor call
    pub handler_timeout: Option<Duration>,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "courier-consumer".to_string(),
            input_topic: "courier-input".to_string(),
            output_topic: "courier-output".to_string(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            auto_offset_reset: "earliest".to_string(),
            poll_timeout: Duration::from_millis(1000),
            flush_timeout: Duration::from_millis(5000),
            session_timeout_ms: 45_000,
            mode: BusMode::Kafka,
            handler_timeout: None,
        }
    }
}

impl BusSettings {
    /// Load settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownMode`] if `MESSAGE_BUS_MODE` is not a
    /// recognised transport.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset. Numeric values that fail to parse
    /// fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownMode`] if `MESSAGE_BUS_MODE` is not a
    /// recognised transport.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let millis = |key: &str| var(key).and_then(|s| s.trim().parse::<u64>().ok());

        let mode = match var("MESSAGE_BUS_MODE") {
            Some(raw) => raw.parse()?,
            None => BusMode::default(),
        };

        let defaults = Self::default();
        Ok(Self {
            bootstrap_servers: var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or(defaults.bootstrap_servers),
            group_id: var("KAFKA_GROUP_ID").unwrap_or(defaults.group_id),
            input_topic: var("KAFKA_INPUT_TOPIC").unwrap_or(defaults.input_topic),
            output_topic: var("KAFKA_OUTPUT_TOPIC").unwrap_or(defaults.output_topic),
            security_protocol: var("KAFKA_SECURITY_PROTOCOL"),
            sasl_mechanism: var("KAFKA_SASL_MECHANISM"),
            sasl_username: var("KAFKA_USERNAME"),
            sasl_password: var("KAFKA_PASSWORD"),
            auto_offset_reset: var("KAFKA_AUTO_OFFSET_RESET").unwrap_or(defaults.auto_offset_reset),
            poll_timeout: millis("KAFKA_POLL_TIMEOUT_MS")
                .map_or(defaults.poll_timeout, Duration::from_millis),
            flush_timeout: millis("KAFKA_FLUSH_TIMEOUT_MS")
                .map_or(defaults.flush_timeout, Duration::from_millis),
            session_timeout_ms: var("KAFKA_SESSION_TIMEOUT_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.session_timeout_ms),
            mode,
            handler_timeout: millis("WORKER_HANDLER_TIMEOUT_MS").map(Duration::from_millis),
        })
    }

    /// Whether both SASL credentials are present.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.sasl_username.is_some() && self.sasl_password.is_some()
    }

    /// Client properties for the consumer.
    ///
    /// Auto commit is always disabled: offsets are committed by the bus only
    /// after the handler reports success.
    #[must_use]
    pub fn consumer_config(&self) -> Vec<(&'static str, String)> {
        let mut config = vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("group.id", self.group_id.clone()),
            ("enable.auto.commit", "false".to_string()),
            ("auto.offset.reset", self.auto_offset_reset.clone()),
            ("session.timeout.ms", self.session_timeout_ms.to_string()),
            ("enable.partition.eof", "false".to_string()),
        ];
        self.extend_security(&mut config);
        config
    }

    /// Client properties for the producer.
    #[must_use]
    pub fn producer_config(&self) -> Vec<(&'static str, String)> {
        let mut config = vec![("bootstrap.servers", self.bootstrap_servers.clone())];
        self.extend_security(&mut config);
        config
    }

    fn extend_security(&self, config: &mut Vec<(&'static str, String)>) {
        if let (Some(username), Some(password)) = (&self.sasl_username, &self.sasl_password) {
            config.push((
                "security.protocol",
                self.security_protocol
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SASL_PROTOCOL.to_string()),
            ));
            config.push((
                "sasl.mechanisms",
                self.sasl_mechanism
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SASL_MECHANISM.to_string()),
            ));
            config.push(("sasl.username", username.clone()));
            config.push(("sasl.password", password.clone()));
        } else if let Some(protocol) = &self.security_protocol {
            config.push(("security.protocol", protocol.clone()));
        }
    }
}

impl fmt::Debug for BusSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSettings")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("group_id", &self.group_id)
            .field("input_topic", &self.input_topic)
            .field("output_topic", &self.output_topic)
            .field("security_protocol", &self.security_protocol)
            .field("sasl_mechanism", &self.sasl_mechanism)
            .field("sasl_username", &self.sasl_username)
            .field("sasl_password", &self.sasl_password.as_ref().map(|_| "<redacted>"))
            .field("auto_offset_reset", &self.auto_offset_reset)
            .field("poll_timeout", &self.poll_timeout)
            .field("flush_timeout", &self.flush_timeout)
            .field("session_timeout_ms", &self.session_timeout_ms)
            .field("mode", &self.mode)
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}
