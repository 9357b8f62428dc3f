//! Server identity, transport configuration and lifecycle status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a tracked server, unique within one manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Create a server id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of transport used to reach a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Subprocess speaking over stdin/stdout pipes
    Stdio,
    /// HTTP streaming endpoint
    Stream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Stream => f.write_str("stream"),
        }
    }
}

/// How to reach a server.
///
/// The core never opens these itself; the configuration is handed to the
/// `TransportConnector` port on every connect attempt.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a subprocess and talk over its pipes.
    Stdio {
        /// Executable name or path, without arguments
        command: String,
        /// Arguments passed to the executable
        #[serde(default)]
        args: Vec<String>,
        /// Extra environment variables for the child
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// Connect to an HTTP streaming endpoint.
    Stream {
        /// Endpoint URL (`http://` or `https://`)
        url: String,
        /// Credential supplied by the caller, sent as a bearer token
        #[serde(default, rename = "bearerToken", skip_serializing_if = "Option::is_none")]
        bearer_token: Option<String>,
    },
}

impl TransportConfig {
    /// Create a stdio configuration with no extra environment.
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    /// Create a stream configuration.
    pub fn stream(url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self::Stream {
            url: url.into(),
            bearer_token,
        }
    }

    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio { .. } => TransportKind::Stdio,
            Self::Stream { .. } => TransportKind::Stream,
        }
    }

    /// Validate the configuration before it is handed to a connector.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Stdio { command, .. } => {
                if command.trim().is_empty() {
                    return Err("Stdio server command cannot be empty".to_string());
                }
                // Flags belong in args, not in the command itself
                if command.contains(char::is_whitespace) {
                    return Err(format!(
                        "Stdio server command must be an executable only, got '{command}'. \
                         Put flags and arguments in 'args'."
                    ));
                }
                Ok(())
            }
            Self::Stream { url, .. } => {
                if url.is_empty() {
                    return Err("Stream server url cannot be empty".to_string());
                }
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("Stream server url must be http(s): {url}"));
                }
                Ok(())
            }
        }
    }
}

// Bearer tokens must never end up in logs.
impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio { command, args, env } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env_keys", &env.keys().collect::<Vec<_>>())
                .finish(),
            Self::Stream { url, bearer_token } => f
                .debug_struct("Stream")
                .field("url", url)
                .field("bearer_token", &bearer_token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// A server to be tracked by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub id: ServerId,
    /// Display name; the id is shown when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub transport: TransportConfig,
}

impl ServerSpec {
    pub fn new(id: impl Into<ServerId>, transport: TransportConfig) -> Self {
        Self {
            id: id.into(),
            label: None,
            transport,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label used for display, falling back to the id.
    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.id.as_str().to_string())
    }
}

/// Lifecycle status of one server connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// No session is open
    #[default]
    Stopped,
    /// Session is being opened and the handshake is in flight
    Starting,
    /// Handshake completed, requests may be dispatched
    Running,
    /// Last connect attempt or the live session failed
    Failed,
}

impl ServerStatus {
    /// Whether `connect` may start a new attempt from this state.
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Status of the outer control channel used to reach the connection layer.
///
/// Independent of any per-server status. Per-server operations are only
/// attempted while the link is `Open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
