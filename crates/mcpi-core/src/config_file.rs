//! Parser for the `mcpServers` JSON server list.
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "everything": { "command": "npx", "args": ["-y", "@modelcontextprotocol/server-everything"] },
//!     "remote": { "type": "streamable-http", "url": "https://example.com/mcp",
//!                 "headers": { "Authorization": "Bearer abc" } }
//!   }
//! }
//! ```
//!
//! Reading and writing the file is the caller's concern; this module only
//! turns its contents into `ServerSpec`s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{ServerId, ServerSpec, TransportConfig};

/// Errors produced while interpreting a server list.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to parse server list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Server '{name}' is invalid: {message}")]
    Invalid { name: String, message: String },

    #[error("Server '{0}' not found in server list")]
    NotFound(String),
}

/// One entry under `mcpServers`, as written by users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    /// `stdio` (default when `command` is set), `sse`, `http` or `streamable-http`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    /// Display label; the entry's key is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ServerEntry {
    /// Convert into a validated transport configuration.
    pub fn to_transport(&self, name: &str) -> Result<TransportConfig, ConfigFileError> {
        let invalid = |message: String| ConfigFileError::Invalid {
            name: name.to_string(),
            message,
        };

        let kind = match (self.kind.as_deref(), &self.command, &self.url) {
            (Some(kind), _, _) => kind,
            (None, Some(_), _) => "stdio",
            (None, None, Some(_)) => "streamable-http",
            (None, None, None) => {
                return Err(invalid("entry needs either 'command' or 'url'".to_string()));
            }
        };

        let config = match kind {
            "stdio" => TransportConfig::Stdio {
                command: self
                    .command
                    .clone()
                    .ok_or_else(|| invalid("stdio entry requires 'command'".to_string()))?,
                args: self.args.clone(),
                env: self.env.clone(),
            },
            "sse" | "http" | "streamable-http" => TransportConfig::Stream {
                url: self
                    .url
                    .clone()
                    .ok_or_else(|| invalid(format!("{kind} entry requires 'url'")))?,
                bearer_token: self.bearer_token.clone().or_else(|| self.header_token()),
            },
            other => return Err(invalid(format!("unknown transport type '{other}'"))),
        };

        config.validate().map_err(invalid)?;
        Ok(config)
    }

    /// Token from an `Authorization: Bearer ...` header, if present.
    fn header_token(&self) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("authorization"))
            .and_then(|(_, value)| value.strip_prefix("Bearer "))
            .map(str::to_string)
    }
}

/// The whole `{"mcpServers": {...}}` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServersFile {
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

impl ServersFile {
    pub fn from_json(json: &str) -> Result<Self, ConfigFileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// All entries as server specs, in key order.
    pub fn server_specs(&self) -> Result<Vec<ServerSpec>, ConfigFileError> {
        self.mcp_servers
            .iter()
            .map(|(name, entry)| Self::spec_for(name, entry))
            .collect()
    }

    /// A single entry by name.
    pub fn server_spec(&self, name: &str) -> Result<ServerSpec, ConfigFileError> {
        let entry = self
            .mcp_servers
            .get(name)
            .ok_or_else(|| ConfigFileError::NotFound(name.to_string()))?;
        Self::spec_for(name, entry)
    }

    fn spec_for(name: &str, entry: &ServerEntry) -> Result<ServerSpec, ConfigFileError> {
        Ok(ServerSpec {
            id: ServerId::new(name),
            label: entry.label.clone(),
            transport: entry.to_transport(name)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "mcpServers": {
            "everything": {
                "command": "npx",
                "args": ["-y", "@modelcontextprotocol/server-everything"],
                "env": {"HELLO": "world"}
            },
            "remote": {
                "type": "streamable-http",
                "url": "https://example.com/mcp",
                "headers": {"Authorization": "Bearer abc"}
            }
        }
    }"#;

    #[test]
    fn test_parses_stdio_and_stream_entries() {
        let file = ServersFile::from_json(SAMPLE).unwrap();
        let specs = file.server_specs().unwrap();
        assert_eq!(specs.len(), 2);

        let everything = &specs[0];
        assert_eq!(everything.id.as_str(), "everything");
        match &everything.transport {
            TransportConfig::Stdio { command, args, env } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 2);
                assert_eq!(env.get("HELLO").map(String::as_str), Some("world"));
            }
            other => panic!("expected stdio, got {other:?}"),
        }

        assert_eq!(
            specs[1].transport,
            TransportConfig::stream("https://example.com/mcp", Some("abc".into()))
        );
    }

    #[test]
    fn test_missing_command_and_url_is_invalid() {
        let file = ServersFile::from_json(r#"{"mcpServers": {"broken": {}}}"#).unwrap();
        assert!(matches!(
            file.server_specs(),
            Err(ConfigFileError::Invalid { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_invalid() {
        let file =
            ServersFile::from_json(r#"{"mcpServers": {"x": {"type": "ws", "url": "ws://h"}}}"#)
                .unwrap();
        let err = file.server_spec("x").unwrap_err();
        assert!(err.to_string().contains("unknown transport type"));
    }

    #[test]
    fn test_server_spec_not_found() {
        let file = ServersFile::from_json(SAMPLE).unwrap();
        assert!(matches!(
            file.server_spec("nope"),
            Err(ConfigFileError::NotFound(_))
        ));
    }
}
