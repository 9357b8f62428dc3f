//! Settings for the orchestration layer.
//!
//! Pure domain types with no storage concerns; the embedding application
//! loads and persists them however it likes.

use serde::{Deserialize, Serialize};

use crate::domain::{ClientInfo, Implementation, LinkStatus, Root};

/// Client name announced during the initialize handshake.
pub const DEFAULT_CLIENT_NAME: &str = "mcpi";

/// Protocol revision requested during the initialize handshake.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// What the manager does when a connection becomes `Running` without an
/// explicit `activate` (for example a reconnect triggered by the transport).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoActivatePolicy {
    /// Add it to the active set.
    #[default]
    OnRunning,
    /// Leave the active set alone; only `activate` adds servers.
    Explicit,
}

/// Inspector settings.
///
/// All fields are optional to support partial configs and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InspectorSettings {
    /// Client name sent in the handshake.
    pub client_name: Option<String>,

    /// Client version sent in the handshake.
    pub client_version: Option<String>,

    /// Protocol revision requested in the handshake.
    pub protocol_version: Option<String>,

    /// Auto-activation policy for connections that become `Running`.
    pub auto_activate: Option<AutoActivatePolicy>,

    /// Link status the manager starts in before the collaborator reports one.
    pub initial_link_status: Option<LinkStatus>,

    /// Roots returned to servers that call `roots/list`.
    pub roots: Vec<Root>,

    /// Maximum request history entries kept (0 = unbounded).
    pub history_limit: Option<usize>,
}

impl InspectorSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            client_name: Some(DEFAULT_CLIENT_NAME.to_string()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            protocol_version: Some(DEFAULT_PROTOCOL_VERSION.to_string()),
            auto_activate: Some(AutoActivatePolicy::OnRunning),
            initial_link_status: Some(LinkStatus::Connecting),
            roots: Vec::new(),
            history_limit: Some(0),
        }
    }

    #[must_use]
    pub fn effective_auto_activate(&self) -> AutoActivatePolicy {
        self.auto_activate.unwrap_or_default()
    }

    #[must_use]
    pub fn effective_initial_link_status(&self) -> LinkStatus {
        self.initial_link_status.unwrap_or_default()
    }

    #[must_use]
    pub fn effective_history_limit(&self) -> usize {
        self.history_limit.unwrap_or(0)
    }

    /// Identification handed to transport connectors for the handshake.
    #[must_use]
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            implementation: Implementation {
                name: self
                    .client_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
                version: Some(
                    self.client_version
                        .clone()
                        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
                ),
            },
            protocol_version: self
                .protocol_version
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            sampling: true,
            roots: !self.roots.is_empty(),
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Client name cannot be empty")]
    EmptyClientName,

    #[error("Protocol version cannot be empty")]
    EmptyProtocolVersion,

    #[error("Root URI must use the file:// scheme, got {0}")]
    InvalidRootUri(String),
}

/// Validate settings before handing them to a manager.
pub fn validate_settings(settings: &InspectorSettings) -> Result<(), SettingsError> {
    if settings
        .client_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(SettingsError::EmptyClientName);
    }

    if settings
        .protocol_version
        .as_deref()
        .is_some_and(|version| version.trim().is_empty())
    {
        return Err(SettingsError::EmptyProtocolVersion);
    }

    if let Some(root) = settings
        .roots
        .iter()
        .find(|root| !root.uri.starts_with("file://"))
    {
        return Err(SettingsError::InvalidRootUri(root.uri.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults_are_valid() {
        assert_ok!(validate_settings(&InspectorSettings::with_defaults()));
        assert_ok!(validate_settings(&InspectorSettings::default()));
    }

    #[test]
    fn test_empty_client_name_rejected() {
        let settings = InspectorSettings {
            client_name: Some("  ".to_string()),
            ..InspectorSettings::default()
        };
        assert_eq!(
            assert_err!(validate_settings(&settings)),
            SettingsError::EmptyClientName
        );
    }

    #[test]
    fn test_root_uri_must_be_file_scheme() {
        let settings = InspectorSettings {
            roots: vec![Root {
                uri: "https://example.com".to_string(),
                name: None,
            }],
            ..InspectorSettings::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidRootUri(_))
        ));
    }

    #[test]
    fn test_client_info_falls_back_to_defaults() {
        let info = InspectorSettings::default().client_info();
        assert_eq!(info.implementation.name, DEFAULT_CLIENT_NAME);
        assert_eq!(info.protocol_version, DEFAULT_PROTOCOL_VERSION);
        assert!(info.sampling);
        assert!(!info.roots);
    }

    #[test]
    fn test_partial_settings_deserialize() {
        let settings: InspectorSettings =
            serde_json::from_str(r#"{"auto_activate":"explicit"}"#).unwrap();
        assert_eq!(
            settings.effective_auto_activate(),
            AutoActivatePolicy::Explicit
        );
        assert_eq!(settings.effective_initial_link_status(), LinkStatus::Connecting);
        assert_eq!(settings.effective_history_limit(), 0);
    }
}
