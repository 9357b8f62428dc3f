//! Server capability flags discovered during the initialize handshake.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::protocol::ServerCapabilities;

bitflags! {
    /// Features a server advertised in its initialize result.
    ///
    /// Empty means the server is not running (or advertised nothing).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct CapabilitySet: u8 {
        /// `resources/list`, `resources/read`, `resources/templates/list`
        const RESOURCES   = 0b0000_0001;
        /// `prompts/list`, `prompts/get`
        const PROMPTS     = 0b0000_0010;
        /// `tools/list`, `tools/call`
        const TOOLS       = 0b0000_0100;
        /// `logging/setLevel` and log message notifications
        const LOGGING     = 0b0000_1000;
        /// `resources/subscribe`, `resources/unsubscribe`
        const SUBSCRIBE   = 0b0001_0000;
        /// `completion/complete`
        const COMPLETIONS = 0b0010_0000;
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names
            .iter()
            .filter_map(|name| Self::from_name(&name.to_uppercase()))
            .fold(Self::empty(), |acc, flag| acc | flag))
    }
}

impl CapabilitySet {
    /// Derive the flag set from the handshake's capability object.
    pub fn from_server_capabilities(caps: &ServerCapabilities) -> Self {
        let mut set = Self::empty();
        if caps.tools.is_some() {
            set |= Self::TOOLS;
        }
        if caps.prompts.is_some() {
            set |= Self::PROMPTS;
        }
        if caps.logging.is_some() {
            set |= Self::LOGGING;
        }
        if caps.completions.is_some() {
            set |= Self::COMPLETIONS;
        }
        if let Some(resources) = &caps.resources {
            set |= Self::RESOURCES;
            if resources
                .get("subscribe")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
            {
                set |= Self::SUBSCRIBE;
            }
        }
        set
    }

    /// Lowercase flag names, in declaration order.
    pub fn names(self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_lowercase())
            .collect()
    }

    pub const fn supports_tools(self) -> bool {
        self.contains(Self::TOOLS)
    }

    pub const fn supports_resources(self) -> bool {
        self.contains(Self::RESOURCES)
    }

    pub const fn supports_prompts(self) -> bool {
        self.contains(Self::PROMPTS)
    }
}
