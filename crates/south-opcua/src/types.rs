// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol-level types shared by the connector modules.
//!
//! - [`NodeId`]: node references as parsed from configuration and returned
//!   by Browse
//! - [`NodeClass`]: node classification used by the address-space walk
//! - [`SecurityMode`], [`SecurityPolicy`], [`AuthPolicy`]: session security
//! - [`SessionSettings`], [`SubscriptionParameters`],
//!   [`MonitoringParameters`]: what the connector hands to the transport

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
///
/// # Examples
///
/// ```
/// use south_opcua::types::NodeId;
///
/// let node = NodeId::string(5, "Root");
/// assert_eq!(node.to_string(), "ns=5;s=Root");
///
/// let parsed: NodeId = "ns=2;i=1001".parse().unwrap();
/// assert_eq!(parsed, NodeId::numeric(2, 1001));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to the OPC UA string format.
    ///
    /// Format: `ns=<namespace>;{i|s|g|b}=<identifier>`, with the namespace
    /// part omitted for namespace 0.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=5;s=85/0:Simulation` (string, kept verbatim including quotes)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=85` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".into()))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".into()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value: u32 = id
                .parse()
                .map_err(|_| invalid("Invalid numeric identifier".into()))?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|e| invalid(format!("Invalid base64: {}", e)))?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".into(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// OPC UA node identifier types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node classes, as carried in browse results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from OPC UA value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }
}

// =============================================================================
// Security
// =============================================================================

/// Message security mode requested for the session.
///
/// `Invalid` is what the "Any" option and any unrecognized option map to;
/// the transport treats it as "accept whatever the server offers".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Unspecified.
    #[default]
    Invalid,
    /// No security.
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Maps a configuration option to a mode. Returns `None` for unknown
    /// options so the caller can log them.
    pub fn from_option(option: &str) -> Option<Self> {
        match option {
            "Any" => Some(Self::Invalid),
            "None" => Some(Self::None),
            "Sign" => Some(Self::Sign),
            "SignAndEncrypt" => Some(Self::SignAndEncrypt),
            _ => None,
        }
    }

    /// Returns the string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security policy requested for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    /// No policy requested; the empty URI.
    #[default]
    Unspecified,
    /// Basic256.
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
}

impl SecurityPolicy {
    /// Maps a configuration option to a policy. Returns `None` for unknown
    /// options so the caller can log them.
    pub fn from_option(option: &str) -> Option<Self> {
        match option {
            "Any" => Some(Self::Unspecified),
            "Basic256" => Some(Self::Basic256),
            "Basic256Sha256" => Some(Self::Basic256Sha256),
            _ => None,
        }
    }

    /// Returns the policy URI; empty when unspecified.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => f.write_str("Any"),
            Self::Basic256 => f.write_str("Basic256"),
            Self::Basic256Sha256 => f.write_str("Basic256Sha256"),
        }
    }
}

/// User authentication for the session.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Anonymous identity token.
    #[default]
    Anonymous,
    /// Username and password identity token.
    Username {
        /// User name.
        username: String,
        /// Password.
        #[serde(skip_serializing)]
        password: String,
    },
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Username { username, .. } => f
                .debug_struct("Username")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Certificate material paths. Stored but not used to connect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CertificatePaths {
    /// CA certificate file.
    pub ca_cert: Option<String>,
    /// Server certificate file.
    pub server_cert: Option<String>,
    /// Client certificate file.
    pub client_cert: Option<String>,
    /// Client private key file.
    pub client_key: Option<String>,
    /// Certificate revocation list.
    pub ca_crl: Option<String>,
}

// =============================================================================
// Transport Parameters
// =============================================================================

/// Everything the transport needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Server endpoint URL.
    pub url: String,
    /// Requested message security mode.
    pub security_mode: SecurityMode,
    /// Requested security policy.
    pub security_policy: SecurityPolicy,
    /// User identity.
    pub auth: AuthPolicy,
}

impl SessionSettings {
    /// Creates anonymous settings with no security preference.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            security_mode: SecurityMode::Invalid,
            security_policy: SecurityPolicy::Unspecified,
            auth: AuthPolicy::Anonymous,
        }
    }
}

/// CreateSubscription parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionParameters {
    /// Requested publishing interval.
    pub publishing_interval: Duration,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Maximum keep-alive count.
    pub max_keep_alive_count: u32,
    /// Maximum notifications per publish (0 = unlimited).
    pub max_notifications_per_publish: u32,
    /// Publishing enabled.
    pub publishing_enabled: bool,
    /// Priority.
    pub priority: u8,
}

impl Default for SubscriptionParameters {
    fn default() -> Self {
        Self {
            publishing_interval: Duration::from_millis(500),
            lifetime_count: 10_000,
            max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }
    }
}

impl SubscriptionParameters {
    /// Returns default parameters with the given publishing interval.
    pub fn with_publishing_interval(publishing_interval: Duration) -> Self {
        Self {
            publishing_interval,
            ..Self::default()
        }
    }
}

/// CreateMonitoredItems parameters for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringParameters {
    /// Sampling interval.
    pub sampling_interval: Duration,
    /// Server-side queue size.
    pub queue_size: u32,
    /// Discard oldest value when the queue overflows.
    pub discard_oldest: bool,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_millis(250),
            queue_size: 1,
            discard_oldest: true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse() {
        let node: NodeId = "ns=5;s=85/0:Simulation".parse().unwrap();
        assert_eq!(node, NodeId::string(5, "85/0:Simulation"));

        let node: NodeId = "i=85".parse().unwrap();
        assert_eq!(node, NodeId::OBJECTS_FOLDER);

        let node: NodeId = "ns=2;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert!(matches!(node.identifier, NodeIdentifier::Guid(_)));

        let node: NodeId = "ns=1;b=SGVsbG8=".parse().unwrap();
        assert_eq!(node, NodeId::opaque(1, b"Hello".to_vec()));
    }

    #[test]
    fn test_node_id_parse_keeps_quotes() {
        let node: NodeId = "ns=5;s=\"Temp\"".parse().unwrap();
        assert_eq!(node.as_string(), Some("\"Temp\""));
        assert_eq!(node.to_string(), "ns=5;s=\"Temp\"");
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=2;i=abc".parse::<NodeId>().is_err());
        assert!("ns=2;q=1".parse::<NodeId>().is_err());
        assert!("ns=2;g=not-a-guid".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::numeric(2, 1001).to_string(), "ns=2;i=1001");
        assert_eq!(NodeId::string(5, "Root").to_string(), "ns=5;s=Root");
    }

    #[test]
    fn test_node_class_values() {
        assert_eq!(NodeClass::from_value(1), Some(NodeClass::Object));
        assert_eq!(NodeClass::from_value(2), Some(NodeClass::Variable));
        assert_eq!(NodeClass::from_value(3), None);
        assert_eq!(NodeClass::View.value(), 128);
    }

    #[test]
    fn test_security_mode_options() {
        assert_eq!(SecurityMode::from_option("Any"), Some(SecurityMode::Invalid));
        assert_eq!(SecurityMode::from_option("None"), Some(SecurityMode::None));
        assert_eq!(SecurityMode::from_option("Sign"), Some(SecurityMode::Sign));
        assert_eq!(
            SecurityMode::from_option("SignAndEncrypt"),
            Some(SecurityMode::SignAndEncrypt)
        );
        assert_eq!(SecurityMode::from_option("Bogus"), None);
        assert_eq!(SecurityMode::default(), SecurityMode::Invalid);
    }

    #[test]
    fn test_security_policy_uris() {
        assert_eq!(SecurityPolicy::Unspecified.uri(), "");
        assert_eq!(
            SecurityPolicy::from_option("Basic256").map(|p| p.uri()),
            Some("http://opcfoundation.org/UA/SecurityPolicy#Basic256")
        );
        assert_eq!(
            SecurityPolicy::Basic256Sha256.uri(),
            "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"
        );
        assert_eq!(SecurityPolicy::from_option("Basic128"), None);
    }

    #[test]
    fn test_auth_policy_debug_hides_password() {
        let auth = AuthPolicy::Username {
            username: "operator".into(),
            password: "secret".into(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("operator"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_default_parameters() {
        let sub = SubscriptionParameters::with_publishing_interval(Duration::from_secs(1));
        assert_eq!(sub.publishing_interval, Duration::from_secs(1));
        assert!(sub.publishing_enabled);

        let item = MonitoringParameters::default();
        assert_eq!(item.queue_size, 1);
        assert!(item.discard_oldest);
    }
}
