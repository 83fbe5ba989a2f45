// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA south connector.
//!
//! Errors are grouped by the stage of the connector that raised them, so the
//! host can tell a fatal startup failure from a per-item problem that was
//! already logged and skipped.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery, session connect, disconnect
//! ├── Browse        - Address-space walk failures
//! ├── Subscription  - Subscription context and monitored items
//! ├── Configuration - Missing or malformed configuration items
//! └── Plugin        - Misuse of the host plugin boundary
//! ```
//!
//! # Examples
//!
//! ```
//! use south_opcua::error::{ConnectionError, ErrorSeverity, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused(
//!     "opc.tcp://localhost:4840",
//! ));
//!
//! assert!(error.is_fatal());
//! assert_eq!(error.severity(), ErrorSeverity::Critical);
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for the connector.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Address-space browse errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Subscription and monitored item errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Plugin boundary misuse.
    #[error("{0}")]
    Plugin(#[from] PluginError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a plugin error.
    #[inline]
    pub fn plugin(error: PluginError) -> Self {
        Self::Plugin(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this error must abort plugin startup.
    ///
    /// Fatal errors are connection failures and malformed configuration;
    /// everything else is contained to the item or call that raised it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_fatal(),
            Self::Configuration(_) => true,
            Self::Plugin(PluginError::PollNotSupported) => true,
            Self::Plugin(_) => false,
            Self::Browse(_) | Self::Subscription(_) => false,
        }
    }

    /// Returns `true` if a later attempt may succeed without a config change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Browse(_) => true,
            Self::Subscription(e) => e.is_retryable(),
            Self::Configuration(_) | Self::Plugin(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Browse(e) => e.severity(),
            Self::Subscription(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Plugin(e) => e.severity(),
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Browse(_) => "browse",
            Self::Subscription(_) => "subscription",
            Self::Configuration(_) => "configuration",
            Self::Plugin(_) => "plugin",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Plugin(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                severity = %self.severity(),
                context = context,
                fatal = self.is_fatal(),
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                severity = %self.severity(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connect handshake failed.
    #[error("Unable to connect to server '{endpoint}': {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Status or reason reported by the stack.
        reason: String,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery failed for '{endpoint}': {reason}")]
    EndpointNotFound {
        /// The endpoint URL.
        endpoint: String,
        /// Reason.
        reason: String,
    },

    /// No endpoint matched the requested security settings.
    #[error("No suitable endpoint found with security mode '{security_mode}' and policy '{security_policy}'")]
    NoSuitableEndpoint {
        /// Requested security mode.
        security_mode: String,
        /// Requested security policy URI.
        security_policy: String,
    },

    /// The client could not be built from the session settings.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// A session already exists on this transport.
    #[error("Already connected to '{endpoint}'")]
    AlreadyConnected {
        /// The endpoint of the live session.
        endpoint: String,
    },

    /// The session was closed while in use.
    #[error("Connection closed: {reason}")]
    Closed {
        /// Reason for closure.
        reason: String,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connect failure.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: "connection refused".to_string(),
        }
    }

    /// Creates a connect failure with the status reported by the stack.
    pub fn refused_with(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an endpoint discovery failure.
    pub fn endpoint_not_found(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(
        security_mode: impl Into<String>,
        security_policy: impl Into<String>,
    ) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
            security_policy: security_policy.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a closed connection error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this failure aborts startup.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotConnected | Self::Closed { .. })
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::EndpointNotFound { .. } | Self::Closed { .. }
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed { .. } => ErrorSeverity::Warning,
            Self::AlreadyConnected { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Critical,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::EndpointNotFound { .. } => ErrorCode::new(1, 2),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(1, 3),
            Self::InvalidEndpoint { .. } => ErrorCode::new(1, 4),
            Self::AlreadyConnected { .. } => ErrorCode::new(1, 5),
            Self::Closed { .. } => ErrorCode::new(1, 6),
            Self::NotConnected => ErrorCode::new(1, 7),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Address-space browse errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The Browse service call failed.
    #[error("Browse failed for '{node_id}': {message}")]
    BrowseFailed {
        /// The node being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// A bad status was returned for the browsed node.
    #[error("Browse of '{node_id}' returned status 0x{status_code:08X}")]
    BadStatus {
        /// The node being browsed.
        node_id: String,
        /// OPC UA status code.
        status_code: u32,
    },
}

impl BrowseError {
    /// Creates a browse failure.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::BrowseFailed { .. } => ErrorCode::new(2, 1),
            Self::BadStatus { .. } => ErrorCode::new(2, 2),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The subscription context could not be created.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// The subscription is unknown to the transport.
    #[error("Subscription not found: {subscription_id}")]
    NotFound {
        /// Subscription ID.
        subscription_id: u32,
    },

    /// A monitored item could not be created.
    #[error("Failed to monitor node '{token}': {message}")]
    MonitoredItemFailed {
        /// Identity token of the item.
        token: String,
        /// Error message.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates a subscription creation error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// Creates a monitored item failure.
    pub fn monitored_item_failed(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CreationFailed { .. } => ErrorSeverity::Error,
            Self::NotFound { .. } => ErrorSeverity::Warning,
            Self::MonitoredItemFailed { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreationFailed { .. } => ErrorCode::new(3, 1),
            Self::NotFound { .. } => ErrorCode::new(3, 2),
            Self::MonitoredItemFailed { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required item is missing.
    #[error("Missing required configuration item '{field}'")]
    MissingField {
        /// Item name.
        field: String,
    },

    /// The subscription item parsed but has no `subscriptions` array.
    #[error("Subscription configuration is missing a subscriptions array")]
    MissingSubscriptions,

    /// The subscription item is not valid JSON.
    #[error("Subscription configuration is not valid JSON: {reason}")]
    InvalidSubscription {
        /// Parser message.
        reason: String,
    },

    /// A node reference could not be parsed.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The rejected node reference.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// The configuration document itself is malformed.
    #[error("Invalid configuration document: {reason}")]
    InvalidDocument {
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid subscription JSON error.
    pub fn invalid_subscription(reason: impl Into<String>) -> Self {
        Self::InvalidSubscription {
            reason: reason.into(),
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(4, 1),
            Self::MissingSubscriptions => ErrorCode::new(4, 3),
            Self::InvalidSubscription { .. } => ErrorCode::new(4, 4),
            Self::InvalidNodeId { .. } => ErrorCode::new(4, 5),
            Self::InvalidDocument { .. } => ErrorCode::new(4, 6),
        }
    }
}

// =============================================================================
// PluginError
// =============================================================================

/// Misuse of the host plugin boundary.
#[derive(Debug, Error)]
pub enum PluginError {
    /// `poll` was called on a push-only connector.
    #[error("OPC UA is an async plugin, poll should not be called")]
    PollNotSupported,

    /// An operation was requested in a state that does not allow it.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The requested operation.
        operation: &'static str,
        /// The current connector state.
        state: String,
    },
}

impl PluginError {
    /// Creates an invalid state error.
    pub fn invalid_state(operation: &'static str, state: impl fmt::Display) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::PollNotSupported => ErrorSeverity::Critical,
            Self::InvalidState { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::PollNotSupported => ErrorCode::new(5, 1),
            Self::InvalidState { .. } => ErrorCode::new(5, 2),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - the connector cannot continue.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `UA-XXYY` where XX is the category and YY the specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Browse
/// - 3: Subscription
/// - 4: Configuration
/// - 5: Plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    #[inline]
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02}{:02}", self.category, self.code)
    }
}

/// Result type for connector operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = OpcUaError::connection(ConnectionError::refused_with(
            "opc.tcp://h/ep",
            "BadCommunicationError",
        ));
        assert_eq!(
            err.to_string(),
            "Unable to connect to server 'opc.tcp://h/ep': BadCommunicationError"
        );
        assert_eq!(err.category(), "connection");
        assert!(err.is_fatal());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_connected_is_not_fatal() {
        let err = OpcUaError::not_connected();
        assert!(!err.is_fatal());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.tracing_level(), Level::WARN);
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err = OpcUaError::configuration(ConfigurationError::MissingSubscriptions);
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.error_code().to_string(), "UA-0403");

        let err = OpcUaError::configuration(ConfigurationError::missing_field("url"));
        assert_eq!(err.to_string(), "Missing required configuration item 'url'");
    }

    #[test]
    fn test_per_item_errors_are_contained() {
        let err = OpcUaError::subscription(SubscriptionError::monitored_item_failed(
            "Temp",
            "BadNodeIdUnknown",
        ));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Failed to monitor node 'Temp': BadNodeIdUnknown");

        let err = OpcUaError::browse(BrowseError::bad_status("ns=5;s=Root", 0x8034_0000));
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Browse of 'ns=5;s=Root' returned status 0x80340000"
        );
    }

    #[test]
    fn test_poll_error() {
        let err = OpcUaError::plugin(PluginError::PollNotSupported);
        assert!(err.is_fatal());
        assert_eq!(err.category(), "plugin");
        assert_eq!(err.error_code(), ErrorCode::new(5, 1));
    }

    #[test]
    fn test_log_at_every_level() {
        let errors = [
            OpcUaError::connection(ConnectionError::closed("publish response lost")),
            OpcUaError::configuration(ConfigurationError::MissingSubscriptions),
            OpcUaError::plugin(PluginError::invalid_state("start", "Running")),
        ];
        let levels: Vec<Level> = errors.iter().map(OpcUaError::tracing_level).collect();
        assert_eq!(levels, vec![Level::WARN, Level::ERROR, Level::WARN]);

        for err in &errors {
            err.log("test");
        }
        assert!(errors[0].is_retryable());
        assert_eq!(errors[1].severity().to_string(), "critical");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::new(1, 7).to_string(), "UA-0107");
        assert_eq!(ErrorCode::new(12, 3).to_string(), "UA-1203");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert!(ErrorSeverity::Warning > ErrorSeverity::Info);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
    }
}
