// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Live OPC UA transport built on the `opcua` crate.
//!
//! The `opcua` client runs its own session thread (started with
//! `Session::run_async`) which keeps the secure channel alive and services
//! publish responses. Data change callbacks on that thread push
//! [`DataChange`]s into a channel; [`OpcUaTransport::run_iterate`] drains it
//! with a bounded wait, so notifications are consumed on the event loop's
//! own task and in arrival order.
//!
//! The `opcua` client API is synchronous and every session and transport
//! owns a private runtime, which must not be dropped on an async worker.
//! Every call into the stack therefore runs on the blocking pool, and the
//! session is always released there.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{
    status, BrowseReference, DataChange, MonitoredItemResult, OpcUaTransport, TransportState,
};
use crate::decoder::WireValue;
use crate::error::{BrowseError, ConnectionError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{
    AuthPolicy, MonitoringParameters, NodeId, NodeIdentifier, SecurityMode, SessionSettings,
    SubscriptionParameters,
};

/// A live session as handed out by the stack.
type SharedSession = Arc<OpcUaRwLock<Session>>;

/// Runs a synchronous stack call on the blocking pool.
async fn blocking<R, F>(operation: &'static str, f: F) -> OpcUaResult<R>
where
    F: FnOnce() -> OpcUaResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        OpcUaError::connection(ConnectionError::closed(format!(
            "{} task failed: {}",
            operation, e
        )))
    })?
}

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// OPC UA transport backed by a live `opcua` client session.
pub struct RealOpcUaTransport {
    /// Application name announced to the server.
    application_name: String,

    /// Endpoint of the current or last session.
    endpoint: String,

    /// Current connection state.
    state: RwLock<TransportState>,

    /// The live session.
    session: RwLock<Option<SharedSession>>,

    /// Stops the session thread started by `Session::run_async`.
    session_stop: SyncMutex<Option<oneshot::Sender<SessionCommand>>>,

    /// Sender side used by the data change callback.
    changes_tx: mpsc::UnboundedSender<DataChange>,

    /// Receiver side drained by `run_iterate`.
    changes_rx: Mutex<mpsc::UnboundedReceiver<DataChange>>,
}

impl RealOpcUaTransport {
    /// Creates a disconnected transport.
    pub fn new(application_name: impl Into<String>) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            application_name: application_name.into(),
            endpoint: String::new(),
            state: RwLock::new(TransportState::Disconnected),
            session: RwLock::new(None),
            session_stop: SyncMutex::new(None),
            changes_tx,
            changes_rx: Mutex::new(changes_rx),
        }
    }

    /// Builds the `opcua` client.
    fn build_client(application_name: &str, url: &str) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(application_name)
            .application_uri(format!("urn:{}", application_name))
            .product_uri(format!("urn:{}", application_name))
            .create_sample_keypair(true)
            .trust_server_certs(true)
            .session_retry_limit(0)
            .client()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::invalid_endpoint(
                    url,
                    "Failed to build OPC UA client",
                ))
            })
    }

    /// Discovers the endpoints, picks one and opens a session. Blocking.
    fn open_session(
        application_name: &str,
        settings: &SessionSettings,
    ) -> OpcUaResult<(SharedSession, oneshot::Sender<SessionCommand>)> {
        let mut client = Self::build_client(application_name, &settings.url)?;

        let endpoints = client
            .get_server_endpoints_from_url(settings.url.as_str())
            .map_err(|status| {
                OpcUaError::connection(ConnectionError::endpoint_not_found(
                    &settings.url,
                    status.to_string(),
                ))
            })?;

        let endpoint = Self::select_endpoint(&endpoints, settings).ok_or_else(|| {
            OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                settings.security_mode.to_string(),
                settings.security_policy.uri(),
            ))
        })?;

        debug!(
            security_policy = %endpoint.security_policy_uri,
            security_mode = ?endpoint.security_mode,
            "Found matching endpoint"
        );

        if let AuthPolicy::Username { username, .. } = &settings.auth {
            info!(endpoint = %settings.url, username = %username, "Connecting with username");
        }

        let session = client
            .connect_to_endpoint(endpoint, Self::identity_token(&settings.auth))
            .map_err(|status| {
                OpcUaError::connection(ConnectionError::refused_with(
                    &settings.url,
                    status.to_string(),
                ))
            })?;

        let stop = Session::run_async(Arc::clone(&session));
        Ok((session, stop))
    }

    /// Converts our SecurityMode to the stack's MessageSecurityMode.
    fn message_security_mode(mode: SecurityMode) -> MessageSecurityMode {
        match mode {
            SecurityMode::Invalid => MessageSecurityMode::Invalid,
            SecurityMode::None => MessageSecurityMode::None,
            SecurityMode::Sign => MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
        }
    }

    /// Creates the identity token for the session.
    fn identity_token(auth: &AuthPolicy) -> IdentityToken {
        match auth {
            AuthPolicy::Anonymous => IdentityToken::Anonymous,
            AuthPolicy::Username { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
        }
    }

    /// Picks the endpoint matching the requested mode and policy.
    ///
    /// An invalid mode or empty policy URI matches anything. When nothing
    /// was requested an unsecured endpoint is preferred.
    fn select_endpoint(
        endpoints: &[EndpointDescription],
        settings: &SessionSettings,
    ) -> Option<EndpointDescription> {
        let mode = Self::message_security_mode(settings.security_mode);
        let policy_uri = settings.security_policy.uri();

        let candidates: Vec<&EndpointDescription> = endpoints
            .iter()
            .filter(|e| mode == MessageSecurityMode::Invalid || e.security_mode == mode)
            .filter(|e| policy_uri.is_empty() || e.security_policy_uri.as_ref() == policy_uri)
            .collect();

        let unrestricted =
            mode == MessageSecurityMode::Invalid && policy_uri.is_empty();
        let preferred = if unrestricted {
            candidates
                .iter()
                .find(|e| e.security_mode == MessageSecurityMode::None)
                .or_else(|| candidates.first())
        } else {
            candidates.first()
        };

        preferred.map(|e| (*e).clone())
    }

    /// Converts our NodeId to the stack's NodeId.
    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(node_id.namespace_index, *v),
            NodeIdentifier::String(v) => {
                opcua::types::NodeId::new(node_id.namespace_index, v.clone())
            }
            NodeIdentifier::Guid(v) => opcua::types::NodeId::new(
                node_id.namespace_index,
                opcua::types::Guid::from_bytes(*v.as_bytes()),
            ),
            NodeIdentifier::Opaque(v) => opcua::types::NodeId::new(
                node_id.namespace_index,
                opcua::types::ByteString::from(v.as_slice()),
            ),
        }
    }

    /// Converts the stack's NodeId to our NodeId.
    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let namespace_index = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(namespace_index, *v),
            opcua::types::Identifier::String(v) => NodeId::string(namespace_index, v.as_ref()),
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(namespace_index, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(namespace_index, v.value.clone().unwrap_or_default())
            }
        }
    }

    /// Converts a stack Variant to a wire value.
    fn from_opcua_variant(variant: &Variant) -> WireValue {
        match variant {
            Variant::Empty => WireValue::Empty,
            Variant::Boolean(v) => WireValue::Boolean(*v),
            Variant::SByte(v) => WireValue::SByte(*v),
            Variant::Byte(v) => WireValue::Byte(*v),
            Variant::Int16(v) => WireValue::Int16(*v),
            Variant::UInt16(v) => WireValue::UInt16(*v),
            Variant::Int32(v) => WireValue::Int32(*v),
            Variant::UInt32(v) => WireValue::UInt32(*v),
            Variant::Int64(v) => WireValue::Int64(*v),
            Variant::UInt64(v) => WireValue::UInt64(*v),
            Variant::Float(v) => WireValue::Float(*v),
            Variant::Double(v) => WireValue::Double(*v),
            Variant::String(v) => WireValue::String(v.as_ref().to_string()),
            Variant::DateTime(v) => WireValue::DateTime(v.as_chrono()),
            Variant::Guid(v) => WireValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
            Variant::ByteString(v) => WireValue::ByteString(v.value.clone().unwrap_or_default()),
            Variant::Array(arr) => {
                WireValue::Array(arr.values.iter().map(Self::from_opcua_variant).collect())
            }
            other => WireValue::Other(format!("{:?}", other.type_id())),
        }
    }

    /// Converts a stack DataValue into a notification for `client_handle`.
    fn to_data_change(client_handle: u32, value: &DataValue) -> DataChange {
        DataChange {
            client_handle,
            value: value
                .value
                .as_ref()
                .map(Self::from_opcua_variant)
                .unwrap_or(WireValue::Empty),
            status_code: value.status.map(|s| s.bits()).unwrap_or(0),
            source_timestamp: value.source_timestamp.as_ref().map(|t| t.as_chrono()),
            server_timestamp: value.server_timestamp.as_ref().map(|t| t.as_chrono()),
        }
    }

    /// Gets the session, returning an error if not connected.
    async fn get_session(&self) -> OpcUaResult<Arc<OpcUaRwLock<Session>>> {
        let session_guard = self.session.read().await;
        session_guard
            .clone()
            .ok_or_else(|| OpcUaError::connection(ConnectionError::NotConnected))
    }

    async fn set_state(&self, state: TransportState) {
        *self.state.write().await = state;
    }

    /// Converts one page of references.
    fn collect_references(
        references: Option<Vec<ReferenceDescription>>,
        out: &mut Vec<BrowseReference>,
    ) {
        for r in references.unwrap_or_default() {
            out.push(BrowseReference {
                node_id: Self::from_opcua_node_id(&r.node_id.node_id),
                browse_name: r.browse_name.name.as_ref().to_string(),
                display_name: r.display_name.text.as_ref().to_string(),
                node_class: r.node_class as u32,
            });
        }
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self, settings: &SessionSettings) -> OpcUaResult<()> {
        if self.session.read().await.is_some() {
            return Err(OpcUaError::connection(ConnectionError::AlreadyConnected {
                endpoint: self.endpoint.clone(),
            }));
        }

        self.endpoint = settings.url.clone();
        self.set_state(TransportState::Connecting).await;

        info!(
            endpoint = %settings.url,
            security_mode = %settings.security_mode,
            security_policy = settings.security_policy.uri(),
            "Connecting to OPC UA server"
        );

        let application_name = self.application_name.clone();
        let request = settings.clone();
        let opened = blocking("connect", move || {
            Self::open_session(&application_name, &request)
        })
        .await;

        let (session, stop) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.set_state(TransportState::Failed).await;
                return Err(e);
            }
        };

        *self.session_stop.lock() = Some(stop);
        *self.session.write().await = Some(session);
        self.set_state(TransportState::Connected).await;

        info!(endpoint = %settings.url, "Connected to OPC UA server");
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        let session = self.session.write().await.take();
        let stop = self.session_stop.lock().take();

        let mut result = Ok(());
        if let Some(session) = session {
            info!(endpoint = %self.endpoint, "Disconnecting from OPC UA server");

            // The last reference is dropped on the blocking pool.
            result = blocking("disconnect", move || {
                if let Some(stop) = stop {
                    let _ = stop.send(SessionCommand::Stop);
                }
                session.read().disconnect();
                drop(session);
                Ok(())
            })
            .await;
        }

        {
            let mut rx = self.changes_rx.lock().await;
            while rx.try_recv().is_ok() {}
        }

        self.set_state(TransportState::Disconnected).await;
        result
    }

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
            .try_read()
            .map(|s| *s)
            .unwrap_or(TransportState::Disconnected)
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseReference>> {
        let session = self.get_session().await?;

        trace!(node_id = %node_id, "Browsing node");

        let description = BrowseDescription {
            node_id: Self::to_opcua_node_id(node_id),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };
        let node = node_id.to_string();

        blocking("browse", move || {
            let browse_failed = |status: StatusCode| {
                OpcUaError::browse(BrowseError::browse_failed(node.clone(), status.to_string()))
            };

            let session_locked = session.read();
            let mut results = session_locked
                .browse(&[description])
                .map_err(browse_failed)?
                .unwrap_or_default();

            let mut references = Vec::new();
            while let Some(result) = results.pop() {
                if !result.status_code.is_good() {
                    return Err(OpcUaError::browse(BrowseError::bad_status(
                        node.clone(),
                        result.status_code.bits(),
                    )));
                }

                Self::collect_references(result.references, &mut references);

                if result.continuation_point.is_null() {
                    break;
                }
                results = session_locked
                    .browse_next(false, &[result.continuation_point])
                    .map_err(browse_failed)?
                    .unwrap_or_default();
            }

            Ok(references)
        })
        .await
    }

    async fn create_subscription(&self, params: &SubscriptionParameters) -> OpcUaResult<u32> {
        let session = self.get_session().await?;
        let changes_tx = self.changes_tx.clone();
        let params = *params;

        // The client handle sent with each item comes back on its notifications.
        let callback = DataChangeCallback::new(move |items| {
            for item in items.iter() {
                let change = Self::to_data_change(item.client_handle(), item.last_value());
                if changes_tx.send(change).is_err() {
                    warn!("Data change dropped, receiver closed");
                }
            }
        });

        let subscription_id = blocking("create_subscription", move || {
            session
                .read()
                .create_subscription(
                    params.publishing_interval.as_millis() as f64,
                    params.lifetime_count,
                    params.max_keep_alive_count,
                    params.max_notifications_per_publish,
                    params.priority,
                    params.publishing_enabled,
                    callback,
                )
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::creation_failed(status.to_string()))
                })
        })
        .await?;

        info!(subscription_id, "Created subscription");
        Ok(subscription_id)
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.get_session().await?;
        blocking("delete_subscription", move || {
            session
                .read()
                .delete_subscription(subscription_id)
                .map(|_| ())
                .map_err(|_| OpcUaError::subscription(SubscriptionError::not_found(subscription_id)))
        })
        .await
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        node_id: &NodeId,
        client_handle: u32,
        params: &MonitoringParameters,
    ) -> OpcUaResult<MonitoredItemResult> {
        let session = self.get_session().await?;

        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: Self::to_opcua_node_id(node_id),
                attribute_id: AttributeId::Value as u32,
                index_range: opcua::types::UAString::null(),
                data_encoding: opcua::types::QualifiedName::null(),
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: opcua::types::MonitoringParameters {
                client_handle,
                sampling_interval: params.sampling_interval.as_millis() as f64,
                filter: ExtensionObject::null(),
                queue_size: params.queue_size,
                discard_oldest: params.discard_oldest,
            },
        };
        let node = node_id.to_string();

        blocking("create_monitored_item", move || {
            let results = session
                .read()
                .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[request])
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                        node,
                        status.to_string(),
                    ))
                })?;

            Ok(match results.first() {
                Some(r) if r.status_code.is_good() => MonitoredItemResult::good(r.monitored_item_id),
                Some(r) => MonitoredItemResult::bad(r.status_code.bits()),
                None => MonitoredItemResult::bad(status::BAD_UNEXPECTED_ERROR),
            })
        })
        .await
    }

    async fn run_iterate(&self, timeout: Duration) -> OpcUaResult<Vec<DataChange>> {
        if self.session.read().await.is_none() {
            return Err(OpcUaError::not_connected());
        }

        let mut rx = self.changes_rx.lock().await;
        let mut changes = Vec::new();

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(first)) => changes.push(first),
            Ok(None) => {
                return Err(OpcUaError::connection(ConnectionError::closed(
                    "data change channel closed",
                )))
            }
            Err(_) => return Ok(changes),
        }

        while let Ok(change) = rx.try_recv() {
            changes.push(change);
        }

        Ok(changes)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityPolicy;

    fn endpoint(mode: MessageSecurityMode, policy: &str) -> EndpointDescription {
        EndpointDescription::from(("opc.tcp://h/ep", policy, mode))
    }

    #[test]
    fn test_node_id_conversion() {
        let node = NodeId::numeric(2, 1001);
        let back = RealOpcUaTransport::from_opcua_node_id(&RealOpcUaTransport::to_opcua_node_id(&node));
        assert_eq!(node, back);

        let node = NodeId::string(5, "85/0:Simulation");
        let back = RealOpcUaTransport::from_opcua_node_id(&RealOpcUaTransport::to_opcua_node_id(&node));
        assert_eq!(node, back);
    }

    #[test]
    fn test_variant_conversion() {
        assert_eq!(
            RealOpcUaTransport::from_opcua_variant(&Variant::Int32(42)),
            WireValue::Int32(42)
        );
        assert_eq!(
            RealOpcUaTransport::from_opcua_variant(&Variant::Boolean(true)),
            WireValue::Boolean(true)
        );
        assert_eq!(
            RealOpcUaTransport::from_opcua_variant(&Variant::Empty),
            WireValue::Empty
        );
    }

    #[test]
    fn test_select_endpoint_prefers_unsecured_when_unrestricted() {
        let endpoints = vec![
            endpoint(MessageSecurityMode::SignAndEncrypt, SecurityPolicy::Basic256Sha256.uri()),
            endpoint(MessageSecurityMode::None, "http://opcfoundation.org/UA/SecurityPolicy#None"),
        ];
        let settings = SessionSettings::new("opc.tcp://h/ep");
        let selected = RealOpcUaTransport::select_endpoint(&endpoints, &settings).unwrap();
        assert_eq!(selected.security_mode, MessageSecurityMode::None);
    }

    #[test]
    fn test_select_endpoint_matches_mode_and_policy() {
        let endpoints = vec![
            endpoint(MessageSecurityMode::None, "http://opcfoundation.org/UA/SecurityPolicy#None"),
            endpoint(MessageSecurityMode::Sign, SecurityPolicy::Basic256.uri()),
            endpoint(MessageSecurityMode::Sign, SecurityPolicy::Basic256Sha256.uri()),
        ];
        let mut settings = SessionSettings::new("opc.tcp://h/ep");
        settings.security_mode = SecurityMode::Sign;
        settings.security_policy = SecurityPolicy::Basic256Sha256;

        let selected = RealOpcUaTransport::select_endpoint(&endpoints, &settings).unwrap();
        assert_eq!(selected.security_policy_uri.as_ref(), SecurityPolicy::Basic256Sha256.uri());

        settings.security_mode = SecurityMode::SignAndEncrypt;
        assert!(RealOpcUaTransport::select_endpoint(&endpoints, &settings).is_none());
    }

    #[test]
    fn test_transport_creation() {
        let transport = RealOpcUaTransport::new("south-opcua");
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
        assert_eq!(transport.endpoint(), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connect_to_closed_port_fails() {
        let mut transport = RealOpcUaTransport::new("south-opcua");
        let settings = SessionSettings::new("opc.tcp://127.0.0.1:1/ep");

        let result = transport.connect(&settings).await;
        assert!(result.is_err());
        assert_eq!(transport.state(), TransportState::Failed);
        assert!(!transport.is_connected());

        // Nothing to release, the transport can be dropped on this task.
        assert!(transport.disconnect().await.is_ok());
        assert_eq!(transport.state(), TransportState::Disconnected);
    }
}
