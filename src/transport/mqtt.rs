use super::{clamp_qos, InboundMessage, PubSubClient};
use crate::config::MqttConfig;
use crate::resource::ResourceName;
use async_trait::async_trait;
use dashmap::DashMap;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests buffered between the client handle and its event loop
const REQUEST_CAPACITY: usize = 32;

struct MqttSession {
    client: AsyncClient,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// MQTT implementation of [`PubSubClient`] on top of `rumqttc`.
///
/// `connect` spawns the event loop; broker connection and reconnection
/// happen inside it. Subscriptions are remembered and re-issued on every
/// CONNACK, so a broker restart resumes inbound delivery by itself.
/// Inbound publishes are resolved to a [`ResourceName`] and forwarded on
/// the channel given at construction.
pub struct MqttConnector {
    host: String,
    port: u16,
    client_id: String,
    keep_alive: Duration,
    default_qos: i32,
    publish_timeout: Duration,
    reconnect_delay: Duration,
    inbound_tx: mpsc::Sender<InboundMessage>,
    session: Mutex<Option<MqttSession>>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<DashMap<ResourceName, QoS>>,
}

impl MqttConnector {
    pub fn new(
        config: &MqttConfig,
        location_id: &str,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id: config.effective_client_id(location_id),
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            default_qos: config.default_qos,
            publish_timeout: Duration::from_secs(config.publish_timeout_secs.max(1)),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            inbound_tx,
            session: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            subscriptions: Arc::new(DashMap::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn client(&self) -> Option<AsyncClient> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.client.clone())
    }
}

#[async_trait]
impl PubSubClient for MqttConnector {
    async fn connect(&self) -> bool {
        let mut session = self.session.lock().await;
        if session.is_some() {
            info!(client_id = %self.client_id, "MQTT session already open, ignoring connect");
            return false;
        }

        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            EventLoopContext {
                connected: Arc::clone(&self.connected),
                subscriptions: Arc::clone(&self.subscriptions),
                inbound_tx: self.inbound_tx.clone(),
                reconnect_delay: self.reconnect_delay,
                cancel: cancel.clone(),
            },
        ));

        info!(
            client_id = %self.client_id,
            host = %self.host,
            port = self.port,
            "MQTT session opened"
        );

        *session = Some(MqttSession {
            client,
            cancel,
            handle,
        });
        true
    }

    async fn disconnect(&self) -> bool {
        let current = self.session.lock().await.take();
        let Some(MqttSession {
            client,
            cancel,
            mut handle,
        }) = current
        else {
            info!(client_id = %self.client_id, "No MQTT session open, ignoring disconnect");
            return false;
        };

        match timeout(self.publish_timeout, client.disconnect()).await {
            Ok(Ok(())) => {
                // Let the event loop flush DISCONNECT before tearing it down
                if timeout(self.publish_timeout, &mut handle).await.is_err() {
                    debug!(client_id = %self.client_id, "Event loop did not exit after DISCONNECT");
                }
            }
            Ok(Err(e)) => warn!(client_id = %self.client_id, error = %e, "Failed to request MQTT disconnect"),
            Err(_) => warn!(client_id = %self.client_id, "Timed out requesting MQTT disconnect"),
        }

        cancel.cancel();
        if !handle.is_finished() {
            if let Err(e) = handle.await {
                warn!(client_id = %self.client_id, error = %e, "MQTT event loop ended abnormally");
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!(client_id = %self.client_id, "MQTT session closed");
        true
    }

    async fn publish(&self, resource: ResourceName, payload: &str, qos: i32) -> bool {
        if payload.is_empty() {
            warn!(resource = %resource, "Refusing to publish empty payload");
            return false;
        }

        let qos = to_mqtt_qos(clamp_qos(qos, self.default_qos));

        let Some(client) = self.client().await else {
            warn!(resource = %resource, "No MQTT session, dropping publish");
            return false;
        };
        if !self.is_connected() {
            warn!(resource = %resource, "Not connected to broker, dropping publish");
            return false;
        }

        let request = client.publish(resource.topic(), qos, false, payload.as_bytes().to_vec());
        match timeout(self.publish_timeout, request).await {
            Ok(Ok(())) => {
                debug!(resource = %resource, bytes = payload.len(), "Published");
                true
            }
            Ok(Err(e)) => {
                error!(resource = %resource, error = %e, "MQTT publish failed");
                false
            }
            Err(_) => {
                warn!(
                    resource = %resource,
                    timeout_secs = self.publish_timeout.as_secs(),
                    "MQTT publish timed out"
                );
                false
            }
        }
    }

    async fn subscribe(&self, resource: ResourceName, qos: i32) -> bool {
        let Some(client) = self.client().await else {
            warn!(resource = %resource, "No MQTT session, cannot subscribe");
            return false;
        };

        let qos = to_mqtt_qos(clamp_qos(qos, self.default_qos));
        self.subscriptions.insert(resource, qos);

        if !self.is_connected() {
            info!(resource = %resource, "Subscription recorded, will be issued on connect");
            return true;
        }

        match timeout(self.publish_timeout, client.subscribe(resource.topic(), qos)).await {
            Ok(Ok(())) => {
                info!(resource = %resource, "Subscribed");
                true
            }
            Ok(Err(e)) => {
                error!(resource = %resource, error = %e, "MQTT subscribe failed");
                false
            }
            Err(_) => {
                warn!(resource = %resource, "MQTT subscribe timed out");
                false
            }
        }
    }

    async fn unsubscribe(&self, resource: ResourceName) -> bool {
        if self.subscriptions.remove(&resource).is_none() {
            info!(resource = %resource, "Not subscribed, ignoring unsubscribe");
            return false;
        }

        let Some(client) = self.client().await else {
            return true;
        };
        if !self.is_connected() {
            return true;
        }

        match timeout(self.publish_timeout, client.unsubscribe(resource.topic())).await {
            Ok(Ok(())) => {
                info!(resource = %resource, "Unsubscribed");
                true
            }
            Ok(Err(e)) => {
                error!(resource = %resource, error = %e, "MQTT unsubscribe failed");
                false
            }
            Err(_) => {
                warn!(resource = %resource, "MQTT unsubscribe timed out");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

struct EventLoopContext {
    connected: Arc<AtomicBool>,
    subscriptions: Arc<DashMap<ResourceName, QoS>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
}

async fn run_event_loop(mut eventloop: EventLoop, client: AsyncClient, ctx: EventLoopContext) {
    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                ctx.connected.store(true, Ordering::SeqCst);
                info!("Connected to MQTT broker");

                for entry in ctx.subscriptions.iter() {
                    if let Err(e) = client.try_subscribe(entry.key().topic(), *entry.value()) {
                        error!(resource = %entry.key(), error = %e, "Failed to re-issue subscription");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(message) = route_publish(&publish.topic, &publish.payload) else {
                    continue;
                };
                match ctx.inbound_tx.try_send(message) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(message)) => {
                        warn!(resource = %message.resource, "Inbound queue full, dropping message");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Inbound receiver closed, dropping message");
                    }
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                debug!("Subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                ctx.connected.store(false, Ordering::SeqCst);
                warn!("Broker closed the MQTT session");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                ctx.connected.store(false, Ordering::SeqCst);
                debug!("DISCONNECT sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                ctx.connected.store(false, Ordering::SeqCst);
                warn!(
                    error = %e,
                    retry_secs = ctx.reconnect_delay.as_secs(),
                    "MQTT connection error, retrying"
                );

                // Wait before retry with cancellation check
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = tokio::time::sleep(ctx.reconnect_delay) => {}
                }
            }
        }
    }

    debug!("MQTT event loop exited");
}

/// Resolve a received publish to an inbound message. Unknown topics and
/// non UTF-8 payloads are logged and dropped.
pub(crate) fn route_publish(topic: &str, payload: &[u8]) -> Option<InboundMessage> {
    let Some(resource) = ResourceName::from_topic(topic) else {
        warn!(topic = %topic, "Message on unknown topic, dropping");
        return None;
    };

    match std::str::from_utf8(payload) {
        Ok(text) => Some(InboundMessage {
            resource,
            payload: text.to_string(),
        }),
        Err(e) => {
            warn!(resource = %resource, error = %e, "Payload is not UTF-8, dropping");
            None
        }
    }
}

fn to_mqtt_qos(qos: i32) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}
