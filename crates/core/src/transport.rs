//! Send and receive transports.
//!
//! A transport owns one peer connection, the handler negotiating on it, the
//! operation queue serializing that handler, and the registry of the
//! producers or consumers it created.
//!
//! ## Lifecycle
//!
//! ```text
//! create ─► Open ──close() / fatal error──► Closed (terminal)
//!                                            │
//!                                            └─► every producer/consumer: transport_closed()
//! ```
//!
//! Connection state mirrors the peer connection's ICE state and is
//! published as [`TransportEvent`]s, as is the closing of each producer and
//! consumer. A fatal negotiation error closes the
//! transport and is published once as [`TransportEvent::Failed`]; whether
//! to restart ICE or rebuild is left to the application.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::consumer::{Consumer, ConsumerOptions};
use crate::error::{NegotiationErrorKind, Result, SfuError, StateErrorKind};
use crate::handler::{
    DtlsConnector, HandlerReceiveOptions, HandlerSendOptions, Negotiable, RecvHandler, SendHandler,
};
use crate::ortc::{
    self, DtlsParameters, ExtendedRtpCapabilities, IceCandidate, IceParameters, MediaKind, RtpCodecCapability,
    RtpEncodingParameters, SctpParameters,
};
use crate::peer::{IceServer, IceTransportPolicy, PeerConnection, StatsReport, TrackRef};
use crate::producer::Producer;
use crate::queue::{CoalescePolicy, OperationKey, OperationQueue, QueueOutcome};
use crate::remote_sdp::CodecOptions;
use crate::signaling::{ConnectTransportRequest, ResumeTrackRequest, SendTrackRequest, SignalingChannel, TransportDirection};

pub use crate::peer::IceConnectionState as ConnectionState;

/// Capacity of the event channel; slow subscribers miss older events.
const EVENT_CAPACITY: usize = 32;

/// Parameters of a server-side transport, as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    #[serde(default)]
    pub sctp_parameters: Option<SctpParameters>,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    #[serde(default)]
    pub ice_transport_policy: IceTransportPolicy,
    #[serde(default)]
    pub app_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ConnectionStateChanged(ConnectionState),
    /// A fatal error closed the transport. Published once.
    Failed { reason: String },
    /// A producer of this transport closed, explicitly or with the transport.
    ProducerClosed { id: String },
    ConsumerClosed { id: String },
    Closed,
}

pub struct ProducerOptions {
    pub track: TrackRef,
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
    pub codec: Option<RtpCodecCapability>,
    pub app_data: serde_json::Value,
}

impl ProducerOptions {
    pub fn new(track: TrackRef) -> Self {
        Self {
            track,
            encodings: Vec::new(),
            codec_options: None,
            codec: None,
            app_data: serde_json::Value::Null,
        }
    }
}

enum DirectionalHandler {
    Send(SendHandler),
    Recv(RecvHandler),
}

impl DirectionalHandler {
    fn negotiable(&mut self) -> &mut dyn Negotiable {
        match self {
            Self::Send(handler) => handler,
            Self::Recv(handler) => handler,
        }
    }

    fn send(&mut self) -> Result<&mut SendHandler> {
        match self {
            Self::Send(handler) => Ok(handler),
            Self::Recv(_) => Err(SfuError::Negotiation(NegotiationErrorKind::WrongDirection)),
        }
    }

    fn recv(&mut self) -> Result<&mut RecvHandler> {
        match self {
            Self::Recv(handler) => Ok(handler),
            Self::Send(_) => Err(SfuError::Negotiation(NegotiationErrorKind::WrongDirection)),
        }
    }
}

/// Reports DTLS parameters through `connect-transport`.
pub(crate) struct SignalingConnector {
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) transport_id: String,
    pub(crate) direction: TransportDirection,
}

#[async_trait]
impl DtlsConnector for SignalingConnector {
    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<()> {
        tracing::debug!(transport_id = %self.transport_id, direction = self.direction.as_str(), "connect-transport");
        self.signaling
            .connect_transport(ConnectTransportRequest {
                transport_id: self.transport_id.clone(),
                direction: self.direction,
                dtls_parameters,
            })
            .await
    }
}

pub struct Transport {
    id: String,
    direction: TransportDirection,
    config: Arc<EngineConfig>,
    extended: Arc<ExtendedRtpCapabilities>,
    signaling: Arc<dyn SignalingChannel>,
    pc: Arc<dyn PeerConnection>,
    handler: tokio::sync::Mutex<DirectionalHandler>,
    queue: OperationQueue,
    closed: AtomicBool,
    failure_reported: AtomicBool,
    connection_state: RwLock<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    producers: RwLock<HashMap<String, Arc<Producer>>>,
    consumers: RwLock<HashMap<String, Arc<Consumer>>>,
    /// participant id -> id of its video consumer.
    video_consumers: RwLock<HashMap<String, String>>,
    probator_consumed: AtomicBool,
    max_sctp_message_size: Option<u32>,
    app_data: serde_json::Value,
}

/// Everything the device hands a new transport.
pub(crate) struct TransportContext {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) extended: Arc<ExtendedRtpCapabilities>,
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) pc: Arc<dyn PeerConnection>,
}

impl Transport {
    pub(crate) fn new(
        direction: TransportDirection,
        options: TransportOptions,
        context: TransportContext,
    ) -> Result<Arc<Self>> {
        ortc::validate_ice_parameters(&options.ice_parameters)?;
        ortc::validate_ice_candidates(&options.ice_candidates)?;
        ortc::validate_dtls_parameters(&options.dtls_parameters)?;

        let TransportContext {
            config,
            extended,
            signaling,
            pc,
        } = context;
        let run_options = crate::handler::HandlerRunOptions {
            transport_id: options.id.clone(),
            ice_parameters: options.ice_parameters,
            ice_candidates: options.ice_candidates,
            dtls_parameters: options.dtls_parameters,
            peer_connection: pc.clone(),
            connector: Arc::new(SignalingConnector {
                signaling: signaling.clone(),
                transport_id: options.id.clone(),
                direction,
            }),
            config: config.clone(),
        };

        let (handler, queue) = match direction {
            TransportDirection::Send => {
                let mut local = HashMap::new();
                let mut remote = HashMap::new();
                for kind in [MediaKind::Audio, MediaKind::Video] {
                    if ortc::can_send(kind, &extended) {
                        local.insert(kind, ortc::get_sending_rtp_parameters(kind, &extended));
                        remote.insert(kind, ortc::get_sending_remote_rtp_parameters(kind, &extended));
                    }
                }
                (
                    DirectionalHandler::Send(SendHandler::new(run_options, local, remote)),
                    OperationQueue::new("send", CoalescePolicy::DropDuplicates),
                )
            }
            TransportDirection::Recv => (
                DirectionalHandler::Recv(RecvHandler::new(run_options)),
                OperationQueue::new("recv", CoalescePolicy::Enqueue),
            ),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let transport = Arc::new(Self {
            id: options.id,
            direction,
            config,
            extended,
            signaling,
            pc: pc.clone(),
            handler: tokio::sync::Mutex::new(handler),
            queue,
            closed: AtomicBool::new(false),
            failure_reported: AtomicBool::new(false),
            connection_state: RwLock::new(ConnectionState::New),
            events,
            producers: RwLock::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            video_consumers: RwLock::new(HashMap::new()),
            probator_consumed: AtomicBool::new(false),
            max_sctp_message_size: options.sctp_parameters.map(|sctp| sctp.max_message_size),
            app_data: options.app_data,
        });

        let weak = Arc::downgrade(&transport);
        pc.on_ice_connection_state_change(Box::new(move |state| {
            if let Some(transport) = weak.upgrade() {
                transport.on_connection_state(state);
            }
        }));
        tracing::info!(transport_id = %transport.id, direction = direction.as_str(), "transport created");
        Ok(transport)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> TransportDirection {
        self.direction
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_sctp_message_size(&self) -> Option<u32> {
        self.max_sctp_message_size
    }

    pub fn app_data(&self) -> &serde_json::Value {
        &self.app_data
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub fn producers(&self) -> Vec<Arc<Producer>> {
        self.producers.read().values().cloned().collect()
    }

    pub fn consumers(&self) -> Vec<Arc<Consumer>> {
        self.consumers.read().values().cloned().collect()
    }

    pub fn producer(&self, id: &str) -> Option<Arc<Producer>> {
        self.producers.read().get(id).cloned()
    }

    pub fn consumer(&self, id: &str) -> Option<Arc<Consumer>> {
        self.consumers.read().get(id).cloned()
    }

    /// Current video consumer of a remote participant.
    pub fn video_consumer_for(&self, participant_id: &str) -> Option<Arc<Consumer>> {
        let id = self.video_consumers.read().get(participant_id).cloned()?;
        self.consumer(&id)
    }

    pub fn probator_consumed(&self) -> bool {
        self.probator_consumed.load(Ordering::SeqCst)
    }

    /// Resolve once no queued operation is pending.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SfuError::State(StateErrorKind::TransportClosed));
        }
        Ok(())
    }

    fn ensure_direction(&self, direction: TransportDirection) -> Result<()> {
        if self.direction != direction {
            return Err(SfuError::Negotiation(NegotiationErrorKind::WrongDirection));
        }
        Ok(())
    }

    /// Close the transport when `result` carries a fatal error.
    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result
            && err.is_fatal()
        {
            self.fail(err);
        }
        result
    }

    fn fail(&self, err: &SfuError) {
        if self.failure_reported.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!(transport_id = %self.id, error = %err, "fatal transport error");
        let _ = self.events.send(TransportEvent::Failed {
            reason: err.to_string(),
        });
        self.close();
    }

    fn publish_producer_closed(&self, producer: &Producer) {
        let _ = self.events.send(TransportEvent::ProducerClosed {
            id: producer.id().to_string(),
        });
    }

    fn publish_consumer_closed(&self, consumer: &Consumer) {
        let _ = self.events.send(TransportEvent::ConsumerClosed {
            id: consumer.id().to_string(),
        });
    }

    fn on_connection_state(&self, state: ConnectionState) {
        if self.is_closed() {
            return;
        }
        let previous = std::mem::replace(&mut *self.connection_state.write(), state);
        if previous == state {
            return;
        }
        tracing::debug!(transport_id = %self.id, ?previous, ?state, "connection state changed");
        let _ = self.events.send(TransportEvent::ConnectionStateChanged(state));
    }

    /// Close the transport and every producer/consumer it owns.
    ///
    /// Queued operations are rejected; an operation already running is not
    /// waited for.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(transport_id = %self.id, "transport closed");
        self.queue.drain();
        match self.handler.try_lock() {
            Ok(mut handler) => handler.negotiable().close(),
            Err(_) => self.pc.close(),
        }
        *self.connection_state.write() = ConnectionState::Closed;

        let producers: Vec<_> = self.producers.write().drain().map(|(_, p)| p).collect();
        for producer in producers {
            if producer.transport_closed() {
                self.publish_producer_closed(&producer);
            }
        }
        let consumers: Vec<_> = self.consumers.write().drain().map(|(_, c)| c).collect();
        for consumer in consumers {
            if consumer.transport_closed() {
                self.publish_consumer_closed(&consumer);
            }
        }
        self.video_consumers.write().clear();
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Ask the server for fresh ICE parameters and renegotiate with them.
    pub async fn restart_ice(&self) -> Result<()> {
        self.ensure_open()?;
        let response = self.signaling.restart_ice(self.direction).await?;
        tracing::info!(transport_id = %self.id, "restarting ICE");
        let result = self
            .queue
            .run_exclusive(move || async move {
                let mut handler = self.handler.lock().await;
                let handler = handler.negotiable();
                if let Some(servers) = response.ice_servers {
                    handler.update_ice_servers(servers)?;
                }
                handler.restart_ice(response.ice_parameters).await
            })
            .await;
        self.guard(result)
    }

    pub fn update_ice_servers(&self, servers: Vec<IceServer>) -> Result<()> {
        self.ensure_open()?;
        self.pc.set_ice_servers(servers)
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        self.ensure_open()?;
        self.handler.lock().await.negotiable().get_transport_stats().await
    }

    /// Start sending a local track.
    ///
    /// With request coalescing on, a second produce of a kind already
    /// queued answers [`QueueOutcome::Coalesced`].
    pub async fn produce(self: &Arc<Self>, options: ProducerOptions) -> Result<QueueOutcome<Arc<Producer>>> {
        self.ensure_direction(TransportDirection::Send)?;
        self.ensure_open()?;
        let kind = options.track.kind();
        if options.track.is_ended() {
            return Err(SfuError::Negotiation(NegotiationErrorKind::TrackEnded));
        }
        if !ortc::can_send(kind, &self.extended) {
            return Err(SfuError::Negotiation(NegotiationErrorKind::CannotProduce(kind)));
        }
        let mut encodings = options.encodings;
        for encoding in &mut encodings {
            ortc::validate_rtp_encoding_parameters(encoding)?;
        }

        let key = self
            .config
            .coalesce_produce_requests
            .then_some(OperationKey::Produce(kind));
        let track = options.track;
        let app_data = options.app_data;
        let handler_options = HandlerSendOptions {
            track: track.clone(),
            encodings,
            codec_options: options.codec_options,
            codec: options.codec,
        };

        let result = self
            .queue
            .run(key, move || async move {
                self.ensure_open()?;
                let mut handler = self.handler.lock().await;
                let sent = handler.send()?.send(handler_options).await?;
                let local_id = sent.local_id.clone();

                let announced = async {
                    let mut rtp_parameters = sent.rtp_parameters;
                    ortc::validate_rtp_parameters(&mut rtp_parameters)?;
                    let id = self
                        .signaling
                        .send_track(SendTrackRequest {
                            transport_id: self.id.clone(),
                            kind,
                            rtp_parameters: rtp_parameters.clone(),
                            app_data: app_data.clone(),
                        })
                        .await?;
                    Ok::<_, SfuError>((id, rtp_parameters))
                }
                .await;

                match announced {
                    Ok((id, rtp_parameters)) => {
                        let producer = Arc::new(Producer::new(
                            id,
                            local_id,
                            track,
                            rtp_parameters,
                            app_data,
                            Arc::downgrade(self),
                        ));
                        self.producers.write().insert(producer.id().to_string(), producer.clone());
                        tracing::info!(
                            transport_id = %self.id,
                            producer_id = %producer.id(),
                            local_id = %producer.local_id(),
                            %kind,
                            "producer created"
                        );
                        Ok(producer)
                    }
                    Err(err) => {
                        tracing::warn!(transport_id = %self.id, %local_id, error = %err, "send-track failed, stopping sender");
                        if let Err(stop_err) = handler.send()?.stop_sending(&local_id).await {
                            tracing::warn!(transport_id = %self.id, %local_id, error = %stop_err, "stop sending failed");
                        }
                        Err(err)
                    }
                }
            })
            .await;
        self.guard(result)
    }

    pub(crate) async fn stop_producer(&self, producer: &Producer) -> Result<()> {
        if self.producers.write().remove(producer.id()).is_some() {
            self.publish_producer_closed(producer);
        }
        if self.is_closed() {
            return Ok(());
        }
        let local_id = producer.local_id();
        let key = self
            .config
            .coalesce_produce_requests
            .then(|| OperationKey::StopSending(local_id.to_string()));
        let result = self
            .queue
            .run(key, move || async move {
                self.handler.lock().await.send()?.stop_sending(local_id).await
            })
            .await;
        self.guard(result).map(|_| ())
    }

    pub(crate) async fn replace_producer_track(&self, local_id: &str, track: Option<TrackRef>) -> Result<()> {
        self.ensure_open()?;
        let key = self
            .config
            .coalesce_produce_requests
            .then(|| OperationKey::ChangeTrack(local_id.to_string()));
        let result = self
            .queue
            .run(key, move || async move {
                self.handler.lock().await.send()?.replace_track(local_id, track).await
            })
            .await;
        self.guard(result).map(|_| ())
    }

    pub(crate) async fn set_producer_max_spatial_layer(
        &self,
        local_id: &str,
        layer: u8,
        encoding_count: usize,
    ) -> Result<()> {
        self.ensure_open()?;
        let result = self
            .queue
            .run_exclusive(move || async move {
                self.handler
                    .lock()
                    .await
                    .send()?
                    .set_max_spatial_layer(local_id, layer, encoding_count)
                    .await
            })
            .await;
        self.guard(result)
    }

    pub(crate) async fn producer_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.ensure_open()?;
        self.handler.lock().await.send()?.get_sender_stats(local_id).await
    }

    /// Start receiving a remote producer.
    ///
    /// Receive requests never coalesce: each one completes (SDP exchange and
    /// `resume-track`) before the next starts. A video consumer for a
    /// participant that already has one replaces it. The consumer is
    /// registered only once `resume-track` succeeded.
    pub async fn consume(self: &Arc<Self>, options: ConsumerOptions) -> Result<Arc<Consumer>> {
        self.ensure_direction(TransportDirection::Recv)?;
        self.ensure_open()?;
        let mut rtp_parameters = options.rtp_parameters;
        ortc::validate_rtp_parameters(&mut rtp_parameters)?;
        if !ortc::can_receive(&rtp_parameters, &self.extended) {
            return Err(SfuError::Negotiation(NegotiationErrorKind::CannotConsume));
        }
        let ConsumerOptions {
            id,
            producer_id,
            kind,
            participant_id,
            app_data,
            ..
        } = options;

        let result = self
            .queue
            .run_exclusive(move || async move {
                self.ensure_open()?;
                let mut handler = self.handler.lock().await;
                let handler = handler.recv()?;

                if kind == MediaKind::Video
                    && let Some(participant) = participant_id.as_deref()
                {
                    self.replace_participant_video(handler, participant).await?;
                }

                let received = handler
                    .receive(HandlerReceiveOptions {
                        track_id: id.clone(),
                        kind,
                        rtp_parameters: rtp_parameters.clone(),
                        stream_id: None,
                    })
                    .await?;
                let resumed = self
                    .signaling
                    .resume_track(ResumeTrackRequest {
                        consumer_id: id.clone(),
                        producer_id: producer_id.clone(),
                        kind,
                    })
                    .await;
                if let Err(err) = resumed {
                    tracing::warn!(
                        transport_id = %self.id,
                        local_id = %received.local_id,
                        error = %err,
                        "resume-track failed, stopping receiver"
                    );
                    if let Err(stop_err) = handler.stop_receiving(&received.local_id).await {
                        tracing::warn!(transport_id = %self.id, local_id = %received.local_id, error = %stop_err, "stop receiving failed");
                    }
                    return Err(err);
                }

                let track = self.pc.receiver_track(received.transceiver);
                let consumer = Arc::new(Consumer::new(
                    id,
                    received.local_id,
                    producer_id,
                    kind,
                    participant_id,
                    rtp_parameters,
                    track,
                    app_data,
                    Arc::downgrade(self),
                ));
                self.consumers.write().insert(consumer.id().to_string(), consumer.clone());
                if kind == MediaKind::Video
                    && let Some(participant) = consumer.participant_id()
                {
                    self.video_consumers
                        .write()
                        .insert(participant.to_string(), consumer.id().to_string());
                }
                tracing::info!(
                    transport_id = %self.id,
                    consumer_id = %consumer.id(),
                    local_id = %consumer.local_id(),
                    %kind,
                    "consumer created"
                );

                if kind == MediaKind::Video && self.config.enable_probator {
                    self.consume_probator(handler, consumer.rtp_parameters()).await;
                }
                Ok(consumer)
            })
            .await;
        self.guard(result)
    }

    /// Close the current video consumer of `participant`, if any.
    async fn replace_participant_video(&self, handler: &mut RecvHandler, participant: &str) -> Result<()> {
        let Some(prior) = self.video_consumer_for(participant) else {
            return Ok(());
        };
        tracing::info!(
            transport_id = %self.id,
            participant,
            consumer_id = %prior.id(),
            "replacing participant video consumer"
        );
        prior.mark_closed();
        self.forget_consumer(&prior);
        handler.stop_receiving(prior.local_id()).await
    }

    /// One probator stream per transport, on the first video consumer.
    async fn consume_probator(&self, handler: &mut RecvHandler, video: &ortc::RtpParameters) {
        if self.probator_consumed.swap(true, Ordering::SeqCst) {
            return;
        }
        let result = async {
            let rtp_parameters = ortc::generate_probator_rtp_parameters(video)?;
            handler
                .receive(HandlerReceiveOptions {
                    track_id: ortc::PROBATOR_MID.to_string(),
                    kind: MediaKind::Video,
                    rtp_parameters,
                    stream_id: Some(ortc::PROBATOR_MID.to_string()),
                })
                .await
        }
        .await;
        match result {
            Ok(received) => {
                tracing::debug!(transport_id = %self.id, local_id = %received.local_id, "probator consumed")
            }
            Err(err) => tracing::warn!(transport_id = %self.id, error = %err, "probator consume failed"),
        }
    }

    fn forget_consumer(&self, consumer: &Consumer) {
        if self.consumers.write().remove(consumer.id()).is_some() {
            self.publish_consumer_closed(consumer);
        }
        if let Some(participant) = consumer.participant_id() {
            let mut video = self.video_consumers.write();
            if video.get(participant).map(String::as_str) == Some(consumer.id()) {
                video.remove(participant);
            }
        }
    }

    pub(crate) async fn stop_consumer(&self, consumer: &Consumer) -> Result<()> {
        self.forget_consumer(consumer);
        if self.is_closed() {
            return Ok(());
        }
        let local_id = consumer.local_id();
        let result = self
            .queue
            .run_exclusive(move || async move {
                let mut handler = self.handler.lock().await;
                let handler = handler.recv()?;
                if !handler.has_local_id(local_id) {
                    return Ok(());
                }
                handler.stop_receiving(local_id).await
            })
            .await;
        self.guard(result)
    }

    pub(crate) async fn consumer_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.ensure_open()?;
        self.handler.lock().await.recv()?.get_receiver_stats(local_id).await
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.pc.close();
        }
    }
}
