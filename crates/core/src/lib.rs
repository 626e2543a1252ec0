pub mod config;
pub mod consumer;
pub mod device;
pub mod error;
pub mod handler;
pub mod ortc;
pub mod peer;
pub mod producer;
pub mod queue;
pub mod remote_sdp;
pub mod sdp;
pub mod signaling;
pub mod transport;

pub use config::EngineConfig;
pub use consumer::{Consumer, ConsumerOptions};
pub use device::Device;
pub use error::{NegotiationErrorKind, Result, SfuError, StateErrorKind, ValidationReason};
pub use ortc::MediaKind;
pub use producer::Producer;
pub use queue::{CoalescePolicy, OperationKey, OperationQueue, QueueOutcome};
pub use transport::{ConnectionState, ProducerOptions, Transport, TransportEvent, TransportOptions};
