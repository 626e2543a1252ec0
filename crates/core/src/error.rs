//! Error types for the SFU client engine.

use std::fmt;

use crate::ortc::MediaKind;

/// Errors that can occur while negotiating media with the SFU.
///
/// Variants map to the stage at which an operation was rejected:
///
/// - [`Validation`](Self::Validation): a capability or
///   parameter document is missing a mandatory field or carries a bad value.
///   Raised before the remote SDP or the peer connection is touched.
/// - [`Negotiation`](Self::Negotiation): the request cannot
///   be satisfied under the negotiated capabilities.
/// - [`Transport`](Self::Transport): the peer connection
///   rejected an offer/answer/description call.
/// - [`Signaling`](Self::Signaling): the signaling channel
///   failed a request.
/// - [`State`](Self::State): the target entity is already closed.
#[derive(Debug, thiserror::Error)]
pub enum SfuError {
    /// A capability/parameter document failed validation.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: String,
        reason: ValidationReason,
    },

    /// The request is not possible under the current negotiation state.
    #[error("negotiation error: {0}")]
    Negotiation(NegotiationErrorKind),

    /// The peer connection rejected an operation.
    #[error("peer connection {operation} failed: {reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },

    /// The signaling channel failed a request.
    #[error("signaling error: {0}")]
    Signaling(String),

    /// Operation attempted on a closed entity.
    #[error("invalid state: {0}")]
    State(StateErrorKind),
}

impl SfuError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: ValidationReason::Missing,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: ValidationReason::Invalid(detail.into()),
        }
    }

    pub(crate) fn transport(operation: &'static str, reason: impl fmt::Display) -> Self {
        Self::Transport {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Whether this error leaves the transport unusable.
    ///
    /// Fatal errors close the owning transport, which cascades closure to
    /// its producers and consumers.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Negotiation(NegotiationErrorKind::TransceiverNotFound(_))
        )
    }
}

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// A mandatory field is absent or empty.
    Missing,
    /// The field is present but its value is not acceptable.
    Invalid(String),
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing mandatory field"),
            Self::Invalid(detail) => write!(f, "{detail}"),
        }
    }
}

/// Specific kind of negotiation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationErrorKind {
    /// The device has not loaded the router capabilities yet.
    DeviceNotLoaded,
    /// `Device::load` was called twice.
    DeviceAlreadyLoaded,
    /// No negotiated codec for this kind.
    CannotProduce(MediaKind),
    /// The remote parameters use a codec the device cannot receive.
    CannotConsume,
    /// The local track has already ended.
    TrackEnded,
    /// A produce call on a receive transport or vice versa.
    WrongDirection,
    /// The operation only applies to another media kind.
    WrongKind(MediaKind),
    /// None of the codecs matches the requested codec.
    NoMatchingCodec,
    /// The local SDP has no media section with ICE parameters and a port.
    NoActiveMediaSection,
    /// The local offer carries no `a=ssrc` lines.
    NoSsrcLines,
    /// No remote media section for this mid.
    MediaSectionNotFound(String),
    /// No transceiver is associated with this local id.
    TransceiverNotFound(String),
}

impl fmt::Display for NegotiationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotLoaded => write!(f, "device not loaded"),
            Self::DeviceAlreadyLoaded => write!(f, "device already loaded"),
            Self::CannotProduce(kind) => write!(f, "cannot produce {kind}"),
            Self::CannotConsume => write!(f, "cannot consume this producer"),
            Self::TrackEnded => write!(f, "track ended"),
            Self::WrongDirection => write!(f, "operation not valid for this transport direction"),
            Self::WrongKind(kind) => write!(f, "operation only valid for {kind}"),
            Self::NoMatchingCodec => write!(f, "no matching codec found"),
            Self::NoActiveMediaSection => write!(f, "no active media section found"),
            Self::NoSsrcLines => write!(f, "no a=ssrc lines found"),
            Self::MediaSectionNotFound(mid) => write!(f, "no media section found with mid '{mid}'"),
            Self::TransceiverNotFound(id) => {
                write!(f, "associated transceiver not found [local_id:{id}]")
            }
        }
    }
}

/// Which entity was closed when the operation arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorKind {
    TransportClosed,
    ProducerClosed,
    ConsumerClosed,
    /// The operation was queued when the queue was drained.
    QueueDrained,
}

impl fmt::Display for StateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportClosed => write!(f, "transport closed"),
            Self::ProducerClosed => write!(f, "producer closed"),
            Self::ConsumerClosed => write!(f, "consumer closed"),
            Self::QueueDrained => write!(f, "operation queue drained"),
        }
    }
}

impl From<serde_json::Error> for SfuError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            field: "document".to_string(),
            reason: ValidationReason::Invalid(err.to_string()),
        }
    }
}

/// Convenience alias for `Result<T, SfuError>`.
pub type Result<T> = std::result::Result<T, SfuError>;
