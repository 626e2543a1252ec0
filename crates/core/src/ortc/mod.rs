//! ORTC capability model and negotiation.
//!
//! The [`Device`](crate::Device) computes [`ExtendedRtpCapabilities`] once
//! from the native capabilities (discovered from a local SDP offer) and the
//! router capabilities received over signaling. Everything else is derived
//! from that value with the pure functions in [`negotiate`]:
//!
//! ```text
//!  native caps ─┐
//!               ├─ get_extended_rtp_capabilities ─┬─ get_recv_rtp_capabilities
//!  router caps ─┘                                 ├─ get_sending_rtp_parameters
//!                                                 └─ get_sending_remote_rtp_parameters
//! ```

pub mod h264;
pub mod negotiate;
pub mod types;
pub mod validate;

pub use negotiate::{
    ABS_SEND_TIME_URI, PROBATOR_MID, PROBATOR_SSRC, TRANSPORT_WIDE_CC_URI, can_receive,
    can_send, generate_probator_rtp_parameters, get_extended_rtp_capabilities, get_recv_rtp_capabilities,
    get_sending_remote_rtp_parameters, get_sending_rtp_parameters, reduce_codecs, reduce_rtcp_feedback,
};
pub use types::*;
pub use validate::*;
