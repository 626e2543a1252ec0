//! One `m=` section of the remote description.
//!
//! Both variants share the ICE/DTLS record; they differ in where the codec
//! lines come from:
//!
//! - **Answer**: what the SFU would answer to our send offer. Built from the
//!   offered media object plus the negotiated answer parameters, `recvonly`.
//! - **Offer**: what the SFU offers when it sends us a producer's stream.
//!   Built from the consumer's RTP parameters, `sendonly`.

use serde::{Deserialize, Serialize};

use crate::ortc::{DtlsRole, IceCandidate, IceParameters, IceProtocol, MediaKind, RtpCodecParameters, RtpParameters};
use crate::sdp::{
    Candidate, CodecParameters, Connection, Direction, END_OF_CANDIDATES, EXTMAP_ALLOW_MIXED, ExtMap, Fmtp, MediaDescription,
    RTCP_MUX, RTCP_RSIZE, Rid, RtcpFb, RtpMap, Simulcast, Ssrc, SsrcGroup, write_params,
};

/// Per-producer codec tweaks applied to the answer (and mirrored into the
/// offered parameters where the remote has to know about them).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodecOptions {
    pub opus_stereo: Option<bool>,
    pub opus_fec: Option<bool>,
    pub opus_dtx: Option<bool>,
    pub opus_max_playback_rate: Option<u32>,
    pub opus_max_average_bitrate: Option<u32>,
    pub opus_ptime: Option<u32>,
    pub video_google_start_bitrate: Option<u32>,
    pub video_google_max_bitrate: Option<u32>,
    pub video_google_min_bitrate: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionVariant {
    Offer,
    Answer,
}

/// Shared ICE/DTLS inputs of every section of one transport.
#[derive(Debug, Clone, Copy)]
pub struct SectionTransport<'a> {
    pub ice_parameters: &'a IceParameters,
    pub ice_candidates: &'a [IceCandidate],
    pub ice_options: Option<&'a str>,
    pub dtls_role: Option<DtlsRole>,
}

/// Inputs of an answer section.
pub struct AnswerSection<'a> {
    pub offer_media: &'a MediaDescription,
    /// Offered parameters; opus options the remote must know are written back.
    pub offer_rtp_parameters: &'a mut RtpParameters,
    pub answer_rtp_parameters: &'a RtpParameters,
    pub codec_options: Option<&'a CodecOptions>,
    pub extmap_allow_mixed: bool,
}

/// Inputs of an offer section.
pub struct OfferSection<'a> {
    pub mid: &'a str,
    pub kind: MediaKind,
    pub offer_rtp_parameters: &'a RtpParameters,
    pub stream_id: &'a str,
    pub track_id: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSection {
    variant: SectionVariant,
    media: MediaDescription,
}

impl MediaSection {
    fn base(transport: SectionTransport<'_>, variant: SectionVariant) -> Self {
        let mut section = Self {
            variant,
            media: MediaDescription::default(),
        };
        section.set_ice_parameters(transport.ice_parameters);

        section.media.candidates = transport
            .ice_candidates
            .iter()
            .map(|candidate| Candidate {
                foundation: candidate.foundation.clone(),
                component: 1,
                transport: match candidate.protocol {
                    IceProtocol::Udp => "udp".to_string(),
                    IceProtocol::Tcp => "tcp".to_string(),
                },
                priority: candidate.priority.into(),
                ip: candidate.address.clone(),
                port: candidate.port,
                kind: candidate.kind.as_str().to_string(),
                raddr: None,
                rport: None,
                tcptype: candidate.tcp_type.map(|t| t.as_str().to_string()),
                generation: None,
                network_id: None,
                network_cost: None,
            })
            .collect();
        section.media.end_of_candidates = Some(END_OF_CANDIDATES.to_string());
        section.media.ice_options = transport.ice_options.map(str::to_string);

        if let Some(role) = transport.dtls_role {
            section.set_dtls_role(role);
        }
        section
    }

    /// Answer to a local send offer. The section is `recvonly` from the
    /// remote point of view.
    pub fn answer(transport: SectionTransport<'_>, mut init: AnswerSection<'_>) -> Self {
        let mut section = Self::base(transport, SectionVariant::Answer);
        let offer = init.offer_media;
        let media = &mut section.media;

        media.mid = offer.mid.clone();
        media.kind = offer.kind.clone();
        media.protocol = offer.protocol.clone();
        media.connection = Some(Connection {
            version: 4,
            ip: "127.0.0.1".to_string(),
        });
        media.port = 7;
        media.direction = Some(Direction::RecvOnly);

        for codec in &init.answer_rtp_parameters.codecs {
            media.rtp.push(rtp_map(codec));

            let mut parameters = codec.parameters.clone();
            if let Some(options) = init.codec_options {
                let offer_codec = init
                    .offer_rtp_parameters
                    .codecs
                    .iter_mut()
                    .find(|c| c.payload_type == codec.payload_type);
                apply_codec_options(codec, options, &mut parameters, offer_codec);
            }
            let config = write_params(&parameters);
            if !config.is_empty() {
                media.fmtp.push(Fmtp {
                    payload: codec.payload_type,
                    config,
                });
            }
            media.rtcp_fb.extend(rtcp_feedback_lines(codec));
        }
        media.payloads = payload_list(&init.answer_rtp_parameters.codecs);

        media.ext = init
            .answer_rtp_parameters
            .header_extensions
            .iter()
            .filter(|ext| offer.ext.iter().any(|offered| offered.uri == ext.uri))
            .map(|ext| ExtMap {
                value: ext.id,
                direction: None,
                encrypt_uri: None,
                uri: ext.uri.clone(),
                config: None,
            })
            .collect();

        if init.extmap_allow_mixed && offer.extmap_allow_mixed.as_deref() == Some(EXTMAP_ALLOW_MIXED) {
            media.extmap_allow_mixed = Some(EXTMAP_ALLOW_MIXED.to_string());
        }

        if let Some(simulcast) = &offer.simulcast {
            media.simulcast = Some(Simulcast {
                dir1: "recv".to_string(),
                list1: simulcast.list1.clone(),
                dir2: None,
                list2: None,
            });
            media.rids = offer
                .rids
                .iter()
                .filter(|rid| rid.direction == "send")
                .map(|rid| Rid {
                    id: rid.id.clone(),
                    direction: "recv".to_string(),
                    params: None,
                })
                .collect();
        }

        media.rtcp_mux = Some(RTCP_MUX.to_string());
        media.rtcp_rsize = Some(RTCP_RSIZE.to_string());
        section
    }

    /// Offer of a remote producer's stream. The section is `sendonly` from
    /// the remote point of view.
    pub fn offer(transport: SectionTransport<'_>, init: OfferSection<'_>) -> Self {
        let mut section = Self::base(transport, SectionVariant::Offer);
        let params = init.offer_rtp_parameters;
        let media = &mut section.media;

        media.mid = Some(init.mid.to_string());
        media.kind = init.kind.as_str().to_string();
        media.protocol = "UDP/TLS/RTP/SAVPF".to_string();
        media.connection = Some(Connection {
            version: 4,
            ip: "127.0.0.1".to_string(),
        });
        media.port = 7;
        media.direction = Some(Direction::SendOnly);
        media.msid = Some(format!("{} {}", init.stream_id, init.track_id));

        for codec in &params.codecs {
            media.rtp.push(rtp_map(codec));
            let config = write_params(&codec.parameters);
            if !config.is_empty() {
                media.fmtp.push(Fmtp {
                    payload: codec.payload_type,
                    config,
                });
            }
            media.rtcp_fb.extend(rtcp_feedback_lines(codec));
        }
        media.payloads = payload_list(&params.codecs);

        media.ext = params
            .header_extensions
            .iter()
            .map(|ext| ExtMap {
                value: ext.id,
                direction: None,
                encrypt_uri: None,
                uri: ext.uri.clone(),
                config: None,
            })
            .collect();

        media.rtcp_mux = Some(RTCP_MUX.to_string());
        media.rtcp_rsize = Some(RTCP_RSIZE.to_string());

        if let Some(encoding) = params.encodings.first()
            && let Some(ssrc) = encoding.ssrc
        {
            let cname = params.rtcp.cname.as_deref().filter(|c| !c.is_empty());
            if let Some(cname) = cname {
                media.ssrcs.push(cname_line(ssrc, cname));
            }
            if let Some(rtx) = encoding.rtx {
                if let Some(cname) = cname {
                    media.ssrcs.push(cname_line(rtx.ssrc, cname));
                }
                media.ssrc_groups.push(SsrcGroup {
                    semantics: "FID".to_string(),
                    ssrcs: format!("{ssrc} {}", rtx.ssrc),
                });
            }
        }
        section
    }

    pub fn variant(&self) -> SectionVariant {
        self.variant
    }

    pub fn mid(&self) -> Option<&str> {
        self.media.mid.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.media.is_closed()
    }

    pub fn media(&self) -> &MediaDescription {
        &self.media
    }

    pub fn set_ice_parameters(&mut self, ice_parameters: &IceParameters) {
        self.media.ice_ufrag = Some(ice_parameters.username_fragment.clone());
        self.media.ice_pwd = Some(ice_parameters.password.clone());
    }

    /// `a=setup` for the given remote DTLS role. Offer sections always
    /// offer `actpass`.
    pub fn set_dtls_role(&mut self, role: DtlsRole) {
        let setup = match (self.variant, role) {
            (SectionVariant::Offer, _) | (SectionVariant::Answer, DtlsRole::Auto) => "actpass",
            (SectionVariant::Answer, DtlsRole::Client) => "active",
            (SectionVariant::Answer, DtlsRole::Server) => "passive",
        };
        self.media.setup = Some(setup.to_string());
    }

    pub fn pause(&mut self) {
        self.media.direction = Some(Direction::Inactive);
    }

    pub fn resume(&mut self) {
        self.media.direction = Some(match self.variant {
            SectionVariant::Offer => Direction::SendOnly,
            SectionVariant::Answer => Direction::RecvOnly,
        });
    }

    /// Make the section inactive while keeping its port and mid.
    pub fn disable(&mut self) {
        let media = &mut self.media;
        media.direction = Some(Direction::Inactive);
        media.ext.clear();
        media.ssrcs.clear();
        media.ssrc_groups.clear();
        media.simulcast = None;
        media.rids.clear();
        media.extmap_allow_mixed = None;
    }

    /// Disable and zero the port (RFC 3264 §8.2 rejection).
    pub fn close(&mut self) {
        self.disable();
        self.media.port = 0;
    }
}

/// `VP8` for `video/VP8`.
fn codec_name(codec: &RtpCodecParameters) -> &str {
    codec
        .mime_type
        .split_once('/')
        .map_or(codec.mime_type.as_str(), |(_, name)| name)
}

fn rtp_map(codec: &RtpCodecParameters) -> RtpMap {
    RtpMap {
        payload: codec.payload_type,
        codec: codec_name(codec).to_string(),
        rate: Some(codec.clock_rate),
        encoding: codec.channels.filter(|channels| *channels > 1),
    }
}

fn rtcp_feedback_lines(codec: &RtpCodecParameters) -> impl Iterator<Item = RtcpFb> + '_ {
    codec.rtcp_feedback.iter().map(|fb| RtcpFb {
        payload: codec.payload_type.to_string(),
        kind: fb.kind.clone(),
        subtype: fb.parameter.clone(),
    })
}

fn payload_list(codecs: &[RtpCodecParameters]) -> String {
    codecs
        .iter()
        .map(|codec| codec.payload_type.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn cname_line(ssrc: u32, cname: &str) -> Ssrc {
    Ssrc {
        id: ssrc,
        attribute: "cname".to_string(),
        value: Some(cname.to_string()),
    }
}

fn apply_codec_options(
    codec: &RtpCodecParameters,
    options: &CodecOptions,
    parameters: &mut CodecParameters,
    mut offer_codec: Option<&mut RtpCodecParameters>,
) {
    let mut mirror = |key: &str, value: i64| {
        if let Some(offer) = offer_codec.as_deref_mut() {
            offer.parameters.insert(key, value);
        }
    };

    match codec.mime_type.to_ascii_lowercase().as_str() {
        "audio/opus" => {
            if let Some(stereo) = options.opus_stereo {
                mirror("sprop-stereo", stereo.into());
                parameters.insert("stereo", i64::from(stereo));
            }
            if let Some(fec) = options.opus_fec {
                mirror("useinbandfec", fec.into());
                parameters.insert("useinbandfec", i64::from(fec));
            }
            if let Some(dtx) = options.opus_dtx {
                mirror("usedtx", dtx.into());
                parameters.insert("usedtx", i64::from(dtx));
            }
            if let Some(rate) = options.opus_max_playback_rate {
                parameters.insert("maxplaybackrate", rate);
            }
            if let Some(bitrate) = options.opus_max_average_bitrate {
                parameters.insert("maxaveragebitrate", bitrate);
            }
            if let Some(ptime) = options.opus_ptime {
                mirror("ptime", ptime.into());
                parameters.insert("ptime", ptime);
            }
        }
        "video/vp8" | "video/vp9" | "video/h264" | "video/h265" | "video/av1" => {
            if let Some(bitrate) = options.video_google_start_bitrate {
                parameters.insert("x-google-start-bitrate", bitrate);
            }
            if let Some(bitrate) = options.video_google_max_bitrate {
                parameters.insert("x-google-max-bitrate", bitrate);
            }
            if let Some(bitrate) = options.video_google_min_bitrate {
                parameters.insert("x-google-min-bitrate", bitrate);
            }
        }
        _ => {}
    }
}
