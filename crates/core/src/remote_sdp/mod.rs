//! The remote side of a transport, as an evolving SDP document.
//!
//! The SFU never exchanges SDP; it speaks ORTC. Each handler keeps a
//! `RemoteSdp` that fabricates the description the SFU *would* have sent,
//! so the local peer connection can run a normal offer/answer cycle.
//!
//! ```text
//!   sections: [ m=audio mid 0 | m=video mid 1 (closed) | m=video mid 2 ]
//!   mid_to_index: { "0": 0, "1": 1, "2": 2 }
//!   a=group:BUNDLE 0 2
//! ```
//!
//! Closed sections keep their slot and are reused by the next section
//! added, so the document does not grow across stop/start cycles. The first
//! section ever added is never closed, only disabled, because the bundled
//! transport is anchored on it.

pub mod media_section;

use std::collections::HashMap;

pub use media_section::{AnswerSection, CodecOptions, MediaSection, OfferSection, SectionTransport, SectionVariant};

use crate::config::EngineConfig;
use crate::error::{NegotiationErrorKind, Result, SfuError};
use crate::ortc::{DtlsParameters, DtlsRole, IceCandidate, IceParameters, MediaKind, RtpParameters};
use crate::sdp::{
    self, Fingerprint, Group, ICE_LITE, MediaDescription, MsidSemantic, Origin, SessionDescription, Timing,
};

/// Where the next media section goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSectionIdx {
    pub idx: usize,
    /// Mid of the closed section to take over, if any.
    pub reuse_mid: Option<String>,
}

/// Inputs of [`RemoteSdp::send`].
pub struct SendSection<'a> {
    pub offer_media: &'a MediaDescription,
    pub reuse_mid: Option<&'a str>,
    pub offer_rtp_parameters: &'a mut RtpParameters,
    pub answer_rtp_parameters: &'a RtpParameters,
    pub codec_options: Option<&'a CodecOptions>,
}

/// Inputs of [`RemoteSdp::receive`].
pub struct ReceiveSection<'a> {
    pub mid: &'a str,
    pub kind: MediaKind,
    pub offer_rtp_parameters: &'a RtpParameters,
    pub stream_id: &'a str,
    pub track_id: &'a str,
}

pub struct RemoteSdp {
    ice_parameters: IceParameters,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: DtlsParameters,
    ice_options: Option<String>,
    extmap_allow_mixed: bool,
    session: SessionDescription,
    sections: Vec<MediaSection>,
    mid_to_index: HashMap<String, usize>,
    first_mid: Option<String>,
}

impl RemoteSdp {
    pub fn new(
        ice_parameters: IceParameters,
        ice_candidates: Vec<IceCandidate>,
        dtls_parameters: DtlsParameters,
        config: &EngineConfig,
    ) -> Self {
        let fingerprint = dtls_parameters.fingerprints.last().map(|fp| Fingerprint {
            kind: fp.algorithm.clone(),
            hash: fp.value.clone(),
        });

        let session = SessionDescription {
            version: 0,
            origin: Origin {
                username: config.sdp_username.clone(),
                session_id: config.sdp_session_id.clone(),
                session_version: 0,
                net_type: "IN".to_string(),
                ip_ver: 4,
                address: "0.0.0.0".to_string(),
            },
            name: config.sdp_session_name.clone(),
            description: None,
            uri: None,
            email: None,
            phone: None,
            timezones: None,
            repeats: None,
            timing: Timing { start: 0, stop: 0 },
            connection: None,
            bandwidth: Vec::new(),
            icelite: ice_parameters.ice_lite.unwrap_or(false).then(|| ICE_LITE.to_string()),
            ice_ufrag: None,
            ice_pwd: None,
            ice_options: None,
            fingerprint,
            setup: None,
            msid_semantic: Some(MsidSemantic {
                semantic: "WMS".to_string(),
                token: "*".to_string(),
            }),
            groups: vec![Group {
                kind: "BUNDLE".to_string(),
                mids: String::new(),
            }],
            extmap_allow_mixed: None,
            invalid: Vec::new(),
            media: Vec::new(),
            extra: Default::default(),
        };

        Self {
            ice_parameters,
            ice_candidates,
            dtls_parameters,
            ice_options: config.ice_options.clone(),
            extmap_allow_mixed: config.extmap_allow_mixed,
            session,
            sections: Vec::new(),
            mid_to_index: HashMap::new(),
            first_mid: None,
        }
    }

    fn section_transport(&self) -> SectionTransport<'_> {
        SectionTransport {
            ice_parameters: &self.ice_parameters,
            ice_candidates: &self.ice_candidates,
            ice_options: self.ice_options.as_deref(),
            dtls_role: self.dtls_parameters.role,
        }
    }

    pub fn dtls_role(&self) -> Option<DtlsRole> {
        self.dtls_parameters.role
    }

    /// Apply fresh ICE credentials (ICE restart) to every section.
    pub fn update_ice_parameters(&mut self, ice_parameters: IceParameters) {
        tracing::debug!(ufrag = %ice_parameters.username_fragment, "updating remote ICE parameters");
        self.session.icelite = ice_parameters.ice_lite.unwrap_or(false).then(|| ICE_LITE.to_string());
        for section in &mut self.sections {
            section.set_ice_parameters(&ice_parameters);
        }
        self.ice_parameters = ice_parameters;
    }

    pub fn update_dtls_role(&mut self, role: DtlsRole) {
        tracing::debug!(?role, "updating remote DTLS role");
        self.dtls_parameters.role = Some(role);
        for section in &mut self.sections {
            section.set_dtls_role(role);
        }
    }

    /// First closed section to reuse, else the append position.
    pub fn get_next_media_section_idx(&self) -> MediaSectionIdx {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, section)| section.is_closed())
            .map(|(idx, section)| MediaSectionIdx {
                idx,
                reuse_mid: section.mid().map(str::to_string),
            })
            .unwrap_or(MediaSectionIdx {
                idx: self.sections.len(),
                reuse_mid: None,
            })
    }

    /// Add the answer section for a local send offer.
    pub fn send(&mut self, init: SendSection<'_>) -> Result<()> {
        let section = MediaSection::answer(
            self.section_transport(),
            AnswerSection {
                offer_media: init.offer_media,
                offer_rtp_parameters: init.offer_rtp_parameters,
                answer_rtp_parameters: init.answer_rtp_parameters,
                codec_options: init.codec_options,
                extmap_allow_mixed: self.extmap_allow_mixed,
            },
        );

        match init.reuse_mid {
            Some(reuse_mid) => self.replace_media_section(section, Some(reuse_mid)),
            None => {
                let known = section.mid().is_some_and(|mid| self.mid_to_index.contains_key(mid));
                if known {
                    self.replace_media_section(section, None)
                } else {
                    self.add_media_section(section);
                    Ok(())
                }
            }
        }
    }

    /// Add the offer section describing a remote producer's stream.
    ///
    /// A closed slot is recycled even if it held another media kind.
    pub fn receive(&mut self, init: ReceiveSection<'_>) -> Result<()> {
        let section = MediaSection::offer(
            self.section_transport(),
            OfferSection {
                mid: init.mid,
                kind: init.kind,
                offer_rtp_parameters: init.offer_rtp_parameters,
                stream_id: init.stream_id,
                track_id: init.track_id,
            },
        );

        if self.mid_to_index.contains_key(init.mid) {
            return self.replace_media_section(section, None);
        }
        let closed_mid = self
            .sections
            .iter()
            .find(|s| s.is_closed())
            .and_then(|s| s.mid().map(str::to_string));
        match closed_mid {
            Some(mid) => self.replace_media_section(section, Some(&mid)),
            None => {
                self.add_media_section(section);
                Ok(())
            }
        }
    }

    fn section_mut(&mut self, mid: &str) -> Result<&mut MediaSection> {
        let idx = *self
            .mid_to_index
            .get(mid)
            .ok_or_else(|| SfuError::Negotiation(NegotiationErrorKind::MediaSectionNotFound(mid.to_string())))?;
        Ok(&mut self.sections[idx])
    }

    pub fn pause_media_section(&mut self, mid: &str) -> Result<()> {
        self.section_mut(mid)?.pause();
        Ok(())
    }

    pub fn resume_media_section(&mut self, mid: &str) -> Result<()> {
        self.section_mut(mid)?.resume();
        Ok(())
    }

    pub fn disable_media_section(&mut self, mid: &str) -> Result<()> {
        self.section_mut(mid)?.disable();
        Ok(())
    }

    /// Close the section for `mid`; returns whether it was really closed.
    ///
    /// The first section is only disabled.
    pub fn close_media_section(&mut self, mid: &str) -> Result<bool> {
        if self.first_mid.as_deref() == Some(mid) {
            tracing::debug!(%mid, "cannot close first media section, disabling it instead");
            self.disable_media_section(mid)?;
            return Ok(false);
        }
        self.section_mut(mid)?.close();
        self.regenerate_bundle_mids();
        Ok(true)
    }

    /// Serialize, bumping the origin session version.
    pub fn get_sdp(&mut self) -> Result<String> {
        self.session.origin.session_version += 1;
        self.session.media = self.sections.iter().map(|s| s.media().clone()).collect();
        let text = sdp::write(&self.session);
        self.session.media.clear();
        tracing::trace!(version = self.session.origin.session_version, "remote SDP emitted");
        text
    }

    pub fn session_version(&self) -> u64 {
        self.session.origin.session_version
    }

    pub fn media_sections(&self) -> &[MediaSection] {
        &self.sections
    }

    pub fn media_section(&self, mid: &str) -> Option<&MediaSection> {
        self.mid_to_index.get(mid).map(|idx| &self.sections[*idx])
    }

    fn add_media_section(&mut self, section: MediaSection) {
        let mid = section.mid().unwrap_or_default().to_string();
        if self.first_mid.is_none() {
            self.first_mid = Some(mid.clone());
        }
        self.sections.push(section);
        self.mid_to_index.insert(mid, self.sections.len() - 1);
        self.regenerate_bundle_mids();
    }

    fn replace_media_section(&mut self, section: MediaSection, reuse_mid: Option<&str>) -> Result<()> {
        let new_mid = section.mid().unwrap_or_default().to_string();
        match reuse_mid {
            Some(reuse_mid) => {
                let idx = *self.mid_to_index.get(reuse_mid).ok_or_else(|| {
                    SfuError::Negotiation(NegotiationErrorKind::MediaSectionNotFound(reuse_mid.to_string()))
                })?;
                self.mid_to_index.remove(reuse_mid);
                self.mid_to_index.insert(new_mid, idx);
                self.sections[idx] = section;
                self.regenerate_bundle_mids();
            }
            None => {
                let idx = *self.mid_to_index.get(&new_mid).ok_or_else(|| {
                    SfuError::Negotiation(NegotiationErrorKind::MediaSectionNotFound(new_mid.clone()))
                })?;
                self.sections[idx] = section;
            }
        }
        Ok(())
    }

    /// BUNDLE lists every section that is not closed.
    fn regenerate_bundle_mids(&mut self) {
        let mids = self
            .sections
            .iter()
            .filter(|s| !s.is_closed())
            .filter_map(|s| s.mid())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(group) = self.session.groups.first_mut() {
            group.mids = mids;
        }
    }
}
