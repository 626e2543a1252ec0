//! H.264 `profile-level-id` parsing and answer generation (RFC 6184 §8.1).
//!
//! ```text
//! profile-level-id = 42e01f
//!                    ││││└┴─ level_idc      (0x1f = 3.1)
//!                    ││└┴─── profile_iop    (constraint flags)
//!                    └┴───── profile_idc    (0x42 = 66)
//! ```
//!
//! `profile_idc` plus a bit pattern over `profile_iop` identify the profile.
//! Level 1b is `level_idc` 11 with the constraint_set3 flag set.

use crate::sdp::{CodecParameters, ParameterValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    ConstrainedBaseline,
    Baseline,
    Main,
    ConstrainedHigh,
    High,
    PredictiveHigh444,
}

/// Levels by `level_idc`, with 1b as a separate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    L1b,
    L1,
    L1_1,
    L1_2,
    L1_3,
    L2,
    L2_1,
    L2_2,
    L3,
    L3_1,
    L3_2,
    L4,
    L4_1,
    L4_2,
    L5,
    L5_1,
    L5_2,
}

impl Level {
    fn from_idc(idc: u8) -> Option<Self> {
        Some(match idc {
            10 => Self::L1,
            11 => Self::L1_1,
            12 => Self::L1_2,
            13 => Self::L1_3,
            20 => Self::L2,
            21 => Self::L2_1,
            22 => Self::L2_2,
            30 => Self::L3,
            31 => Self::L3_1,
            32 => Self::L3_2,
            40 => Self::L4,
            41 => Self::L4_1,
            42 => Self::L4_2,
            50 => Self::L5,
            51 => Self::L5_1,
            52 => Self::L5_2,
            _ => return None,
        })
    }

    fn idc(self) -> u8 {
        match self {
            Self::L1b => 0,
            Self::L1 => 10,
            Self::L1_1 => 11,
            Self::L1_2 => 12,
            Self::L1_3 => 13,
            Self::L2 => 20,
            Self::L2_1 => 21,
            Self::L2_2 => 22,
            Self::L3 => 30,
            Self::L3_1 => 31,
            Self::L3_2 => 32,
            Self::L4 => 40,
            Self::L4_1 => 41,
            Self::L4_2 => 42,
            Self::L5 => 50,
            Self::L5_1 => 51,
            Self::L5_2 => 52,
        }
    }

    /// Strict ordering where 1b sits between 1 and 1.1.
    pub fn is_less_than(self, other: Self) -> bool {
        match (self, other) {
            (Self::L1b, other) => other != Self::L1 && other != Self::L1b,
            (this, Self::L1b) => this == Self::L1,
            (this, other) => this.idc() < other.idc(),
        }
    }

    pub fn min(self, other: Self) -> Self {
        if self.is_less_than(other) { self } else { other }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLevelId {
    pub profile: Profile,
    pub level: Level,
}

/// Used when the SDP carries no `profile-level-id`.
pub const DEFAULT_PROFILE_LEVEL_ID: ProfileLevelId = ProfileLevelId {
    profile: Profile::ConstrainedBaseline,
    level: Level::L3_1,
};

const CONSTRAINT_SET3_FLAG: u8 = 0x10;

/// Match on `profile_iop` bits: `x` is don't-care.
struct BitPattern {
    mask: u8,
    masked_value: u8,
}

impl BitPattern {
    const fn new(pattern: &[u8; 8]) -> Self {
        let mut mask = 0u8;
        let mut masked_value = 0u8;
        let mut i = 0;
        while i < 8 {
            let bit = 1u8 << (7 - i);
            if pattern[i] != b'x' {
                mask |= bit;
            }
            if pattern[i] == b'1' {
                masked_value |= bit;
            }
            i += 1;
        }
        Self { mask, masked_value }
    }

    fn matches(&self, value: u8) -> bool {
        self.masked_value == (value & self.mask)
    }
}

static PROFILE_PATTERNS: [(u8, BitPattern, Profile); 9] = [
    (0x42, BitPattern::new(b"x1xx0000"), Profile::ConstrainedBaseline),
    (0x4D, BitPattern::new(b"1xxx0000"), Profile::ConstrainedBaseline),
    (0x58, BitPattern::new(b"11xx0000"), Profile::ConstrainedBaseline),
    (0x42, BitPattern::new(b"x0xx0000"), Profile::Baseline),
    (0x58, BitPattern::new(b"10xx0000"), Profile::Baseline),
    (0x4D, BitPattern::new(b"0x0x0000"), Profile::Main),
    (0x64, BitPattern::new(b"00000000"), Profile::High),
    (0x64, BitPattern::new(b"00001100"), Profile::ConstrainedHigh),
    (0xF4, BitPattern::new(b"00000000"), Profile::PredictiveHigh444),
];

/// Parse a six hex digit `profile-level-id`.
pub fn parse_profile_level_id(text: &str) -> Option<ProfileLevelId> {
    if text.len() != 6 {
        return None;
    }
    let numeric = u32::from_str_radix(text, 16).ok()?;
    if numeric == 0 {
        return None;
    }
    let level_idc = (numeric & 0xFF) as u8;
    let profile_iop = ((numeric >> 8) & 0xFF) as u8;
    let profile_idc = ((numeric >> 16) & 0xFF) as u8;

    let level = if level_idc == Level::L1_1.idc() {
        if profile_iop & CONSTRAINT_SET3_FLAG != 0 {
            Level::L1b
        } else {
            Level::L1_1
        }
    } else {
        Level::from_idc(level_idc)?
    };

    PROFILE_PATTERNS
        .iter()
        .find(|(idc, pattern, _)| *idc == profile_idc && pattern.matches(profile_iop))
        .map(|(_, _, profile)| ProfileLevelId {
            profile: *profile,
            level,
        })
}

/// Inverse of [`parse_profile_level_id`]. Level 1b only exists for the
/// baseline and main profiles.
pub fn profile_level_id_to_string(id: ProfileLevelId) -> Option<String> {
    if id.level == Level::L1b {
        return match id.profile {
            Profile::ConstrainedBaseline => Some("42f00b".to_string()),
            Profile::Baseline => Some("42100b".to_string()),
            Profile::Main => Some("4d100b".to_string()),
            _ => None,
        };
    }
    let profile = match id.profile {
        Profile::ConstrainedBaseline => "42e0",
        Profile::Baseline => "4200",
        Profile::Main => "4d00",
        Profile::ConstrainedHigh => "640c",
        Profile::High => "6400",
        Profile::PredictiveHigh444 => "f400",
    };
    Some(format!("{profile}{:02x}", id.level.idc()))
}

fn sdp_profile_level_id(params: &CodecParameters) -> Option<ProfileLevelId> {
    match params.get("profile-level-id") {
        None => Some(DEFAULT_PROFILE_LEVEL_ID),
        Some(value) => parse_profile_level_id(&value.to_string()),
    }
}

fn level_asymmetry_allowed(params: &CodecParameters) -> bool {
    match params.get("level-asymmetry-allowed") {
        Some(ParameterValue::Number(n)) => *n == 1,
        Some(ParameterValue::Text(s)) => s == "1" || s == "true",
        None => false,
    }
}

/// Both parameter sets parse and name the same profile.
pub fn is_same_profile(a: &CodecParameters, b: &CodecParameters) -> bool {
    match (sdp_profile_level_id(a), sdp_profile_level_id(b)) {
        (Some(a), Some(b)) => a.profile == b.profile,
        _ => false,
    }
}

/// Why a `profile-level-id` answer could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerError {
    InvalidLocal,
    InvalidRemote,
    ProfileMismatch,
}

/// `profile-level-id` to put in an answer, or `None` when neither side
/// signalled one.
///
/// With level asymmetry allowed on both sides the local level is used,
/// otherwise the lower of the two.
pub fn generate_profile_level_id_for_answer(
    local: &CodecParameters,
    remote: &CodecParameters,
) -> Result<Option<String>, AnswerError> {
    if !local.contains_key("profile-level-id") && !remote.contains_key("profile-level-id") {
        return Ok(None);
    }
    let local_id = sdp_profile_level_id(local).ok_or(AnswerError::InvalidLocal)?;
    let remote_id = sdp_profile_level_id(remote).ok_or(AnswerError::InvalidRemote)?;
    if local_id.profile != remote_id.profile {
        return Err(AnswerError::ProfileMismatch);
    }

    let level = if level_asymmetry_allowed(local) && level_asymmetry_allowed(remote) {
        local_id.level
    } else {
        local_id.level.min(remote_id.level)
    };

    Ok(profile_level_id_to_string(ProfileLevelId {
        profile: local_id.profile,
        level,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::parse_params;

    #[test]
    fn parses_common_ids() {
        assert_eq!(
            parse_profile_level_id("42e01f"),
            Some(ProfileLevelId {
                profile: Profile::ConstrainedBaseline,
                level: Level::L3_1
            })
        );
        assert_eq!(parse_profile_level_id("4d001f").map(|p| p.profile), Some(Profile::Main));
        assert_eq!(parse_profile_level_id("640c2a").map(|p| p.profile), Some(Profile::ConstrainedHigh));
        assert_eq!(parse_profile_level_id("640032").map(|p| p.level), Some(Level::L5));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_profile_level_id("42e01"), None);
        assert_eq!(parse_profile_level_id("000000"), None);
        assert_eq!(parse_profile_level_id("42e0ff"), None, "unknown level");
        assert_eq!(parse_profile_level_id("12e01f"), None, "unknown profile");
    }

    #[test]
    fn level_1b() {
        let id = parse_profile_level_id("42f00b").unwrap();
        assert_eq!(id.level, Level::L1b);
        assert_eq!(profile_level_id_to_string(id).as_deref(), Some("42f00b"));
        assert!(Level::L1b.is_less_than(Level::L1_1));
        assert!(!Level::L1b.is_less_than(Level::L1));
        assert!(Level::L1.is_less_than(Level::L1b));
    }

    #[test]
    fn to_string_round_trips() {
        for text in ["42e01f", "4d0032", "640c1f", "f40028", "42001f"] {
            let id = parse_profile_level_id(text).unwrap();
            assert_eq!(profile_level_id_to_string(id).as_deref(), Some(text));
        }
    }

    #[test]
    fn answer_takes_minimum_level_without_asymmetry() {
        let local = parse_params("profile-level-id=42e034;packetization-mode=1");
        let remote = parse_params("profile-level-id=42e01f;packetization-mode=1");
        assert_eq!(
            generate_profile_level_id_for_answer(&local, &remote),
            Ok(Some("42e01f".to_string()))
        );
    }

    #[test]
    fn answer_keeps_local_level_with_asymmetry() {
        let local = parse_params("profile-level-id=42e034;level-asymmetry-allowed=1");
        let remote = parse_params("profile-level-id=42e01f;level-asymmetry-allowed=1");
        assert_eq!(
            generate_profile_level_id_for_answer(&local, &remote),
            Ok(Some("42e034".to_string()))
        );
    }

    #[test]
    fn answer_without_ids_is_none() {
        let empty = CodecParameters::new();
        assert_eq!(generate_profile_level_id_for_answer(&empty, &empty), Ok(None));
    }

    #[test]
    fn answer_profile_mismatch() {
        let local = parse_params("profile-level-id=42e01f");
        let remote = parse_params("profile-level-id=640c1f");
        assert_eq!(
            generate_profile_level_id_for_answer(&local, &remote),
            Err(AnswerError::ProfileMismatch)
        );
        assert!(!is_same_profile(&local, &remote));
    }

    #[test]
    fn missing_id_defaults_to_constrained_baseline() {
        let remote = parse_params("packetization-mode=1");
        let local = parse_params("profile-level-id=42e01f");
        assert!(is_same_profile(&local, &remote));
    }
}
