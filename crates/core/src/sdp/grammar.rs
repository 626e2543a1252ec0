//! Declarative SDP line grammar (RFC 4566 / RFC 8866 plus WebRTC attributes).
//!
//! Every line type letter maps to an ordered list of [`Rule`]s. A rule
//! carries a regex whose capture groups are named positionally by
//! [`Rule::names`], a coercion type per group, and a format used to write
//! the line back:
//!
//! ```text
//! a=rtpmap:111 opus/48000/2
//!   rule "rtp" (push)  names = [payload, codec, rate, encoding]
//!   -> { "payload": 111, "codec": "opus", "rate": 48000, "encoding": 2 }
//! ```
//!
//! Rules with [`Target::Push`] append to a list; [`Target::Name`] rules
//! overwrite a single key. The last `a=` rule catches everything else and
//! keeps it verbatim in `invalid`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// How a captured group is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldType {
    Str,
    Int,
    Float,
}

/// Where the parsed value lands in the current location object.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target {
    /// Overwrite `location[key]`.
    Name(&'static str),
    /// Append to `location[key]`, a list.
    Push(&'static str),
    /// Merge the captured fields into the location itself (the `m=` line).
    Merge,
}

impl Target {
    pub(crate) fn key(&self) -> Option<&'static str> {
        match self {
            Self::Name(key) | Self::Push(key) => Some(key),
            Self::Merge => None,
        }
    }
}

/// Re-serialization template. `%s`/`%d` consume the next argument, `%v`
/// consumes one and prints nothing.
#[derive(Clone, Copy)]
pub(crate) enum Format {
    Template(&'static str),
    Computed(fn(&Map<String, Value>) -> String),
}

pub(crate) struct Rule {
    pub target: Target,
    pub reg: Regex,
    /// Group names; empty means the first group is stored as a bare value.
    pub names: &'static [&'static str],
    pub types: &'static [FieldType],
    pub format: Format,
}

use FieldType::{Float, Int, Str};

fn rule(
    target: Target,
    reg: &str,
    names: &'static [&'static str],
    types: &'static [FieldType],
    format: Format,
) -> Rule {
    Rule {
        target,
        reg: Regex::new(reg).expect("static SDP grammar regex"),
        names,
        types,
        format,
    }
}

fn has(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(|v| !v.is_null())
}

/// Session-level line order used when writing (RFC 4566 §5).
pub(crate) const OUTER_ORDER: &[char] = &['v', 'o', 's', 'i', 'u', 'e', 'p', 'c', 'b', 't', 'r', 'z', 'a'];

/// Media-level line order used when writing, after the `m=` line.
pub(crate) const INNER_ORDER: &[char] = &['i', 'c', 'b', 'a'];

static GRAMMAR: LazyLock<Vec<(char, Vec<Rule>)>> = LazyLock::new(build_grammar);

/// Rules for a line type letter, in match priority order.
pub(crate) fn rules(line_type: char) -> Option<&'static [Rule]> {
    GRAMMAR
        .iter()
        .find(|(letter, _)| *letter == line_type)
        .map(|(_, rules)| rules.as_slice())
}

fn single(key: &'static str, reg: &str, ty: &'static [FieldType], template: &'static str) -> Rule {
    rule(Target::Name(key), reg, &[], ty, Format::Template(template))
}

fn build_grammar() -> Vec<(char, Vec<Rule>)> {
    use Target::{Name, Push};

    vec![
        ('v', vec![single("version", r"^(\d*)$", &[Int], "%d")]),
        (
            'o',
            vec![rule(
                Name("origin"),
                r"^(\S*) (\d*) (\d*) (\S*) IP(\d) (\S*)",
                &["username", "sessionId", "sessionVersion", "netType", "ipVer", "address"],
                &[Str, Str, Int, Str, Int, Str],
                Format::Template("%s %s %d %s IP%d %s"),
            )],
        ),
        ('s', vec![single("name", r"(.*)", &[Str], "%s")]),
        ('i', vec![single("description", r"(.*)", &[Str], "%s")]),
        ('u', vec![single("uri", r"(.*)", &[Str], "%s")]),
        ('e', vec![single("email", r"(.*)", &[Str], "%s")]),
        ('p', vec![single("phone", r"(.*)", &[Str], "%s")]),
        ('z', vec![single("timezones", r"(.*)", &[Str], "%s")]),
        ('r', vec![single("repeats", r"(.*)", &[Str], "%s")]),
        (
            't',
            vec![rule(
                Name("timing"),
                r"^(\d*) (\d*)",
                &["start", "stop"],
                &[Int, Int],
                Format::Template("%d %d"),
            )],
        ),
        (
            'c',
            vec![rule(
                Name("connection"),
                r"^IN IP(\d) (\S*)",
                &["version", "ip"],
                &[Int, Str],
                Format::Template("IN IP%d %s"),
            )],
        ),
        (
            'b',
            vec![rule(
                Push("bandwidth"),
                r"^(TIAS|AS|CT|RR|RS):(\d*)",
                &["type", "limit"],
                &[Str, Int],
                Format::Template("%s:%s"),
            )],
        ),
        (
            'm',
            vec![rule(
                Target::Merge,
                r"^(\w*) (\d*)(?:/(\d*))? ([\w/]*)(?: (.*))?",
                &["type", "port", "numPorts", "protocol", "payloads"],
                &[Str, Int, Int, Str, Str],
                Format::Computed(|o| {
                    if has(o, "numPorts") {
                        "%s %d/%d %s %s".to_string()
                    } else {
                        "%s %d%v %s %s".to_string()
                    }
                }),
            )],
        ),
        ('a', attribute_rules()),
    ]
}

fn attribute_rules() -> Vec<Rule> {
    use Target::{Name, Push};

    vec![
        rule(
            Push("rtp"),
            r"^rtpmap:(\d*) ([\w\-.]*)(?:\s*/(\d*)(?:\s*/(\d+))?)?",
            &["payload", "codec", "rate", "encoding"],
            &[Int, Str, Int, Int],
            Format::Computed(|o| {
                if has(o, "encoding") {
                    "rtpmap:%d %s/%s/%s".to_string()
                } else if has(o, "rate") {
                    "rtpmap:%d %s/%s".to_string()
                } else {
                    "rtpmap:%d %s".to_string()
                }
            }),
        ),
        rule(
            Push("fmtp"),
            r"^fmtp:(\d*) ([\S| ]*)",
            &["payload", "config"],
            &[Int, Str],
            Format::Template("fmtp:%d %s"),
        ),
        single("control", r"^control:(.*)", &[Str], "control:%s"),
        rule(
            Name("rtcp"),
            r"^rtcp:(\d*)(?: (\S*) IP(\d) (\S*))?",
            &["port", "netType", "ipVer", "address"],
            &[Int, Str, Int, Str],
            Format::Computed(|o| {
                if has(o, "address") {
                    "rtcp:%d %s IP%d %s".to_string()
                } else {
                    "rtcp:%d".to_string()
                }
            }),
        ),
        rule(
            Push("rtcpFbTrrInt"),
            r"^rtcp-fb:(\*|\d*) trr-int (\d*)",
            &["payload", "value"],
            &[Str, Int],
            Format::Template("rtcp-fb:%s trr-int %d"),
        ),
        rule(
            Push("rtcpFb"),
            r"^rtcp-fb:(\*|\d*) ([\w-]*)(?: ([\w-]*))?",
            &["payload", "type", "subtype"],
            &[Str, Str, Str],
            Format::Computed(|o| {
                if has(o, "subtype") {
                    "rtcp-fb:%s %s %s".to_string()
                } else {
                    "rtcp-fb:%s %s".to_string()
                }
            }),
        ),
        rule(
            Push("ext"),
            r"^extmap:(\d+)(?:/(\w+))?(?: (urn:ietf:params:rtp-hdrext:encrypt))? (\S*)(?: (\S*))?",
            &["value", "direction", "encrypt-uri", "uri", "config"],
            &[Int, Str, Str, Str, Str],
            Format::Computed(|o| {
                let mut format = String::from("extmap:%d");
                format.push_str(if has(o, "direction") { "/%s" } else { "%v" });
                format.push_str(if has(o, "encrypt-uri") { " %s" } else { "%v" });
                format.push_str(" %s");
                if has(o, "config") {
                    format.push_str(" %s");
                }
                format
            }),
        ),
        single("extmapAllowMixed", r"^(extmap-allow-mixed)", &[Str], "%s"),
        rule(
            Push("crypto"),
            r"^crypto:(\d*) ([\w_]*) (\S*)(?: (\S*))?",
            &["id", "suite", "config", "sessionConfig"],
            &[Int, Str, Str, Str],
            Format::Computed(|o| {
                if has(o, "sessionConfig") {
                    "crypto:%d %s %s %s".to_string()
                } else {
                    "crypto:%d %s %s".to_string()
                }
            }),
        ),
        single("setup", r"^setup:(\w*)", &[Str], "setup:%s"),
        single("connectionType", r"^connection:(new|existing)", &[Str], "connection:%s"),
        single("mid", r"^mid:([^\s]*)", &[Str], "mid:%s"),
        single("msid", r"^msid:(.*)", &[Str], "msid:%s"),
        single("ptime", r"^ptime:(\d*(?:\.\d*)*)", &[Float], "ptime:%d"),
        single("maxptime", r"^maxptime:(\d*(?:\.\d*)*)", &[Float], "maxptime:%d"),
        single("direction", r"^(sendrecv|recvonly|sendonly|inactive)", &[Str], "%s"),
        single("icelite", r"^(ice-lite)", &[Str], "%s"),
        single("iceUfrag", r"^ice-ufrag:(\S*)", &[Str], "ice-ufrag:%s"),
        single("icePwd", r"^ice-pwd:(\S*)", &[Str], "ice-pwd:%s"),
        rule(
            Name("fingerprint"),
            r"^fingerprint:(\S*) (\S*)",
            &["type", "hash"],
            &[Str, Str],
            Format::Template("fingerprint:%s %s"),
        ),
        rule(
            Push("candidates"),
            r"^candidate:(\S*) (\d*) (\S*) (\d*) (\S*) (\d*) typ (\S*)(?: raddr (\S*) rport (\d*))?(?: tcptype (\S*))?(?: generation (\d*))?(?: network-id (\d*))?(?: network-cost (\d*))?",
            &[
                "foundation",
                "component",
                "transport",
                "priority",
                "ip",
                "port",
                "type",
                "raddr",
                "rport",
                "tcptype",
                "generation",
                "network-id",
                "network-cost",
            ],
            &[Str, Int, Str, Int, Str, Int, Str, Str, Int, Str, Int, Int, Int],
            Format::Computed(|o| {
                let mut format = String::from("candidate:%s %d %s %d %s %d typ %s");
                format.push_str(if has(o, "raddr") { " raddr %s rport %d" } else { "%v%v" });
                format.push_str(if has(o, "tcptype") { " tcptype %s" } else { "%v" });
                format.push_str(if has(o, "generation") { " generation %d" } else { "%v" });
                format.push_str(if has(o, "network-id") { " network-id %d" } else { "%v" });
                format.push_str(if has(o, "network-cost") { " network-cost %d" } else { "%v" });
                format
            }),
        ),
        single("endOfCandidates", r"^(end-of-candidates)", &[Str], "%s"),
        single("remoteCandidates", r"^remote-candidates:(.*)", &[Str], "remote-candidates:%s"),
        single("iceOptions", r"^ice-options:(\S*)", &[Str], "ice-options:%s"),
        rule(
            Push("ssrcs"),
            r"^ssrc:(\d*) ([\w_-]*)(?::(.*))?",
            &["id", "attribute", "value"],
            &[Int, Str, Str],
            Format::Computed(|o| {
                let mut format = String::from("ssrc:%d");
                if has(o, "attribute") {
                    format.push_str(" %s");
                    if has(o, "value") {
                        format.push_str(":%s");
                    }
                }
                format
            }),
        ),
        rule(
            Push("ssrcGroups"),
            r"^ssrc-group:([\x21\x23\x24\x25\x26\x27\x2A\x2B\x2D\x2E\w]*) (.*)",
            &["semantics", "ssrcs"],
            &[Str, Str],
            Format::Template("ssrc-group:%s %s"),
        ),
        rule(
            Name("msidSemantic"),
            r"^msid-semantic:\s?(\w*) (\S*)",
            &["semantic", "token"],
            &[Str, Str],
            Format::Template("msid-semantic: %s %s"),
        ),
        rule(
            Push("groups"),
            r"^group:(\w*) (.*)",
            &["type", "mids"],
            &[Str, Str],
            Format::Template("group:%s %s"),
        ),
        single("rtcpMux", r"^(rtcp-mux)", &[Str], "%s"),
        single("rtcpRsize", r"^(rtcp-rsize)", &[Str], "%s"),
        rule(
            Name("sctpmap"),
            r"^sctpmap:([\w_/]*) (\S*)(?: (\S*))?",
            &["sctpmapNumber", "app", "maxMessageSize"],
            &[Int, Str, Int],
            Format::Computed(|o| {
                if has(o, "maxMessageSize") {
                    "sctpmap:%s %s %s".to_string()
                } else {
                    "sctpmap:%s %s".to_string()
                }
            }),
        ),
        single("xGoogleFlag", r"^x-google-flag:([^\s]*)", &[Str], "x-google-flag:%s"),
        rule(
            Push("rids"),
            r"^rid:([\d\w]+) (\w+)(?: ([\S| ]*))?",
            &["id", "direction", "params"],
            &[Str, Str, Str],
            Format::Computed(|o| {
                if has(o, "params") {
                    "rid:%s %s %s".to_string()
                } else {
                    "rid:%s %s".to_string()
                }
            }),
        ),
        rule(
            Name("simulcast"),
            r"^simulcast:(send|recv) (\S*)(?: (send|recv) (\S*))?",
            &["dir1", "list1", "dir2", "list2"],
            &[Str, Str, Str, Str],
            Format::Computed(|o| {
                if has(o, "dir2") {
                    "simulcast:%s %s %s %s".to_string()
                } else {
                    "simulcast:%s %s".to_string()
                }
            }),
        ),
        single("framerate", r"^framerate:(\d+(?:$|\.\d+))", &[Float], "framerate:%s"),
        single("sctpPort", r"^sctp-port:(\d+)$", &[Int], "sctp-port:%s"),
        single("maxMessageSize", r"^max-message-size:(\d+)$", &[Int], "max-message-size:%s"),
        rule(
            Push("invalid"),
            r"^(.*)",
            &["value"],
            &[Str],
            Format::Template("%s"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_line_types_compile() {
        for letter in OUTER_ORDER.iter().chain(['m'].iter()) {
            assert!(rules(*letter).is_some(), "missing rules for {letter}");
        }
    }

    #[test]
    fn catch_all_is_last() {
        let rules = rules('a').unwrap();
        assert_eq!(rules.last().unwrap().target.key(), Some("invalid"));
    }

    #[test]
    fn rtpmap_rule_matches_channels() {
        let rule = &rules('a').unwrap()[0];
        let caps = rule.reg.captures("rtpmap:111 opus/48000/2").unwrap();
        assert_eq!(&caps[1], "111");
        assert_eq!(&caps[2], "opus");
        assert_eq!(&caps[3], "48000");
        assert_eq!(&caps[4], "2");
    }
}
