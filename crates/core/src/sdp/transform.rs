//! Grammar-driven conversion between SDP text and the generic JSON form.
//!
//! Parsing keeps a "location" pointer: the session object until the first
//! `m=` line, then the most recent media object. Writing walks the fixed
//! RFC 4566 §5 line order, then each media section in turn.

use regex::Captures;
use serde_json::{Map, Number, Value};

use super::grammar::{self, FieldType, Format, INNER_ORDER, OUTER_ORDER, Rule, Target};

/// Parse SDP text into a generic session object with a `media` list.
///
/// Lines that are not `<lowercase letter>=...` are skipped. `a=` lines that
/// no rule recognises end up in `invalid`.
pub(crate) fn parse_value(sdp: &str) -> Map<String, Value> {
    let mut session = Map::new();
    let mut media: Vec<Map<String, Value>> = Vec::new();

    for line in sdp.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let bytes = line.as_bytes();
        if bytes.len() < 2 || bytes[1] != b'=' || !bytes[0].is_ascii_lowercase() {
            continue;
        }
        let letter = bytes[0] as char;
        let content = &line[2..];

        if letter == 'm' {
            media.push(Map::new());
        }
        let location = match media.last_mut() {
            Some(m) => m,
            None => &mut session,
        };

        let Some(rules) = grammar::rules(letter) else {
            tracing::trace!(%letter, "no grammar for line type");
            continue;
        };
        if let Some((rule, caps)) = rules
            .iter()
            .find_map(|rule| rule.reg.captures(content).map(|caps| (rule, caps)))
        {
            apply(rule, &caps, location);
        }
    }

    session.insert(
        "media".to_string(),
        Value::Array(media.into_iter().map(Value::Object).collect()),
    );
    session
}

fn apply(rule: &Rule, caps: &Captures<'_>, location: &mut Map<String, Value>) {
    if rule.names.is_empty() {
        let ty = rule.types.first().copied().unwrap_or(FieldType::Str);
        if let (Some(key), Some(m)) = (rule.target.key(), caps.get(1))
            && let Some(value) = coerce(m.as_str(), ty)
        {
            location.insert(key.to_string(), value);
        }
        return;
    }

    let mut fields = Map::new();
    for (i, name) in rule.names.iter().enumerate() {
        let Some(m) = caps.get(i + 1) else {
            continue;
        };
        let ty = rule.types.get(i).copied().unwrap_or(FieldType::Str);
        if let Some(value) = coerce(m.as_str(), ty) {
            fields.insert((*name).to_string(), value);
        }
    }

    match rule.target {
        Target::Merge => location.extend(fields),
        Target::Name(key) => {
            location.insert(key.to_string(), Value::Object(fields));
        }
        Target::Push(key) => {
            let list = location
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                items.push(Value::Object(fields));
            }
        }
    }
}

/// Numeric groups with empty text are omitted; text that does not coerce is
/// kept as a string.
fn coerce(raw: &str, ty: FieldType) -> Option<Value> {
    match ty {
        FieldType::Str => Some(Value::String(raw.to_string())),
        FieldType::Int | FieldType::Float if raw.is_empty() => None,
        FieldType::Int => Some(
            raw.parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<u64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(raw.to_string())),
        ),
        FieldType::Float => Some(
            raw.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
        ),
    }
}

/// Serialize a generic session object back to SDP text (CRLF terminated).
pub(crate) fn write_value(session: &Map<String, Value>) -> String {
    let mut lines = Vec::new();

    for letter in OUTER_ORDER {
        write_rules(*letter, session, &mut lines);
    }

    if let Some(Value::Array(media)) = session.get("media") {
        for section in media {
            let Value::Object(section) = section else {
                continue;
            };
            write_rules('m', section, &mut lines);
            for letter in INNER_ORDER {
                write_rules(*letter, section, &mut lines);
            }
        }
    }

    let mut sdp = lines.join("\r\n");
    sdp.push_str("\r\n");
    sdp
}

fn write_rules(letter: char, location: &Map<String, Value>, lines: &mut Vec<String>) {
    let Some(rules) = grammar::rules(letter) else {
        return;
    };
    for rule in rules {
        match rule.target {
            Target::Merge => lines.push(make_line(letter, rule, location, None)),
            Target::Name(key) => match location.get(key) {
                Some(Value::Null) | None => {}
                Some(Value::Object(fields)) => lines.push(make_line(letter, rule, fields, None)),
                Some(bare) => lines.push(make_line(letter, rule, location, Some(bare))),
            },
            Target::Push(key) => {
                if let Some(Value::Array(items)) = location.get(key) {
                    for item in items {
                        if let Value::Object(fields) = item {
                            lines.push(make_line(letter, rule, fields, None));
                        }
                    }
                }
            }
        }
    }
}

/// Render one line. `bare` is the single argument of a rule without names.
fn make_line(letter: char, rule: &Rule, fields: &Map<String, Value>, bare: Option<&Value>) -> String {
    let format = match rule.format {
        Format::Template(template) => template.to_string(),
        Format::Computed(compute) => compute(fields),
    };
    let args: Vec<Option<&Value>> = match bare {
        Some(value) => vec![Some(value)],
        None => rule.names.iter().map(|name| fields.get(*name)).collect(),
    };

    let mut line = String::with_capacity(format.len() + 2);
    line.push(letter);
    line.push('=');

    let mut args = args.into_iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%'
            && let Some(spec @ ('s' | 'd' | 'v')) = chars.peek().copied()
        {
            chars.next();
            let arg = args.next().flatten();
            if spec != 'v' {
                line.push_str(&render(arg));
            }
            continue;
        }
        line.push(c);
    }
    line
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Some(other) => other.to_string(),
    }
}
