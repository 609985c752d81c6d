//! Text UDP codec for the X-Plane plugin ↔ TelemFFB protocol.
//!
//! Telemetry (plugin → TelemFFB) is one datagram per simulator frame:
//! ```text
//! key=value;key=value;...;
//! ```
//! Values are fixed-point decimals, integers, plain text, or arrays of
//! 3-decimal entries joined with `~`. Keys are emitted in lexicographic order.
//!
//! Commands (TelemFFB → plugin) are `KIND:payload` datagrams:
//! ```text
//! AXIS:jx=0.12345,jy=-0.5
//! OVERRIDE:joystick=true
//! ```

use std::collections::BTreeMap;

/// Default destination port for telemetry datagrams.
pub const TELEMETRY_PORT: u16 = 34390;
/// Default local port the plugin listens on for commands.
pub const COMMAND_PORT: u16 = 34391;

/// Default inbound buffer size. Command datagrams longer than this are
/// truncated by the transport before they reach the decoder.
pub const DEFAULT_RECV_BUFFER_LEN: usize = 4096;

/// Decimal places used for every array entry.
pub const ARRAY_PRECISION: usize = 3;

const ARRAY_SEPARATOR: char = '~';
const ZERO_ENTRY: &str = "0.000";

/// One telemetry frame: wire key → encoded value.
///
/// A `BTreeMap` so that encoding is deterministic (lexicographic key order).
pub type Snapshot = BTreeMap<String, String>;

// ── CommandMessage ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Axis,
    Override,
    /// Any other kind tag. Receivers ignore these.
    Other(String),
}

impl CommandKind {
    fn parse(tag: &str) -> Self {
        match tag {
            "AXIS" => Self::Axis,
            "OVERRIDE" => Self::Override,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Axis => "AXIS",
            Self::Override => "OVERRIDE",
            Self::Other(tag) => tag,
        }
    }
}

/// A decoded inbound datagram, split into kind and untyped payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub kind: CommandKind,
    pub payload: String,
}

// ── ProtocolError ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("token {0:?} has no '=' separator")]
    MissingAssignment(String),
    #[error("invalid number {value:?} for axis {key:?}")]
    InvalidNumber { key: String, value: String },
    #[error("invalid boolean {value:?} for override {keyword:?}")]
    InvalidBool { keyword: String, value: String },
}

// ── Telemetry encoding ───────────────────────────────────────────────────────

/// Format `value * factor` with exactly `precision` decimals (never scientific).
pub fn encode_scalar(value: f64, precision: usize, factor: f64) -> String {
    format!("{:.*}", precision, value * factor)
}

/// Encode an array field as `~`-joined 3-decimal entries.
///
/// With `fixed_arity = Some(n)` the result has exactly `n` entries: missing
/// source entries are padded with zero and extra ones are dropped. Without a
/// fixed arity, trailing entries that format to exactly `0.000` are stripped,
/// so an all-zero array encodes to the empty string. The trim looks at the
/// formatted text, so values below the 3-decimal resolution are stripped too.
pub fn encode_array(values: &[f64], factor: f64, fixed_arity: Option<usize>) -> String {
    let format_entry = |v: f64| encode_scalar(v, ARRAY_PRECISION, factor);

    let mut entries: Vec<String> = match fixed_arity {
        Some(n) => (0..n)
            .map(|i| format_entry(values.get(i).copied().unwrap_or(0.0)))
            .collect(),
        None => values.iter().copied().map(format_entry).collect(),
    };

    if fixed_arity.is_none() {
        while entries.last().is_some_and(|e| e == ZERO_ENTRY) {
            entries.pop();
        }
    }

    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push(ARRAY_SEPARATOR);
        }
        out.push_str(entry);
    }
    out
}

/// Serialize a snapshot as `key=value;` pairs. An empty snapshot is `""`.
pub fn encode_line(snapshot: &Snapshot) -> String {
    let cap = snapshot.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
    let mut line = String::with_capacity(cap);
    for (key, value) in snapshot {
        line.push_str(key);
        line.push('=');
        line.push_str(value);
        line.push(';');
    }
    line
}

/// Parse a wire line back into its key/value strings.
///
/// Segments with no `=` are skipped; values are kept as their encoded text.
pub fn decode_wire_line(line: &str) -> Snapshot {
    line.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

// ── Command decoding ─────────────────────────────────────────────────────────

/// Split a command datagram on its first `:`.
///
/// A datagram with no `:` becomes a message with an empty payload; unknown
/// kind tags are preserved as [`CommandKind::Other`] for the caller to ignore.
pub fn decode_command(datagram: &str) -> CommandMessage {
    let (tag, payload) = datagram.split_once(':').unwrap_or((datagram, ""));
    CommandMessage {
        kind: CommandKind::parse(tag.trim()),
        payload: payload.to_owned(),
    }
}

/// Decode an `AXIS` payload (`key=float,key=float,...`).
///
/// Tokens without `=` are skipped. A well-formed token whose value is not a
/// finite number fails the whole payload. Repeated keys keep the last value.
pub fn decode_axis_payload(payload: &str) -> Result<BTreeMap<String, f32>, ProtocolError> {
    let mut values = BTreeMap::new();
    for token in payload.split(',') {
        let Some((key, raw)) = token.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();
        let value = raw
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ProtocolError::InvalidNumber {
                key: key.to_owned(),
                value: raw.to_owned(),
            })?;
        values.insert(key.to_owned(), value);
    }
    Ok(values)
}

/// Decode an `OVERRIDE` payload (`keyword=true|false`, case-insensitive).
pub fn decode_override_payload(payload: &str) -> Result<(String, bool), ProtocolError> {
    let (keyword, raw) = payload
        .split_once('=')
        .ok_or_else(|| ProtocolError::MissingAssignment(payload.to_owned()))?;
    let keyword = keyword.trim();
    let raw = raw.trim();

    let enabled = if raw.eq_ignore_ascii_case("true") {
        true
    } else if raw.eq_ignore_ascii_case("false") {
        false
    } else {
        return Err(ProtocolError::InvalidBool {
            keyword: keyword.to_owned(),
            value: raw.to_owned(),
        });
    };
    Ok((keyword.to_owned(), enabled))
}

// ── Command encoding (peer side) ─────────────────────────────────────────────

/// Build an `AXIS:` datagram from `(key, value)` pairs.
pub fn encode_axis_command(pairs: &[(&str, f32)]) -> String {
    let body: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}:{}", CommandKind::Axis.as_str(), body.join(","))
}

/// Build an `OVERRIDE:` datagram.
pub fn encode_override_command(keyword: &str, enabled: bool) -> String {
    format!("{}:{keyword}={enabled}", CommandKind::Override.as_str())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
