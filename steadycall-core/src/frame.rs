//! Event stream framing.
//!
//! Streaming responses are a sequence of delimiter-terminated frames:
//!
//! ```text
//! tag[#position]:data<delimiter>
//! ```
//!
//! - `tag` is a non-empty token without `:`, `#` or ASCII whitespace
//! - `#position` optionally states the frame's sequence position explicitly
//! - `data` is the raw payload up to the delimiter (may be empty)
//!
//! A frame whose tag is the terminal tag (`end` by default) closes the
//! stream. Its data is either empty or a JSON trailer that may carry an
//! error: `{"error": {"kind": "rate_limited", "message": "slow down"}}`.

use bytes::Bytes;
use serde::Deserialize;

use crate::error::ErrorKind;

/// Default frame delimiter.
pub const DEFAULT_DELIMITER: u8 = b'|';

/// Default tag of the terminal frame.
pub const DEFAULT_TERMINAL_TAG: &str = "end";

/// Wire settings shared by the encoder and the decoder of one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    delimiter: u8,
    terminal_tag: String,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            terminal_tag: DEFAULT_TERMINAL_TAG.to_string(),
        }
    }
}

impl StreamFormat {
    /// Create the default format (`|` delimiter, `end` terminal tag).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame delimiter byte.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the tag that marks the terminal frame.
    pub fn terminal_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.terminal_tag = tag.into();
        self
    }

    /// Get the frame delimiter byte.
    pub fn get_delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Get the terminal tag.
    pub fn get_terminal_tag(&self) -> &str {
        &self.terminal_tag
    }
}

/// Framing errors.
///
/// Any of these ends the stream; a partially consumed stream is never
/// replayed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is missing the ':' separator")]
    MissingSeparator,

    #[error("frame has an empty tag")]
    EmptyTag,

    #[error("invalid frame tag {0:?}")]
    InvalidTag(String),

    #[error("frame data contains the delimiter")]
    DelimiterInData,

    #[error("frame header is not valid UTF-8")]
    InvalidHeader,

    #[error("invalid sequence position {0:?}")]
    InvalidPosition(String),

    #[error("sequence gap: expected position {expected}, got {actual}")]
    PositionGap { expected: u64, actual: u64 },

    #[error("invalid terminal frame: {0}")]
    InvalidTrailer(String),
}

/// Error carried by a terminal frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrailerError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

/// One parsed frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A regular event frame.
    Event {
        tag: String,
        position: Option<u64>,
        data: Bytes,
    },
    /// The terminal frame, optionally carrying an error.
    End { error: Option<TrailerError> },
}

/// Find the end of the first complete frame in `buf`.
///
/// Returns the index of the delimiter, or `None` if more data is needed.
pub fn find_frame_end(buf: &[u8], delimiter: u8) -> Option<usize> {
    buf.iter().position(|b| *b == delimiter)
}

/// Parse one frame (without its delimiter).
pub fn parse_frame(frame: Bytes, format: &StreamFormat) -> Result<Frame, FrameError> {
    let separator = frame
        .iter()
        .position(|b| *b == b':')
        .ok_or(FrameError::MissingSeparator)?;

    let header =
        std::str::from_utf8(&frame[..separator]).map_err(|_| FrameError::InvalidHeader)?;
    let (tag, position) = match header.split_once('#') {
        Some((tag, pos)) => {
            let pos = pos
                .parse::<u64>()
                .map_err(|_| FrameError::InvalidPosition(pos.to_string()))?;
            (tag, Some(pos))
        }
        None => (header, None),
    };

    if tag.is_empty() {
        return Err(FrameError::EmptyTag);
    }
    if tag.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(FrameError::InvalidTag(tag.to_string()));
    }

    let data = frame.slice(separator + 1..);

    if tag == format.terminal_tag {
        return Ok(Frame::End {
            error: parse_trailer(&data)?,
        });
    }

    Ok(Frame::Event {
        tag: tag.to_string(),
        position,
        data,
    })
}

/// Terminal frame JSON structure.
#[derive(Deserialize)]
struct TrailerJson {
    #[serde(default)]
    error: Option<TrailerErrorJson>,
}

#[derive(Deserialize)]
struct TrailerErrorJson {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse the data of a terminal frame.
///
/// Empty data and `{}` mean a clean end.
pub fn parse_trailer(data: &[u8]) -> Result<Option<TrailerError>, FrameError> {
    if data.is_empty() || data == b"{}" {
        return Ok(None);
    }

    let trailer: TrailerJson = serde_json::from_slice(data)
        .map_err(|e| FrameError::InvalidTrailer(e.to_string()))?;

    Ok(trailer.error.map(|e| TrailerError {
        kind: e
            .kind
            .and_then(|k| k.parse().ok())
            .unwrap_or(ErrorKind::Unknown),
        message: e.message,
    }))
}

/// Encode an event frame, delimiter included.
///
/// Fails if the tag is not a valid frame tag or if `tag` or `data` contain
/// the delimiter byte.
pub fn encode_frame(
    tag: &str,
    position: Option<u64>,
    data: &[u8],
    format: &StreamFormat,
) -> Result<Vec<u8>, FrameError> {
    if tag.is_empty() {
        return Err(FrameError::EmptyTag);
    }
    if tag
        .bytes()
        .any(|b| b == b':' || b == b'#' || b == format.delimiter || b.is_ascii_whitespace())
    {
        return Err(FrameError::InvalidTag(tag.to_string()));
    }
    if data.contains(&format.delimiter) {
        return Err(FrameError::DelimiterInData);
    }

    let mut frame = Vec::with_capacity(tag.len() + data.len() + 8);
    frame.extend_from_slice(tag.as_bytes());
    if let Some(pos) = position {
        frame.push(b'#');
        frame.extend_from_slice(pos.to_string().as_bytes());
    }
    frame.push(b':');
    frame.extend_from_slice(data);
    frame.push(format.delimiter);
    Ok(frame)
}

/// Encode a terminal frame, optionally carrying an error.
///
/// A delimiter inside the error message is written as a `\u00XX` escape.
/// Fails only for delimiters that JSON cannot escape that way (letters,
/// digits, JSON punctuation, non-ASCII bytes) when the trailer contains one.
pub fn encode_end(
    error: Option<(ErrorKind, &str)>,
    format: &StreamFormat,
) -> Result<Vec<u8>, FrameError> {
    let data = match error {
        Some((kind, message)) => escape_delimiter(
            serde_json::json!({
                "error": { "kind": kind.as_str(), "message": message }
            })
            .to_string(),
            format.delimiter,
        ),
        None => String::new(),
    };
    encode_frame(&format.terminal_tag, None, data.as_bytes(), format)
}

/// Replace a delimiter occurring in serialized JSON by its `\u00XX` form.
///
/// Only delimiters that can appear solely inside JSON strings are replaced.
fn escape_delimiter(json: String, delimiter: u8) -> String {
    let escapable = delimiter.is_ascii()
        && !delimiter.is_ascii_alphanumeric()
        && !b"\"\\{}[],:.+-".contains(&delimiter);
    if !escapable || !json.as_bytes().contains(&delimiter) {
        return json;
    }
    json.replace(
        char::from(delimiter),
        &format!("\\u{:04x}", delimiter),
    )
}
