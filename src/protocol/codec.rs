//! Line framing over a byte stream
//!
//! Bytes arrive in arbitrary fragments. [`LineFramer`] buffers them, splits
//! on `\n` and decodes each complete line. Corrupt input never poisons the
//! stream: a bad line yields one error and framing resumes at the next
//! terminator or at the next line tag, whichever comes first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    protocol::{
        link::LinkSettings,
        message::{LINE_PREFIXES, ProtocolMessage, TERMINATOR},
    },
};

/// Default maximum line length in bytes, terminator excluded
pub const DEFAULT_MAX_LINE_LEN: usize = 64;

/// Protocol-level settings shared by host and device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Longest accepted line, terminator excluded
    pub max_line_len: usize,
    pub link: LinkSettings,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            link: LinkSettings::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        // Must at least hold a MoveLog line such as "LOG:Move,Human,3,21"
        if self.max_line_len < 24 {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "max_line_len must be at least 24 bytes, got {}",
                    self.max_line_len
                ),
            });
        }
        self.link.validate()
    }
}

/// Incremental decoder from bytes to [`ProtocolMessage`]s
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_len: usize,
    discarding: bool,
    ready: VecDeque<Result<ProtocolMessage>>,
}

impl LineFramer {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_len,
            discarding: false,
            ready: VecDeque::new(),
        }
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Bytes held back waiting for a terminator
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop partial input and anything not yet taken
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
        self.ready.clear();
    }

    /// Feed raw bytes; complete lines are decoded immediately
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == TERMINATOR {
                if self.discarding {
                    self.discarding = false;
                    self.buffer.clear();
                } else {
                    let line = std::mem::take(&mut self.buffer);
                    self.decode_line(&line);
                }
                continue;
            }

            self.buffer.push(byte);
            if self.discarding {
                self.hunt();
                continue;
            }
            // A carriage return before the terminator is not part of the line
            let limit = self.max_line_len + usize::from(byte == b'\r');
            if self.buffer.len() > limit {
                self.overflow();
            }
        }
    }

    /// The current line outgrew the limit. When a tag starts after its
    /// first byte, the line before it lost its terminator: report that
    /// part and keep the rest. Otherwise drop input until the next
    /// terminator or tag.
    fn overflow(&mut self) {
        let len = self.buffer.len();
        log::warn!("dropping line longer than {} bytes", self.max_line_len);
        self.ready.push_back(Err(Error::OversizedMessage {
            limit: self.max_line_len,
            len,
        }));

        match find_tag(&self.buffer[1..]) {
            Some(at) => {
                log::debug!("resynchronized after {} bytes", at + 1);
                self.buffer.drain(..=at);
            }
            None => {
                self.discarding = true;
                self.hunt();
            }
        }
    }

    /// While discarding, keep only enough trailing bytes to spot a tag
    /// split across deliveries.
    fn hunt(&mut self) {
        if let Some(at) = find_tag(&self.buffer) {
            self.buffer.drain(..at);
            self.discarding = false;
            return;
        }
        let keep = longest_prefix().saturating_sub(1);
        let excess = self.buffer.len().saturating_sub(keep);
        self.buffer.drain(..excess);
    }

    /// Next decoded message or framing error, in arrival order
    pub fn next_message(&mut self) -> Option<Result<ProtocolMessage>> {
        self.ready.pop_front()
    }

    /// Feed bytes and take everything decoded so far
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Result<ProtocolMessage>> {
        self.push(bytes);
        self.ready.drain(..).collect()
    }

    fn decode_line(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }

        match ProtocolMessage::parse(line) {
            Ok(message) => self.ready.push_back(Ok(message)),
            Err(err) => match resync(line) {
                Some((garbage, message)) => {
                    log::debug!("resynchronized after {} corrupt bytes", garbage.len());
                    self.ready.push_back(Err(Error::MalformedMessage {
                        line: garbage.to_string(),
                    }));
                    self.ready.push_back(Ok(message));
                }
                None => {
                    log::debug!("discarding line: {err}");
                    self.ready.push_back(Err(err));
                }
            },
        }
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

fn longest_prefix() -> usize {
    LINE_PREFIXES.iter().map(|prefix| prefix.len()).max().unwrap_or(0)
}

/// Offset of the first line tag in `bytes`
fn find_tag(bytes: &[u8]) -> Option<usize> {
    (0..bytes.len()).find(|&at| {
        LINE_PREFIXES
            .iter()
            .any(|prefix| bytes[at..].starts_with(prefix.as_bytes()))
    })
}

/// Find a well-formed message that starts inside a corrupted line, as
/// happens when a fragment lost its terminator and ran into the next line.
fn resync(line: &str) -> Option<(&str, ProtocolMessage)> {
    line.char_indices().skip(1).find_map(|(at, _)| {
        let tail = &line[at..];
        if !LINE_PREFIXES.iter().any(|prefix| tail.starts_with(prefix)) {
            return None;
        }
        ProtocolMessage::parse(tail)
            .ok()
            .map(|message| (&line[..at], message))
    })
}
