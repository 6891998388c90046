//! KISS framing as spoken by the ground-station TNCs.
//!
//! Frames are delimited by `FEND`. Inside a frame, `FESC TFEND` stands for a
//! literal `FEND` and `FESC TFESC` for a literal `FESC`. Any other byte after
//! `FESC` is kept as-is; malformed escapes are not an error.

use log::warn;

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

/// Longest frame kept by a default decoder.
pub const DEFAULT_MAX_FRAME: usize = 4096;

/// Streaming decoder. Holds the partial frame and any pending escape across
/// reads, so frames may be split at arbitrary byte offsets.
///
/// A frame that grows past `max_frame` bytes is discarded up to the next
/// `FEND`.
#[derive(Debug)]
pub struct KissDecoder {
    buffer: Vec<u8>,
    escaped: bool,
    max_frame: usize,
    oversized: bool,
}

impl Default for KissDecoder {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

impl KissDecoder {
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            escaped: false,
            max_frame: max_frame.max(1),
            oversized: false,
        }
    }

    /// Feeds one chunk and returns the frames it completes, lazily.
    ///
    /// Bytes the iterator has not reached yet are still consumed when it is
    /// dropped, so the decoder state never depends on how far the caller
    /// iterated.
    pub fn decode<'a>(&'a mut self, chunk: &'a [u8]) -> Frames<'a> {
        Frames {
            decoder: self,
            chunk,
            pos: 0,
        }
    }

    /// Number of decoded bytes waiting for a closing `FEND`.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == FEND {
            // a dangling FESC right before FEND carries nothing
            self.escaped = false;
            if std::mem::take(&mut self.oversized) || self.buffer.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.buffer));
        }

        if self.escaped {
            self.escaped = false;
            let literal = match byte {
                TFEND => FEND,
                TFESC => FESC,
                other => other,
            };
            self.keep(literal);
        } else if byte == FESC {
            self.escaped = true;
        } else {
            self.keep(byte);
        }
        None
    }

    fn keep(&mut self, byte: u8) {
        if self.oversized {
            return;
        }
        if self.buffer.len() >= self.max_frame {
            warn!("Discarding a frame longer than {} bytes", self.max_frame);
            self.buffer.clear();
            self.oversized = true;
            return;
        }
        self.buffer.push(byte);
    }
}

pub struct Frames<'a> {
    decoder: &'a mut KissDecoder,
    chunk: &'a [u8],
    pos: usize,
}

impl Iterator for Frames<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.chunk.len() {
            let byte = self.chunk[self.pos];
            self.pos += 1;
            if let Some(frame) = self.decoder.push(byte) {
                return Some(frame);
            }
        }
        None
    }
}

impl Drop for Frames<'_> {
    fn drop(&mut self) {
        // frames completed in the unread tail are lost, but the partial
        // buffer stays consistent with the bytes that went past
        for _ in self.by_ref() {}
    }
}

/// Wraps a payload in `FEND`s, escaping every literal `FEND`/`FESC`.
#[allow(dead_code)]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(FEND);
    for &byte in payload {
        match byte {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            other => out.push(other),
        }
    }
    out.push(FEND);
    out
}
