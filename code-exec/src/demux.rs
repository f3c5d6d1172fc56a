//! Decoding of the container engine's multiplexed attach stream.
//!
//! Each frame is an 8 byte header followed by its payload:
//!
//! ```text
//! [selector, 0, 0, 0, len_be[0], len_be[1], len_be[2], len_be[3]] payload...
//! ```
//!
//! A selector of 1 is stdout and 2 is stderr. Frames with any other selector
//! are skipped.

use tracing::debug;

pub const HEADER_LEN: usize = 8;

pub const STDIN: u8 = 0;
pub const STDOUT: u8 = 1;
pub const STDERR: u8 = 2;

/// A single decoded frame, borrowing its payload from the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub selector: u8,
    pub payload: &'a [u8],
}

/// Iterator over the frames of a raw multiplexed buffer.
///
/// Stops at the first header that does not fit in the remaining bytes. A
/// payload shorter than its declared length is yielded as-is and ends the
/// iteration.
pub struct Frames<'a> {
    buf: &'a [u8],
}

impl<'a> Frames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < HEADER_LEN {
            if !self.buf.is_empty() {
                debug!(
                    "Discarding truncated frame header ({} bytes)",
                    self.buf.len()
                );
                self.buf = &[];
            }
            return None;
        }

        let selector = self.buf[0];
        let len = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        let body = &self.buf[HEADER_LEN..];

        if body.len() < len {
            debug!(
                "Frame declares {} payload bytes but only {} remain",
                len,
                body.len()
            );
            self.buf = &[];
            return Some(Frame {
                selector,
                payload: body,
            });
        }

        let (payload, rest) = body.split_at(len);
        self.buf = rest;
        Some(Frame { selector, payload })
    }
}

/// Separated output of one container run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Demuxed {
    pub stdout: String,
    pub stderr: String,
}

/// Split a raw multiplexed buffer into stdout and stderr text.
///
/// Payload bytes are collected per stream before UTF-8 decoding, so a
/// character split across two frames decodes intact.
pub fn demux(raw: &[u8]) -> Demuxed {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    for frame in Frames::new(raw) {
        match frame.selector {
            STDOUT => stdout.extend_from_slice(frame.payload),
            STDERR => stderr.extend_from_slice(frame.payload),
            other => debug!("Skipping frame for stream {}", other),
        }
    }

    Demuxed {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}

/// Encode one frame in the wire format
pub fn encode_frame(selector: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(selector);
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
