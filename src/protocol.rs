//! Wire-level encoding of requests and framing of reports
//!
//! gpsd speaks newline-delimited JSON. Requests are single command lines;
//! reports arrive as one JSON object per line, but a transport read may end
//! anywhere, so incoming bytes go through a [`FrameBuffer`] that hands out
//! complete lines only.

use std::collections::VecDeque;

use crate::{
    Result,
    error::{DecodeError, GpsdClientError},
};

pub mod v3;

/// Longest report frame accepted before the frame is dropped
pub const MAX_FRAME_LEN: usize = 16 * 1024;

pub trait GpsdJsonResponse: serde::de::DeserializeOwned {
    /// Decodes one frame, without its line terminator
    fn decode(frame: &[u8]) -> core::result::Result<Self, DecodeError> {
        serde_json::from_slice(frame).map_err(|source| DecodeError::Json {
            frame: String::from_utf8_lossy(frame).into_owned(),
            source,
        })
    }
}

pub trait GpsdJsonRequest {
    fn to_command(&self) -> serde_json::Result<String>;
}

pub trait GpsdJsonEncode: std::io::Write {
    fn write_request(&mut self, request: &impl GpsdJsonRequest) -> Result<()> {
        let mut cmd = request.to_command().map_err(|e| {
            GpsdClientError::Send(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        cmd.push('\n');
        self.write_all(cmd.as_bytes())
            .and_then(|_| self.flush())
            .map_err(GpsdClientError::Send)
    }
}

impl<W: std::io::Write + ?Sized> GpsdJsonEncode for W {}

/// Reassembles newline-delimited frames from arbitrarily split input
///
/// The frames handed out do not depend on how the input was split across
/// calls to [`FrameBuffer::extend`]. Blank lines are skipped, a trailing
/// `\r` is stripped, and a frame longer than the limit is reported once
/// as [`DecodeError::FrameTooLong`] in its place in the sequence.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    limit: usize,
    discarding: bool,
    /// Stream offset of the first byte still in `buf`
    consumed: usize,
    /// Stream offsets at which a frame was dropped for length
    dropped: VecDeque<usize>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_FRAME_LEN)
    }

    pub fn with_limit(limit: usize) -> Self {
        FrameBuffer {
            buf: Vec::new(),
            limit,
            discarding: false,
            consumed: 0,
            dropped: VecDeque::new(),
        }
    }

    /// Appends bytes received from the transport
    pub fn extend(&mut self, mut chunk: &[u8]) {
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return,
            }
        }

        self.buf.extend_from_slice(chunk);

        let partial_start = self
            .buf
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        if self.buf.len() - partial_start > self.limit {
            self.buf.truncate(partial_start);
            self.dropped.push_back(self.consumed + partial_start);
            self.discarding = true;
        }
    }

    /// Returns true if [`FrameBuffer::next_frame`] would yield something
    pub fn has_frame(&self) -> bool {
        // a dropped frame always follows complete lines only
        if !self.dropped.is_empty() {
            return true;
        }
        let Some(end) = self.buf.iter().rposition(|&b| b == b'\n') else {
            return false;
        };
        self.buf[..end]
            .split(|&b| b == b'\n')
            .any(|line| !is_blank(line))
    }

    /// Takes the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<core::result::Result<Vec<u8>, DecodeError>> {
        loop {
            if self.dropped.front() == Some(&self.consumed) {
                self.dropped.pop_front();
                return Some(Err(DecodeError::FrameTooLong { limit: self.limit }));
            }

            let pos = self.buf.iter().position(|&b| b == b'\n')?;
            let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
            self.consumed += pos + 1;

            frame.pop();
            if frame.len() > self.limit {
                return Some(Err(DecodeError::FrameTooLong { limit: self.limit }));
            }
            if frame.last() == Some(&b'\r') {
                frame.pop();
            }
            if is_blank(&frame) {
                continue;
            }
            return Some(Ok(frame));
        }
    }

    /// Number of buffered bytes not yet handed out
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
