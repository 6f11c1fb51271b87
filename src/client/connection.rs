//! Byte-stream connection to gpsd
//!
//! A [`Connection`] owns one transport, buffers incoming bytes into frames,
//! and tracks whether the stream is still usable. It knows nothing about
//! the report model; see [`crate::client::GpsdClient`] for that.

use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::client::Endpoint;
use crate::error::{ConnectError, GpsdClientError, ReadError};
use crate::protocol::{FrameBuffer, GpsdJsonEncode, GpsdJsonResponse, v3};
use crate::{Result, protocol::v3::types::WatchFlags};

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 4096;

/// Shortest read timeout used by [`Connection::waiting`]
///
/// Socket timeouts cannot be zero, so a zero wait still polls this long.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Open,
    /// The transport failed or the daemon hung up; only closing is valid
    Failed,
    /// The transport has been released
    Closed,
}

/// Byte stream a connection can run over
///
/// Implemented for [`TcpStream`]. Other implementations let the client run
/// over any reliable stream, such as an in-memory pipe in tests.
pub trait Transport: std::io::Read + std::io::Write {
    /// Handle that can interrupt the transport from another thread
    type Closer: TransportCloser;

    /// Sets how long a read may block; `None` blocks indefinitely
    ///
    /// Callers never pass a zero duration.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Shuts the transport down in both directions
    fn shutdown(&mut self) -> std::io::Result<()>;

    /// Creates a handle that shuts this transport down when closed
    fn closer(&self) -> std::io::Result<Self::Closer>;
}

/// Shuts down a transport owned elsewhere
pub trait TransportCloser: Send + 'static {
    fn close(&self) -> std::io::Result<()>;
}

impl Transport for TcpStream {
    type Closer = TcpStream;

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn closer(&self) -> std::io::Result<TcpStream> {
        self.try_clone()
    }
}

impl TransportCloser for TcpStream {
    fn close(&self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Closes a connection from another thread
///
/// A `read` or `waiting` blocked on the connection returns promptly with
/// [`ReadError::Closed`]. Closing more than once is harmless.
#[derive(Debug)]
pub struct CloseHandle<C> {
    closer: C,
}

impl<C: TransportCloser> CloseHandle<C> {
    pub fn close(&self) {
        if let Err(e) = self.closer.close() {
            debug!(error = %e, "shutdown through close handle failed");
        }
    }
}

/// Connection to a gpsd instance
///
/// The transport is released when the connection is closed or dropped.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
    frames: FrameBuffer,
    endpoint: Option<Endpoint>,
    state: ConnectionState,
    eof: bool,
}

impl Connection<TcpStream> {
    /// Resolves `endpoint` and connects to the first address that accepts
    ///
    /// Blocks for the duration of name resolution and the TCP handshake.
    pub fn open(endpoint: &Endpoint) -> core::result::Result<Self, ConnectError> {
        let addrs = endpoint.resolve()?;

        let mut last_err = None;
        for addr in addrs {
            debug!(%addr, "connecting to gpsd");
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    debug!(%addr, %endpoint, "connected to gpsd");
                    let mut conn = Connection::from_transport(stream);
                    conn.endpoint = Some(endpoint.clone());
                    return Ok(conn);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connection attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(source) => ConnectError::Unreachable {
                endpoint: endpoint.clone(),
                source,
            },
            None => ConnectError::NoAddress(endpoint.clone()),
        })
    }
}

impl<T: Transport> Connection<T> {
    /// Wraps an already connected transport
    pub fn from_transport(transport: T) -> Self {
        Connection {
            transport,
            frames: FrameBuffer::new(),
            endpoint: None,
            state: ConnectionState::Open,
            eof: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The endpoint this connection was opened to, if opened by name
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn close_handle(&self) -> std::io::Result<CloseHandle<T::Closer>> {
        Ok(CloseHandle {
            closer: self.transport.closer()?,
        })
    }

    /// Sends one control request
    pub fn send(&mut self, request: &v3::RequestMessage) -> Result<()> {
        self.ensure_open()?;
        trace!(?request, "sending request");
        self.transport.write_request(request).inspect_err(|_| {
            self.state = ConnectionState::Failed;
        })
    }

    /// Sends the subscription request for `flags`
    ///
    /// Does not wait for the daemon's acknowledgement; the WATCH and DEVICES
    /// responses arrive through the normal report stream.
    pub fn stream(&mut self, flags: WatchFlags, device: Option<&str>) -> Result<()> {
        debug!(?flags, ?device, "updating watch policy");
        self.send(&flags.to_request(device))
    }

    /// Waits up to `timeout` for a complete frame
    ///
    /// Returns `Ok(false)` when the timeout passes without one. A timeout
    /// too large to represent as a deadline waits indefinitely.
    pub fn waiting(&mut self, timeout: Duration) -> Result<bool> {
        self.ensure_open()?;
        if self.frames.has_frame() {
            return Ok(true);
        }

        let deadline = Instant::now().checked_add(timeout);
        let result = self.fill_until(deadline);
        let restored = self.transport.set_read_timeout(None);

        let ready = result?;
        if let Err(e) = restored {
            return Err(self.fail(ReadError::Io(e)));
        }
        Ok(ready)
    }

    /// Blocks until a complete frame is available and returns it
    pub fn next_frame(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        loop {
            if let Some(frame) = self.frames.next_frame() {
                let frame = frame?;
                trace!(frame = %String::from_utf8_lossy(&frame), "received frame");
                return Ok(frame);
            }
            if self.eof {
                return Err(self.fail(ReadError::Closed));
            }
            self.fill()?;
        }
    }

    /// Blocks until a complete report is available and decodes it
    pub fn read_message(&mut self) -> Result<v3::ResponseMessage> {
        let frame = self.next_frame()?;
        v3::ResponseMessage::decode(&frame)
            .inspect_err(|e| warn!(error = %e, "dropping undecodable frame"))
            .map_err(GpsdClientError::from)
    }

    /// Releases the transport
    ///
    /// Failures while shutting down are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        if let Err(e) = self.transport.shutdown() {
            debug!(error = %e, "transport shutdown failed");
        }
        debug!(endpoint = ?self.endpoint, "connection closed");
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            state => Err(GpsdClientError::InvalidState(state)),
        }
    }

    fn fail(&mut self, err: ReadError) -> GpsdClientError {
        debug!(error = %err, "connection failed");
        self.state = ConnectionState::Failed;
        GpsdClientError::Read(err)
    }

    /// One blocking read into the frame buffer
    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.transport.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.frames.extend(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(ReadError::Io(e))),
            }
        }
    }

    /// Reads until a frame is complete or `deadline` passes; `None` never
    /// passes
    fn fill_until(&mut self, deadline: Option<Instant>) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read_timeout = deadline.map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .max(MIN_POLL_INTERVAL)
            });
            if let Err(e) = self.transport.set_read_timeout(read_timeout) {
                return Err(self.fail(ReadError::Io(e)));
            }

            match self.transport.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return if self.frames.has_frame() {
                        Ok(true)
                    } else {
                        Err(self.fail(ReadError::Closed))
                    };
                }
                Ok(n) => {
                    self.frames.extend(&chunk[..n]);
                    if self.frames.has_frame() {
                        return Ok(true);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail(ReadError::Io(e))),
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(false);
            }
        }
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.release();
    }
}
