//! Blocking gpsd client
//!
//! This module provides the client an application holds for the lifetime
//! of a session with gpsd. The supported call sequence is
//! open → stream → { waiting → read }* → close.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use gpsd_client::{GpsdClient, WatchFlags};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = GpsdClient::open("localhost", "2947")?;
//! client.stream(WatchFlags::ENABLE | WatchFlags::JSON)?;
//!
//! loop {
//!     if client.waiting(Duration::from_secs(1))? {
//!         let report = client.read()?;
//!         println!("mode {:?} at {:?}, {:?}", report.fix.mode, report.fix.latitude, report.fix.longitude);
//!     }
//! }
//! # }
//! ```

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::Utc;
use dns_lookup::{AddrInfoHints, SockType, getaddrinfo};
use tracing::debug;

use crate::{
    Result,
    error::ConnectError,
    protocol::v3::{self, types::WatchFlags},
    report::Report,
};

/// Connection and transport abstraction
pub mod connection;

pub use connection::{CloseHandle, Connection, ConnectionState, Transport, TransportCloser};

/// Port gpsd listens on when no service is given
pub const DEFAULT_GPSD_PORT: u16 = 2947;

/// Host used when no host is given
pub const DEFAULT_GPSD_HOST: &str = "localhost";

/// Host and service of a gpsd instance
///
/// The service is a port number or a TCP service name known to the
/// system services database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    service: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(DEFAULT_GPSD_HOST, DEFAULT_GPSD_PORT.to_string())
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Endpoint {
            host: host.into(),
            service: service.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Port number the service maps to
    ///
    /// `gpsd` maps to [`DEFAULT_GPSD_PORT`] even when the services
    /// database has no entry for it.
    pub fn port(&self) -> core::result::Result<u16, ConnectError> {
        if let Ok(port) = self.service.parse::<u16>() {
            return Ok(port);
        }
        match lookup_service(&self.service) {
            Some(port) => Ok(port),
            None if self.service == "gpsd" => Ok(DEFAULT_GPSD_PORT),
            None => Err(ConnectError::UnknownService(self.service.clone())),
        }
    }

    /// Resolves the endpoint to socket addresses using the system resolver
    pub fn resolve(&self) -> core::result::Result<Vec<SocketAddr>, ConnectError> {
        let port = self.port()?;
        let addrs: Vec<SocketAddr> = (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                endpoint: self.clone(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ConnectError::NoAddress(self.clone()));
        }
        Ok(addrs)
    }
}

/// Looks up a TCP service name with the system resolver
fn lookup_service(name: &str) -> Option<u16> {
    if name.is_empty() {
        return None;
    }
    let hints = AddrInfoHints {
        socktype: SockType::Stream.into(),
        ..AddrInfoHints::default()
    };
    match getaddrinfo(None, Some(name), Some(hints)) {
        Ok(mut addrs) => addrs
            .find_map(|addr| addr.ok())
            .map(|addr| addr.sockaddr.port()),
        Err(e) => {
            debug!(service = name, error = ?e, "service lookup failed");
            None
        }
    }
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.service)
        } else {
            write!(f, "{}:{}", self.host, self.service)
        }
    }
}

impl core::str::FromStr for Endpoint {
    type Err = core::convert::Infallible;

    /// Parses `host`, `host:service` or `[v6-address]:service`
    ///
    /// Missing parts take the defaults; a bare IPv6 address is a host.
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let default = Endpoint::default();
        let (host, service) = if let Some(rest) = s.strip_prefix('[') {
            match rest.split_once(']') {
                Some((host, tail)) => (host, tail.strip_prefix(':').unwrap_or("")),
                None => (rest, ""),
            }
        } else if s.matches(':').count() == 1 {
            s.split_once(':').unwrap_or((s, ""))
        } else {
            (s, "")
        };

        Ok(Endpoint {
            host: if host.is_empty() { default.host } else { host.to_string() },
            service: if service.is_empty() {
                default.service
            } else {
                service.to_string()
            },
        })
    }
}

/// Client session with gpsd
///
/// Holds one connection and the report state merged from everything the
/// daemon has sent on it. One thread at a time may use a client; to
/// interrupt a blocked `read` from another thread use [`GpsdClient::close_handle`].
///
/// # Type Parameters
/// * `T` - The underlying transport (e.g., TcpStream)
#[derive(Debug)]
pub struct GpsdClient<T: Transport = TcpStream> {
    conn: Connection<T>,
    report: Report,
}

impl GpsdClient<TcpStream> {
    /// Connects to gpsd at `host` and `service`
    ///
    /// # Example
    /// ```no_run
    /// # use gpsd_client::GpsdClient;
    /// let client = GpsdClient::open("127.0.0.1", "gpsd")?;
    /// # Ok::<(), gpsd_client::error::GpsdClientError>(())
    /// ```
    pub fn open(host: &str, service: &str) -> Result<Self> {
        Self::connect(&Endpoint::new(host, service))
    }

    /// Connects to gpsd at `endpoint`
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let conn = Connection::open(endpoint)?;
        Ok(Self::from_connection(conn))
    }
}

impl From<TcpStream> for GpsdClient<TcpStream> {
    fn from(stream: TcpStream) -> Self {
        Self::from_transport(stream)
    }
}

impl<T: Transport> GpsdClient<T> {
    /// Creates a client over an already connected transport
    pub fn from_transport(transport: T) -> Self {
        Self::from_connection(Connection::from_transport(transport))
    }

    pub fn from_connection(conn: Connection<T>) -> Self {
        GpsdClient {
            conn,
            report: Report::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.conn.endpoint()
    }

    /// The report state as of the last successful `read`
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Returns a handle that can close this client's transport from
    /// another thread
    pub fn close_handle(&self) -> std::io::Result<CloseHandle<T::Closer>> {
        self.conn.close_handle()
    }

    /// Subscribes to (or unsubscribes from) the report stream
    ///
    /// # Arguments
    /// * `flags` - Watch policy; see [`WatchFlags`]
    pub fn stream(&mut self, flags: WatchFlags) -> Result<()> {
        self.conn.stream(flags, None)
    }

    /// Like [`GpsdClient::stream`], restricted to one device when
    /// `flags` contains [`WatchFlags::DEVICE`]
    ///
    /// # Arguments
    /// * `device` - Path to the GPS device (e.g., "/dev/ttyUSB0")
    pub fn stream_device(&mut self, flags: WatchFlags, device: &str) -> Result<()> {
        self.conn.stream(flags, Some(device))
    }

    /// Asks the daemon for a one-shot POLL report
    pub fn poll(&mut self) -> Result<()> {
        self.conn.send(&v3::RequestMessage::Poll)
    }

    /// Asks the daemon for its VERSION report
    pub fn request_version(&mut self) -> Result<()> {
        self.conn.send(&v3::RequestMessage::Version)
    }

    /// Asks the daemon for its DEVICES report
    pub fn request_devices(&mut self) -> Result<()> {
        self.conn.send(&v3::RequestMessage::Devices)
    }

    /// Returns true if a report can be read without blocking, waiting up
    /// to `timeout` for one to arrive
    ///
    /// A timeout is not an error. Fails if the connection has failed or
    /// the daemon hung up with nothing left to read.
    pub fn waiting(&mut self, timeout: Duration) -> Result<bool> {
        self.conn.waiting(timeout)
    }

    /// [`GpsdClient::waiting`] with the timeout in microseconds
    pub fn waiting_micros(&mut self, timeout_micros: u64) -> Result<bool> {
        self.waiting(Duration::from_micros(timeout_micros))
    }

    /// Blocks until the next report arrives and returns the merged state
    ///
    /// Values absent from this report keep the value of earlier reports;
    /// `set` on the returned report names what this one changed. Use
    /// [`GpsdClient::waiting`] first to avoid blocking.
    pub fn read(&mut self) -> Result<Report> {
        let message = self.conn.read_message()?;
        self.report.apply(message, Utc::now());
        Ok(self.report.clone())
    }

    /// Closes the connection
    ///
    /// Shutdown failures are logged and otherwise ignored.
    pub fn close(self) {
        debug!(endpoint = ?self.conn.endpoint(), "closing gpsd client");
        self.conn.close();
    }
}
