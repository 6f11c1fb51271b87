//! # gpsd-client
//!
//! A blocking client for gpsd (GPS Service Daemon) speaking its JSON protocol.
//!
//! ## Overview
//!
//! gpsd monitors GPS receivers attached to a host and serves their data
//! on TCP port 2947. A client connects, sends a `?WATCH` subscription, and
//! from then on the daemon pushes a stream of newline-delimited JSON reports
//! (TPV for fixes, SKY for satellites and DOP, and others).
//!
//! This crate turns that stream into a single [`Report`] per connection.
//! Each report merges onto the previous state, because the daemon does not
//! resend every field on every cycle.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use gpsd_client::{GpsdClient, WatchFlags, units};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = GpsdClient::open("localhost", "gpsd")?;
//! client.stream(WatchFlags::ENABLE | WatchFlags::JSON)?;
//!
//! while client.waiting(Duration::from_millis(500))? {
//!     let report = client.read()?;
//!     if let Some(speed) = report.fix.speed {
//!         println!("{:.1} km/h", speed * units::MPS_TO_KPH);
//!     }
//! }
//! client.close();
//! # Ok(())
//! # }
//! ```

use crate::error::GpsdClientError;

/// Client facade and connection management
pub mod client;

/// Error types used throughout the library
pub mod error;

/// Protocol definitions and message parsing for the gpsd JSON protocol
pub mod protocol;

/// Report state merged from the daemon's messages
pub mod report;

/// Unit conversion factors
pub mod units;

pub use client::{CloseHandle, ConnectionState, Endpoint, GpsdClient};
pub use protocol::v3::types::{FixMode, FixStatus, MAX_CHANNELS, WatchFlags};
pub use report::{Fix, Report, ReportFlags, SkySatellite};

/// Convenience type alias for Results with GpsdClientError
pub type Result<T> = core::result::Result<T, GpsdClientError>;
