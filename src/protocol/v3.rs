//! gpsd JSON Protocol Version 3 implementation
//!
//! This module implements version 3 of the gpsd JSON protocol, which is
//! the current stable protocol used by gpsd 3.x releases.
//!
//! # Protocol Overview
//!
//! - Commands start with '?' and end with ';'
//! - Responses are JSON objects with a "class" field indicating message type
//! - After a `?WATCH` with `"enable":true` the daemon pushes reports until
//!   the watch is disabled or the connection closes
//!
//! # References
//!
//! - [gpsd Protocol Documentation](https://gpsd.io/gpsd_json.html)

use crate::protocol::GpsdJsonResponse;

/// Request message types and builders
pub mod request;
/// Response message types and parsers
pub mod response;
/// Common data types used in protocol messages
pub mod types;

/// Protocol version 3 major version number
///
/// Reference: [release-3.25](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/SConscript?ref_type=tags#L226)
pub const API_VERSION_MAJOR: i32 = 3;

/// Protocol version 3 minor version number
///
/// Reports are decoded in the form used since protocol version 3.15
pub const API_VERSION_MINOR: i32 = 15;

/// Type alias for version 3 response messages
pub type ResponseMessage = response::Message;
impl GpsdJsonResponse for ResponseMessage {}

/// Type alias for version 3 request messages
pub type RequestMessage = request::Message;

/// Returns true if a daemon announcing this protocol version can be decoded
pub fn is_supported(proto_major: i32, proto_minor: i32) -> bool {
    proto_major == API_VERSION_MAJOR && proto_minor >= API_VERSION_MINOR
}
