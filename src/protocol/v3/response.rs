//! gpsd protocol v3 report messages
//!
//! This module defines the messages gpsd pushes to a watching client.
//! Messages are identified by their "class" field in the JSON object.
//! The classes the client model consumes are:
//! - TPV: the fix itself
//! - SKY: satellites in view and DOPs
//! - GST: pseudorange noise
//! - DEVICE/DEVICES: attached receivers
//! - VERSION, WATCH, ERROR: daemon responses to control requests
//! - POLL: a bundle of the above in answer to `?POLL;`
//!
//! Every other class decodes to [`Message::Other`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::*;

/// Fix report: time, position and velocity of one device
///
/// Only `mode` is always present. Everything else is sent when the
/// receiver supplies it.
///
/// * [json_tpv_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L34)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tpv {
    pub device: Option<String>,
    pub mode: FixMode,
    pub status: Option<FixStatus>,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub time: Option<DateTime<Utc>>,
    /// seconds
    pub ept: Option<f64>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Pre-3.20 altitude; MSL on most receivers
    pub alt: Option<f64>,
    #[serde(rename = "altHAE")]
    pub alt_hae: Option<f64>,
    #[serde(rename = "altMSL")]
    pub alt_msl: Option<f64>,
    /// Geoid height above the WGS84 ellipsoid
    #[serde(rename = "geoidSep")]
    pub geoid_sep: Option<f64>,

    /// Degrees true
    pub track: Option<f64>,
    /// Degrees magnetic
    pub magtrack: Option<f64>,
    /// m/s over ground
    pub speed: Option<f64>,
    /// m/s, negative when sinking
    pub climb: Option<f64>,

    // 95% confidence error estimates, meters or m/s or degrees
    pub epx: Option<f64>,
    pub epy: Option<f64>,
    pub epv: Option<f64>,
    pub eph: Option<f64>,
    pub sep: Option<f64>,
    pub epd: Option<f64>,
    pub eps: Option<f64>,
    pub epc: Option<f64>,

    #[cfg(feature = "extra-fields")]
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Sky view report: visible satellites and dilution of precision
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sky {
    pub device: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub dop: Dop,
    #[serde(rename = "nSat")]
    pub n_sat: Option<i32>,
    #[serde(rename = "uSat")]
    pub u_sat: Option<i32>,
    /// Absent on cycles where only the DOPs changed
    pub satellites: Option<Vec<Satellite>>,

    #[cfg(feature = "extra-fields")]
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Pseudorange noise report
///
/// All deviations are 1-sigma, in meters.
///
/// * [json_noise_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L175)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Gst {
    pub device: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub time: Option<DateTime<Utc>>,
    pub rms: Option<f64>,
    /// Error ellipse axes
    pub major: Option<f64>,
    pub minor: Option<f64>,
    /// Ellipse orientation, degrees from true north
    pub orient: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
}

/// Daemon release and protocol level
///
/// Sent unsolicited right after connecting, and in answer to `?VERSION;`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Version {
    pub release: String,
    #[serde(default)]
    pub rev: String,
    pub proto_major: i32,
    pub proto_minor: i32,
}

/// Answer to `?DEVICES;`, also sent when a watch is enabled
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceList {
    pub devices: Vec<Device>,
}

/// Answer to `?POLL;`: the latest reports of every active device
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Poll {
    pub active: Option<i32>,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tpv: Vec<Tpv>,
    #[serde(default)]
    pub gst: Vec<Gst>,
    #[serde(default)]
    pub sky: Vec<Sky>,
}

/// Complaint about a malformed or unknown request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Error {
    pub message: String,
}

/// One report frame, discriminated by its `class` member
///
/// * [libgps_json_unpack](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c#L792)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class", rename_all = "UPPERCASE")]
pub enum Message {
    Tpv(Tpv),
    Gst(Gst),
    Sky(Sky),
    Devices(DeviceList),
    Device(Device),
    /// Echo of the policy in effect after a `?WATCH`
    Watch(Watch),
    Version(Version),
    Error(Error),
    Poll(Poll),
    /// A class this client does not model (ATT, IMU, PPS, TOFF, RAW, AIS...)
    #[serde(other)]
    Other,
}
