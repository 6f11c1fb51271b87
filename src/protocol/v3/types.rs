use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::Deserialize_repr;
use serde_with::skip_serializing_none;

/// Maximum number of satellite channels tracked per report
///
/// * [MAXCHANNELS](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2397)
pub const MAX_CHANNELS: usize = 184;

/// * [gps_fix_t.mode](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L181)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize_repr)]
#[repr(i32)]
pub enum FixMode {
    #[default]
    NotSeen = 0,
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

impl FixMode {
    /// Returns true if the mode carries a position (2D or 3D)
    pub fn has_fix(self) -> bool {
        matches!(self, FixMode::Fix2D | FixMode::Fix3D)
    }
}

/// * [gps_fix_t.status](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L192)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr)]
#[repr(i32)]
pub enum FixStatus {
    Unknown = 0,
    Gps = 1,
    DGps = 2,
    RTKFixed = 3,
    RTKFloat = 4,
    /// Dead reckoning only
    DR = 5,
    GnssDR = 6,
    /// Surveyed-in position, time output only
    Time = 7,
    Simulated = 8,
    /// P(Y) code
    PpsFix = 9,
}

/// * [satellite.gnssid](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2449)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr)]
#[repr(u8)]
pub enum GnssId {
    Gps = 0,
    Sbas = 1,
    Gal = 2,
    Bd = 3,
    Imes = 4,
    Qzss = 5,
    Glo = 6,
    Irnss = 7,
}

bitflags::bitflags! {
    /// Subscription policy bits understood by `?WATCH`
    ///
    /// * [WATCH_ENABLE..](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2830)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatchFlags: u32 {
        /// Start streaming reports
        const ENABLE = 0x000001;
        /// Stop streaming reports
        const DISABLE = 0x000002;
        /// JSON reports
        const JSON = 0x000010;
        /// NMEA sentences
        const NMEA = 0x000020;
        /// Raw data, only when the device speaks a binary protocol
        const RARE = 0x000040;
        /// Raw data, always
        const RAW = 0x000080;
        /// Apply scaling divisors
        const SCALED = 0x000100;
        /// Timing information
        const TIMING = 0x000200;
        /// Watch only the named device
        const DEVICE = 0x000800;
        /// Split AIS type 24 messages
        const SPLIT24 = 0x001000;
        /// PPS reports
        const PPS = 0x002000;
        /// Force JSON-era request syntax
        const NEWSTYLE = 0x010000;
        /// Force pre-JSON request syntax
        const OLDSTYLE = 0x020000;
    }
}

bitflags::bitflags! {
    /// Kinds of data a device has produced so far (`DEVICE.flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceSeen: u32 {
        const GPS = 0x01;
        const RTCM2 = 0x02;
        const RTCM3 = 0x04;
        const AIS = 0x08;
    }
}

impl<'de> Deserialize<'de> for DeviceSeen {
    /// Bits this client does not know are dropped
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(DeviceSeen::from_bits_truncate)
    }
}

/// * [dop_t](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2557)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Dop {
    #[serde(rename = "xdop")]
    pub x: Option<f64>,
    #[serde(rename = "ydop")]
    pub y: Option<f64>,
    #[serde(rename = "pdop")]
    pub p: Option<f64>,
    #[serde(rename = "hdop")]
    pub h: Option<f64>,
    #[serde(rename = "vdop")]
    pub v: Option<f64>,
    #[serde(rename = "tdop")]
    pub t: Option<f64>,
    #[serde(rename = "gdop")]
    pub g: Option<f64>,
}

impl Dop {
    /// Overwrites each value present in `update`, keeping the rest
    ///
    /// Returns true if any value was present.
    pub fn merge(&mut self, update: &Dop) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.x, update.x),
            (&mut self.y, update.y),
            (&mut self.p, update.p),
            (&mut self.h, update.h),
            (&mut self.v, update.v),
            (&mut self.t, update.t),
            (&mut self.g, update.g),
        ] {
            if value.is_some() {
                *slot = value;
                changed = true;
            }
        }
        changed
    }
}

/// * [json_attrs_satellites](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L295)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Satellite {
    #[serde(rename = "PRN")]
    pub prn: i16,
    #[serde(rename = "az")]
    pub azimuth: Option<f64>,
    #[serde(rename = "el")]
    pub elevation: Option<f64>,
    pub gnssid: Option<GnssId>,
    pub ss: Option<f64>,
    pub svid: Option<u8>,
    #[serde(default)]
    pub used: bool,
}

/// One receiver attached to the daemon
///
/// * [json_device_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L28)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    pub path: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub activated: Option<DateTime<Utc>>,
    pub flags: Option<DeviceSeen>,
    pub driver: Option<String>,
    pub subtype: Option<String>,
    pub bps: Option<i32>,
    pub cycle: Option<f64>,
}

/// Watch policy, as sent in `?WATCH=` and echoed back in WATCH reports
///
/// * [json_watch_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L95)
///
/// Field order is the key order of the request on the wire.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    pub enable: Option<bool>,
    pub json: Option<bool>,
    pub nmea: Option<bool>,
    pub raw: Option<i32>,
    pub scaled: Option<bool>,
    pub timing: Option<bool>,
    pub split24: Option<bool>,
    pub pps: Option<bool>,
    pub device: Option<String>,
    pub remote: Option<String>,
}

/// Deserializes a timestamp sent either as an ISO 8601 string or as
/// floating-point seconds since the Unix epoch (pre-3.10 daemons).
pub(crate) fn flexible_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Iso(String),
        Unix(f64),
    }

    match Option::<RawTime>::deserialize(deserializer)? {
        Some(RawTime::Iso(iso)) => DateTime::parse_from_rfc3339(&iso)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {iso:?}: {e}"))),
        Some(RawTime::Unix(secs)) if secs > 0.0 => Ok(DateTime::<Utc>::from_timestamp(
            secs.trunc() as i64,
            (secs.fract() * 1e9) as u32,
        )),
        // 0 means "never" in the legacy encoding
        Some(RawTime::Unix(_)) | None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_seen_bits() {
        let flags: DeviceSeen = serde_json::from_str("9").unwrap();
        assert_eq!(flags, DeviceSeen::GPS | DeviceSeen::AIS);

        let flags: DeviceSeen = serde_json::from_str("17").unwrap();
        assert_eq!(flags, DeviceSeen::GPS);
    }

    #[test]
    fn test_watch_flag_bits_match_daemon() {
        assert_eq!(WatchFlags::ENABLE.bits(), 0x01);
        assert_eq!(WatchFlags::JSON.bits(), 0x10);
        assert_eq!(WatchFlags::DEVICE.bits(), 0x800);
        assert_eq!(WatchFlags::NEWSTYLE.bits(), 0x10000);
        assert_eq!(WatchFlags::OLDSTYLE.bits(), 0x20000);

        let names: Vec<_> = WatchFlags::all().iter_names().map(|(name, _)| name).collect();
        assert_eq!(names.len(), 13);
        assert!(names.contains(&"RARE"));
    }

    #[test]
    fn test_dop_merge_keeps_absent_values() {
        let mut dop = Dop {
            h: Some(1.2),
            v: Some(2.0),
            ..Default::default()
        };
        let update: Dop = serde_json::from_str(r#"{"hdop":0.9,"pdop":1.5}"#).unwrap();

        assert!(dop.merge(&update));
        assert_eq!(dop.h, Some(0.9));
        assert_eq!(dop.p, Some(1.5));
        assert_eq!(dop.v, Some(2.0));
        assert!(!dop.merge(&Dop::default()));
    }

    #[test]
    fn test_device_activated_formats() {
        let iso: Device =
            serde_json::from_str(r#"{"path":"/dev/ttyUSB0","activated":"2024-05-01T12:00:00.000Z"}"#)
                .unwrap();
        assert_eq!(
            iso.activated.map(|t| t.timestamp()),
            Some(1_714_564_800)
        );

        let unix: Device =
            serde_json::from_str(r#"{"path":"/dev/ttyUSB0","activated":1714564800.5}"#).unwrap();
        assert_eq!(unix.activated.map(|t| t.timestamp()), Some(1_714_564_800));

        let never: Device = serde_json::from_str(r#"{"path":"/dev/ttyUSB0","activated":0}"#).unwrap();
        assert_eq!(never.activated, None);
    }
}
