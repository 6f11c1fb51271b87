//! Merged view of the report stream
//!
//! gpsd does not repeat every field on every cycle. A [`Report`] therefore
//! accumulates: each decoded message overwrites only the values it carries,
//! and everything else keeps its last known value. The `set` mask says what
//! the most recent message touched.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::protocol::v3::{
    self,
    response::{DeviceList, Gst, Message, Sky, Tpv, Version},
    types::{Device, Dop, FixMode, FixStatus, MAX_CHANNELS, Satellite, WatchFlags},
};

bitflags::bitflags! {
    /// Groups of report fields updated by a single message
    ///
    /// * [gps_mask_t](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2640)
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ReportFlags: u32 {
        const ONLINE = 1 << 0;
        const TIME = 1 << 1;
        const MODE = 1 << 2;
        const LATLON = 1 << 3;
        const ALTITUDE = 1 << 4;
        const SPEED = 1 << 5;
        const TRACK = 1 << 6;
        const CLIMB = 1 << 7;
        /// Any of the ep* error estimates, or epe
        const ERRORS = 1 << 8;
        const STATUS = 1 << 9;
        const DOP = 1 << 10;
        const SATELLITE = 1 << 11;
        const NOISE = 1 << 12;
        const DEVICE = 1 << 13;
        const DEVICELIST = 1 << 14;
        const VERSION = 1 << 15;
        const POLICY = 1 << 16;
        const ERROR = 1 << 17;
    }
}

/// Position/velocity solution
///
/// Every measured quantity has an error estimate beside it. Values are
/// `None` until the daemon first reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fix {
    pub time: Option<DateTime<Utc>>,
    pub mode: FixMode,
    /// Degrees, positive north
    pub latitude: Option<f64>,
    /// Degrees, positive east
    pub longitude: Option<f64>,
    /// Meters above mean sea level
    pub altitude: Option<f64>,
    /// Degrees from true north
    pub track: Option<f64>,
    /// Meters per second
    pub speed: Option<f64>,
    /// Meters per second, positive up
    pub climb: Option<f64>,
    pub ept: Option<f64>,
    pub epx: Option<f64>,
    pub epy: Option<f64>,
    pub epv: Option<f64>,
    pub epd: Option<f64>,
    pub eps: Option<f64>,
    pub epc: Option<f64>,
}

/// One visible satellite slot of the sky view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkySatellite {
    pub prn: i16,
    /// Degrees above the horizon
    pub elevation: Option<f64>,
    /// Degrees from true north
    pub azimuth: Option<f64>,
    /// Signal strength, dB-Hz
    pub ss: Option<f64>,
    pub used: bool,
}

impl From<&Satellite> for SkySatellite {
    fn from(sat: &Satellite) -> Self {
        SkySatellite {
            prn: sat.prn,
            elevation: sat.elevation,
            azimuth: sat.azimuth,
            ss: sat.ss,
            used: sat.used,
        }
    }
}

/// Snapshot of everything the daemon has reported on one connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Field groups updated by the message that produced this snapshot
    pub set: ReportFlags,
    /// Last contact with the device, `None` if never
    pub online: Option<DateTime<Utc>>,
    pub fix: Fix,
    /// Geoid separation in meters
    pub separation: Option<f64>,
    pub status: Option<FixStatus>,
    /// Estimated horizontal position error in meters
    pub epe: Option<f64>,
    pub dop: Dop,
    /// Satellites used in the solution, as reported (not truncated)
    pub satellites_used: usize,
    /// Satellites visible, as reported (not truncated)
    pub satellites_visible: usize,
    pub skyview_time: Option<DateTime<Utc>>,
    used: Vec<i16>,
    skyview: Vec<SkySatellite>,
    /// Latest pseudorange noise statistics
    pub noise: Option<Gst>,
    /// Path of the device that produced the latest data, empty if unknown
    pub device: String,
    pub devices: Vec<Device>,
    pub version: Option<Version>,
    /// Watch policy as last echoed by the daemon
    pub policy: Option<WatchFlags>,
    /// Last error message sent by the daemon
    pub error: Option<String>,
}

impl Report {
    /// PRNs of the satellites used in the solution, at most [`MAX_CHANNELS`]
    pub fn used(&self) -> &[i16] {
        &self.used
    }

    /// Visible satellites, at most [`MAX_CHANNELS`]
    pub fn skyview(&self) -> &[SkySatellite] {
        &self.skyview
    }

    pub fn prn(&self) -> Vec<i16> {
        self.skyview.iter().map(|sat| sat.prn).collect()
    }

    pub fn elevation(&self) -> Vec<Option<f64>> {
        self.skyview.iter().map(|sat| sat.elevation).collect()
    }

    pub fn azimuth(&self) -> Vec<Option<f64>> {
        self.skyview.iter().map(|sat| sat.azimuth).collect()
    }

    pub fn ss(&self) -> Vec<Option<f64>> {
        self.skyview.iter().map(|sat| sat.ss).collect()
    }

    /// Merges one decoded message, received at `received`
    ///
    /// Resets `set` to the groups this message updated.
    pub fn apply(&mut self, message: Message, received: DateTime<Utc>) {
        self.set = match message {
            Message::Tpv(tpv) => self.merge_tpv(tpv, received),
            Message::Sky(sky) => self.merge_sky(sky, received),
            Message::Gst(gst) => self.merge_gst(gst, received),
            Message::Device(device) => self.merge_device(device),
            Message::Devices(list) => self.merge_devices(list),
            Message::Version(version) => self.merge_version(version),
            Message::Watch(watch) => {
                self.policy = Some(WatchFlags::from_watch(&watch));
                ReportFlags::POLICY
            }
            Message::Error(err) => {
                warn!(message = %err.message, "gpsd reported an error");
                self.error = Some(err.message);
                ReportFlags::ERROR
            }
            Message::Poll(poll) => {
                let mut set = ReportFlags::empty();
                for tpv in poll.tpv {
                    set |= self.merge_tpv(tpv, received);
                }
                for gst in poll.gst {
                    set |= self.merge_gst(gst, received);
                }
                for sky in poll.sky {
                    set |= self.merge_sky(sky, received);
                }
                set
            }
            Message::Other => ReportFlags::empty(),
        };
    }

    fn merge_tpv(&mut self, tpv: Tpv, received: DateTime<Utc>) -> ReportFlags {
        let fix = &mut self.fix;
        fix.mode = tpv.mode;
        let mut set = ReportFlags::ONLINE | ReportFlags::MODE;
        self.online = Some(received);

        if merge(&mut fix.time, tpv.time) {
            set |= ReportFlags::TIME;
        }
        if merge(&mut fix.latitude, tpv.lat) | merge(&mut fix.longitude, tpv.lon) {
            set |= ReportFlags::LATLON;
        }
        if merge(&mut fix.altitude, tpv.alt_msl.or(tpv.alt))
            | merge(&mut self.separation, tpv.geoid_sep)
        {
            set |= ReportFlags::ALTITUDE;
        }
        if merge(&mut fix.speed, tpv.speed) {
            set |= ReportFlags::SPEED;
        }
        if merge(&mut fix.track, tpv.track) {
            set |= ReportFlags::TRACK;
        }
        if merge(&mut fix.climb, tpv.climb) {
            set |= ReportFlags::CLIMB;
        }

        let mut errors = false;
        for (slot, value) in [
            (&mut fix.ept, tpv.ept),
            (&mut fix.epx, tpv.epx),
            (&mut fix.epy, tpv.epy),
            (&mut fix.epv, tpv.epv),
            (&mut fix.epd, tpv.epd),
            (&mut fix.eps, tpv.eps),
            (&mut fix.epc, tpv.epc),
            (&mut self.epe, tpv.eph),
        ] {
            errors |= merge(slot, value);
        }
        if errors {
            set |= ReportFlags::ERRORS;
        }

        if merge(&mut self.status, tpv.status) {
            set |= ReportFlags::STATUS;
        }
        set | self.merge_device_path(tpv.device)
    }

    fn merge_sky(&mut self, sky: Sky, received: DateTime<Utc>) -> ReportFlags {
        let mut set = ReportFlags::ONLINE;
        self.online = Some(received);

        if self.dop.merge(&sky.dop) {
            set |= ReportFlags::DOP;
        }
        if merge(&mut self.skyview_time, sky.time) {
            set |= ReportFlags::SATELLITE;
        }
        if let Some(satellites) = sky.satellites {
            // excess satellites are dropped, not an error
            self.satellites_visible = satellites.len();
            self.satellites_used = satellites.iter().filter(|sat| sat.used).count();
            self.used = satellites
                .iter()
                .filter(|sat| sat.used)
                .map(|sat| sat.prn)
                .take(MAX_CHANNELS)
                .collect();
            self.skyview = satellites
                .iter()
                .take(MAX_CHANNELS)
                .map(SkySatellite::from)
                .collect();
            set |= ReportFlags::SATELLITE;
        }
        set | self.merge_device_path(sky.device)
    }

    fn merge_gst(&mut self, gst: Gst, received: DateTime<Utc>) -> ReportFlags {
        self.online = Some(received);
        let device = gst.device.clone();
        self.noise = Some(gst);
        ReportFlags::ONLINE | ReportFlags::NOISE | self.merge_device_path(device)
    }

    fn merge_device(&mut self, device: Device) -> ReportFlags {
        let mut set = self.merge_device_path(device.path);
        if merge(&mut self.online, device.activated) {
            set |= ReportFlags::ONLINE;
        }
        set
    }

    fn merge_devices(&mut self, list: DeviceList) -> ReportFlags {
        let mut set = ReportFlags::DEVICELIST;
        if self.device.is_empty() {
            let first = list.devices.iter().find_map(|dev| dev.path.clone());
            set |= self.merge_device_path(first);
        }
        self.devices = list.devices;
        set
    }

    fn merge_version(&mut self, version: Version) -> ReportFlags {
        if !v3::is_supported(version.proto_major, version.proto_minor) {
            warn!(
                release = %version.release,
                proto_major = version.proto_major,
                proto_minor = version.proto_minor,
                "gpsd protocol version may not be fully supported"
            );
        }
        self.version = Some(version);
        ReportFlags::VERSION
    }

    fn merge_device_path(&mut self, path: Option<String>) -> ReportFlags {
        match path {
            Some(path) if !path.is_empty() => {
                self.device = path;
                ReportFlags::DEVICE
            }
            _ => ReportFlags::empty(),
        }
    }
}

/// Overwrites `slot` if `value` is present
fn merge<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = Some(value);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(report: &mut Report, line: &str) {
        let message = serde_json::from_str(line).unwrap();
        report.apply(message, Utc::now());
    }

    fn sky_line(visible: usize) -> String {
        let sats: Vec<String> = (0..visible)
            .map(|i| {
                format!(
                    r#"{{"PRN":{},"el":{},"az":{},"ss":{},"used":true}}"#,
                    i + 1,
                    i % 90,
                    i % 360,
                    20 + i % 30
                )
            })
            .collect();
        format!(
            r#"{{"class":"SKY","device":"/dev/ttyACM0","satellites":[{}]}}"#,
            sats.join(",")
        )
    }

    #[test]
    fn test_absent_fields_keep_previous_value() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"TPV","mode":3,"lat":37.0,"lon":-122.0,"altMSL":100.0,"epv":4.5}"#,
        );
        assert!(report.set.contains(ReportFlags::ALTITUDE));

        apply(&mut report, r#"{"class":"TPV","mode":2,"lat":37.5,"lon":-122.5}"#);
        assert_eq!(report.fix.altitude, Some(100.0));
        assert_eq!(report.fix.epv, Some(4.5));
        assert_eq!(report.fix.latitude, Some(37.5));
        assert_eq!(report.fix.mode, FixMode::Fix2D);
        assert!(!report.set.contains(ReportFlags::ALTITUDE));
        assert!(report.set.contains(ReportFlags::LATLON | ReportFlags::MODE));
    }

    #[test]
    fn test_tpv_fields() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"TPV","device":"/dev/ttyUSB0","status":2,"mode":3,"time":"2024-05-01T12:00:01.000Z","ept":0.005,"lat":37.0,"lon":-122.0,"alt":11.0,"altHAE":40.0,"eph":3.1,"epx":2.0,"epy":2.5,"track":181.5,"speed":0.2,"climb":-0.1,"eps":0.4,"epc":0.6,"epd":12.0,"geoidSep":-29.0}"#,
        );

        assert_eq!(report.device, "/dev/ttyUSB0");
        assert_eq!(report.status, Some(FixStatus::DGps));
        assert_eq!(report.fix.altitude, Some(11.0));
        assert_eq!(report.separation, Some(-29.0));
        assert_eq!(report.epe, Some(3.1));
        assert_eq!(report.fix.track, Some(181.5));
        assert_eq!(report.fix.epd, Some(12.0));
        assert!(report.online.is_some());
        assert!(report.set.contains(
            ReportFlags::ONLINE
                | ReportFlags::TIME
                | ReportFlags::ERRORS
                | ReportFlags::STATUS
                | ReportFlags::DEVICE
        ));
    }

    #[test]
    fn test_sky_sequences_share_length() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"SKY","hdop":0.9,"satellites":[{"PRN":3,"el":12,"az":40,"ss":30,"used":false},{"PRN":7,"el":63,"az":270,"ss":44,"used":true}]}"#,
        );

        assert_eq!(report.satellites_visible, 2);
        assert_eq!(report.satellites_used, 1);
        assert_eq!(report.used(), &[7]);
        assert_eq!(report.prn(), vec![3, 7]);
        assert_eq!(report.elevation(), vec![Some(12.0), Some(63.0)]);
        assert_eq!(report.azimuth(), vec![Some(40.0), Some(270.0)]);
        assert_eq!(report.ss(), vec![Some(30.0), Some(44.0)]);
        assert_eq!(report.dop.h, Some(0.9));
    }

    #[test]
    fn test_sky_truncates_to_max_channels() {
        let mut report = Report::default();
        apply(&mut report, &sky_line(MAX_CHANNELS + 16));

        assert_eq!(report.satellites_visible, MAX_CHANNELS + 16);
        assert_eq!(report.satellites_used, MAX_CHANNELS + 16);
        assert_eq!(report.used().len(), MAX_CHANNELS);
        assert_eq!(report.skyview().len(), MAX_CHANNELS);
        assert_eq!(report.prn().len(), MAX_CHANNELS);
        assert_eq!(report.ss().len(), MAX_CHANNELS);
        assert_eq!(report.prn().last(), Some(&(MAX_CHANNELS as i16)));
    }

    #[test]
    fn test_sky_without_list_keeps_satellites() {
        let mut report = Report::default();
        apply(&mut report, &sky_line(4));
        apply(&mut report, r#"{"class":"SKY","pdop":2.2,"nSat":9,"uSat":5}"#);

        assert_eq!(report.satellites_visible, 4);
        assert_eq!(report.skyview().len(), 4);
        assert_eq!(report.dop.p, Some(2.2));
        assert!(!report.set.contains(ReportFlags::SATELLITE));
    }

    #[test]
    fn test_control_responses() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#,
        );
        assert_eq!(report.set, ReportFlags::VERSION);
        assert_eq!(report.version.as_ref().map(|v| v.proto_minor), Some(15));

        apply(
            &mut report,
            r#"{"class":"DEVICES","devices":[{"class":"DEVICE","path":"/dev/ttyUSB0","driver":"u-blox","activated":"2024-05-01T12:00:00.000Z","flags":1}]}"#,
        );
        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.device, "/dev/ttyUSB0");

        apply(
            &mut report,
            r#"{"class":"WATCH","enable":true,"json":true,"nmea":false,"raw":0,"scaled":false,"timing":false,"split24":false,"pps":false}"#,
        );
        assert_eq!(report.policy, Some(WatchFlags::ENABLE | WatchFlags::JSON));

        apply(&mut report, r#"{"class":"ERROR","message":"Unrecognized request '?FOO'"}"#);
        assert_eq!(report.set, ReportFlags::ERROR);
        assert_eq!(report.error.as_deref(), Some("Unrecognized request '?FOO'"));
    }

    #[test]
    fn test_device_activation_sets_online() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"DEVICE","path":"/dev/ttyS0","activated":1714564800.0}"#,
        );
        assert_eq!(report.online.map(|t| t.timestamp()), Some(1_714_564_800));
        assert!(report.set.contains(ReportFlags::DEVICE | ReportFlags::ONLINE));
    }

    #[test]
    fn test_unmodelled_class_changes_nothing() {
        let mut report = Report::default();
        apply(&mut report, r#"{"class":"TPV","mode":3,"lat":1.0,"lon":2.0}"#);
        let before = report.clone();

        apply(&mut report, r#"{"class":"PPS","device":"/dev/pps0","real_sec":1}"#);
        assert_eq!(report.set, ReportFlags::empty());
        assert_eq!(report.fix, before.fix);
    }

    #[test]
    fn test_poll_merges_contents() {
        let mut report = Report::default();
        apply(
            &mut report,
            r#"{"class":"POLL","active":1,"tpv":[{"class":"TPV","mode":3,"lat":10.0,"lon":20.0}],"gst":[{"class":"GST","rms":1.5}],"sky":[{"class":"SKY","vdop":1.1}]}"#,
        );
        assert_eq!(report.fix.latitude, Some(10.0));
        assert_eq!(report.noise.as_ref().and_then(|n| n.rms), Some(1.5));
        assert_eq!(report.dop.v, Some(1.1));
        assert!(report.set.contains(ReportFlags::LATLON | ReportFlags::NOISE | ReportFlags::DOP));
    }
}
