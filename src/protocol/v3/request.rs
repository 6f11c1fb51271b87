use super::types::*;
use crate::protocol::GpsdJsonRequest;

/// Control requests a client can send to gpsd
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Devices,
    Watch(Option<Watch>),
    /// Pre-JSON watch command (`w+x` / `w-`), for daemons older than 3.0
    LegacyWatch { enable: bool, nmea: bool },
    Poll,
    Version,
}

impl GpsdJsonRequest for Message {
    /// Formats the request according to the gpsd command grammar:
    /// - Simple commands: `?COMMAND;`
    /// - Commands with parameters: `?COMMAND={"json":"params"};`
    /// - Legacy watch: `w+x`, `w+xr+`, `w-`, `w-r-`
    fn to_command(&self) -> serde_json::Result<String> {
        let cmd = match self {
            Message::Devices => "?DEVICES;".into(),
            Message::Watch(Some(watch)) => format!("?WATCH={};", serde_json::to_string(watch)?),
            Message::Watch(None) => "?WATCH;".into(),
            Message::LegacyWatch { enable, nmea } => {
                let mut cmd = String::from(if *enable { "w+x" } else { "w-" });
                if *nmea {
                    cmd.push_str(if *enable { "r+" } else { "r-" });
                }
                cmd
            }
            Message::Poll => "?POLL;".into(),
            Message::Version => "?VERSION;".into(),
        };
        Ok(cmd)
    }
}

impl WatchFlags {
    /// Builds the subscription request gpsd expects for this flag set
    ///
    /// Mirrors `gps_stream()` in libgps: JSON is implied when no output
    /// format is selected, DISABLE takes precedence over ENABLE, and the
    /// device path is only sent when DEVICE is set.
    ///
    /// - [gps_sock_stream](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/libgps/libgps_sock.c#L315)
    pub fn to_request(self, device: Option<&str>) -> Message {
        let mut flags = self;

        if flags.contains(WatchFlags::OLDSTYLE) && !flags.contains(WatchFlags::NEWSTYLE) {
            return Message::LegacyWatch {
                enable: !flags.contains(WatchFlags::DISABLE),
                nmea: flags.contains(WatchFlags::NMEA),
            };
        }

        if !flags.intersects(WatchFlags::JSON | WatchFlags::NMEA | WatchFlags::RAW) {
            flags |= WatchFlags::JSON;
        }

        let enable = !flags.contains(WatchFlags::DISABLE);
        let toggle = |flag: WatchFlags| flags.contains(flag).then_some(enable);

        // RAW beats RARE when enabling, RARE beats RAW when disabling
        let raw = match (
            enable,
            flags.contains(WatchFlags::RAW),
            flags.contains(WatchFlags::RARE),
        ) {
            (true, true, _) => Some(2),
            (true, false, true) => Some(1),
            (false, _, true) => Some(0),
            (false, true, false) => Some(1),
            _ => None,
        };

        let device = if enable && flags.contains(WatchFlags::DEVICE) {
            device.map(String::from)
        } else {
            None
        };

        Message::Watch(Some(Watch {
            enable: Some(enable),
            json: toggle(WatchFlags::JSON),
            nmea: toggle(WatchFlags::NMEA),
            raw,
            scaled: toggle(WatchFlags::SCALED),
            timing: toggle(WatchFlags::TIMING),
            split24: toggle(WatchFlags::SPLIT24),
            pps: toggle(WatchFlags::PPS),
            device,
            remote: None,
        }))
    }

    /// Recovers the flag set from a watch policy object
    ///
    /// This is the inverse of [`WatchFlags::to_request`] for new-style
    /// requests, and also interprets the daemon's WATCH echo.
    pub fn from_watch(watch: &Watch) -> WatchFlags {
        let mut flags = WatchFlags::empty();
        let enable = match watch.enable {
            Some(true) => {
                flags |= WatchFlags::ENABLE;
                true
            }
            Some(false) => {
                flags |= WatchFlags::DISABLE;
                false
            }
            None => true,
        };

        for (value, flag) in [
            (watch.json, WatchFlags::JSON),
            (watch.nmea, WatchFlags::NMEA),
            (watch.scaled, WatchFlags::SCALED),
            (watch.timing, WatchFlags::TIMING),
            (watch.split24, WatchFlags::SPLIT24),
            (watch.pps, WatchFlags::PPS),
        ] {
            if value == Some(enable) {
                flags |= flag;
            }
        }

        flags |= match (enable, watch.raw) {
            (true, Some(1)) => WatchFlags::RARE,
            (true, Some(2)) => WatchFlags::RAW,
            (false, Some(0)) => WatchFlags::RARE,
            (false, Some(1)) => WatchFlags::RAW,
            _ => WatchFlags::empty(),
        };

        if watch.device.is_some() {
            flags |= WatchFlags::DEVICE;
        }

        flags
    }

    /// Parses a `?WATCH={...};` request line back into flags
    ///
    /// Returns `None` for anything that is not a new-style watch request
    /// with a policy object.
    pub fn from_command(cmd: &str) -> Option<WatchFlags> {
        let body = cmd
            .trim()
            .strip_prefix("?WATCH=")?
            .strip_suffix(';')?;
        let watch: Watch = serde_json::from_str(body).ok()?;
        Some(WatchFlags::from_watch(&watch))
    }
}
