use std::time::Duration;

use clap::Parser;
use gpsd_client::{Endpoint, GpsdClient, ReportFlags, WatchFlags, units};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// gpsd to connect to, as host, host:port or [v6addr]:port
    #[arg(default_value = "localhost:2947")]
    endpoint: Endpoint,
    /// Only watch this device
    #[arg(short, long)]
    device: Option<String>,
    /// Also ask for NMEA sentences
    #[arg(long)]
    nmea: bool,
    /// Ask the daemon to scale values to natural units
    #[arg(long)]
    scaled: bool,
    /// Include timing information
    #[arg(long)]
    timing: bool,
    /// Seconds to wait for each report before giving up
    #[arg(short, long, default_value = "5")]
    timeout: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut client = match GpsdClient::connect(&args.endpoint) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Cannot connect to {}: {e}", args.endpoint);
            return;
        }
    };

    let mut flags = WatchFlags::ENABLE | WatchFlags::JSON;
    flags.set(WatchFlags::NMEA, args.nmea);
    flags.set(WatchFlags::SCALED, args.scaled);
    flags.set(WatchFlags::TIMING, args.timing);

    let subscribed = match &args.device {
        Some(device) => client.stream_device(flags | WatchFlags::DEVICE, device),
        None => client.stream(flags),
    };
    if let Err(e) = subscribed {
        eprintln!("Cannot subscribe: {e}");
        return;
    }

    let timeout = Duration::from_secs(args.timeout);
    loop {
        match client.waiting(timeout) {
            Ok(true) => {}
            Ok(false) => {
                eprintln!("No report within {}s", args.timeout);
                break;
            }
            Err(e) => {
                eprintln!("Connection lost: {e}");
                return;
            }
        }

        let report = match client.read() {
            Ok(report) => report,
            Err(e) if e.is_recoverable() => {
                eprintln!("Skipping report: {e}");
                continue;
            }
            Err(e) => {
                eprintln!("Error receiving report: {e}");
                return;
            }
        };

        if report.set.contains(ReportFlags::VERSION) {
            if let Some(version) = &report.version {
                println!("GPSD Version: {}", version.release);
            }
        }
        if report.set.contains(ReportFlags::LATLON) {
            if let (Some(lat), Some(lon)) = (report.fix.latitude, report.fix.longitude) {
                println!("Current position: lat {lat:6.3}, lon {lon:6.3} ({:?})", report.fix.mode);
            }
            if let Some(alt) = report.fix.altitude {
                println!("Altitude: {alt:.1} m ({:.0} ft)", alt * units::METERS_TO_FEET);
            }
        }
        if report.set.contains(ReportFlags::SPEED) {
            if let Some(speed) = report.fix.speed {
                println!(
                    "Speed: {:.1} km/h, {:.1} kn",
                    speed * units::MPS_TO_KPH,
                    speed * units::MPS_TO_KNOTS
                );
            }
        }
        if report.set.contains(ReportFlags::SATELLITE) {
            println!(
                "Satellites in view: {}, used: {}",
                report.satellites_visible, report.satellites_used
            );
        }
    }

    client.close();
}
