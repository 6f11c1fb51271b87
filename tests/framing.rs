//! Report decoding over an in-memory transport with controlled read
//! boundaries

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::rc::Rc;
use std::time::Duration;

use gpsd_client::{
    GpsdClient, MAX_CHANNELS, Report, ReportFlags, WatchFlags,
    client::{Transport, TransportCloser},
    error::{GpsdClientError, ReadError},
};

/// Delivers pre-cut chunks, one per read, then end-of-stream
#[derive(Debug)]
struct ChunkedTransport {
    chunks: VecDeque<Vec<u8>>,
    sent: Rc<RefCell<Vec<u8>>>,
}

impl ChunkedTransport {
    fn new(chunks: Vec<Vec<u8>>) -> Self {
        ChunkedTransport {
            chunks: chunks.into(),
            sent: Rc::default(),
        }
    }
}

impl Read for ChunkedTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

impl Write for ChunkedTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sent.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct NoopCloser;

impl TransportCloser for NoopCloser {
    fn close(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for ChunkedTransport {
    type Closer = NoopCloser;

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn closer(&self) -> std::io::Result<NoopCloser> {
        Ok(NoopCloser)
    }
}

fn frames() -> Vec<String> {
    let sats: Vec<String> = (1..=MAX_CHANNELS + 8)
        .map(|prn| format!(r#"{{"PRN":{prn},"el":{},"az":{},"ss":35,"used":{}}}"#, prn % 90, prn % 360, prn % 2 == 0))
        .collect();

    vec![
        r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#.into(),
        r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-05-01T12:00:01.000Z","lat":37.0,"lon":-122.0,"altMSL":100.0}"#.into(),
        format!(r#"{{"class":"SKY","device":"/dev/ttyUSB0","hdop":0.8,"pdop":1.4,"satellites":[{}]}}"#, sats.join(",")),
        r#"{"class":"ATT","device":"/dev/ttyUSB0","heading":90.0}"#.into(),
        r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":2,"time":"2024-05-01T12:00:02.000Z","lat":37.5,"lon":-122.5}"#.into(),
        r#"{"class":"GST","device":"/dev/ttyUSB0","rms":2.5,"major":4.0}"#.into(),
        r#"{"class":"SKY","device":"/dev/ttyUSB0","vdop":1.9}"#.into(),
    ]
}

/// Reads until end-of-stream, with receipt times blanked out
fn read_all(chunks: Vec<Vec<u8>>) -> Vec<Report> {
    let mut client = GpsdClient::from_transport(ChunkedTransport::new(chunks));
    let mut reports = Vec::new();
    loop {
        match client.read() {
            Ok(mut report) => {
                report.online = None;
                reports.push(report);
            }
            Err(GpsdClientError::Read(ReadError::Closed)) => return reports,
            Err(e) => panic!("unexpected error {e}"),
        }
    }
}

fn one_chunk_per_frame() -> Vec<Vec<u8>> {
    frames()
        .into_iter()
        .map(|frame| format!("{frame}\n").into_bytes())
        .collect()
}

#[test]
fn test_read_boundaries_do_not_matter() {
    let expected = read_all(one_chunk_per_frame());
    assert_eq!(expected.len(), frames().len());

    let stream: Vec<u8> = one_chunk_per_frame().concat();
    for size in [1, 2, 3, 7, 64, 100, 511, 4096, stream.len()] {
        let chunks = stream.chunks(size).map(<[u8]>::to_vec).collect();
        assert_eq!(read_all(chunks), expected, "chunk size {size}");
    }

    // uneven cuts, some landing exactly on newlines
    let mut chunks = Vec::new();
    let mut rest = stream.as_slice();
    let mut step = 1;
    while !rest.is_empty() {
        let n = step.min(rest.len());
        chunks.push(rest[..n].to_vec());
        rest = &rest[n..];
        step = step * 3 % 97 + 1;
    }
    assert_eq!(read_all(chunks), expected);
}

#[test]
fn test_reports_merge_across_cycles() {
    let reports = read_all(one_chunk_per_frame());

    let second_fix = &reports[4];
    assert_eq!(second_fix.fix.latitude, Some(37.5));
    assert_eq!(second_fix.fix.altitude, Some(100.0));
    assert_eq!(second_fix.dop.h, Some(0.8));
    assert_eq!(second_fix.skyview().len(), MAX_CHANNELS);

    let unmodelled = &reports[3];
    assert_eq!(unmodelled.set, ReportFlags::empty());

    let last = reports.last().unwrap();
    assert_eq!(last.dop.v, Some(1.9));
    assert_eq!(last.dop.p, Some(1.4));
    assert_eq!(last.noise.as_ref().and_then(|n| n.rms), Some(2.5));
    assert_eq!(last.version.as_ref().map(|v| v.proto_major), Some(3));
}

#[test]
fn test_satellite_sequences_are_clamped() {
    let reports = read_all(one_chunk_per_frame());
    let sky = &reports[2];

    assert!(sky.set.contains(ReportFlags::SATELLITE | ReportFlags::DOP));
    assert_eq!(sky.satellites_visible, MAX_CHANNELS + 8);
    assert_eq!(sky.satellites_used, (MAX_CHANNELS + 8) / 2);
    assert!(sky.used().len() <= MAX_CHANNELS);
    for len in [
        sky.prn().len(),
        sky.elevation().len(),
        sky.azimuth().len(),
        sky.ss().len(),
    ] {
        assert_eq!(len, MAX_CHANNELS.min(sky.satellites_visible));
    }
}

#[test]
fn test_waiting_sees_buffered_frames() {
    let stream = one_chunk_per_frame().concat();
    let mut client = GpsdClient::from_transport(ChunkedTransport::new(vec![stream]));

    let mut count = 0;
    while client.waiting(Duration::from_millis(10)).unwrap() {
        client.read().unwrap();
        count += 1;
        if count == frames().len() {
            break;
        }
    }
    assert_eq!(count, frames().len());
    assert!(matches!(
        client.waiting(Duration::from_millis(10)),
        Err(GpsdClientError::Read(ReadError::Closed))
    ));
}

#[test]
fn test_control_requests_are_written_verbatim() {
    let transport = ChunkedTransport::new(Vec::new());
    let sent = Rc::clone(&transport.sent);
    let mut client = GpsdClient::from_transport(transport);

    client.stream(WatchFlags::ENABLE | WatchFlags::JSON | WatchFlags::SCALED).unwrap();
    client.stream(WatchFlags::DISABLE).unwrap();
    client.poll().unwrap();
    client.request_version().unwrap();
    client.request_devices().unwrap();

    let sent = String::from_utf8(sent.borrow().clone()).unwrap();
    assert_eq!(
        sent,
        concat!(
            "?WATCH={\"enable\":true,\"json\":true,\"scaled\":true};\n",
            "?WATCH={\"enable\":false,\"json\":false};\n",
            "?POLL;\n",
            "?VERSION;\n",
            "?DEVICES;\n",
        )
    );
}
