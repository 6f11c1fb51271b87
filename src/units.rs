//! Unit conversion factors
//!
//! Scalar factors for converting the SI units gpsd reports (meters,
//! meters per second) and nautical units into common alternatives.
//! Values match the daemon's `gps.h`.

/// Meters to U.S./British feet
pub const METERS_TO_FEET: f64 = 3.2808399;
/// Meters to statute miles
pub const METERS_TO_MILES: f64 = 0.00062137119;
/// Meters to fathoms
pub const METERS_TO_FATHOMS: f64 = 0.54680665;
/// Knots to miles per hour
pub const KNOTS_TO_MPH: f64 = 1.1507794;
/// Knots to kilometers per hour
pub const KNOTS_TO_KPH: f64 = 1.852;
/// Knots to meters per second
pub const KNOTS_TO_MPS: f64 = 0.51444444;
/// Meters per second to kilometers per hour
pub const MPS_TO_KPH: f64 = 3.6;
/// Meters per second to miles per hour
pub const MPS_TO_MPH: f64 = 2.2369363;
/// Meters per second to knots
pub const MPS_TO_KNOTS: f64 = 1.9438445;

/// All conversion factors by name, for exporting to other environments
pub const UNITS: &[(&str, f64)] = &[
    ("METERS_TO_FEET", METERS_TO_FEET),
    ("METERS_TO_MILES", METERS_TO_MILES),
    ("METERS_TO_FATHOMS", METERS_TO_FATHOMS),
    ("KNOTS_TO_MPH", KNOTS_TO_MPH),
    ("KNOTS_TO_KPH", KNOTS_TO_KPH),
    ("KNOTS_TO_MPS", KNOTS_TO_MPS),
    ("MPS_TO_KPH", MPS_TO_KPH),
    ("MPS_TO_MPH", MPS_TO_MPH),
    ("MPS_TO_KNOTS", MPS_TO_KNOTS),
];
