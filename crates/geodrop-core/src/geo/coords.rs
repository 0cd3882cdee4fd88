//! Latitude and longitude as typed by a source.
//!
//! Values may carry a cardinal suffix or prefix (`40.7N`, `w74`), in any
//! case. `S` and `W` force a negative value, `N` and `E` a positive one.

use crate::error::{GeoDropError, GeoDropResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }
}

/// Parse a latitude/longitude pair into `(lat, lng)`.
pub fn parse_lat_lng(lat: &str, lng: &str) -> GeoDropResult<(f64, f64)> {
    Ok((
        parse_ordinate(lat, Axis::Latitude)?,
        parse_ordinate(lng, Axis::Longitude)?,
    ))
}

fn parse_ordinate(raw: &str, axis: Axis) -> GeoDropResult<f64> {
    let upper = raw.trim().to_ascii_uppercase();
    let invalid = || GeoDropError::InvalidCoordinate(format!("{} {:?}", axis.name(), raw));

    let mut rest = upper.as_str();
    let mut sign: Option<f64> = None;
    for at_end in [false, true] {
        let c = if at_end { rest.chars().last() } else { rest.chars().next() };
        let Some(c @ ('N' | 'E' | 'S' | 'W')) = c else {
            continue;
        };
        let s = if matches!(c, 'S' | 'W') { -1.0 } else { 1.0 };
        let fits_axis = match axis {
            Axis::Latitude => matches!(c, 'N' | 'S'),
            Axis::Longitude => matches!(c, 'E' | 'W'),
        };
        if !fits_axis || sign.is_some_and(|prev| prev != s) {
            return Err(invalid());
        }
        sign = Some(s);
        rest = if at_end { &rest[..rest.len() - 1] } else { &rest[1..] };
        rest = rest.trim();
    }

    // Spaces may separate the number from its cardinal or degree sign, never
    // split the number itself.
    let digits = rest.strip_suffix('\u{b0}').unwrap_or(rest).trim_end();
    if digits.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let value: f64 = digits.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    let value = match sign {
        Some(s) => value.abs() * s,
        None => value,
    };
    if value.abs() > axis.limit() {
        return Err(GeoDropError::InvalidCoordinate(format!(
            "{} {} is out of range",
            axis.name(),
            value
        )));
    }
    Ok(value)
}
