// 24-bit RGB colours and linear interpolation between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("colour must look like #rrggbb, got {0:?}")]
    BadFormat(String),
}

/// An 8-bit-per-channel RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ColorParseError::BadFormat(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(bad)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(bad());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Blend `from` towards `to` by `t`, channel by channel.
///
/// `t` is expected in [0, 1]; values outside are clamped so a late timer
/// tick can never overshoot the end colour.
pub fn interpolate(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let mix = |a: u8, b: u8| {
        let a = f64::from(a);
        let b = f64::from(b);
        (a + (b - a) * t).round() as u8
    };
    Rgb::new(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLD: Rgb = Rgb::new(0xff, 0xd5, 0x4f);
    const SLATE: Rgb = Rgb::new(0x3a, 0x3a, 0x3a);

    #[test]
    fn endpoints_are_exact() {
        let samples = [
            (Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)),
            (GOLD, SLATE),
            (Rgb::new(17, 200, 3), Rgb::new(17, 200, 3)),
            (Rgb::new(255, 0, 128), Rgb::new(0, 255, 127)),
        ];
        for (a, b) in samples {
            assert_eq!(interpolate(a, b, 0.0), a);
            assert_eq!(interpolate(a, b, 1.0), b);
        }
    }

    #[test]
    fn midpoint_rounds_per_channel() {
        let mid = interpolate(Rgb::new(0, 10, 255), Rgb::new(255, 11, 0), 0.5);
        // 127.5 -> 128, 10.5 -> 11, 127.5 -> 128
        assert_eq!(mid, Rgb::new(128, 11, 128));
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        assert_eq!(interpolate(GOLD, SLATE, -0.3), GOLD);
        assert_eq!(interpolate(GOLD, SLATE, 1.7), SLATE);
        assert_eq!(interpolate(GOLD, SLATE, f64::NAN), GOLD);
    }

    #[test]
    fn parse_hex() {
        assert_eq!("#ffd54f".parse::<Rgb>().unwrap(), GOLD);
        assert_eq!(" #3A3A3A ".parse::<Rgb>().unwrap(), SLATE);
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["ffd54f", "#ffd54", "#ffd54f0", "#gg0000", "#ééé"] {
            assert!(bad.parse::<Rgb>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        assert_eq!(GOLD.to_string(), "#ffd54f");
        assert_eq!(GOLD.to_string().parse::<Rgb>().unwrap(), GOLD);
    }
}
