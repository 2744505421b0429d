use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a #RRGGBB or #RRGGBBAA colour")]
pub struct ParseColorError(pub String);

/// A colour with four channels normalised to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub const GRAY: Rgba = Rgba {
        red: 128.0 / 255.0,
        green: 128.0 / 255.0,
        blue: 128.0 / 255.0,
        alpha: 1.0,
    };

    pub fn opaque(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue, alpha: 1.0 }
    }

    /// Parses `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Result<Self, ParseColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || ParseColorError(hex.to_string());

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        let channel = |shift: u32| ((value >> shift) & 0xFF) as f64 / 255.0;

        match digits.len() {
            6 => Ok(Self::opaque(channel(16), channel(8), channel(0))),
            8 => Ok(Self {
                red: channel(24),
                green: channel(16),
                blue: channel(8),
                alpha: channel(0),
            }),
            _ => Err(invalid()),
        }
    }

    /// Formats as `#RRGGBB`, or `#RRGGBBAA` when the colour is translucent.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a < 255 {
            format!("#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
        } else {
            format!("#{:02X}{:02X}{:02X}", r, g, b)
        }
    }

    /// Channels scaled to bytes. Values are clamped then truncated; the
    /// epsilon absorbs the rounding error of a `byte / 255.0` round trip.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0 + 1e-9) as u8;
        [byte(self.red), byte(self.green), byte(self.blue), byte(self.alpha)]
    }
}

impl FromStr for Rgba {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::GRAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digit_hex() {
        let color = Rgba::from_hex("#FF8000").unwrap();
        assert_eq!(color.to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(color.alpha, 1.0);
    }

    #[test]
    fn test_parse_eight_digit_hex_without_hash() {
        let color = Rgba::from_hex("00FF0080").unwrap();
        assert_eq!(color.to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(Rgba::from_hex("#FFF").is_err());
        assert!(Rgba::from_hex("#GG0000").is_err());
        assert!(Rgba::from_hex("#+F0000").is_err());
        assert!(Rgba::from_hex("").is_err());
    }

    #[test]
    fn test_to_hex_drops_opaque_alpha() {
        assert_eq!(Rgba::opaque(1.0, 0.0, 0.0).to_hex(), "#FF0000");
        assert_eq!(Rgba::GRAY.to_hex(), "#808080");

        let translucent = Rgba { red: 0.0, green: 0.0, blue: 1.0, alpha: 0.5 };
        assert_eq!(translucent.to_hex(), "#0000FF7F");
    }
}
