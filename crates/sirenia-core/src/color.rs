use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color value: {value}")]
pub struct ColorError {
    pub value: String,
}

/// A color as accepted from theme payloads.
///
/// Every form normalizes through [`ColorValue::normalize`] to the single representation handed
/// to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    /// `0xRRGGBB`.
    Numeric(u32),
    /// Hex (`#rgb`, `#rrggbb`, `#rrggbbaa`), CSS named colors, `rgb()/rgba()/hsl()/hsla()`.
    Text(String),
    Rgb {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        a: Option<f64>,
    },
    /// Hue in degrees; saturation and lightness in percent.
    Hsl {
        h: f64,
        s: f64,
        l: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        a: Option<f64>,
    },
}

impl From<&str> for ColorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ColorValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl ColorValue {
    pub fn to_rgba(&self) -> Result<Rgba, ColorError> {
        match self {
            Self::Numeric(n) if *n <= 0xff_ffff => Ok(Rgba {
                r: (n >> 16) as u8,
                g: (n >> 8) as u8,
                b: *n as u8,
                a: 255,
            }),
            Self::Numeric(n) => Err(ColorError {
                value: format!("{n:#x}"),
            }),
            Self::Text(s) => s.parse(),
            Self::Rgb { r, g, b, a } => Ok(Rgba {
                r: channel(*r),
                g: channel(*g),
                b: channel(*b),
                a: alpha(*a),
            }),
            Self::Hsl { h, s, l, a } => {
                let (r, g, b) = hsl_to_rgb01(*h, *s, *l);
                Ok(Rgba {
                    r: channel(r * 255.0),
                    g: channel(g * 255.0),
                    b: channel(b * 255.0),
                    a: alpha(*a),
                })
            }
        }
    }

    pub fn normalize(&self) -> Result<String, ColorError> {
        self.to_rgba().map(|c| c.to_string())
    }
}

/// Normalized 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl FromStr for Rgba {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match svgtypes::Color::from_str(s.trim()) {
            Ok(c) => Ok(Rgba {
                r: c.red,
                g: c.green,
                b: c.blue,
                a: c.alpha,
            }),
            Err(_) => Err(ColorError {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Rgba {
    /// `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            return write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b);
        }
        let a = format!("{:.3}", f64::from(self.a) / 255.0);
        let a = a.trim_end_matches('0').trim_end_matches('.');
        let a = if a.is_empty() { "0" } else { a };
        write!(f, "rgba({}, {}, {}, {a})", self.r, self.g, self.b)
    }
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn alpha(a: Option<f64>) -> u8 {
    a.map_or(255, |a| (a.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn hsl_to_rgb01(h_deg: f64, s_pct: f64, l_pct: f64) -> (f64, f64, f64) {
    let h = (h_deg / 360.0).rem_euclid(1.0);
    let s = (s_pct / 100.0).clamp(0.0, 1.0);
    let l = (l_pct / 100.0).clamp(0.0, 1.0);

    if s == 0.0 {
        return (l, l, l);
    }

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

/// Expands shorthand role names (`primary`, `line`, ...) to the engine's canonical keys.
/// Unknown keys are returned unchanged.
pub fn canonical_role(key: &str) -> &str {
    match key {
        "primary" => "primaryColor",
        "primaryText" => "primaryTextColor",
        "primaryBorder" => "primaryBorderColor",
        "secondary" => "secondaryColor",
        "secondaryText" => "secondaryTextColor",
        "secondaryBorder" => "secondaryBorderColor",
        "tertiary" => "tertiaryColor",
        "tertiaryText" => "tertiaryTextColor",
        "tertiaryBorder" => "tertiaryBorderColor",
        "line" => "lineColor",
        "text" => "textColor",
        "background" | "bg" => "background",
        other => other,
    }
}
