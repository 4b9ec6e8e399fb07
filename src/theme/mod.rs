//! Per-tenant branding rendered as CSS custom properties.

use std::fmt::Write;
use thiserror::Error;

use crate::store::Branding;

const LIGHT_FOREGROUND: Rgb = Rgb(0xff, 0xff, 0xff);
const DARK_FOREGROUND: Rgb = Rgb(0x0f, 0x17, 0x2a);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThemeError {
    #[error("invalid color for {field}: '{value}'")]
    InvalidColor { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rgb` or `#rrggbb`
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut digits = hex.chars().map(|c| c.to_string().repeat(2));
                Some(Rgb(
                    channel(&digits.next()?)?,
                    channel(&digits.next()?)?,
                    channel(&digits.next()?)?,
                ))
            }
            6 => Some(Rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// WCAG 2.x relative luminance
    pub fn luminance(self) -> f64 {
        fn linear(c: u8) -> f64 {
            let c = c as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linear(self.0) + 0.7152 * linear(self.1) + 0.0722 * linear(self.2)
    }

    pub fn contrast(self, other: Rgb) -> f64 {
        let (a, b) = (self.luminance(), other.luminance());
        let (hi, lo) = if a > b { (a, b) } else { (b, a) };
        (hi + 0.05) / (lo + 0.05)
    }

    /// Readable text color on top of this background
    pub fn foreground(self) -> Rgb {
        if self.contrast(LIGHT_FOREGROUND) >= self.contrast(DARK_FOREGROUND) {
            LIGHT_FOREGROUND
        } else {
            DARK_FOREGROUND
        }
    }
}

fn color(field: &'static str, value: &str) -> Result<Rgb, ThemeError> {
    Rgb::parse_hex(value).ok_or_else(|| ThemeError::InvalidColor {
        field,
        value: value.to_string(),
    })
}

/// Render the `:root` block injected into every tenant page
pub fn theme_css(branding: &Branding) -> Result<String, ThemeError> {
    let primary = color("primaryColor", &branding.primary_color)?;
    let secondary = color("secondaryColor", &branding.secondary_color)?;
    let accent = match &branding.accent_color {
        Some(value) => color("accentColor", value)?,
        None => secondary,
    };

    let mut css = String::from(":root {\n");
    for (name, rgb) in [("primary", primary), ("secondary", secondary), ("accent", accent)] {
        // Writing to a String cannot fail
        let _ = writeln!(css, "  --{}: {};", name, rgb.to_hex());
        let _ = writeln!(css, "  --{}-foreground: {};", name, rgb.foreground().to_hex());
    }
    css.push_str("}\n");
    Ok(css)
}
