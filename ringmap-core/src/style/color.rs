//! CSS color strings as used by style paint properties.

use std::fmt;

/// Straight (non-premultiplied) RGBA, each channel in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `hsl()`, `hsla()`, `rgb()`, `rgba()`, `#rgb`, `#rrggbb` or
    /// `transparent`.
    pub fn parse(input: &str) -> Option<Color> {
        let s = input.trim().to_ascii_lowercase();
        if s == "transparent" {
            return Some(Color::TRANSPARENT);
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }

        let (name, args) = s.split_once('(')?;
        let args: Vec<&str> = args.strip_suffix(')')?.split(',').map(str::trim).collect();
        match (name.trim(), args.as_slice()) {
            ("hsl", [h, sat, l]) => Some(hsl(number(h)?, percent(sat)?, percent(l)?, 1.0)),
            ("hsla", [h, sat, l, a]) => Some(hsl(number(h)?, percent(sat)?, percent(l)?, alpha(a)?)),
            ("rgb", [r, g, b]) => Some(Color::rgba(channel(r)?, channel(g)?, channel(b)?, 1.0)),
            ("rgba", [r, g, b, a]) => {
                Some(Color::rgba(channel(r)?, channel(g)?, channel(b)?, alpha(a)?))
            }
            _ => None,
        }
    }

    /// Component-wise linear blend, `t` clamped to `0..=1`.
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: f64, y: f64| x + (y - x) * t;
        Color::rgba(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, _] = self.to_rgba8();
        let a = (self.a.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
        write!(f, "rgba({r}, {g}, {b}, {a})")
    }
}

fn number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn percent(s: &str) -> Option<f64> {
    Some((number(s.strip_suffix('%')?)? / 100.0).clamp(0.0, 1.0))
}

fn alpha(s: &str) -> Option<f64> {
    Some(number(s)?.clamp(0.0, 1.0))
}

fn channel(s: &str) -> Option<f64> {
    Some((number(s)? / 255.0).clamp(0.0, 1.0))
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;
    let (r, g, b) = match digits.as_slice() {
        [r, g, b] => (r * 17, g * 17, b * 17),
        [r1, r2, g1, g2, b1, b2] => (r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2),
        _ => return None,
    };
    Some(Color::rgba(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
        1.0,
    ))
}

fn hsl(h: f64, s: f64, l: f64, a: f64) -> Color {
    let h = h.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Color::rgba(r + m, g + m, b + m, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_hsla_white_with_alpha() {
        let c = Color::parse("hsla(233, 0%, 100%, 0.94)").unwrap();
        assert!(approx(c.r, 1.0) && approx(c.g, 1.0) && approx(c.b, 1.0));
        assert!(approx(c.a, 0.94));
    }

    #[test]
    fn test_hsl_saturated() {
        let red = Color::parse("hsl(0, 100%, 50%)").unwrap();
        assert_eq!(red.to_rgba8(), [255, 0, 0, 255]);
        let blue = Color::parse("hsl(240, 100%, 50%)").unwrap();
        assert_eq!(blue.to_rgba8(), [0, 0, 255, 255]);
    }

    #[test]
    fn test_hsl_water_tint() {
        let c = Color::parse("hsl(231, 14%, 84%)").unwrap();
        assert_eq!(c.to_rgba8(), [208, 210, 220, 255]);
    }

    #[test]
    fn test_rgb_and_hex() {
        assert_eq!(Color::parse("rgb(10, 20, 30)").unwrap().to_rgba8(), [10, 20, 30, 255]);
        assert_eq!(Color::parse("#fff").unwrap().to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(Color::parse("#0a141e").unwrap().to_rgba8(), [10, 20, 30, 255]);
        assert_eq!(Color::parse("transparent"), Some(Color::TRANSPARENT));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Color::parse("hsla(1, 2, 3)").is_none());
        assert!(Color::parse("#12").is_none());
        assert!(Color::parse("red-ish").is_none());
        assert!(Color::parse("hsl(0, 10%, 10%").is_none());
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = Color::rgba(0.0, 0.0, 0.0, 0.0);
        let b = Color::rgba(1.0, 0.5, 0.0, 1.0);
        let mid = a.lerp(b, 0.5);
        assert!(approx(mid.r, 0.5) && approx(mid.g, 0.25) && approx(mid.a, 0.5));
        assert_eq!(a.lerp(b, 3.0), b);
    }

    #[test]
    fn test_display() {
        let c = Color::parse("hsla(0, 0%, 100%, 0.51)").unwrap();
        assert_eq!(c.to_string(), "rgba(255, 255, 255, 0.51)");
    }
}
