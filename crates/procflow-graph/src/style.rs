//! Edge Style System
//!
//! Weight-driven edge encoding (stroke colour and width), swappable colour
//! palettes, and the fixed styles used for structural, ghost and
//! highlighted edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA color, serialized as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Linear interpolation between two colors, `t` clamped to `[0, 1]`.
    pub fn lerp(&self, other: Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value
            .strip_prefix('#')
            .ok_or_else(|| format!("color must start with '#': {value}"))?;
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|c| u8::from_str_radix(c, 16).ok())
                .ok_or_else(|| format!("invalid color: {value}"))
        };
        match hex.len() {
            6 => Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(format!("invalid color length: {value}")),
        }
    }
}

// ============================================================================
// Style Constants
// ============================================================================

/// Fallback stroke for edges whose original style was never cached.
pub const DEFAULT_EDGE_COLOR: Color = Color::rgb(51, 102, 204);
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// Weight-scaled stroke widths span this range.
pub const MIN_STROKE_WIDTH: f32 = 1.0;
pub const MAX_STROKE_WIDTH: f32 = 6.0;

pub const STRUCTURAL_EDGE_COLOR: Color = Color::rgb(160, 160, 160);
pub const STRUCTURAL_STROKE_WIDTH: f32 = 1.0;

pub const GHOST_EDGE_COLOR: Color = Color::rgba(150, 150, 150, 200);
pub const GHOST_STROKE_WIDTH: f32 = 1.5;

pub const HIGHLIGHT_COLOR: Color = Color::rgb(255, 140, 0);
pub const PATH_HIGHLIGHT_COLOR: Color = Color::rgb(220, 50, 47);
pub const HIGHLIGHT_EXTRA_WIDTH: f32 = 2.0;
pub const DIMMED_OPACITY: f32 = 0.25;

// ============================================================================
// Palettes
// ============================================================================

/// Maps an edge weight inside `[min, max]` to a stroke color.
pub trait ColorPalette: Send + Sync {
    fn color_for(&self, weight: f64, min: f64, max: f64) -> Color;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Blues,
    Viridis,
    Heat,
    Grayscale,
}

impl Palette {
    pub const ALL: [Palette; 4] = [
        Palette::Blues,
        Palette::Viridis,
        Palette::Heat,
        Palette::Grayscale,
    ];

    fn stops(&self) -> &'static [Color] {
        const BLUES: [Color; 3] = [
            Color::rgb(158, 202, 225),
            Color::rgb(66, 146, 198),
            Color::rgb(8, 48, 107),
        ];
        const VIRIDIS: [Color; 4] = [
            Color::rgb(68, 1, 84),
            Color::rgb(49, 104, 142),
            Color::rgb(53, 183, 121),
            Color::rgb(253, 231, 37),
        ];
        const HEAT: [Color; 3] = [
            Color::rgb(254, 217, 118),
            Color::rgb(253, 141, 60),
            Color::rgb(189, 0, 38),
        ];
        const GRAYSCALE: [Color; 2] = [Color::rgb(200, 200, 200), Color::rgb(40, 40, 40)];
        match self {
            Palette::Blues => &BLUES,
            Palette::Viridis => &VIRIDIS,
            Palette::Heat => &HEAT,
            Palette::Grayscale => &GRAYSCALE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Blues => "blues",
            Palette::Viridis => "viridis",
            Palette::Heat => "heat",
            Palette::Grayscale => "grayscale",
        }
    }
}

impl ColorPalette for Palette {
    fn color_for(&self, weight: f64, min: f64, max: f64) -> Color {
        let t = normalize_weight(weight, min, max);
        let stops = self.stops();
        let segments = (stops.len() - 1) as f64;
        let scaled = t * segments;
        let index = (scaled.floor() as usize).min(stops.len() - 2);
        stops[index].lerp(stops[index + 1], scaled - index as f64)
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::ALL
            .into_iter()
            .find(|p| p.name() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown palette: {s}"))
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Min-max normalization into `[0, 1]`.
///
/// When `max <= min` the range is widened to `min + 1` so equal weights all
/// normalize to `0`.
pub fn normalize_weight(weight: f64, min: f64, max: f64) -> f64 {
    let max = if max <= min { min + 1.0 } else { max };
    if !weight.is_finite() {
        return 0.0;
    }
    ((weight - min) / (max - min)).clamp(0.0, 1.0)
}

/// Linear scale of a normalized weight into the stroke width range.
pub fn stroke_width_for(normalized: f64) -> f32 {
    MIN_STROKE_WIDTH + (MAX_STROKE_WIDTH - MIN_STROKE_WIDTH) * normalized.clamp(0.0, 1.0) as f32
}

// ============================================================================
// Edge Style
// ============================================================================

/// Current edge style plus the cached base encoding it reverts to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: Color,
    pub stroke_width: f32,
    pub opacity: f32,
    pub dashed: bool,
    #[serde(default)]
    pub original_stroke: Option<Color>,
    #[serde(default)]
    pub original_stroke_width: Option<f32>,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_EDGE_COLOR,
            stroke_width: DEFAULT_STROKE_WIDTH,
            opacity: 1.0,
            dashed: false,
            original_stroke: None,
            original_stroke_width: None,
        }
    }
}

impl EdgeStyle {
    /// A style whose current and original encodings are both `stroke`/`width`.
    pub fn cached(stroke: Color, width: f32) -> Self {
        Self {
            stroke,
            stroke_width: width,
            opacity: 1.0,
            dashed: false,
            original_stroke: Some(stroke),
            original_stroke_width: Some(width),
        }
    }

    pub fn structural() -> Self {
        Self::cached(STRUCTURAL_EDGE_COLOR, STRUCTURAL_STROKE_WIDTH)
    }

    pub fn ghost() -> Self {
        Self {
            dashed: true,
            ..Self::cached(GHOST_EDGE_COLOR, GHOST_STROKE_WIDTH)
        }
    }

    pub fn base_stroke(&self) -> Color {
        self.original_stroke.unwrap_or(DEFAULT_EDGE_COLOR)
    }

    pub fn base_width(&self) -> f32 {
        self.original_stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH)
    }

    /// Back to the cached original encoding.
    pub fn restored(&self) -> Self {
        Self {
            stroke: self.base_stroke(),
            stroke_width: self.base_width(),
            opacity: 1.0,
            ..*self
        }
    }

    pub fn highlighted(&self, color: Color) -> Self {
        Self {
            stroke: color,
            stroke_width: self.base_width() + HIGHLIGHT_EXTRA_WIDTH,
            opacity: 1.0,
            ..*self
        }
    }

    pub fn dimmed(&self) -> Self {
        Self {
            opacity: DIMMED_OPACITY,
            ..self.restored()
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.stroke != self.base_stroke()
            || self.stroke_width != self.base_width()
            || self.opacity != 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_weight_spreads_range() {
        let weights = [5.0, 10.0, 15.0];
        let normalized: Vec<f64> = weights
            .iter()
            .map(|w| normalize_weight(*w, 5.0, 15.0))
            .collect();
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_equal_weights_is_defined() {
        for w in [7.0, 7.0, 7.0] {
            assert_eq!(normalize_weight(w, 7.0, 7.0), 0.0);
        }
    }

    #[test]
    fn test_stroke_width_range() {
        assert_eq!(stroke_width_for(0.0), MIN_STROKE_WIDTH);
        assert_eq!(stroke_width_for(1.0), MAX_STROKE_WIDTH);
        assert_eq!(stroke_width_for(0.5), 3.5);
    }

    #[test]
    fn test_color_hex_roundtrip() {
        let color = Color::rgba(1, 2, 255, 128);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"#0102ff80\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
        assert!(Color::try_from("123456".to_string()).is_err());
        assert!(Color::try_from("#12".to_string()).is_err());
    }

    #[test]
    fn test_palette_endpoints_match_stops() {
        for palette in Palette::ALL {
            let stops = palette.stops();
            assert_eq!(palette.color_for(0.0, 0.0, 10.0), stops[0]);
            assert_eq!(palette.color_for(10.0, 0.0, 10.0), stops[stops.len() - 1]);
        }
    }

    #[test]
    fn test_palette_from_str() {
        assert_eq!("Heat".parse::<Palette>(), Ok(Palette::Heat));
        assert!("rainbow".parse::<Palette>().is_err());
    }

    #[test]
    fn test_highlight_then_restore_is_exact() {
        let base = EdgeStyle::cached(Color::rgb(10, 20, 30), 3.25);
        let highlighted = base.highlighted(HIGHLIGHT_COLOR);
        assert!(highlighted.is_overridden());
        let again = highlighted.highlighted(HIGHLIGHT_COLOR);
        assert_eq!(again.stroke_width, 3.25 + HIGHLIGHT_EXTRA_WIDTH);
        assert_eq!(again.restored(), base);
    }

    #[test]
    fn test_uncached_style_falls_back_to_default_blue() {
        let style = EdgeStyle {
            stroke: HIGHLIGHT_COLOR,
            stroke_width: 9.0,
            ..EdgeStyle::default()
        };
        let restored = style.restored();
        assert_eq!(restored.stroke, DEFAULT_EDGE_COLOR);
        assert_eq!(restored.stroke_width, DEFAULT_STROKE_WIDTH);
    }

    proptest! {
        #[test]
        fn prop_normalized_weight_in_unit_range(
            w in -1.0e6f64..1.0e6,
            min in -1.0e6f64..1.0e6,
            span in 0.0f64..1.0e6
        ) {
            let n = normalize_weight(w, min, min + span);
            prop_assert!((0.0..=1.0).contains(&n));
        }
    }
}
