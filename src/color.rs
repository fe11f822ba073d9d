use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use crate::data::model::Value;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn to_color32(rgb: Srgb) -> Color32 {
    let rgb: Srgb<u8> = rgb.into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            to_color32(hsl.into_color())
        })
        .collect()
}

/// Parse `#rrggbb` (the form stored in the config).
pub fn parse_hex(hex: &str) -> Option<Color32> {
    let rgb: Srgb<u8> = hex.trim().parse().ok()?;
    Some(Color32::from_rgb(rgb.red, rgb.green, rgb.blue))
}

pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

// ---------------------------------------------------------------------------
// Sequential colour scale for density plots
// ---------------------------------------------------------------------------

const VIRIDIS: [(f32, f32, f32); 5] = [
    (0.267, 0.005, 0.329),
    (0.231, 0.322, 0.545),
    (0.129, 0.569, 0.549),
    (0.369, 0.788, 0.384),
    (0.993, 0.906, 0.144),
];

/// Viridis-like colour for `t` in `[0, 1]`, interpolated in linear RGB.
pub fn viridis(t: f32) -> Color32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let lin = |(r, g, b): (f32, f32, f32)| -> LinSrgb { Srgb::new(r, g, b).into_linear() };
    let mixed = lin(VIRIDIS[i]).mix(lin(VIRIDIS[i + 1]), scaled - i as f32);
    to_color32(Srgb::from_linear(mixed))
}

// ---------------------------------------------------------------------------
// Color mapping: column value → Color32
// ---------------------------------------------------------------------------

/// Maps the distinct values of the colour-by column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<Value, Color32>,
    default_color: Color32,
}

impl ColorMap {
    pub fn new<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut unique: Vec<&Value> = values.into_iter().collect();
        unique.sort();
        unique.dedup();
        let palette = generate_palette(unique.len());
        ColorMap {
            mapping: unique.into_iter().cloned().zip(palette).collect(),
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, value: &Value) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let p = generate_palette(6);
        assert_eq!(p.len(), 6);
        for (i, a) in p.iter().enumerate() {
            assert!(p[i + 1..].iter().all(|b| a != b));
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn hex_round_trip() {
        let c = parse_hex("#1f77b4").unwrap();
        assert_eq!(c, Color32::from_rgb(0x1f, 0x77, 0xb4));
        assert_eq!(to_hex(c), "#1f77b4");
        assert!(parse_hex("blue-ish").is_none());
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0), viridis(-1.0));
        assert_eq!(viridis(1.0), viridis(2.0));
        assert_ne!(viridis(0.0), viridis(1.0));
        // dark purple to yellow
        assert!(viridis(0.0).b() > viridis(0.0).g());
        assert!(viridis(1.0).r() > 200 && viridis(1.0).g() > 200);
    }

    #[test]
    fn colour_map_dedups_values() {
        let values = [
            Value::String("g".into()),
            Value::String("r".into()),
            Value::String("g".into()),
        ];
        let cm = ColorMap::new(&values);
        assert_eq!(cm.len(), 2);
        assert_ne!(
            cm.color_for(&Value::String("g".into())),
            cm.color_for(&Value::String("r".into()))
        );
        assert_eq!(cm.color_for(&Value::Integer(1)), Color32::GRAY);
    }
}
