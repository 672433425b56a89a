//! Discrete state colors.
//!
//! A [`Palette`] maps an integer state (or flat-cluster) id to a display color. It is
//! passed explicitly into every plot; nothing here is process-wide.

use crate::{Error, Result};
use plotters::style::RGBColor;

/// An 8-bit RGB color.
///
/// Ordered and hashable so it can key the gene-cluster map returned by
/// [`crate::heatmap::plot_transition_clustermap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return Err(Error::Domain("hex color must have exactly 6 hex digits"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| Error::Domain("hex color contains a non-hex digit"))
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl From<Rgb> for RGBColor {
    fn from(c: Rgb) -> Self {
        RGBColor(c.0, c.1, c.2)
    }
}

impl From<RGBColor> for Rgb {
    fn from(c: RGBColor) -> Self {
        Rgb(c.0, c.1, c.2)
    }
}

/// Colors indexed by state id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Palette {
    pub state_colors: Vec<Rgb>,
}

const DEFAULT_STATE_COLORS: [Rgb; 20] = [
    Rgb(0x1f, 0x77, 0xb4),
    Rgb(0xff, 0x7f, 0x0e),
    Rgb(0x2c, 0xa0, 0x2c),
    Rgb(0xd6, 0x27, 0x28),
    Rgb(0x94, 0x67, 0xbd),
    Rgb(0x8c, 0x56, 0x4b),
    Rgb(0xe3, 0x77, 0xc2),
    Rgb(0x7f, 0x7f, 0x7f),
    Rgb(0xbc, 0xbd, 0x22),
    Rgb(0x17, 0xbe, 0xcf),
    Rgb(0xae, 0xc7, 0xe8),
    Rgb(0xff, 0xbb, 0x78),
    Rgb(0x98, 0xdf, 0x8a),
    Rgb(0xff, 0x98, 0x96),
    Rgb(0xc5, 0xb0, 0xd5),
    Rgb(0xc4, 0x9c, 0x94),
    Rgb(0xf7, 0xb6, 0xd2),
    Rgb(0xc7, 0xc7, 0xc7),
    Rgb(0xdb, 0xdb, 0x8d),
    Rgb(0x9e, 0xda, 0xe5),
];

impl Default for Palette {
    fn default() -> Self {
        Self {
            state_colors: DEFAULT_STATE_COLORS.to_vec(),
        }
    }
}

impl Palette {
    pub fn new(state_colors: Vec<Rgb>) -> Result<Self> {
        if state_colors.is_empty() {
            return Err(Error::Domain("palette must have at least one color"));
        }
        Ok(Self { state_colors })
    }

    /// Build a palette from `#rrggbb` strings.
    pub fn from_hex<S: AsRef<str>>(colors: &[S]) -> Result<Self> {
        let parsed = colors
            .iter()
            .map(|c| Rgb::from_hex(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    pub fn len(&self) -> usize {
        self.state_colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_colors.is_empty()
    }

    /// Color for `state`. Out-of-range ids are an error, not wrapped.
    pub fn color(&self, state: usize) -> Result<Rgb> {
        self.state_colors
            .get(state)
            .copied()
            .ok_or(Error::Domain("state id has no palette entry"))
    }

    /// Per-element colors for a label vector.
    pub fn colors_for(&self, labels: &[usize]) -> Result<Vec<Rgb>> {
        labels.iter().map(|&s| self.color(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_optional_hash() {
        assert_eq!(Rgb::from_hex("#ff7f0e").unwrap(), Rgb(255, 127, 14));
        assert_eq!(Rgb::from_hex("1f77b4").unwrap(), Rgb(0x1f, 0x77, 0xb4));
        assert_eq!(Rgb(0x1f, 0x77, 0xb4).to_hex(), "#1f77b4");
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("#gg0000").is_err());
    }

    #[test]
    fn out_of_range_state_is_an_error() {
        let p = Palette::from_hex(&["#000000", "#ffffff"]).unwrap();
        assert_eq!(p.color(1).unwrap(), Rgb(255, 255, 255));
        assert!(p.color(2).is_err());
        assert!(p.colors_for(&[0, 1, 5]).is_err());
    }

    #[test]
    fn default_palette_has_distinct_colors() {
        let p = Palette::default();
        let mut seen = p.state_colors.clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), p.len());
    }
}
