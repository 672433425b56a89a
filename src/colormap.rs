//! Sequential colormaps for heatmaps and density bands.
//!
//! `Oranges`, `Blues` and `Viridis` are the `colorous` gradients. `Rocket` has no
//! `colorous` counterpart; it is a short anchor table interpolated linearly in RGB.

use crate::palette::Rgb;
use colorous::Gradient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Colormap {
    /// White to dark orange.
    #[default]
    Oranges,
    /// White to dark blue.
    Blues,
    /// Near-black through red to cream; the clustermap default.
    Rocket,
    /// Purple through teal to yellow.
    Viridis,
}

const ROCKET: [Rgb; 5] = [
    Rgb(0x03, 0x05, 0x1a),
    Rgb(0x4c, 0x1d, 0x4b),
    Rgb(0xcb, 0x1b, 0x4f),
    Rgb(0xf6, 0x9c, 0x73),
    Rgb(0xfa, 0xeb, 0xdd),
];

fn eval(gradient: &Gradient, t: f64) -> Rgb {
    let c = gradient.eval_continuous(t);
    Rgb(c.r, c.g, c.b)
}

fn interpolate(anchors: &[Rgb], t: f64) -> Rgb {
    let segments = (anchors.len() - 1) as f64;
    let pos = t * segments;
    let lo = (pos.floor() as usize).min(anchors.len() - 2);
    let frac = pos - lo as f64;
    let (a, b) = (anchors[lo], anchors[lo + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

impl Colormap {
    /// Map `t` in [0, 1] to a color. Values outside are clamped; NaN maps to 0.
    pub fn at(self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Colormap::Oranges => eval(&colorous::ORANGES, t),
            Colormap::Blues => eval(&colorous::BLUES, t),
            Colormap::Viridis => eval(&colorous::VIRIDIS, t),
            Colormap::Rocket => interpolate(&ROCKET, t),
        }
    }

    /// Map `v` from `[lo, hi]` to a color. A degenerate range maps to the midpoint.
    pub fn scaled(self, v: f64, lo: f64, hi: f64) -> Rgb {
        if !(hi > lo) {
            return self.at(0.5);
        }
        self.at((v - lo) / (hi - lo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn endpoints_follow_the_gradients() {
        let c = colorous::BLUES.eval_continuous(1.0);
        assert_eq!(Colormap::Blues.at(1.0), Rgb(c.r, c.g, c.b));
        let c = colorous::ORANGES.eval_continuous(0.0);
        assert_eq!(Colormap::Oranges.at(-3.0), Rgb(c.r, c.g, c.b));
        assert_eq!(Colormap::Rocket.at(f64::NAN), ROCKET[0]);
        assert_eq!(Colormap::Rocket.at(1.0), ROCKET[4]);
        assert_eq!(Colormap::Viridis.scaled(2.0, 2.0, 2.0), Colormap::Viridis.at(0.5));
    }

    #[test]
    fn light_end_is_light_for_sequential_maps() {
        for cmap in [Colormap::Oranges, Colormap::Blues] {
            let (lo, hi) = (cmap.at(0.0), cmap.at(1.0));
            let lum = |c: Rgb| c.0 as u32 + c.1 as u32 + c.2 as u32;
            assert!(lum(lo) > lum(hi), "{cmap:?}");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_rocket_brightens_monotonically(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            // Red is non-decreasing along the Rocket anchors.
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Colormap::Rocket.at(hi).0 >= Colormap::Rocket.at(lo).0);
        }
    }
}
