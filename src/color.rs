//! Display colors for newly imported tracks.
//!
//! Hues inside the reserved band (80..=160 by default, the greens) are
//! resampled so generated track colors stay distinct from the fixed reference
//! color used elsewhere.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorConfig {
    /// First reserved hue (inclusive). Default: 80
    pub reserved_hue_min: u16,
    /// Last reserved hue (inclusive). Default: 160
    pub reserved_hue_max: u16,
    /// Saturation percent. Default: 90
    pub saturation: u8,
    /// Lightness percent. Default: 50
    pub lightness: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            reserved_hue_min: 80,
            reserved_hue_max: 160,
            saturation: 90,
            lightness: 50,
        }
    }
}

impl ColorConfig {
    /// Reserved band actually applied. A band that would reserve every hue
    /// falls back to the default band so sampling always terminates.
    fn reserved_band(&self) -> (u16, u16) {
        if self.reserved_hue_min == 0 && self.reserved_hue_max >= 359 {
            let d = ColorConfig::default();
            (d.reserved_hue_min, d.reserved_hue_max)
        } else {
            (self.reserved_hue_min, self.reserved_hue_max)
        }
    }
}

/// Random track color with the default configuration.
pub fn next_color() -> String {
    next_color_with(&mut rand::thread_rng(), &ColorConfig::default())
}

/// Random track color drawn from `rng`, as `hsl(H, S%, L%)`.
pub fn next_color_with<R: Rng + ?Sized>(rng: &mut R, config: &ColorConfig) -> String {
    let (lo, hi) = config.reserved_band();
    let hue = loop {
        let hue: u16 = rng.gen_range(0..360);
        if hue < lo || hue > hi {
            break hue;
        }
    };
    format!("hsl({}, {}%, {}%)", hue, config.saturation, config.lightness)
}

/// Hue of an `hsl(...)` color string.
pub fn hue_of(color: &str) -> Option<f64> {
    let inner = color.trim().strip_prefix("hsl(")?.strip_suffix(')')?;
    inner.split(',').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reserved_band_never_sampled() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = ColorConfig::default();
        for _ in 0..10_000 {
            let color = next_color_with(&mut rng, &config);
            let hue = hue_of(&color).unwrap();
            assert!((0.0..360.0).contains(&hue));
            assert!(!(80.0..=160.0).contains(&hue), "reserved hue in {}", color);
        }
    }

    #[test]
    fn test_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let color = next_color_with(&mut rng, &ColorConfig::default());
        assert!(color.starts_with("hsl("));
        assert!(color.ends_with(", 90%, 50%)"));
        assert!(!next_color().is_empty());
    }

    #[test]
    fn test_full_reservation_falls_back() {
        let config = ColorConfig {
            reserved_hue_min: 0,
            reserved_hue_max: 359,
            ..ColorConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let hue = hue_of(&next_color_with(&mut rng, &config)).unwrap();
        assert!(!(80.0..=160.0).contains(&hue));
    }

    #[test]
    fn test_hue_of() {
        assert_eq!(hue_of("hsl(200, 90%, 50%)"), Some(200.0));
        assert_eq!(hue_of("#007bff"), None);
    }
}
