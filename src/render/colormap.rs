use image::Rgb;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Colormaps available for depth visualisation.
///
/// Names follow the usual `COLORMAP_*` spelling; parsing is case-insensitive
/// and the prefix is optional (`jet`, `COLORMAP_JET` and `Colormap_Jet` all
/// resolve to [`Colormap::Jet`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Colormap {
    Autumn,
    Bone,
    Cool,
    Gray,
    Hot,
    Jet,
    Turbo,
}

impl Colormap {
    pub const ALL: [Colormap; 7] = [
        Colormap::Autumn,
        Colormap::Bone,
        Colormap::Cool,
        Colormap::Gray,
        Colormap::Hot,
        Colormap::Jet,
        Colormap::Turbo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Colormap::Autumn => "COLORMAP_AUTUMN",
            Colormap::Bone => "COLORMAP_BONE",
            Colormap::Cool => "COLORMAP_COOL",
            Colormap::Gray => "COLORMAP_GRAY",
            Colormap::Hot => "COLORMAP_HOT",
            Colormap::Jet => "COLORMAP_JET",
            Colormap::Turbo => "COLORMAP_TURBO",
        }
    }

    /// Colour for one 8-bit intensity.
    pub fn apply(&self, value: u8) -> Rgb<u8> {
        let t = value as f32 / 255.0;
        let (r, g, b) = match self {
            Colormap::Autumn => (1.0, t, 0.0),
            Colormap::Bone => {
                // grey ramp tinted by the channel-reversed hot map
                let (hr, hg, hb) = hot(t);
                ((7.0 * t + hb) / 8.0, (7.0 * t + hg) / 8.0, (7.0 * t + hr) / 8.0)
            }
            Colormap::Cool => (t, 1.0 - t, 1.0),
            Colormap::Gray => (t, t, t),
            Colormap::Hot => hot(t),
            Colormap::Jet => (
                1.5 - (4.0 * t - 3.0).abs(),
                1.5 - (4.0 * t - 2.0).abs(),
                1.5 - (4.0 * t - 1.0).abs(),
            ),
            Colormap::Turbo => turbo(t),
        };
        Rgb([channel(r), channel(g), channel(b)])
    }

    /// All 256 colours, indexed by intensity.
    pub fn lut(&self) -> [Rgb<u8>; 256] {
        let mut table = [Rgb([0, 0, 0]); 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = self.apply(i as u8);
        }
        table
    }
}

fn hot(t: f32) -> (f32, f32, f32) {
    (
        (3.0 * t).clamp(0.0, 1.0),
        (3.0 * t - 1.0).clamp(0.0, 1.0),
        (3.0 * t - 2.0).clamp(0.0, 1.0),
    )
}

// polynomial fit of the Turbo colormap
fn turbo(t: f32) -> (f32, f32, f32) {
    let r = 0.135_721_38
        + t * (4.615_392_6 + t * (-42.660_322 + t * (132.131_08 + t * (-152.942_39 + t * 59.286_38))));
    let g = 0.091_402_61
        + t * (2.194_188_4 + t * (4.842_966_6 + t * (-14.185_033 + t * (4.277_298_6 + t * 2.829_566))));
    let b = 0.106_673_3
        + t * (12.641_946 + t * (-60.582_05 + t * (110.362_77 + t * (-89.903_11 + t * 27.348_25))));
    (r, g, b)
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("COLORMAP_").unwrap_or(&upper);
        Colormap::ALL
            .into_iter()
            .find(|map| map.name().strip_prefix("COLORMAP_") == Some(bare))
            .ok_or_else(|| Error::UnknownColormap(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_or_without_prefix() {
        assert_eq!("COLORMAP_JET".parse::<Colormap>().unwrap(), Colormap::Jet);
        assert_eq!("jet".parse::<Colormap>().unwrap(), Colormap::Jet);
        assert_eq!("Colormap_Turbo".parse::<Colormap>().unwrap(), Colormap::Turbo);
        assert!(matches!(
            "COLORMAP_PLAID".parse::<Colormap>(),
            Err(Error::UnknownColormap(name)) if name == "COLORMAP_PLAID"
        ));
    }

    #[test]
    fn names_round_trip_through_display() {
        for map in Colormap::ALL {
            assert_eq!(map.to_string().parse::<Colormap>().unwrap(), map);
        }
    }

    #[test]
    fn gray_is_identity() {
        let lut = Colormap::Gray.lut();
        assert!(lut.iter().enumerate().all(|(i, c)| c.0 == [i as u8; 3]));
    }

    #[test]
    fn jet_runs_blue_to_red() {
        let lut = Colormap::Jet.lut();
        assert!(lut[0].0[2] > 100 && lut[0].0[0] == 0);
        assert!(lut[255].0[0] > 100 && lut[255].0[2] == 0);
        assert_eq!(lut[128].0[1], 255);
    }

    #[test]
    fn hot_ends_white() {
        assert_eq!(Colormap::Hot.apply(255).0, [255, 255, 255]);
        assert_eq!(Colormap::Hot.apply(0).0, [0, 0, 0]);
    }
}
