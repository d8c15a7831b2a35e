use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::constants::{CUSTOM_LANDSCAPE_WIDTH, CUSTOM_PORTRAIT_HEIGHT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AspectRatioError {
    #[error("unknown aspect ratio '{0}' (expected auto, instagram, square, iphone, landscape or W:H)")]
    Unknown(String),
    #[error("malformed aspect ratio '{0}' (expected two positive integers as W:H)")]
    Malformed(String),
}

/// Named output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectPreset {
    /// 4:5 portrait.
    Instagram,
    Square,
    /// 9:16 vertical.
    Iphone,
    /// 16:9.
    Landscape,
}

impl AspectPreset {
    pub fn target(self) -> TargetSize {
        match self {
            Self::Instagram => TargetSize::new(1080, 1350, 0.8),
            Self::Square => TargetSize::new(1080, 1080, 1.0),
            Self::Iphone => TargetSize::new(1080, 1920, 0.5625),
            Self::Landscape => TargetSize::new(1920, 1080, 1.777),
        }
    }
}

/// Requested output aspect ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AspectRatio {
    /// Size follows the tracked subject; no fixed ratio.
    #[default]
    Auto,
    Preset(AspectPreset),
    Custom { width: u32, height: u32 },
}

impl AspectRatio {
    /// Nominal output size, or `None` for [`AspectRatio::Auto`].
    pub fn target(&self) -> Option<TargetSize> {
        match *self {
            Self::Auto => None,
            Self::Preset(preset) => Some(preset.target()),
            Self::Custom { width, height } => {
                let ratio = width as f64 / height as f64;
                // Extreme ratios would floor the derived side to zero.
                Some(if ratio < 1.0 {
                    let h = CUSTOM_PORTRAIT_HEIGHT;
                    TargetSize::new(((h as f64 * ratio).floor() as u32).max(1), h, ratio)
                } else {
                    let w = CUSTOM_LANDSCAPE_WIDTH;
                    TargetSize::new(w, ((w as f64 / ratio).floor() as u32).max(1), ratio)
                })
            }
        }
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let preset = match name.as_str() {
            "" | "auto" => return Ok(Self::Auto),
            "instagram" | "4:5" => AspectPreset::Instagram,
            "square" | "1:1" => AspectPreset::Square,
            "iphone" | "9:16" => AspectPreset::Iphone,
            "landscape" | "16:9" => AspectPreset::Landscape,
            _ => {
                let Some((w, h)) = name.split_once(':') else {
                    return Err(AspectRatioError::Unknown(s.to_string()));
                };
                let malformed = || AspectRatioError::Malformed(s.to_string());
                let width: u32 = w.trim().parse().map_err(|_| malformed())?;
                let height: u32 = h.trim().parse().map_err(|_| malformed())?;
                if width == 0 || height == 0 {
                    return Err(malformed());
                }
                return Ok(Self::Custom { width, height });
            }
        };
        Ok(Self::Preset(preset))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Preset(AspectPreset::Instagram) => write!(f, "4:5"),
            Self::Preset(AspectPreset::Square) => write!(f, "1:1"),
            Self::Preset(AspectPreset::Iphone) => write!(f, "9:16"),
            Self::Preset(AspectPreset::Landscape) => write!(f, "16:9"),
            Self::Custom { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

/// Output frame size paired with the ratio crops must keep.
///
/// `ratio` is the nominal width / height and may differ slightly from
/// `width / height` after flooring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
}

impl TargetSize {
    pub fn new(width: u32, height: u32, ratio: f64) -> Self {
        Self {
            width,
            height,
            ratio,
        }
    }

    /// Scales down uniformly so both sides fit the source; never scales up.
    ///
    /// The limiting side takes the source size; the other side is derived
    /// from `ratio`.
    pub fn fit_within(&self, source_width: u32, source_height: u32) -> TargetSize {
        if self.width <= source_width && self.height <= source_height {
            return *self;
        }
        let (max_w, max_h) = (source_width.max(1), source_height.max(1));
        let width_limited = source_width as f64 / self.width as f64
            <= source_height as f64 / self.height as f64;
        let (width, height) = if width_limited {
            let h = ((max_w as f64 / self.ratio).round() as u32).clamp(1, max_h);
            (max_w, h)
        } else {
            let w = ((max_h as f64 * self.ratio).round() as u32).clamp(1, max_w);
            (w, max_h)
        };
        TargetSize {
            width,
            height,
            ratio: self.ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::instagram("instagram", 1080, 1350)]
    #[case::four_five("4:5", 1080, 1350)]
    #[case::square("Square", 1080, 1080)]
    #[case::one_one("1:1", 1080, 1080)]
    #[case::iphone("IPHONE", 1080, 1920)]
    #[case::nine_sixteen("9:16", 1080, 1920)]
    #[case::landscape("landscape", 1920, 1080)]
    #[case::sixteen_nine("16:9", 1920, 1080)]
    fn test_presets(#[case] name: &str, #[case] width: u32, #[case] height: u32) {
        let target = name.parse::<AspectRatio>().unwrap().target().unwrap();
        assert_eq!((target.width, target.height), (width, height));
    }

    #[test]
    fn test_landscape_ratio_constant() {
        let target = AspectPreset::Landscape.target();
        assert_relative_eq!(target.ratio, 1.777);
    }

    #[test]
    fn test_auto_has_no_target() {
        assert_eq!("auto".parse::<AspectRatio>().unwrap(), AspectRatio::Auto);
        assert_eq!("AUTO".parse::<AspectRatio>().unwrap().target(), None);
    }

    #[test]
    fn test_custom_portrait_anchored_on_height() {
        let target = "3:4".parse::<AspectRatio>().unwrap().target().unwrap();
        assert_eq!((target.width, target.height), (1012, 1350));
        assert_relative_eq!(target.ratio, 0.75);
    }

    #[test]
    fn test_custom_landscape_anchored_on_width() {
        let target = "21:9".parse::<AspectRatio>().unwrap().target().unwrap();
        assert_eq!((target.width, target.height), (1920, 822));
    }

    #[rstest]
    #[case::not_numbers("a:b")]
    #[case::zero_height("4:0")]
    #[case::negative("-4:5")]
    #[case::too_many("1:2:3")]
    fn test_malformed_custom(#[case] input: &str) {
        assert_eq!(
            input.parse::<AspectRatio>(),
            Err(AspectRatioError::Malformed(input.to_string()))
        );
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            "cinema".parse::<AspectRatio>(),
            Err(AspectRatioError::Unknown(_))
        ));
    }

    #[test]
    fn test_fit_within_scales_once() {
        let target = AspectPreset::Instagram.target().fit_within(1280, 720);
        // scale = min(1280/1080, 720/1350) = 0.5333
        assert_eq!((target.width, target.height), (576, 720));
        assert_relative_eq!(target.ratio, 0.8);
    }

    #[rstest]
    #[case::vertical_in_landscape("9:16", 640, 360, (203, 360))]
    #[case::wide_custom_in_square("7:3", 240, 240, (240, 103))]
    #[case::landscape_in_square("16:9", 500, 500, (500, 281))]
    fn test_fit_within_keeps_ratio(
        #[case] aspect: &str,
        #[case] source_width: u32,
        #[case] source_height: u32,
        #[case] expected: (u32, u32),
    ) {
        let target = aspect.parse::<AspectRatio>().unwrap().target().unwrap();
        let fitted = target.fit_within(source_width, source_height);
        assert_eq!((fitted.width, fitted.height), expected);
        let actual = fitted.width as f64 / fitted.height as f64;
        assert!((actual - target.ratio).abs() <= 0.01, "{actual} vs {}", target.ratio);
    }

    #[rstest]
    #[case::very_tall("1:2000", (1, 1350))]
    #[case::very_wide("5000:1", (1920, 1))]
    fn test_extreme_custom_ratio_never_zero(#[case] aspect: &str, #[case] expected: (u32, u32)) {
        let target = aspect.parse::<AspectRatio>().unwrap().target().unwrap();
        assert_eq!((target.width, target.height), expected);
    }

    #[test]
    fn test_fit_within_leaves_small_target() {
        let target = AspectPreset::Square.target();
        assert_eq!(target.fit_within(1920, 1080), target);
    }

    #[test]
    fn test_display_round_trip() {
        for name in ["auto", "4:5", "1:1", "9:16", "16:9", "3:2"] {
            let parsed: AspectRatio = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }
}
