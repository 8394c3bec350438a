//! Phase pattern generators.
//!
//! Every generator fills a display-sized [`Pattern`] with grayscale values in
//! `[0, 1023]`. Generators are plain parameter structs; [`PatternSpec`] wraps
//! them in a serde-tagged enum so a pattern can be described in TOML:
//!
//! ```toml
//! kind = "binary_grating"
//! phase = 512
//! period_px = 25
//! duty_cycle = 0.5
//! ```

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::calibration::MAX_GRAYSCALE;
use crate::error::{SlmError, SlmResult};
use crate::hardware::Dimensions;

/// Grayscale image for the display, shape `(height, width)`.
pub type Pattern = Array2<u16>;

/// Something that can draw a full-display pattern.
pub trait PatternGenerator {
    /// Draw the pattern for a display of size `dims`. Out-of-range parameters
    /// fail with [`SlmError::Configuration`].
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern>;
}

fn check_phase(name: &str, value: u16) -> SlmResult<()> {
    if value > MAX_GRAYSCALE {
        return Err(SlmError::Configuration(format!(
            "{name} must be within [0, {MAX_GRAYSCALE}], got {value}"
        )));
    }
    Ok(())
}

/// Same grayscale everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Uniform {
    /// Grayscale of every pixel.
    pub phase: u16,
}

impl Default for Uniform {
    fn default() -> Self {
        Self { phase: 50 }
    }
}

impl PatternGenerator for Uniform {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        check_phase("phase", self.phase)?;
        Ok(Pattern::from_elem(dims.shape(), self.phase))
    }
}

/// Sawtooth ramp from 0 to `max_phase` repeating every `period_px` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlazedGrating {
    /// Ramp length, at least 2.
    pub period_px: usize,
    /// Grayscale at the top of the ramp.
    pub max_phase: u16,
    /// Ramp along the columns (lines are vertical) instead of the rows.
    pub horizontal: bool,
}

impl Default for BlazedGrating {
    fn default() -> Self {
        Self {
            period_px: 50,
            max_phase: 1023,
            horizontal: false,
        }
    }
}

impl PatternGenerator for BlazedGrating {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        check_phase("max_phase", self.max_phase)?;
        if self.period_px < 2 {
            return Err(SlmError::Configuration(format!(
                "blazed grating period must be at least 2 px, got {}",
                self.period_px
            )));
        }
        let step = f64::from(self.max_phase) / (self.period_px - 1) as f64;
        let horizontal = self.horizontal;
        let period = self.period_px;
        Ok(Pattern::from_shape_fn(dims.shape(), |(row, col)| {
            let i = if horizontal { col } else { row };
            ((i % period) as f64 * step) as u16
        }))
    }
}

/// Two-level grating: `phase` for the first `duty_cycle` of each period, 0 elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryGrating {
    /// Grayscale of the "on" part.
    pub phase: u16,
    /// Grating period, at least 2.
    pub period_px: usize,
    /// Fraction of each period set to `phase`, in `[0, 1]`.
    pub duty_cycle: f64,
    /// Alternate along the columns instead of the rows.
    pub horizontal: bool,
}

impl Default for BinaryGrating {
    fn default() -> Self {
        Self {
            phase: 512,
            period_px: 25,
            duty_cycle: 0.5,
            horizontal: false,
        }
    }
}

impl PatternGenerator for BinaryGrating {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        check_phase("phase", self.phase)?;
        if self.period_px < 2 {
            return Err(SlmError::Configuration(format!(
                "binary grating period must be at least 2 px, got {}",
                self.period_px
            )));
        }
        if !(0.0..=1.0).contains(&self.duty_cycle) {
            return Err(SlmError::Configuration(format!(
                "duty cycle must be within [0, 1], got {}",
                self.duty_cycle
            )));
        }
        let on_px = self.period_px as f64 * self.duty_cycle;
        let (period, phase, horizontal) = (self.period_px, self.phase, self.horizontal);
        Ok(Pattern::from_shape_fn(dims.shape(), |(row, col)| {
            let i = if horizontal { col } else { row };
            if ((i % period) as f64) < on_px {
                phase
            } else {
                0
            }
        }))
    }
}

/// One or two straight slits on a uniform background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slit {
    /// Slit runs top to bottom (its width is measured along the columns).
    pub vertical: bool,
    /// Slit width.
    pub width_px: f64,
    /// Shift of the slit centre from the display centre.
    pub offset_px: f64,
    /// Draw two slits around the offset.
    pub double: bool,
    /// Centre-to-centre distance of a double slit.
    pub separation_px: f64,
    /// Grayscale inside the slit.
    pub slit_phase: u16,
    /// Grayscale of the background.
    pub nonslit_phase: u16,
}

impl Default for Slit {
    fn default() -> Self {
        Self {
            vertical: true,
            width_px: 50.0,
            offset_px: 0.0,
            double: false,
            separation_px: 200.0,
            slit_phase: 0,
            nonslit_phase: 512,
        }
    }
}

impl Slit {
    /// Half-open pixel range `[start, end)` covered by a slit centred at `offset`.
    fn extent(&self, length: usize, offset: f64) -> (usize, usize) {
        let length_f = length as f64;
        let centre = (length_f / 2.0).round_ties_even() + offset;
        let half = self.width_px / 2.0;
        let start = (centre - half).clamp(0.0, length_f) as usize;
        let end = (centre + half).clamp(0.0, length_f) as usize;
        (start, end)
    }
}

impl PatternGenerator for Slit {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        check_phase("slit_phase", self.slit_phase)?;
        check_phase("nonslit_phase", self.nonslit_phase)?;
        let length = if self.vertical { dims.width } else { dims.height };
        let offsets = if self.double {
            vec![
                self.offset_px + self.separation_px / 2.0,
                self.offset_px - self.separation_px / 2.0,
            ]
        } else {
            vec![self.offset_px]
        };
        let ranges: Vec<(usize, usize)> =
            offsets.into_iter().map(|o| self.extent(length, o)).collect();

        let vertical = self.vertical;
        Ok(Pattern::from_shape_fn(dims.shape(), |(row, col)| {
            let i = if vertical { col } else { row };
            if ranges.iter().any(|&(start, end)| i >= start && i < end) {
                self.slit_phase
            } else {
                self.nonslit_phase
            }
        }))
    }
}

/// Circular aperture on a uniform background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pinhole {
    /// Aperture radius.
    pub radius_px: f64,
    /// Horizontal shift of the centre from the display centre.
    pub offset_x_px: f64,
    /// Vertical shift of the centre from the display centre.
    pub offset_y_px: f64,
    /// Grayscale inside the aperture.
    pub slit_phase: u16,
    /// Grayscale of the background.
    pub nonslit_phase: u16,
}

impl Default for Pinhole {
    fn default() -> Self {
        Self {
            radius_px: 30.0,
            offset_x_px: 0.0,
            offset_y_px: 0.0,
            slit_phase: 0,
            nonslit_phase: 512,
        }
    }
}

impl PatternGenerator for Pinhole {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        check_phase("slit_phase", self.slit_phase)?;
        check_phase("nonslit_phase", self.nonslit_phase)?;
        let cx = self.offset_x_px + dims.width as f64 / 2.0;
        let cy = self.offset_y_px + dims.height as f64 / 2.0;
        let r2 = self.radius_px * self.radius_px;
        Ok(Pattern::from_shape_fn(dims.shape(), |(row, col)| {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            if dx * dx + dy * dy < r2 {
                self.slit_phase
            } else {
                self.nonslit_phase
            }
        }))
    }
}

/// Product of two patterns, with 1023 standing for 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiplier {
    /// First factor.
    pub first: Box<PatternSpec>,
    /// Second factor.
    pub second: Box<PatternSpec>,
}

impl PatternGenerator for Multiplier {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        let a = self.first.generate(dims)?;
        let b = self.second.generate(dims)?;
        let full = f64::from(MAX_GRAYSCALE);
        Ok(ndarray::Zip::from(&a)
            .and(&b)
            .map_collect(|&x, &y| (f64::from(x) / full * (f64::from(y) / full) * full) as u16))
    }
}

/// Serializable description of any pattern generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternSpec {
    /// `kind = "uniform"`
    Uniform(Uniform),
    /// `kind = "blazed_grating"`
    BlazedGrating(BlazedGrating),
    /// `kind = "binary_grating"`
    BinaryGrating(BinaryGrating),
    /// `kind = "slit"`
    Slit(Slit),
    /// `kind = "pinhole"`
    Pinhole(Pinhole),
    /// `kind = "multiplier"` with `[first]` and `[second]` tables
    Multiplier(Multiplier),
}

impl PatternSpec {
    /// Parse a pattern description; missing parameters take their defaults.
    pub fn from_toml_str(text: &str) -> SlmResult<Self> {
        toml::from_str(text).map_err(|e| SlmError::Configuration(e.to_string()))
    }
}

impl PatternGenerator for PatternSpec {
    fn generate(&self, dims: Dimensions) -> SlmResult<Pattern> {
        match self {
            PatternSpec::Uniform(g) => g.generate(dims),
            PatternSpec::BlazedGrating(g) => g.generate(dims),
            PatternSpec::BinaryGrating(g) => g.generate(dims),
            PatternSpec::Slit(g) => g.generate(dims),
            PatternSpec::Pinhole(g) => g.generate(dims),
            PatternSpec::Multiplier(g) => g.generate(dims),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dims(height: usize, width: usize) -> Dimensions {
        Dimensions { height, width }
    }

    #[test]
    fn uniform_fills_display() {
        let p = Uniform { phase: 300 }.generate(dims(3, 5)).unwrap();
        assert_eq!(p.dim(), (3, 5));
        assert!(p.iter().all(|&v| v == 300));
        assert!(Uniform { phase: 1024 }.generate(dims(1, 1)).is_err());
    }

    #[test]
    fn blazed_grating_ramps_along_chosen_axis() {
        let g = BlazedGrating {
            period_px: 4,
            max_phase: 900,
            horizontal: true,
        };
        let p = g.generate(dims(2, 6)).unwrap();
        assert_eq!(p, array![[0, 300, 600, 900, 0, 300], [0, 300, 600, 900, 0, 300]]);

        let v = BlazedGrating {
            horizontal: false,
            ..g
        }
        .generate(dims(6, 1))
        .unwrap();
        assert_eq!(v.column(0).to_vec(), vec![0, 300, 600, 900, 0, 300]);
    }

    #[test]
    fn binary_grating_duty_cycle() {
        let g = BinaryGrating {
            phase: 512,
            period_px: 4,
            duty_cycle: 0.25,
            horizontal: true,
        };
        let p = g.generate(dims(1, 8)).unwrap();
        assert_eq!(p, array![[512, 0, 0, 0, 512, 0, 0, 0]]);

        let bad = BinaryGrating {
            duty_cycle: 1.5,
            ..BinaryGrating::default()
        };
        assert!(bad.generate(dims(1, 8)).is_err());
    }

    #[test]
    fn slit_is_centred_and_clamped() {
        let slit = Slit {
            vertical: true,
            width_px: 2.0,
            offset_px: 0.0,
            slit_phase: 1,
            nonslit_phase: 0,
            ..Slit::default()
        };
        // length 5: centre rounds 2.5 to 2, slit covers [1, 3)
        let p = slit.generate(dims(1, 5)).unwrap();
        assert_eq!(p, array![[0, 1, 1, 0, 0]]);

        let edge = Slit {
            offset_px: -3.0,
            ..slit.clone()
        };
        let p = edge.generate(dims(1, 6)).unwrap();
        assert_eq!(p, array![[1, 0, 0, 0, 0, 0]]);
    }

    #[test]
    fn double_slit_places_both_openings() {
        let slit = Slit {
            vertical: false,
            width_px: 2.0,
            double: true,
            separation_px: 6.0,
            slit_phase: 9,
            nonslit_phase: 1,
            ..Slit::default()
        };
        let p = slit.generate(dims(10, 1)).unwrap();
        // centre 5, slits centred at 8 and 2
        assert_eq!(p.column(0).to_vec(), vec![1, 9, 9, 1, 1, 1, 1, 9, 9, 1]);
    }

    #[test]
    fn pinhole_masks_disc() {
        let p = Pinhole {
            radius_px: 1.5,
            offset_x_px: 0.0,
            offset_y_px: 0.0,
            slit_phase: 7,
            nonslit_phase: 0,
        }
        .generate(dims(5, 5))
        .unwrap();
        // centre at (2.5, 2.5): only the four pixels around it are inside
        assert_eq!(p[[2, 2]], 7);
        assert_eq!(p[[0, 0]], 0);
        assert_eq!(p.iter().filter(|&&v| v == 7).count(), 4);
    }

    #[test]
    fn multiplier_scales_by_full_range() {
        let spec = PatternSpec::Multiplier(Multiplier {
            first: Box::new(PatternSpec::Uniform(Uniform { phase: 1023 })),
            second: Box::new(PatternSpec::Uniform(Uniform { phase: 512 })),
        });
        let p = spec.generate(dims(2, 2)).unwrap();
        assert!(p.iter().all(|&v| v == 511 || v == 512));

        let zero = PatternSpec::Multiplier(Multiplier {
            first: Box::new(PatternSpec::Uniform(Uniform { phase: 0 })),
            second: Box::new(PatternSpec::Uniform(Uniform { phase: 512 })),
        });
        assert!(zero.generate(dims(1, 1)).unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn pattern_spec_from_toml() {
        let spec = PatternSpec::from_toml_str(
            r#"
            kind = "binary_grating"
            phase = 300
            period_px = 10
            "#,
        )
        .unwrap();
        assert_eq!(
            spec,
            PatternSpec::BinaryGrating(BinaryGrating {
                phase: 300,
                period_px: 10,
                duty_cycle: 0.5,
                horizontal: false,
            })
        );
        assert!(PatternSpec::from_toml_str("kind = \"spiral\"").is_err());
    }

    #[test]
    fn shipped_pattern_files_parse() {
        for text in [
            include_str!("../config/patterns/binary_grating.toml"),
            include_str!("../config/patterns/double_slit.toml"),
            include_str!("../config/patterns/masked_grating.toml"),
        ] {
            let spec = PatternSpec::from_toml_str(text).unwrap();
            let pattern = spec.generate(dims(60, 80)).unwrap();
            assert!(pattern.iter().all(|&v| v <= MAX_GRAYSCALE));
        }
    }
}
