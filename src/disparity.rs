//! Disparity pixels and maps.

use crate::image::OwnedImage;

/// Per-pixel correspondence between a left and right image: horizontal and
/// vertical offset plus a match quality score.
///
/// Invalid entries carry no offset semantics; the accessors return `None`
/// so missing pixels are never dereferenced for arithmetic by accident.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Disparity {
    h: f32,
    v: f32,
    score: f32,
    valid: bool,
}

impl Disparity {
    /// A valid disparity with the given offsets and match score.
    pub fn new(h: f32, v: f32, score: f32) -> Self {
        Self {
            h,
            v,
            score,
            valid: true,
        }
    }

    /// The missing-pixel marker.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Horizontal and vertical offsets, present only for valid pixels.
    pub fn offsets(&self) -> Option<(f32, f32)> {
        self.valid.then_some((self.h, self.v))
    }

    /// Match quality score, present only for valid pixels. Higher is
    /// better for every metric (see [`Metric`](crate::Metric)).
    pub fn score(&self) -> Option<f32> {
        self.valid.then_some(self.score)
    }

    pub(crate) fn h(&self) -> f32 {
        self.h
    }

    pub(crate) fn v(&self) -> f32 {
        self.v
    }

    pub(crate) fn raw_score(&self) -> f32 {
        self.score
    }

    pub(crate) fn set_offsets(&mut self, h: f32, v: f32) {
        self.h = h;
        self.v = v;
    }

    pub(crate) fn invalidate(&mut self) {
        *self = Self::invalid();
    }
}

/// A dense 2D array of disparities.
pub type DisparityMap = OwnedImage<Disparity>;

/// Shifts the offsets of every valid pixel in place. Invalid pixels are
/// untouched.
pub(crate) fn shift_valid(map: &mut DisparityMap, dx: f32, dy: f32) {
    for d in map.data_mut() {
        if d.valid {
            d.h += dx;
            d.v += dy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{shift_valid, Disparity, DisparityMap};

    #[test]
    fn invalid_exposes_no_offsets() {
        let d = Disparity::invalid();
        assert!(!d.is_valid());
        assert!(d.offsets().is_none());
        assert!(d.score().is_none());
    }

    #[test]
    fn shift_skips_invalid_pixels() {
        let mut map = DisparityMap::filled(2, 1, Disparity::invalid()).unwrap();
        map.set(1, 0, Disparity::new(2.0, -1.0, 0.9));
        shift_valid(&mut map, -5.0, 3.0);
        assert!(map.at(0, 0).offsets().is_none());
        assert_eq!(map.at(1, 0).offsets(), Some((-3.0, 2.0)));
    }
}
