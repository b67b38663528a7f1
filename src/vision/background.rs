use crate::error::ProcessingError;
use image::GrayImage;

pub const DEFAULT_LEARNING_RATE: f32 = 0.05;
pub const DEFAULT_DEVIATION_GATE: f32 = 2.5;

const INITIAL_VARIANCE: f32 = 225.0;
const MIN_VARIANCE: f32 = 4.0;

/// Running per-pixel statistical model of a mostly-static scene. Each
/// `apply` folds the new frame into an exponential moving mean/variance and
/// returns a graded foreground mask: 0 for pixels matching the model, rising
/// past 128 once a pixel deviates more than `deviation_gate` standard
/// deviations from its running mean.
///
/// The first frame primes the model and reports an all-background mask.
/// Every later frame must match the primed shape; a mismatch is an error for
/// that frame, never a silent default mask.
#[derive(Debug)]
pub struct BackgroundModel {
    shape: Option<(u32, u32)>,
    mean: Vec<f32>,
    variance: Vec<f32>,
    learning_rate: f32,
    deviation_gate: f32,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_LEARNING_RATE, DEFAULT_DEVIATION_GATE)
    }

    pub fn with_params(learning_rate: f32, deviation_gate: f32) -> Self {
        Self {
            shape: None,
            mean: Vec::new(),
            variance: Vec::new(),
            learning_rate,
            deviation_gate,
        }
    }

    /// Update the model with `frame` and return its foreground mask.
    pub fn apply(&mut self, frame: &GrayImage) -> Result<GrayImage, ProcessingError> {
        let dims = frame.dimensions();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(ProcessingError::EmptyFrame);
        }
        match self.shape {
            None => {
                self.prime(frame);
                return Ok(GrayImage::new(dims.0, dims.1));
            }
            Some(expected) if expected != dims => {
                return Err(ProcessingError::ShapeMismatch {
                    expected,
                    got: dims,
                });
            }
            Some(_) => {}
        }

        let mut mask = GrayImage::new(dims.0, dims.1);
        let alpha = self.learning_rate;
        for (i, (raw, out)) in frame.as_raw().iter().zip(mask.iter_mut()).enumerate() {
            let value = *raw as f32;
            let diff = value - self.mean[i];
            let sigma = self.variance[i].sqrt();
            let ratio = diff.abs() / (self.deviation_gate * sigma);
            *out = (ratio * 128.0).min(255.0) as u8;

            self.mean[i] += alpha * diff;
            self.variance[i] =
                (self.variance[i] + alpha * (diff * diff - self.variance[i])).max(MIN_VARIANCE);
        }
        Ok(mask)
    }

    fn prime(&mut self, frame: &GrayImage) {
        self.shape = Some(frame.dimensions());
        self.mean = frame.as_raw().iter().map(|&v| v as f32).collect();
        self.variance = vec![INITIAL_VARIANCE; self.mean.len()];
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([value]))
    }

    #[test]
    fn first_frame_primes_with_quiet_mask() {
        let mut model = BackgroundModel::new();
        let mask = model.apply(&flat(8, 8, 40)).unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn static_scene_stays_background() {
        let mut model = BackgroundModel::new();
        for _ in 0..5 {
            let mask = model.apply(&flat(8, 8, 40)).unwrap();
            assert!(mask.iter().all(|&v| v < 128));
        }
    }

    #[test]
    fn sudden_change_lights_up_foreground() {
        let mut model = BackgroundModel::new();
        model.apply(&flat(8, 8, 20)).unwrap();
        let mask = model.apply(&flat(8, 8, 220)).unwrap();
        assert!(mask.iter().all(|&v| v == 255));
    }

    #[test]
    fn model_adapts_to_a_persistent_change() {
        let mut model = BackgroundModel::with_params(0.3, DEFAULT_DEVIATION_GATE);
        model.apply(&flat(4, 4, 20)).unwrap();
        let mut last = 255;
        for _ in 0..60 {
            let mask = model.apply(&flat(4, 4, 200)).unwrap();
            last = mask.as_raw()[0];
        }
        assert!(last < 128, "mask still hot after adaptation: {last}");
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mut model = BackgroundModel::new();
        model.apply(&flat(8, 8, 0)).unwrap();
        let err = model.apply(&flat(4, 8, 0)).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::ShapeMismatch {
                expected: (8, 8),
                got: (4, 8)
            }
        ));
    }

    #[test]
    fn empty_frame_is_an_error() {
        let mut model = BackgroundModel::new();
        assert!(matches!(
            model.apply(&GrayImage::new(0, 0)),
            Err(ProcessingError::EmptyFrame)
        ));
    }
}
