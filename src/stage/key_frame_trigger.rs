use super::{Stage, Verdict};
use crate::config::StageConfig;
use crate::error::{ConfigError, ProcessingError, StageError};
use crate::frame::{Frame, FramePacket};
use crate::vision::{self, BackgroundModel};
use async_trait::async_trait;
use chrono::Utc;
use image::GrayImage;
use std::path::PathBuf;

const EDGE_STRIP_PX: u32 = 10;
const CLOSE_KERNEL_PX: u32 = 20;
const DEFAULT_HOLD_FRAMES: u64 = 7;
const DEFAULT_CENTER_BAND_PX: u64 = 100;

/// Visual trigger deciding, frame by frame, whether a frame is the key
/// frame of interest for downstream processing.
///
/// Two macro-states drive the decision. **Unlocked**: the background
/// subtraction decision runs; an interesting frame is admitted with
/// `user_data = 1` and the trigger locks. **Locked**: a hold window of
/// `hold_frames` frames during which nothing is admitted, so one physical
/// object passing through the field of view produces one trigger instead of
/// a burst; the background model keeps tracking throughout. Once the hold
/// expires the next frame is evaluated fresh again.
///
/// A frame is interesting when its foreground mask is large enough
/// (`n_total_px`), stays clear of both lateral 10-pixel edge strips
/// (`n_left_px` / `n_right_px`), and the largest foreground region is fully
/// in frame with its horizontal center inside `center_band_px` of the frame
/// midline.
///
/// With `training_mode` the decision is bypassed entirely: every frame is
/// written to `training_dir` for offline model tuning and nothing is ever
/// forwarded.
#[derive(Debug)]
pub struct KeyFrameTrigger {
    name: String,
    n_total_px: u64,
    n_left_px: u64,
    n_right_px: u64,
    center_band_px: u32,
    hold_frames: u32,
    training_mode: bool,
    training_dir: Option<PathBuf>,
    profiling: bool,
    background: BackgroundModel,
    locked: bool,
    lock_frame_count: u32,
    capture_count: u64,
}

impl KeyFrameTrigger {
    pub fn from_config(config: &StageConfig) -> Result<Self, ConfigError> {
        let n_total_px = config.require_u64("n_total_px")?;
        let n_left_px = config.require_u64("n_left_px")?;
        let n_right_px = config.require_u64("n_right_px")?;
        let center_band_px = config.u64_or("center_band_px", DEFAULT_CENTER_BAND_PX)? as u32;
        let hold_frames = config.u64_or("hold_frames", DEFAULT_HOLD_FRAMES)?;
        if hold_frames == 0 {
            return Err(ConfigError::InvalidValue {
                key: "hold_frames".to_string(),
                reason: "must be a positive integer".to_string(),
            });
        }
        let training_mode = config.bool_or("training_mode", false)?;
        let training_dir = if training_mode {
            let dir = PathBuf::from(config.require_str("training_dir")?);
            std::fs::create_dir_all(&dir).map_err(|e| ConfigError::InvalidValue {
                key: "training_dir".to_string(),
                reason: e.to_string(),
            })?;
            Some(dir)
        } else {
            None
        };
        let profiling = config.bool_or("profiling", false)?;

        Ok(Self {
            name: "key_frame_trigger".to_string(),
            n_total_px,
            n_left_px,
            n_right_px,
            center_band_px,
            hold_frames: hold_frames as u32,
            training_mode,
            training_dir,
            profiling,
            background: BackgroundModel::new(),
            locked: false,
            lock_frame_count: 0,
            capture_count: 0,
        })
    }

    pub fn factory(config: &StageConfig) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(Self::from_config(config)?))
    }

    /// The vision decision: update the background model with the frame and
    /// decide whether it shows an object of interest.
    fn check_frame(&mut self, plane: &GrayImage) -> Result<bool, ProcessingError> {
        let foreground = self.background.apply(plane)?;
        let columns = foreground.width();

        let level = vision::otsu_level(&foreground);
        let mask = vision::threshold(&foreground, level);
        let mask = vision::close(&mask, CLOSE_KERNEL_PX, CLOSE_KERNEL_PX);

        let n_total = vision::count_white(&mask);
        let n_left = vision::count_white_in_columns(&mask, 0, EDGE_STRIP_PX);
        let n_right = vision::count_white_in_columns(
            &mask,
            columns.saturating_sub(EDGE_STRIP_PX),
            columns,
        );
        // The object must be in view and not touching either lateral edge.
        if n_total <= self.n_total_px || n_left >= self.n_left_px || n_right >= self.n_right_px {
            return Ok(false);
        }

        // The largest foreground region is assumed to bound the object.
        let Some(object) = vision::largest_component(&mask) else {
            return Ok(false);
        };
        let bbox = object.bbox;
        if bbox.x == 0 || bbox.right() == columns {
            return Ok(false);
        }
        let midline = columns / 2;
        let center = bbox.center_x();
        Ok(center + self.center_band_px >= midline && center <= midline + self.center_band_px)
    }

    fn capture_frame(&mut self, frame: &Frame) {
        let Some(dir) = self.training_dir.as_ref() else {
            return;
        };
        for (plane_idx, plane) in frame.planes().iter().enumerate() {
            let file = if plane_idx == 0 {
                format!("{}.png", self.capture_count)
            } else {
                format!("{}_p{}.png", self.capture_count, plane_idx)
            };
            let path = dir.join(file);
            if let Err(e) = plane.save(&path) {
                tracing::warn!("Failed to persist training frame {}: {}", path.display(), e);
            }
        }
        self.capture_count += 1;
    }
}

#[async_trait]
impl Stage for KeyFrameTrigger {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    async fn process(&mut self, packet: &mut FramePacket) -> Result<Verdict, ProcessingError> {
        if self.profiling {
            packet.metadata.insert(
                "ts_filter_entry".to_string(),
                Utc::now().timestamp_millis().into(),
            );
        }

        if self.training_mode {
            self.capture_frame(&packet.frame);
            return Ok(Verdict::Drop);
        }

        let plane = packet.frame.primary().ok_or(ProcessingError::EmptyFrame)?;

        if self.locked {
            self.lock_frame_count += 1;
            if self.lock_frame_count >= self.hold_frames {
                // Hold window over; this frame is evaluated fresh below.
                self.locked = false;
                tracing::debug!("Trigger unlocked after {} held frames", self.lock_frame_count);
            } else {
                // Keep the background model tracking object positions while
                // the trigger is held.
                self.background.apply(plane)?;
                return Ok(Verdict::Drop);
            }
        }

        if self.check_frame(plane)? {
            tracing::debug!("Key frame {} admitted", packet.frame.id());
            self.locked = true;
            self.lock_frame_count = 0;
            packet.metadata.insert("user_data".to_string(), 1.into());
            return Ok(Verdict::Admit);
        }
        Ok(Verdict::Drop)
    }
}
