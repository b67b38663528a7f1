use chrono::{DateTime, Utc};
use image::GrayImage;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Auxiliary key-value annotation attached to a frame, accumulated across
/// stages. Keys written by one stage must survive to downstream consumers.
pub type Metadata = HashMap<String, Value>;

/// One unit of visual input: a grayscale pixel plane, or several planes for
/// multi-sensor sources. Plane 0 is the primary sensor.
#[derive(Debug, Clone)]
pub struct Frame {
    planes: Vec<GrayImage>,
    captured_at: DateTime<Utc>,
    id: Uuid,
}

impl Frame {
    pub fn new(plane: GrayImage) -> Self {
        Self::from_planes(vec![plane])
    }

    pub fn from_planes(planes: Vec<GrayImage>) -> Self {
        Self {
            planes,
            captured_at: Utc::now(),
            id: Uuid::new_v4(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn planes(&self) -> &[GrayImage] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [GrayImage] {
        &mut self.planes
    }

    /// The primary sensor plane, if the frame carries any pixels at all.
    pub fn primary(&self) -> Option<&GrayImage> {
        self.planes.first()
    }
}

/// Frame plus metadata, moved through queues as one owned unit. Whichever
/// worker dequeues a packet owns it exclusively until it forwards or drops it.
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub frame: Frame,
    pub metadata: Metadata,
}

impl FramePacket {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(frame: Frame, metadata: Metadata) -> Self {
        Self { frame, metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_plane_is_first() {
        let frame = Frame::from_planes(vec![GrayImage::new(4, 4), GrayImage::new(8, 8)]);
        assert_eq!(frame.primary().unwrap().width(), 4);
        assert_eq!(frame.planes().len(), 2);
    }

    #[test]
    fn empty_frame_has_no_primary() {
        let frame = Frame::from_planes(Vec::new());
        assert!(frame.primary().is_none());
    }

    #[test]
    fn packets_start_with_empty_metadata() {
        let packet = FramePacket::new(Frame::new(GrayImage::new(2, 2)));
        assert!(packet.metadata.is_empty());
    }
}
