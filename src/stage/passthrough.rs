use super::{Stage, Verdict};
use crate::config::StageConfig;
use crate::error::{ProcessingError, StageError};
use crate::frame::FramePacket;
use async_trait::async_trait;

/// The trivial stage: admits every frame unchanged. Useful as a pipeline
/// placeholder and in tests exercising the runner.
#[derive(Debug)]
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new() -> Self {
        Self {
            name: "passthrough".to_string(),
        }
    }

    pub fn factory(config: &StageConfig) -> Result<Box<dyn Stage>, StageError> {
        let _ = config;
        Ok(Box::new(Self::new()))
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    async fn process(&mut self, packet: &mut FramePacket) -> Result<Verdict, ProcessingError> {
        tracing::debug!("Passing frame {} through unchanged", packet.frame.id());
        Ok(Verdict::Admit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use image::GrayImage;

    #[tokio::test]
    async fn admits_without_touching_the_packet() {
        let mut stage = Passthrough::new();
        let mut packet = FramePacket::new(Frame::new(GrayImage::new(4, 4)));
        let verdict = stage.process(&mut packet).await.unwrap();
        assert!(verdict.is_admit());
        assert!(packet.metadata.is_empty());
    }
}
