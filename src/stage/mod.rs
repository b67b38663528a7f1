use crate::error::ProcessingError;
use crate::frame::FramePacket;
use async_trait::async_trait;

pub mod key_frame_trigger;
pub mod passthrough;
pub mod registry;
pub mod runner;

pub use key_frame_trigger::KeyFrameTrigger;
pub use passthrough::Passthrough;
pub use registry::{StageFactory, StageRegistry};
pub use runner::StageRunner;

/// Outcome of one `process` invocation: forward the packet downstream, or
/// discard it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Drop,
}

impl Verdict {
    pub fn is_admit(self) -> bool {
        matches!(self, Verdict::Admit)
    }
}

/// A pluggable unit of per-item processing logic, hosted by a
/// [`StageRunner`] between an input and an output queue.
///
/// `process` may mutate the packet in place (transforming classifier-style
/// stages) or leave it untouched and only gate admission (filter-style
/// stages); the verdict unifies both shapes at the runtime boundary. Stages
/// never touch queues — only the hosting runner does. The name is for
/// diagnostics, never dispatch.
#[async_trait]
pub trait Stage: Send + std::fmt::Debug {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    async fn process(&mut self, packet: &mut FramePacket) -> Result<Verdict, ProcessingError>;
}
