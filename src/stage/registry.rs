use super::runner::StageRunner;
use super::{KeyFrameTrigger, Passthrough, Stage};
use crate::config::StageConfig;
use crate::error::{LoadError, StageError};
use crate::queue::FrameQueue;
use indexmap::IndexMap;

/// Uniform construction signature for every registered stage: the factory
/// receives the stage's configuration and nothing else. Stages that need no
/// configuration simply ignore it.
pub type StageFactory = fn(&StageConfig) -> Result<Box<dyn Stage>, StageError>;

/// Static registration table resolving stage-type names to factories,
/// populated at process start. Loading has no side effects beyond
/// construction; no worker is started.
pub struct StageRegistry {
    factories: IndexMap<String, StageFactory>,
}

impl StageRegistry {
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// The registry with every stage this crate ships.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("key_frame_trigger", KeyFrameTrigger::factory);
        registry.register("passthrough", Passthrough::factory);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: StageFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Resolve `name` and construct the stage from `config`. An unregistered
    /// name fails with [`LoadError`]; a missing or invalid configuration key
    /// fails with [`crate::error::ConfigError`] and no stage escapes.
    pub fn load(&self, name: &str, config: &StageConfig) -> Result<Box<dyn Stage>, StageError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| LoadError::UnknownStage(name.to_string()))?;
        // Every stage is hosted by a worker pool, so the pool size is
        // validated here even before the factory sees the config.
        config.max_workers()?;
        let mut stage = factory(config)?;
        stage.set_name(name.to_string());
        tracing::debug!("Loaded stage \"{}\"", name);
        Ok(stage)
    }

    /// Construct the stage and wire it to a runner over the given queue
    /// pair. This is the one-call path an operator uses per stage.
    pub fn load_runner(
        &self,
        name: &str,
        config: &StageConfig,
        input: FrameQueue,
        output: FrameQueue,
    ) -> Result<StageRunner, StageError> {
        let stage = self.load(name, config)?;
        Ok(StageRunner::new(stage, config, input, output)?)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
