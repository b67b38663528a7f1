use super::{Stage, Verdict};
use crate::config::StageConfig;
use crate::error::ConfigError;
use crate::queue::FrameQueue;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Hosts one stage between an input and an output queue with a fixed-size
/// worker pool. Each worker suspends on the input queue, runs the stage on
/// the dequeued packet and forwards it downstream when admitted.
///
/// Workers share the stage behind an async mutex, so `process` invocations
/// never race; cross-worker ordering of dequeues and enqueues is still
/// unspecified. A stage with temporal state (like the key-frame trigger)
/// should be hosted with `max_workers = 1` — running it wider leaves the
/// admission ordering undefined, and that is the caller's call to make.
///
/// A runner is single-use: started once, stopped once, never restarted.
pub struct StageRunner {
    stage: Arc<Mutex<Box<dyn Stage>>>,
    stage_name: String,
    input: FrameQueue,
    output: FrameQueue,
    max_workers: usize,
    cancel_token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl StageRunner {
    pub fn new(
        stage: Box<dyn Stage>,
        config: &StageConfig,
        input: FrameQueue,
        output: FrameQueue,
    ) -> Result<Self, ConfigError> {
        let max_workers = config.max_workers()?;
        let stage_name = stage.name().to_string();
        Ok(Self {
            stage: Arc::new(Mutex::new(stage)),
            stage_name,
            input,
            output,
            max_workers,
            cancel_token: CancellationToken::new(),
            workers: Vec::new(),
        })
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of workers that have not yet exited.
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_finished()).count()
    }

    /// Spawn the worker pool. Calling `start` on a runner that already ran
    /// does nothing; runners are not restartable.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            tracing::warn!("Stage \"{}\" was already started", self.stage_name);
            return;
        }
        tracing::info!(
            "Starting stage \"{}\" with {} workers",
            self.stage_name,
            self.max_workers
        );
        for worker in 0..self.max_workers {
            self.workers.push(tokio::spawn(worker_loop(
                worker,
                self.stage_name.clone(),
                Arc::clone(&self.stage),
                self.input.clone(),
                self.output.clone(),
                self.cancel_token.clone(),
            )));
        }
    }

    /// Raise the cancellation signal and return immediately. In-flight
    /// `process` calls complete, but no worker begins another dequeue once
    /// it observes the signal. Never blocks, never fails, idempotent.
    /// Callers needing a drain guarantee close the input queue and
    /// [`join`](Self::join) instead.
    pub fn stop(&self) {
        tracing::info!("Stopping stage \"{}\"", self.stage_name);
        self.cancel_token.cancel();
    }

    /// Wait for every worker to exit. The explicit blocking counterpart to
    /// the fire-and-forget [`stop`](Self::stop).
    pub async fn join(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

async fn worker_loop(
    worker: usize,
    stage_name: String,
    stage: Arc<Mutex<Box<dyn Stage>>>,
    input: FrameQueue,
    output: FrameQueue,
    cancel_token: CancellationToken,
) {
    loop {
        // Checked before every dequeue so a stop never strands this worker
        // waiting on an empty queue.
        let mut packet = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            taken = input.take() => match taken {
                Some(packet) => packet,
                None => break,
            },
        };

        let verdict = {
            let mut stage = stage.lock().await;
            stage.process(&mut packet).await
        };
        match verdict {
            Ok(Verdict::Admit) => {
                if output.put(packet).await.is_err() {
                    tracing::warn!(
                        "Stage \"{}\" worker {}: output queue closed, exiting",
                        stage_name,
                        worker
                    );
                    break;
                }
            }
            Ok(Verdict::Drop) => {}
            // One bad frame never takes the pool down; the item is dropped
            // and the worker keeps consuming.
            Err(e) => {
                tracing::warn!(
                    "Stage \"{}\" worker {}: dropping frame after processing error: {}",
                    stage_name,
                    worker,
                    e
                );
            }
        }
    }
    tracing::debug!("Stage \"{}\" worker {} exited", stage_name, worker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use crate::frame::{Frame, FramePacket};
    use crate::stage::Passthrough;
    use async_trait::async_trait;
    use image::GrayImage;
    use std::time::Duration;

    fn packet() -> FramePacket {
        FramePacket::new(Frame::new(GrayImage::new(4, 4)))
    }

    fn runner_with(workers: u64) -> (StageRunner, FrameQueue, FrameQueue) {
        let input = FrameQueue::bounded(16);
        let output = FrameQueue::bounded(16);
        let config = StageConfig::new().with("max_workers", workers);
        let runner = StageRunner::new(
            Box::new(Passthrough::new()),
            &config,
            input.clone(),
            output.clone(),
        )
        .unwrap();
        (runner, input, output)
    }

    #[tokio::test]
    async fn start_spawns_exactly_max_workers() {
        let (mut runner, _input, _output) = runner_with(3);
        assert_eq!(runner.worker_count(), 0);
        runner.start();
        assert_eq!(runner.worker_count(), 3);
        runner.stop();
        runner.join().await;
    }

    #[tokio::test]
    async fn admitted_packets_reach_the_output_queue() {
        let (mut runner, input, output) = runner_with(1);
        runner.start();
        let mut sent = packet();
        sent.metadata.insert("origin".to_string(), "camera-1".into());
        let id = sent.frame.id();
        input.put(sent).await.unwrap();
        let got = output.take().await.unwrap();
        assert_eq!(got.frame.id(), id);
        assert_eq!(got.metadata["origin"], "camera-1");
        runner.stop();
        runner.join().await;
    }

    #[tokio::test]
    async fn stop_returns_without_blocking_and_halts_dequeues() {
        let (mut runner, input, _output) = runner_with(2);
        runner.start();
        runner.stop();
        runner.join().await;
        assert_eq!(runner.worker_count(), 0);

        // Nothing is consuming any more: a packet put now must still be
        // there for us to take back.
        input.put(packet()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(input.take().await.is_some());
    }

    #[tokio::test]
    async fn stop_twice_is_harmless() {
        let (mut runner, _input, _output) = runner_with(2);
        runner.start();
        runner.stop();
        runner.stop();
        runner.join().await;
        assert_eq!(runner.worker_count(), 0);
        runner.stop();
    }

    #[tokio::test]
    async fn closing_the_input_drains_then_stops_workers() {
        let (mut runner, input, output) = runner_with(1);
        for _ in 0..3 {
            input.put(packet()).await.unwrap();
        }
        input.close().await;
        runner.start();
        runner.join().await;
        for _ in 0..3 {
            assert!(output.take().await.is_some());
        }
    }

    #[derive(Debug)]
    struct FailEveryOther {
        name: String,
        calls: usize,
    }

    #[async_trait]
    impl Stage for FailEveryOther {
        fn name(&self) -> &str {
            &self.name
        }
        fn set_name(&mut self, name: String) {
            self.name = name;
        }
        async fn process(
            &mut self,
            _packet: &mut FramePacket,
        ) -> Result<Verdict, ProcessingError> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(ProcessingError::EmptyFrame)
            } else {
                Ok(Verdict::Admit)
            }
        }
    }

    #[tokio::test]
    async fn a_processing_error_drops_one_item_not_the_pool() {
        let input = FrameQueue::bounded(16);
        let output = FrameQueue::bounded(16);
        let config = StageConfig::new().with("max_workers", 1);
        let stage = FailEveryOther {
            name: "flaky".to_string(),
            calls: 0,
        };
        let mut runner =
            StageRunner::new(Box::new(stage), &config, input.clone(), output.clone()).unwrap();
        runner.start();

        for _ in 0..4 {
            input.put(packet()).await.unwrap();
        }
        // Calls 1 and 3 admit, 2 and 4 error out.
        assert!(output.take().await.is_some());
        assert!(output.take().await.is_some());
        assert_eq!(runner.worker_count(), 1);
        runner.stop();
        runner.join().await;
    }
}
