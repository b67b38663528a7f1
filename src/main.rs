use framegate::{Frame, FramePacket, FrameQueue, Settings, StageRegistry};
use image::{GrayImage, Luma};
use tracing::Level;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

// Synthetic camera feed: a static scene with an object sliding through the
// field of view, pausing centered for a few frames. Stands in for an
// upstream ingestion service while demonstrating the stage runtime.
fn synthetic_frame(step: u32) -> FramePacket {
    const WIDTH: u32 = 320;
    const HEIGHT: u32 = 240;
    let mut plane = GrayImage::from_pixel(WIDTH, HEIGHT, Luma([30]));

    // The object appears every 24 frames and crosses in 12 steps.
    let phase = step % 24;
    if phase < 12 {
        let x0 = phase * (WIDTH - 60) / 11;
        for y in 80..160 {
            for x in x0..(x0 + 60).min(WIDTH) {
                plane.put_pixel(x, y, Luma([200]));
            }
        }
    }
    FramePacket::new(Frame::new(plane))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let settings = Settings::load().unwrap_or_else(|e| {
        tracing::warn!("No usable settings ({}), falling back to defaults", e);
        Settings::default()
    });
    tracing::info!(
        "Hosting stage \"{}\" with queue capacity {}",
        settings.stage,
        settings.queue_capacity
    );

    let registry = StageRegistry::builtin();
    let input = FrameQueue::bounded(settings.queue_capacity);
    let output = FrameQueue::bounded(settings.queue_capacity);
    let mut runner = registry.load_runner(
        &settings.stage,
        &settings.stage_config,
        input.clone(),
        output.clone(),
    )?;
    runner.start();

    let consumer_queue = output.clone();
    let consumer = tokio::spawn(async move {
        let mut admitted = 0u64;
        while let Some(packet) = consumer_queue.take().await {
            admitted += 1;
            tracing::info!(
                "Admitted frame {} (metadata: {:?})",
                packet.frame.id(),
                packet.metadata
            );
        }
        admitted
    });

    for step in 0..120 {
        input.put(synthetic_frame(step)).await?;
    }
    input.close().await;
    runner.join().await;
    output.close().await;

    let admitted = consumer.await?;
    tracing::info!("Done: {} of 120 frames admitted", admitted);
    Ok(())
}
