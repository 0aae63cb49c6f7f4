//! Headless THA Live Demo
//!
//! Runs a live session against a synthetic renderer for a few seconds,
//! walks through several emotions, switches the effect chain halfway, and
//! logs the periodic statistics.
//!
//! Usage: tha-headless [config.json] [seconds]
//! Set RUST_LOG=debug to see blinks and sway retargets.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use tha_core::{Channel, InferenceError, PoseVector};
use tha_effects::{EffectSpec, Frame};
use tha_pose::EmotionLibrary;
use tha_runtime::{init_tracing, AnimatorConfig, EmittedFrame, FrameDriver, LogFormat};

const SIZE: usize = 128;

/// Draws a face-ish blob: brightness follows the mouth, position follows the head
fn synthetic_render(pose: &PoseVector) -> Result<Frame, InferenceError> {
    // Stand-in for model latency
    std::thread::sleep(Duration::from_millis(8));

    let cx = SIZE as f32 * (0.5 + 0.2 * pose.get(Channel::HeadY));
    let cy = SIZE as f32 * (0.5 + 0.2 * pose.get(Channel::HeadX));
    let mouth = pose.get(Channel::MouthAaa);
    let eyes = 1.0 - pose.get(Channel::EyeRelaxedLeft).max(pose.get(Channel::EyeWinkLeft));

    let mut frame = Frame::new(SIZE, SIZE);
    for y in 0..SIZE {
        for (x, px) in frame.row_mut(y).iter_mut().enumerate() {
            let dx = (x as f32 - cx) / SIZE as f32;
            let dy = (y as f32 - cy) / SIZE as f32;
            let inside = (dx * dx + dy * dy).sqrt() < 0.3;
            if inside {
                *px = [0.9, 0.7 * eyes, 0.4 + 0.6 * mouth, 1.0];
            }
        }
    }
    Ok(frame)
}

fn load_config(path: Option<&str>) -> Result<AnimatorConfig, String> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            AnimatorConfig::from_json_str(&json).map_err(|e| e.to_string())
        }
        None => Ok(AnimatorConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::Plain);

    let args: Vec<String> = std::env::args().collect();
    let config = match load_config(args.get(1).map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "could not load config");
            std::process::exit(1);
        }
    };
    let seconds: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(12);

    let mut driver = match FrameDriver::new(config, EmotionLibrary::builtin(), synthetic_render, 2024) {
        Ok(driver) => driver,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let control = driver.control();

    let (sink, mut frames) = watch::channel::<Option<EmittedFrame>>(None);
    let consumer = tokio::spawn(async move {
        let mut seen = 0u64;
        while frames.changed().await.is_ok() {
            if let Some(frame) = frames.borrow_and_update().as_ref() {
                seen = frame.sequence + 1;
            }
        }
        seen
    });

    let session = tokio::spawn(async move { driver.run(sink).await });

    let script = [
        ("joy", false),
        ("curiosity", true),
        ("confusion", false),
        ("sadness", true),
        ("neutral", false),
    ];
    let step = Duration::from_secs(seconds) / script.len() as u32;
    for (i, (emotion, talking)) in script.iter().enumerate() {
        info!(emotion, talking, "switching emotion");
        if let Err(e) = control
            .set_emotion(emotion, std::iter::empty::<(&str, f32)>())
            .and_then(|_| control.set_talking(*talking))
        {
            error!(error = %e, "control request rejected");
        }
        if i == script.len() / 2 {
            let crt = EffectSpec::from_json_str(
                r#"[{"filter": "scanlines"}, {"filter": "banding"}, {"filter": "vignetting"}]"#,
            );
            if let Err(e) = crt.and_then(|spec| control.set_effects(spec)) {
                error!(error = %e, "effect chain rejected");
            }
        }
        tokio::time::sleep(step).await;
    }
    control.shutdown();

    match session.await {
        Ok(Ok(stats)) => info!(
            ticks = stats.ticks,
            frames = stats.frames_emitted,
            stale = stats.stale_frames,
            render_ms = stats.average_render_time.as_secs_f64() * 1000.0,
            "session finished"
        ),
        Ok(Err(e)) => error!(error = %e, "session failed"),
        Err(e) => error!(error = %e, "session task panicked"),
    }
    if let Ok(seen) = consumer.await {
        info!(latest_sequence_seen = seen, "consumer finished");
    }
}
