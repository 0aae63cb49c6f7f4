//! Frame driver - the realtime loop

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn};

use tha_core::{Channel, InferenceError, PoseVector, ThaError, ThaResult};
use tha_effects::{EffectChain, EffectSpec, Frame};
use tha_motion::{MotionOffsets, MotionStack};
use tha_pose::{EmotionLibrary, EmotionTemplate, Interpolator, PoseCompositor};
use tha_time::{FramePacer, RunningAverage, SharedAverage, TickClock};

use crate::{
    AnimatorConfig, Command, ControlHandle, EmittedFrame, FrameSink, InferenceAdapter,
    RuntimeStats, StatsReporter,
};

/// What one synchronous tick did
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    pub dt: Duration,
    /// Composed pose of this tick
    pub pose: PoseVector,
    /// Channels clamped while composing
    pub range_violations: usize,
    pub commands_applied: usize,
    /// Emitted frame, `None` while paused
    pub frame: Option<EmittedFrame>,
}

/// Result of one adapter call
struct RenderOutcome {
    pose: PoseVector,
    result: Result<Frame, InferenceError>,
}

/// Owns every piece of per-session animation state.
///
/// Only the driver mutates the interpolator, the generators and the effect
/// chain. Producers talk to it through a [`ControlHandle`].
pub struct FrameDriver<A: InferenceAdapter> {
    config: AnimatorConfig,
    pacer: FramePacer,
    seed: u64,

    // Target state
    library: Arc<EmotionLibrary>,
    emotion: Arc<EmotionTemplate>,
    overrides: BTreeMap<Channel, f32>,

    // Animation state
    interpolator: Interpolator,
    motion: MotionStack,
    offsets: MotionOffsets,
    compositor: PoseCompositor,
    effects: EffectChain,
    effects_generation: u64,
    /// Time since the effect chain last ran
    effects_dt: f64,

    // Inference
    adapter: Arc<Mutex<A>>,
    last_frame: Option<Arc<Frame>>,
    sequence: u64,

    // Control
    control: ControlHandle,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: watch::Receiver<bool>,
    paused: bool,
    stopped: bool,

    // Statistics
    stats: RuntimeStats,
    render_times: SharedAverage,
    reporter: StatsReporter,
}

impl<A: InferenceAdapter> FrameDriver<A> {
    /// Create a new driver starting at the neutral pose.
    ///
    /// `seed` makes every stochastic process of the session reproducible.
    pub fn new(
        config: AnimatorConfig,
        library: EmotionLibrary,
        adapter: A,
        seed: u64,
    ) -> ThaResult<Self> {
        config.validate()?;

        let library = Arc::new(library);
        let emotion = library.neutral();
        let interpolator = Interpolator::new(config.interpolation.clone(), emotion.target_pose())?;
        let motion = MotionStack::new(&config.motion(), seed)?;
        let mut compositor = PoseCompositor::default();
        compositor.set_rules_from_template(&emotion);
        let effects = EffectChain::new(config.effect_chain.clone(), seed)?;

        let (control, commands, shutdown) =
            ControlHandle::new(Arc::clone(&library), compositor.pairs().clone());
        let render_times: SharedAverage = Arc::new(Mutex::new(RunningAverage::new()));
        let reporter =
            StatsReporter::new(config.stats_interval_duration()?, Arc::clone(&render_times));

        Ok(Self {
            pacer: config.pacer()?,
            config,
            seed,
            library,
            emotion,
            overrides: BTreeMap::new(),
            interpolator,
            motion,
            offsets: MotionOffsets::new(),
            compositor,
            effects,
            effects_generation: 0,
            effects_dt: 0.0,
            adapter: Arc::new(Mutex::new(adapter)),
            last_frame: None,
            sequence: 0,
            control,
            commands,
            shutdown,
            paused: false,
            stopped: false,
            stats: RuntimeStats::default(),
            render_times,
            reporter,
        })
    }

    /// A producer handle for this driver
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn emotion(&self) -> &EmotionTemplate {
        &self.emotion
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn motion(&self) -> &MotionStack {
        &self.motion
    }

    pub fn effects(&self) -> &EffectSpec {
        self.effects.spec()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stats(&self) -> RuntimeStats {
        let mut stats = self.stats.clone();
        stats.average_render_time = Duration::from_secs_f64(self.render_times.lock().average());
        stats
    }

    /// Run one tick covering `dt`, rendering on the calling thread.
    ///
    /// A failed render is not an error: the previous frame is re-emitted
    /// marked stale. Only a fatal adapter failure returns `Err`, after which
    /// the driver is stopped.
    pub fn tick(&mut self, dt: Duration) -> ThaResult<TickReport> {
        if self.stopped {
            return Err(ThaError::DriverStopped);
        }
        let span = info_span!("tick", n = self.stats.ticks + 1);
        let _enter = span.enter();
        let start = Instant::now();

        let (commands_applied, range_violations, pose) = self.advance(dt)?;

        let frame = if self.paused {
            None
        } else {
            let outcome = render_timed(&self.adapter, &self.render_times, pose);
            Some(self.finish(outcome)?)
        };

        self.stats.last_tick_duration = start.elapsed();
        Ok(TickReport {
            tick: self.stats.ticks,
            dt,
            pose,
            range_violations,
            commands_applied,
            frame,
        })
    }

    /// Drive the session in real time until shutdown, a fatal adapter
    /// failure, or the sink going away.
    ///
    /// Rendering happens on a blocking worker with at most one call in
    /// flight. Ticks that arrive while it is busy keep advancing the
    /// animation; when the worker frees up it gets the newest composed pose.
    pub async fn run<S: FrameSink>(&mut self, mut sink: S) -> ThaResult<RuntimeStats> {
        if self.stopped {
            return Err(ThaError::DriverStopped);
        }

        let mut clock = TickClock::with_max_tick(self.config.max_tick_duration()?);
        let mut pacer = self.pacer;
        let mut ticker = tick_interval(pacer);
        let mut shutdown = self.shutdown.clone();
        let mut in_flight: Option<JoinHandle<RenderOutcome>> = None;
        let mut pending: Option<PoseVector> = None;

        info!(fps = pacer.fps(), seed = self.seed, "frame driver started");

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let dt = clock.tick();
                    let span = info_span!("tick", n = self.stats.ticks + 1);
                    let start = Instant::now();
                    let (_, _, pose) = span.in_scope(|| self.advance(dt))?;

                    if self.pacer != pacer {
                        pacer = self.pacer;
                        ticker = tick_interval(pacer);
                        info!(fps = pacer.fps(), "tick rate changed");
                    }
                    if self.paused {
                        pending = None;
                        self.stats.poses_skipped += 1;
                    } else if in_flight.is_none() {
                        in_flight = Some(self.submit(pose));
                    } else if pending.replace(pose).is_some() {
                        self.stats.poses_skipped += 1;
                    }
                    self.stats.last_tick_duration = start.elapsed();
                }
                joined = join_render(&mut in_flight) => {
                    in_flight = None;
                    let outcome = joined.map_err(|e| {
                        error!(error = %e, "render worker failed, stopping");
                        self.stopped = true;
                        ThaError::Inference(InferenceError::Fatal(e.to_string()))
                    })?;

                    // Paused while rendering: drop the frame
                    if self.paused {
                        continue;
                    }
                    let emitted = self.finish(outcome)?;
                    if let Err(e) = sink.emit(emitted) {
                        info!(error = %e, "frame sink closed, stopping");
                        break;
                    }
                    if let Some(pose) = pending.take() {
                        in_flight = Some(self.submit(pose));
                    }
                }
                _ = shutdown.changed() => {}
            }
        }

        if in_flight.is_some() {
            debug!("abandoning in-flight render");
        }
        info!(
            ticks = self.stats.ticks,
            frames = self.stats.frames_emitted,
            "frame driver stopped"
        );
        Ok(self.stats())
    }

    /// Everything up to composition: commands, interpolation, motion
    fn advance(&mut self, dt: Duration) -> ThaResult<(usize, usize, PoseVector)> {
        let commands_applied = self.apply_commands();
        let secs = dt.as_secs_f64();

        self.interpolator.advance(secs)?;
        self.motion.advance_into(secs, &mut self.offsets);
        let composition = self
            .compositor
            .compose(self.interpolator.current(), &self.offsets);

        self.effects_dt += secs;
        self.stats.ticks += 1;
        self.stats.animation_time = self.stats.animation_time.saturating_add(dt);
        self.stats.range_violations += composition.violations.len() as u64;
        let stats = self.stats();
        self.reporter.observe(dt, &stats);

        Ok((commands_applied, composition.violations.len(), composition.pose))
    }

    /// Postprocess a render result into the frame to emit
    fn finish(&mut self, outcome: RenderOutcome) -> ThaResult<EmittedFrame> {
        let RenderOutcome { pose, result } = outcome;
        match result {
            Ok(mut frame) => {
                self.effects.apply(&mut frame, self.effects_dt);
                self.effects_dt = 0.0;
                if self.config.gamma_correct {
                    frame.linear_to_srgb();
                }
                let frame = Arc::new(frame);
                self.last_frame = Some(Arc::clone(&frame));
                Ok(self.emit(frame, false, pose))
            }
            Err(err) if err.is_fatal() => {
                error!(error = %err, "inference adapter failed, stopping");
                self.stopped = true;
                Err(err.into())
            }
            Err(err) => {
                self.stats.inference_failures += 1;
                warn!(error = %err, "render failed, re-sending previous frame");
                let frame = match &self.last_frame {
                    Some(frame) => Arc::clone(frame),
                    None => Arc::new(Frame::transparent(
                        self.config.placeholder_width,
                        self.config.placeholder_height,
                    )),
                };
                self.stats.stale_frames += 1;
                Ok(self.emit(frame, true, pose))
            }
        }
    }

    fn emit(&mut self, frame: Arc<Frame>, stale: bool, pose: PoseVector) -> EmittedFrame {
        let emitted = EmittedFrame {
            sequence: self.sequence,
            frame,
            stale,
            pose,
        };
        self.sequence += 1;
        self.stats.frames_emitted += 1;
        emitted
    }

    fn submit(&self, pose: PoseVector) -> JoinHandle<RenderOutcome> {
        let adapter = Arc::clone(&self.adapter);
        let render_times = Arc::clone(&self.render_times);
        tokio::task::spawn_blocking(move || render_timed(&adapter, &render_times, pose))
    }

    /// Apply everything queued since the previous tick
    fn apply_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            let name = command.name();
            match self.apply(command) {
                Ok(()) => {
                    applied += 1;
                    debug!(command = name, "applied");
                }
                Err(e) => {
                    self.stats.commands_rejected += 1;
                    warn!(command = name, error = %e, "command rejected");
                }
            }
        }
        self.stats.commands_applied += applied as u64;
        applied
    }

    fn apply(&mut self, command: Command) -> ThaResult<()> {
        match command {
            Command::SetTarget {
                template,
                overrides,
            } => self.set_target(template, overrides),
            Command::SetEffects(spec) => {
                self.effects = self.build_effects(spec)?;
            }
            Command::Configure(config) => self.reconfigure(*config)?,
            Command::SetTalking(talking) => self.motion.set_talking(talking),
            Command::Pause => {
                if !self.paused {
                    info!("animation paused");
                }
                self.paused = true;
            }
            Command::Resume => {
                if self.paused {
                    info!("animation resumed");
                }
                self.paused = false;
            }
            Command::ReloadEmotions(library) => {
                let template = match library.get(self.emotion.name()) {
                    Ok(template) => template,
                    Err(_) => {
                        warn!(
                            emotion = self.emotion.name(),
                            "emotion missing after reload, using neutral"
                        );
                        library.neutral()
                    }
                };
                info!(templates = library.len(), "emotion templates reloaded");
                self.library = library;
                let overrides = std::mem::take(&mut self.overrides);
                self.set_target(template, overrides);
            }
        }
        Ok(())
    }

    fn set_target(&mut self, template: Arc<EmotionTemplate>, overrides: BTreeMap<Channel, f32>) {
        if template.name() != self.emotion.name() {
            debug!(from = self.emotion.name(), to = template.name(), "emotion changed");
            self.motion.on_emotion_change(&template.cue());
        }
        self.interpolator.set_target(template.target_with(&overrides));
        self.compositor.set_rules_from_template(&template);
        self.emotion = template;
        self.overrides = overrides;
    }

    fn build_effects(&mut self, spec: EffectSpec) -> ThaResult<EffectChain> {
        let generation = self.effects_generation + 1;
        let chain = EffectChain::new(spec, self.seed.wrapping_add(generation << 32))?;
        self.effects_generation = generation;
        Ok(chain)
    }

    /// Swap in a new configuration; nothing changes if any part is rejected
    fn reconfigure(&mut self, config: AnimatorConfig) -> ThaResult<()> {
        config.validate()?;
        let pacer = config.pacer()?;
        let stats_interval = config.stats_interval_duration()?;
        let effects = if config.effect_chain != self.config.effect_chain {
            Some(self.build_effects(config.effect_chain.clone())?)
        } else {
            None
        };
        let mut interpolator = self.interpolator.clone();
        interpolator.reconfigure(config.interpolation.clone())?;
        self.motion.reconfigure(&config.motion())?;

        self.interpolator = interpolator;
        if let Some(effects) = effects {
            self.effects = effects;
        }
        self.pacer = pacer;
        self.reporter.set_interval(stats_interval);
        self.config = config;
        Ok(())
    }
}

fn render_timed<A: InferenceAdapter>(
    adapter: &Mutex<A>,
    render_times: &SharedAverage,
    pose: PoseVector,
) -> RenderOutcome {
    let start = Instant::now();
    let result = adapter.lock().render(&pose);
    render_times.lock().add_duration(start.elapsed());
    RenderOutcome { pose, result }
}

fn tick_interval(pacer: FramePacer) -> Interval {
    let mut interval = time::interval(pacer.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Resolves with the in-flight render, or never if there is none
async fn join_render(
    in_flight: &mut Option<JoinHandle<RenderOutcome>>,
) -> Result<RenderOutcome, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tha_effects::{FilterSpec, TranslucencyParams};

    /// Renders a 4x4 frame whose red channel is the mouth opening
    fn mouth_adapter(pose: &PoseVector) -> Result<Frame, InferenceError> {
        let value = pose.get(Channel::MouthAaa);
        Ok(Frame::filled(4, 4, [value, 0.5, 0.5, 1.0]))
    }

    fn still_config() -> AnimatorConfig {
        // No motion that would make frames nondeterministic
        AnimatorConfig {
            blink_interval_min: 1e6,
            blink_interval_max: 1e6,
            sway_max_random: 0.0,
            sway_max_noise: 0.0,
            gamma_correct: false,
            ..AnimatorConfig::default()
        }
    }

    fn driver() -> FrameDriver<fn(&PoseVector) -> Result<Frame, InferenceError>> {
        FrameDriver::new(
            still_config(),
            EmotionLibrary::builtin(),
            mouth_adapter as fn(&PoseVector) -> Result<Frame, InferenceError>,
            7,
        )
        .unwrap()
    }

    const FRAME: Duration = Duration::from_millis(40);

    #[test]
    fn test_tick_emits_sequenced_frames() {
        let mut driver = driver();
        for i in 0..3 {
            let report = driver.tick(FRAME).unwrap();
            assert_eq!(report.tick, i + 1);
            let frame = report.frame.unwrap();
            assert_eq!(frame.sequence, i);
            assert!(!frame.stale);
            assert!(frame.pose.is_range_valid());
        }
        assert_eq!(driver.stats().frames_emitted, 3);
    }

    #[test]
    fn test_emotion_applies_at_next_tick() {
        let mut driver = driver();
        let control = driver.control();
        driver.tick(FRAME).unwrap();

        control.set_emotion("surprise", [("mouth_aaa", 1.0)]).unwrap();
        assert_eq!(driver.emotion().name(), "neutral");

        let report = driver.tick(FRAME).unwrap();
        assert_eq!(report.commands_applied, 1);
        assert_eq!(driver.emotion().name(), "surprise");
        assert_eq!(driver.interpolator().target().get(Channel::MouthAaa), 1.0);
        // Moving toward the target but not there yet
        let mouth = report.pose.get(Channel::MouthAaa);
        assert!(mouth > 0.0 && mouth < 1.0);
    }

    #[test]
    fn test_effect_change_takes_effect_at_next_frame() {
        let mut driver = driver();
        let control = driver.control();

        let before = driver.tick(FRAME).unwrap().frame.unwrap();
        assert_eq!(before.frame.get(0, 0).unwrap()[3], 1.0);

        let spec = EffectSpec::new(vec![FilterSpec::Translucency(TranslucencyParams {
            alpha: 0.5,
        })]);
        control.set_effects(spec).unwrap();

        // The already-emitted frame is untouched
        assert_eq!(before.frame.get(0, 0).unwrap()[3], 1.0);

        let after = driver.tick(FRAME).unwrap().frame.unwrap();
        assert!((after.frame.get(0, 0).unwrap()[3] - 0.5).abs() < 1e-6);
        assert_eq!(driver.effects().len(), 1);
    }

    #[test]
    fn test_render_failure_resends_last_frame() {
        let mut calls = 0;
        let adapter = move |pose: &PoseVector| {
            calls += 1;
            if calls == 2 {
                return Err(InferenceError::Unavailable("reloading".into()));
            }
            mouth_adapter(pose)
        };
        let mut driver =
            FrameDriver::new(still_config(), EmotionLibrary::builtin(), adapter, 1).unwrap();

        let good = driver.tick(FRAME).unwrap().frame.unwrap();
        let stale = driver.tick(FRAME).unwrap().frame.unwrap();
        assert!(stale.stale);
        assert!(Arc::ptr_eq(&good.frame, &stale.frame));

        let next = driver.tick(FRAME).unwrap().frame.unwrap();
        assert!(!next.stale);
        assert_eq!(next.sequence, 2);

        let stats = driver.stats();
        assert_eq!(stats.inference_failures, 1);
        assert_eq!(stats.stale_frames, 1);
    }

    #[test]
    fn test_failure_before_first_frame_sends_placeholder() {
        let adapter = |_: &PoseVector| -> Result<Frame, InferenceError> {
            Err(InferenceError::InvalidChannelSet("45 != 44".into()))
        };
        let mut config = still_config();
        config.placeholder_width = 8;
        config.placeholder_height = 6;
        let mut driver = FrameDriver::new(config, EmotionLibrary::builtin(), adapter, 1).unwrap();

        let frame = driver.tick(FRAME).unwrap().frame.unwrap();
        assert!(frame.stale);
        assert_eq!((frame.frame.width(), frame.frame.height()), (8, 6));
        assert!(frame.frame.pixels().iter().all(|px| px[3] == 0.0));
    }

    #[test]
    fn test_fatal_failure_stops_driver() {
        let adapter = |_: &PoseVector| -> Result<Frame, InferenceError> {
            Err(InferenceError::Fatal("device lost".into()))
        };
        let mut driver =
            FrameDriver::new(still_config(), EmotionLibrary::builtin(), adapter, 1).unwrap();

        assert!(matches!(driver.tick(FRAME), Err(ThaError::Inference(_))));
        assert!(driver.is_stopped());
        assert_eq!(driver.tick(FRAME).unwrap_err(), ThaError::DriverStopped);
    }

    #[test]
    fn test_pause_skips_frames_but_keeps_time() {
        let mut driver = driver();
        let control = driver.control();
        control.set_emotion("surprise", [("mouth_aaa", 1.0)]).unwrap();
        control.pause().unwrap();

        let report = driver.tick(FRAME).unwrap();
        assert!(report.frame.is_none());
        assert!(driver.is_paused());
        let paused_mouth = report.pose.get(Channel::MouthAaa);
        for _ in 0..10 {
            driver.tick(FRAME).unwrap();
        }
        assert!(driver.interpolator().current().get(Channel::MouthAaa) > paused_mouth);

        control.resume().unwrap();
        let report = driver.tick(FRAME).unwrap();
        assert_eq!(report.frame.unwrap().sequence, 0);
    }

    #[test]
    fn test_configure_swaps_everything_at_once() {
        let mut driver = driver();
        let control = driver.control();

        let mut config = still_config();
        config.target_fps = 60.0;
        config.breathing_cycle_duration = 2.0;
        config.effect_chain = EffectSpec::from_json_str(r#"[{"filter": "noise"}]"#).unwrap();
        control.configure(config).unwrap();

        driver.tick(FRAME).unwrap();
        assert_eq!(driver.config().target_fps, 60.0);
        assert_eq!(driver.motion().breathing().config().cycle_duration, 2.0);
        assert_eq!(driver.effects().len(), 1);
    }

    #[test]
    fn test_longest_tick_snaps_to_target() {
        let config = AnimatorConfig {
            gamma_correct: false,
            ..AnimatorConfig::default()
        };
        let mut driver =
            FrameDriver::new(config, EmotionLibrary::builtin(), mouth_adapter, 5).unwrap();
        let control = driver.control();
        control.set_emotion("surprise", [("mouth_aaa", 1.0)]).unwrap();

        let report = driver.tick(Duration::MAX).unwrap();
        assert_eq!(driver.interpolator().current(), driver.interpolator().target());
        assert!(report.pose.is_range_valid());
        assert_eq!(driver.motion().blink().blink_count(), 1);

        // Again, with every accumulated duration already saturated
        let report = driver.tick(Duration::MAX).unwrap();
        assert!(report.frame.is_some());
        assert_eq!(driver.stats().animation_time, Duration::MAX);
        driver.tick(FRAME).unwrap();
    }

    #[test]
    fn test_configure_rejects_unrepresentable_durations() {
        let mut driver = driver();
        let control = driver.control();

        let config = AnimatorConfig {
            stats_interval: 1e20,
            ..still_config()
        };
        assert!(control.configure(config).unwrap_err().is_configuration());
        let config = AnimatorConfig {
            blink_interval_max: f64::INFINITY,
            ..still_config()
        };
        assert!(control.configure(config).is_err());

        let report = driver.tick(FRAME).unwrap();
        assert_eq!(report.commands_applied, 0);
        assert_eq!(driver.config().stats_interval, 5.0);
    }

    #[test]
    fn test_reload_falls_back_to_neutral() {
        let mut driver = driver();
        let control = driver.control();
        control.set_emotion("joy", std::iter::empty::<(&str, f32)>()).unwrap();
        driver.tick(FRAME).unwrap();
        assert_eq!(driver.emotion().name(), "joy");

        control.reload_emotions(EmotionLibrary::neutral_only()).unwrap();
        driver.tick(FRAME).unwrap();
        assert_eq!(driver.emotion().name(), "neutral");
        assert_eq!(driver.interpolator().target(), &PoseVector::neutral());
    }

    #[test]
    fn test_same_seed_same_frames() {
        let run = || {
            let config = AnimatorConfig {
                effect_chain: EffectSpec::from_json_str(r#"[{"filter": "noise"}]"#).unwrap(),
                ..AnimatorConfig::default()
            };
            let mut driver =
                FrameDriver::new(config, EmotionLibrary::builtin(), mouth_adapter, 42).unwrap();
            (0..50)
                .map(|_| driver.tick(FRAME).unwrap().frame.unwrap())
                .map(|f| (f.pose, (*f.frame).clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let mut config = still_config();
        config.target_fps = 100.0;
        let mut driver =
            FrameDriver::new(config, EmotionLibrary::builtin(), mouth_adapter, 3).unwrap();
        let control = driver.control();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let stats = driver.run(tx).await;
            (driver, stats)
        });

        let mut last = None;
        for _ in 0..5 {
            let frame = rx.recv().await.unwrap();
            if let Some(prev) = last {
                assert_eq!(frame.sequence, prev + 1);
            }
            last = Some(frame.sequence);
        }
        control.shutdown();

        let (driver, stats) = task.await.unwrap();
        let stats = stats.unwrap();
        assert!(stats.frames_emitted >= 5);
        assert!(stats.ticks >= stats.frames_emitted);
        assert!(control.set_talking(true).is_err());
        assert!(!driver.is_stopped());
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_error() {
        let mut calls = 0;
        let adapter = move |pose: &PoseVector| {
            calls += 1;
            if calls > 3 {
                return Err(InferenceError::Fatal("device lost".into()));
            }
            mouth_adapter(pose)
        };
        let mut config = still_config();
        config.target_fps = 200.0;
        let mut driver = FrameDriver::new(config, EmotionLibrary::builtin(), adapter, 3).unwrap();

        let mut frames = Vec::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = driver.run(tx).await;
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }

        assert!(matches!(result, Err(ThaError::Inference(InferenceError::Fatal(_)))));
        assert!(driver.is_stopped());
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_when_sink_closes() {
        let mut driver = driver();
        let (tx, rx) = mpsc::unbounded_channel::<EmittedFrame>();
        drop(rx);
        let stats = driver.run(tx).await.unwrap();
        assert_eq!(stats.frames_emitted, 1);
    }
}
