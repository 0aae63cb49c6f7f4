//! Control handle - reconfiguration from outside the frame loop
//!
//! Producers never touch driver state. Every request is validated on the
//! producer side, queued, and applied by the driver at the start of its next
//! tick, so a tick always runs against one consistent configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use tha_core::{Channel, ThaError, ThaResult};
use tha_effects::EffectSpec;
use tha_pose::{ChannelPairs, EmotionLibrary, EmotionTemplate};

use crate::AnimatorConfig;

/// A validated request waiting for the next tick
#[derive(Debug, Clone)]
pub enum Command {
    SetTarget {
        template: Arc<EmotionTemplate>,
        overrides: BTreeMap<Channel, f32>,
    },
    SetEffects(EffectSpec),
    Configure(Box<AnimatorConfig>),
    SetTalking(bool),
    Pause,
    Resume,
    ReloadEmotions(Arc<EmotionLibrary>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetTarget { .. } => "set_target",
            Command::SetEffects(_) => "set_effects",
            Command::Configure(_) => "configure",
            Command::SetTalking(_) => "set_talking",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::ReloadEmotions(_) => "reload_emotions",
        }
    }
}

/// Cloneable producer side of a driver's command queue
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::UnboundedSender<Command>,
    library: Arc<RwLock<Arc<EmotionLibrary>>>,
    pairs: ChannelPairs,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ControlHandle {
    /// Create a handle and the driver-side receivers
    pub(crate) fn new(
        library: Arc<EmotionLibrary>,
        pairs: ChannelPairs,
    ) -> (Self, mpsc::UnboundedReceiver<Command>, watch::Receiver<bool>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = Self {
            commands,
            library: Arc::new(RwLock::new(library)),
            pairs,
            shutdown: Arc::new(shutdown),
        };
        (handle, rx, shutdown_rx)
    }

    /// Switch to a named emotion, with optional manual channel values.
    ///
    /// Override keys may be channel names or logical pair keys such as
    /// `eye_wink`, which set both sides.
    pub fn set_emotion<'a, I>(&self, name: &str, overrides: I) -> ThaResult<()>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let template = self.library.read().get(name)?;
        let overrides = self.pairs.resolve(overrides)?;
        self.send(Command::SetTarget {
            template,
            overrides,
        })
    }

    /// Switch to the highest-scoring classifier label; returns the chosen emotion
    pub fn set_emotion_from_scores<'a, I>(&self, scores: I) -> ThaResult<String>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let template = self.library.read().dominant(scores);
        let name = template.name().to_string();
        self.send(Command::SetTarget {
            template,
            overrides: BTreeMap::new(),
        })?;
        Ok(name)
    }

    pub fn set_effects(&self, spec: EffectSpec) -> ThaResult<()> {
        spec.validate()?;
        self.send(Command::SetEffects(spec))
    }

    pub fn configure(&self, config: AnimatorConfig) -> ThaResult<()> {
        config.validate()?;
        self.send(Command::Configure(Box::new(config)))
    }

    pub fn set_talking(&self, talking: bool) -> ThaResult<()> {
        self.send(Command::SetTalking(talking))
    }

    pub fn pause(&self) -> ThaResult<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> ThaResult<()> {
        self.send(Command::Resume)
    }

    /// Replace the emotion library. The active emotion is looked up again
    /// in the new library; if it is gone the driver falls back to neutral.
    pub fn reload_emotions(&self, library: EmotionLibrary) -> ThaResult<()> {
        let library = Arc::new(library);
        *self.library.write() = Arc::clone(&library);
        self.send(Command::ReloadEmotions(library))
    }

    /// Ask the driver to stop. An in-flight render is abandoned.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Current emotion library snapshot
    pub fn library(&self) -> Arc<EmotionLibrary> {
        Arc::clone(&self.library.read())
    }

    fn send(&self, command: Command) -> ThaResult<()> {
        if self.is_shutdown() {
            return Err(ThaError::DriverStopped);
        }
        debug!(command = command.name(), "queued");
        self.commands
            .send(command)
            .map_err(|_| ThaError::DriverStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tha_effects::FilterSpec;

    fn handle() -> (ControlHandle, mpsc::UnboundedReceiver<Command>) {
        let (handle, rx, _shutdown) =
            ControlHandle::new(Arc::new(EmotionLibrary::builtin()), ChannelPairs::standard());
        (handle, rx)
    }

    #[test]
    fn test_set_emotion_queues_resolved_target() {
        let (handle, mut rx) = handle();
        handle.set_emotion("joy", [("eye_wink", 0.5)]).unwrap();

        match rx.try_recv().unwrap() {
            Command::SetTarget {
                template,
                overrides,
            } => {
                assert_eq!(template.name(), "joy");
                assert_eq!(overrides.get(&Channel::EyeWinkLeft), Some(&0.5));
                assert_eq!(overrides.get(&Channel::EyeWinkRight), Some(&0.5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invalid_requests_not_queued() {
        let (handle, mut rx) = handle();

        assert_eq!(
            handle.set_emotion("smug", std::iter::empty::<(&str, f32)>()),
            Err(ThaError::UnknownEmotion("smug".into()))
        );
        assert!(handle.set_emotion("joy", [("tail_wag", 1.0)]).is_err());
        assert!(handle.set_emotion("joy", [("head_x", 4.0)]).is_err());

        let mut config = AnimatorConfig::default();
        config.target_fps = -1.0;
        assert!(handle.configure(config).is_err());

        let bad = EffectSpec::new(vec![FilterSpec::Vignetting(tha_effects::VignettingParams {
            strength: 3.0,
        })]);
        assert!(handle.set_effects(bad).unwrap_err().is_configuration());

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scores_pick_dominant() {
        let (handle, mut rx) = handle();
        let chosen = handle
            .set_emotion_from_scores([("joy", 0.2), ("anger", 0.7), ("fear", 0.1)])
            .unwrap();
        assert_eq!(chosen, "anger");

        let chosen = handle.set_emotion_from_scores([("smugness", 0.9)]).unwrap();
        assert_eq!(chosen, "neutral");

        assert!(matches!(rx.try_recv(), Ok(Command::SetTarget { .. })));
        assert!(matches!(rx.try_recv(), Ok(Command::SetTarget { .. })));
    }

    #[test]
    fn test_reload_updates_validation_library() {
        let (handle, mut rx) = handle();
        handle.reload_emotions(EmotionLibrary::neutral_only()).unwrap();

        assert!(handle.set_emotion("joy", std::iter::empty::<(&str, f32)>()).is_err());
        assert!(handle.set_emotion("neutral", std::iter::empty::<(&str, f32)>()).is_ok());
        assert!(matches!(rx.try_recv(), Ok(Command::ReloadEmotions(_))));
        assert_eq!(handle.library().len(), 1);
    }

    #[test]
    fn test_shutdown_rejects_further_commands() {
        let (handle, _rx) = handle();
        let other = handle.clone();
        handle.shutdown();
        assert!(other.is_shutdown());
        assert_eq!(other.pause(), Err(ThaError::DriverStopped));
    }

    #[test]
    fn test_closed_queue() {
        let (handle, rx) = handle();
        drop(rx);
        assert_eq!(handle.resume(), Err(ThaError::DriverStopped));
    }
}
