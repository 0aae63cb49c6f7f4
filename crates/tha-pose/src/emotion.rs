//! Emotion templates and the emotion library
//!
//! A template is a partial pose: channels it does not mention rest at
//! neutral. Templates are immutable once built; a library is replaced
//! wholesale on reload.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tha_core::{Channel, PoseVector, ThaError, ThaResult};
use tha_motion::EmotionCue;

use crate::ChannelPairs;

use Channel::*;

/// Name of the template every library must contain
pub const NEUTRAL: &str = "neutral";

/// A named target expression
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionTemplate {
    name: String,
    values: BTreeMap<Channel, f32>,
    override_only: BTreeSet<Channel>,
    rapid_blink: bool,
}

impl EmotionTemplate {
    /// Create a new template from physical channel values.
    ///
    /// `breathing` is owned by the breathing generator and is dropped.
    pub fn new(name: impl Into<String>, values: BTreeMap<Channel, f32>) -> ThaResult<Self> {
        let name = name.into();
        let mut checked = BTreeMap::new();
        for (channel, value) in values {
            if channel == Channel::Breathing {
                debug!(template = %name, "ignoring breathing value in template");
                continue;
            }
            let range = channel.range();
            if !(value.is_finite() && range.contains(value)) {
                return Err(ThaError::OutOfRange {
                    what: format!("{name}.{channel}"),
                    value: value as f64,
                    min: range.min as f64,
                    max: range.max as f64,
                });
            }
            checked.insert(channel, value);
        }
        Ok(Self {
            name,
            values: checked,
            override_only: BTreeSet::new(),
            rapid_blink: false,
        })
    }

    /// Build from a posedict-style definition, resolving pair keys
    pub fn from_def(name: impl Into<String>, def: &TemplateDef, pairs: &ChannelPairs) -> ThaResult<Self> {
        let values = pairs.resolve(def.values.iter().map(|(k, v)| (k.as_str(), *v)).filter(
            |(k, _)| {
                // Stored posedicts always carry a breathing entry
                Channel::from_name(k) != Some(Channel::Breathing)
            },
        ))?;
        let mut override_only = BTreeSet::new();
        for key in &def.override_only {
            if let Some(channel) = Channel::from_name(key) {
                override_only.insert(channel);
            } else if let Some((left, right)) = pairs.get(key) {
                override_only.insert(left);
                override_only.insert(right);
            } else {
                return Err(ThaError::UnknownChannel(key.clone()));
            }
        }
        Ok(Self::new(name, values)?
            .with_override_only(override_only)
            .with_rapid_blink(def.rapid_blink))
    }

    /// Mark channels on which procedural motion is ignored
    pub fn with_override_only(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.override_only.extend(channels);
        self
    }

    /// Allow extra blinks shortly after this emotion is entered
    pub fn with_rapid_blink(mut self, rapid_blink: bool) -> Self {
        self.rapid_blink = rapid_blink;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicitly set channels
    pub fn values(&self) -> &BTreeMap<Channel, f32> {
        &self.values
    }

    pub fn get(&self, channel: Channel) -> Option<f32> {
        self.values.get(&channel).copied()
    }

    pub fn override_only(&self) -> &BTreeSet<Channel> {
        &self.override_only
    }

    pub fn rapid_blink(&self) -> bool {
        self.rapid_blink
    }

    /// Complete target pose; unset channels are neutral
    pub fn target_pose(&self) -> PoseVector {
        let mut pose = PoseVector::neutral();
        for (channel, value) in &self.values {
            pose.set_clamped(*channel, *value);
        }
        pose
    }

    /// Target pose with manual overrides applied on top
    pub fn target_with(&self, overrides: &BTreeMap<Channel, f32>) -> PoseVector {
        let mut pose = self.target_pose();
        for (channel, value) in overrides {
            if *channel != Channel::Breathing {
                pose.set_clamped(*channel, *value);
            }
        }
        pose
    }

    /// What the motion generators need to know about this emotion
    pub fn cue(&self) -> EmotionCue {
        EmotionCue::new(self.name.clone(), self.rapid_blink)
    }
}

/// Serialized template: a flat posedict plus optional flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub override_only: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rapid_blink: bool,

    /// Channel or pair name → weight
    #[serde(flatten)]
    pub values: BTreeMap<String, f32>,
}

/// Requested target: an emotion plus manual per-channel overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetState {
    pub emotion: String,
    pub overrides: BTreeMap<Channel, f32>,
}

impl TargetState {
    pub fn new(emotion: impl Into<String>) -> Self {
        Self {
            emotion: emotion.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<Channel, f32>) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Immutable set of named templates; always contains `neutral`
#[derive(Debug, Clone)]
pub struct EmotionLibrary {
    templates: BTreeMap<String, Arc<EmotionTemplate>>,
    neutral: Arc<EmotionTemplate>,
}

impl EmotionLibrary {
    /// Library with only the neutral template
    pub fn neutral_only() -> Self {
        let neutral = Arc::new(EmotionTemplate {
            name: NEUTRAL.to_string(),
            values: BTreeMap::new(),
            override_only: BTreeSet::new(),
            rapid_blink: false,
        });
        let mut templates = BTreeMap::new();
        templates.insert(NEUTRAL.to_string(), neutral.clone());
        Self { templates, neutral }
    }

    /// The 28 labels of the emotion classifier with stock expressions
    pub fn builtin() -> Self {
        let mut library = Self::neutral_only();
        for (name, entries, rapid_blink) in BUILTIN {
            let mut values = BTreeMap::new();
            for (channel, value) in entries.iter() {
                values.insert(*channel, *value);
                if channel.name().ends_with("_left") {
                    if let Some(right) = channel.mirror() {
                        values.entry(right).or_insert(*value);
                    }
                }
            }
            let template = EmotionTemplate {
                name: name.to_string(),
                values,
                override_only: BTreeSet::new(),
                rapid_blink: *rapid_blink,
            };
            library.insert(template);
        }
        library
    }

    /// Build from posedict definitions. `neutral` must be among them.
    pub fn from_defs(defs: &BTreeMap<String, TemplateDef>, pairs: &ChannelPairs) -> ThaResult<Self> {
        let Some(neutral_def) = defs.get(NEUTRAL) else {
            return Err(ThaError::config("emotion library has no neutral template"));
        };
        let neutral = Arc::new(EmotionTemplate::from_def(NEUTRAL, neutral_def, pairs)?);
        let mut library = Self {
            templates: BTreeMap::new(),
            neutral: neutral.clone(),
        };
        library.templates.insert(NEUTRAL.to_string(), neutral);
        for (name, def) in defs {
            if name != NEUTRAL {
                library.insert(EmotionTemplate::from_def(name.clone(), def, pairs)?);
            }
        }
        Ok(library)
    }

    /// Parse a JSON object of `name → posedict`
    pub fn from_posedicts(json: &str, pairs: &ChannelPairs) -> ThaResult<Self> {
        let defs: BTreeMap<String, TemplateDef> = serde_json::from_str(json)
            .map_err(|e| ThaError::config(format!("invalid emotion templates: {e}")))?;
        Self::from_defs(&defs, pairs)
    }

    /// Add or replace a template
    pub fn insert(&mut self, template: EmotionTemplate) {
        let template = Arc::new(template);
        if template.name == NEUTRAL {
            self.neutral = template.clone();
        }
        self.templates.insert(template.name.clone(), template);
    }

    pub fn with_template(mut self, template: EmotionTemplate) -> Self {
        self.insert(template);
        self
    }

    pub fn get(&self, name: &str) -> ThaResult<Arc<EmotionTemplate>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| ThaError::UnknownEmotion(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn neutral(&self) -> Arc<EmotionTemplate> {
        self.neutral.clone()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template for the highest-scoring classifier label.
    ///
    /// Falls back to neutral when the winning label has no template or no
    /// usable score was given.
    pub fn dominant<'a, I>(&self, scores: I) -> Arc<EmotionTemplate>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let best = scores
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .fold(None::<(&str, f32)>, |best, (label, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((label, score)),
            });

        match best {
            Some((label, _)) => match self.templates.get(label) {
                Some(template) => template.clone(),
                None => {
                    warn!(label, "no template for classified emotion, using neutral");
                    self.neutral.clone()
                }
            },
            None => {
                warn!("no emotion scores, using neutral");
                self.neutral.clone()
            }
        }
    }

    /// Resolve a target state to a template and its complete pose
    pub fn target(&self, state: &TargetState) -> ThaResult<(Arc<EmotionTemplate>, PoseVector)> {
        let template = self.get(&state.emotion)?;
        let pose = template.target_with(&state.overrides);
        Ok((template, pose))
    }
}

impl Default for EmotionLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

type BuiltinEntry = (&'static str, &'static [(Channel, f32)], bool);

// Left-side entries are mirrored to the right side.
const BUILTIN: &[BuiltinEntry] = &[
    ("admiration", &[(EyebrowRaisedLeft, 0.4), (EyeHappyWinkLeft, 0.3), (MouthRaisedCornerLeft, 0.6), (IrisSmallLeft, 0.2)], false),
    ("amusement", &[(EyebrowHappyLeft, 0.6), (EyeHappyWinkLeft, 0.7), (MouthAaa, 0.4), (MouthRaisedCornerLeft, 0.8)], false),
    ("anger", &[(EyebrowAngryLeft, 1.0), (EyeUnimpressedLeft, 0.3), (MouthLoweredCornerLeft, 0.7), (MouthDelta, 0.3), (IrisSmallLeft, 0.3)], false),
    ("annoyance", &[(EyebrowSeriousLeft, 0.6), (EyeUnimpressedLeft, 0.6), (MouthLoweredCornerLeft, 0.4)], false),
    ("approval", &[(EyebrowHappyLeft, 0.4), (EyeRelaxedLeft, 0.3), (MouthRaisedCornerLeft, 0.5)], false),
    ("caring", &[(EyebrowTroubledLeft, 0.3), (EyeRelaxedLeft, 0.5), (MouthRaisedCornerLeft, 0.4)], false),
    ("confusion", &[(EyebrowTroubledLeft, 0.6), (EyebrowRaisedRight, 0.5), (MouthDelta, 0.3), (IrisRotationX, 0.2)], true),
    ("curiosity", &[(EyebrowRaisedLeft, 0.6), (EyeSurprisedLeft, 0.2), (MouthOoo, 0.2), (NeckZ, 0.1)], false),
    ("desire", &[(EyebrowHappyLeft, 0.3), (EyeRelaxedLeft, 0.6), (MouthRaisedCornerLeft, 0.3), (MouthSmirk, 0.3)], false),
    ("disappointment", &[(EyebrowTroubledLeft, 0.7), (EyeRelaxedLeft, 0.4), (MouthLoweredCornerLeft, 0.6)], false),
    ("disapproval", &[(EyebrowSeriousLeft, 0.7), (EyeUnimpressedLeft, 0.5), (MouthLoweredCornerLeft, 0.5), (MouthSmirk, 0.2)], false),
    ("disgust", &[(EyebrowAngryLeft, 0.5), (EyeRaisedLowerEyelidLeft, 0.6), (MouthIii, 0.3), (MouthLoweredCornerLeft, 0.8)], false),
    ("embarrassment", &[(EyebrowTroubledLeft, 0.5), (EyeHappyWinkLeft, 0.3), (MouthRaisedCornerLeft, 0.3), (IrisRotationY, -0.3)], false),
    ("excitement", &[(EyebrowRaisedLeft, 0.7), (EyeSurprisedLeft, 0.4), (IrisSmallLeft, 0.3), (MouthAaa, 0.5), (MouthRaisedCornerLeft, 0.7)], false),
    ("fear", &[(EyebrowTroubledLeft, 1.0), (EyeSurprisedLeft, 0.8), (IrisSmallLeft, 0.6), (MouthEee, 0.3)], false),
    ("gratitude", &[(EyebrowHappyLeft, 0.5), (EyeHappyWinkLeft, 0.5), (MouthRaisedCornerLeft, 0.6)], false),
    ("grief", &[(EyebrowTroubledLeft, 1.0), (EyeRelaxedLeft, 0.7), (MouthLoweredCornerLeft, 1.0)], false),
    ("joy", &[(EyebrowHappyLeft, 0.8), (EyeHappyWinkLeft, 1.0), (MouthAaa, 0.3), (MouthRaisedCornerLeft, 1.0)], false),
    ("love", &[(EyebrowHappyLeft, 0.6), (EyeRelaxedLeft, 0.6), (MouthRaisedCornerLeft, 0.8)], false),
    ("nervousness", &[(EyebrowTroubledLeft, 0.8), (EyeRaisedLowerEyelidLeft, 0.3), (IrisSmallLeft, 0.4), (MouthIii, 0.3)], false),
    ("optimism", &[(EyebrowRaisedLeft, 0.3), (EyeHappyWinkLeft, 0.4), (MouthRaisedCornerLeft, 0.7)], false),
    ("pride", &[(EyebrowSeriousLeft, 0.3), (EyeRelaxedLeft, 0.4), (MouthSmirk, 0.7)], false),
    ("realization", &[(EyebrowRaisedLeft, 1.0), (EyeSurprisedLeft, 0.6), (MouthOoo, 0.5)], false),
    ("relief", &[(EyebrowHappyLeft, 0.4), (EyeRelaxedLeft, 0.8), (MouthRaisedCornerLeft, 0.4), (MouthUuu, 0.2)], false),
    ("remorse", &[(EyebrowTroubledLeft, 0.8), (EyeRelaxedLeft, 0.5), (MouthLoweredCornerLeft, 0.5), (IrisRotationY, -0.4)], false),
    ("sadness", &[(EyebrowTroubledLeft, 1.0), (EyeRelaxedLeft, 0.6), (MouthLoweredCornerLeft, 0.8)], false),
    ("surprise", &[(EyebrowRaisedLeft, 1.0), (EyeSurprisedLeft, 1.0), (IrisSmallLeft, 0.5), (MouthOoo, 0.8)], false),
];
