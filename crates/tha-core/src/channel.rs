//! Pose channels - the degrees of freedom of the posing model
//!
//! The posing model consumes a fixed-length vector of 45 weights. Each weight
//! is a named channel with a declared valid range and a rule describing how
//! procedural motion may be layered on top of it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ThaError, ThaResult};

/// Pose channel identifier, in model input order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    // Eyebrows
    EyebrowTroubledLeft,
    EyebrowTroubledRight,
    EyebrowAngryLeft,
    EyebrowAngryRight,
    EyebrowLoweredLeft,
    EyebrowLoweredRight,
    EyebrowRaisedLeft,
    EyebrowRaisedRight,
    EyebrowHappyLeft,
    EyebrowHappyRight,
    EyebrowSeriousLeft,
    EyebrowSeriousRight,

    // Eyes
    EyeWinkLeft,
    EyeWinkRight,
    EyeHappyWinkLeft,
    EyeHappyWinkRight,
    EyeSurprisedLeft,
    EyeSurprisedRight,
    EyeRelaxedLeft,
    EyeRelaxedRight,
    EyeUnimpressedLeft,
    EyeUnimpressedRight,
    EyeRaisedLowerEyelidLeft,
    EyeRaisedLowerEyelidRight,

    // Irises
    IrisSmallLeft,
    IrisSmallRight,

    // Mouth
    MouthAaa,
    MouthIii,
    MouthUuu,
    MouthEee,
    MouthOoo,
    MouthDelta,
    MouthLoweredCornerLeft,
    MouthLoweredCornerRight,
    MouthRaisedCornerLeft,
    MouthRaisedCornerRight,
    MouthSmirk,

    // Gaze
    IrisRotationX,
    IrisRotationY,

    // Head and body
    HeadX,
    HeadY,
    NeckZ,
    BodyY,
    BodyZ,

    Breathing,
}

/// Coarse grouping of channels, used for per-group tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelGroup {
    Eyebrow,
    Eye,
    Iris,
    Mouth,
    Head,
    Body,
    Breathing,
}

/// How procedural offsets combine with the interpolated value of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    /// The interpolated value is authoritative; offsets are discarded
    Override,
    /// Offsets are summed onto the value; leaving the range is a violation (clamped)
    Additive,
    /// Offsets are summed onto the value and saturate at the range bounds
    AdditiveClamped,
}

/// Closed interval of valid weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    pub min: f32,
    pub max: f32,
}

impl ChannelRange {
    /// Morph weights
    pub const UNIT: ChannelRange = ChannelRange { min: 0.0, max: 1.0 };
    /// Rotations and translations
    pub const SIGNED: ChannelRange = ChannelRange {
        min: -1.0,
        max: 1.0,
    };

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp into range. NaN maps to the lower bound.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

impl Channel {
    /// Number of channels the posing model consumes
    pub const COUNT: usize = 45;

    /// All channels in model order
    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::EyebrowTroubledLeft,
        Channel::EyebrowTroubledRight,
        Channel::EyebrowAngryLeft,
        Channel::EyebrowAngryRight,
        Channel::EyebrowLoweredLeft,
        Channel::EyebrowLoweredRight,
        Channel::EyebrowRaisedLeft,
        Channel::EyebrowRaisedRight,
        Channel::EyebrowHappyLeft,
        Channel::EyebrowHappyRight,
        Channel::EyebrowSeriousLeft,
        Channel::EyebrowSeriousRight,
        Channel::EyeWinkLeft,
        Channel::EyeWinkRight,
        Channel::EyeHappyWinkLeft,
        Channel::EyeHappyWinkRight,
        Channel::EyeSurprisedLeft,
        Channel::EyeSurprisedRight,
        Channel::EyeRelaxedLeft,
        Channel::EyeRelaxedRight,
        Channel::EyeUnimpressedLeft,
        Channel::EyeUnimpressedRight,
        Channel::EyeRaisedLowerEyelidLeft,
        Channel::EyeRaisedLowerEyelidRight,
        Channel::IrisSmallLeft,
        Channel::IrisSmallRight,
        Channel::MouthAaa,
        Channel::MouthIii,
        Channel::MouthUuu,
        Channel::MouthEee,
        Channel::MouthOoo,
        Channel::MouthDelta,
        Channel::MouthLoweredCornerLeft,
        Channel::MouthLoweredCornerRight,
        Channel::MouthRaisedCornerLeft,
        Channel::MouthRaisedCornerRight,
        Channel::MouthSmirk,
        Channel::IrisRotationX,
        Channel::IrisRotationY,
        Channel::HeadX,
        Channel::HeadY,
        Channel::NeckZ,
        Channel::BodyY,
        Channel::BodyZ,
        Channel::Breathing,
    ];

    /// Position in the model's input vector
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel at a model input position
    pub fn from_index(index: usize) -> Option<Channel> {
        Channel::ALL.get(index).copied()
    }

    /// Canonical snake_case name
    pub fn name(self) -> &'static str {
        match self {
            Channel::EyebrowTroubledLeft => "eyebrow_troubled_left",
            Channel::EyebrowTroubledRight => "eyebrow_troubled_right",
            Channel::EyebrowAngryLeft => "eyebrow_angry_left",
            Channel::EyebrowAngryRight => "eyebrow_angry_right",
            Channel::EyebrowLoweredLeft => "eyebrow_lowered_left",
            Channel::EyebrowLoweredRight => "eyebrow_lowered_right",
            Channel::EyebrowRaisedLeft => "eyebrow_raised_left",
            Channel::EyebrowRaisedRight => "eyebrow_raised_right",
            Channel::EyebrowHappyLeft => "eyebrow_happy_left",
            Channel::EyebrowHappyRight => "eyebrow_happy_right",
            Channel::EyebrowSeriousLeft => "eyebrow_serious_left",
            Channel::EyebrowSeriousRight => "eyebrow_serious_right",
            Channel::EyeWinkLeft => "eye_wink_left",
            Channel::EyeWinkRight => "eye_wink_right",
            Channel::EyeHappyWinkLeft => "eye_happy_wink_left",
            Channel::EyeHappyWinkRight => "eye_happy_wink_right",
            Channel::EyeSurprisedLeft => "eye_surprised_left",
            Channel::EyeSurprisedRight => "eye_surprised_right",
            Channel::EyeRelaxedLeft => "eye_relaxed_left",
            Channel::EyeRelaxedRight => "eye_relaxed_right",
            Channel::EyeUnimpressedLeft => "eye_unimpressed_left",
            Channel::EyeUnimpressedRight => "eye_unimpressed_right",
            Channel::EyeRaisedLowerEyelidLeft => "eye_raised_lower_eyelid_left",
            Channel::EyeRaisedLowerEyelidRight => "eye_raised_lower_eyelid_right",
            Channel::IrisSmallLeft => "iris_small_left",
            Channel::IrisSmallRight => "iris_small_right",
            Channel::MouthAaa => "mouth_aaa",
            Channel::MouthIii => "mouth_iii",
            Channel::MouthUuu => "mouth_uuu",
            Channel::MouthEee => "mouth_eee",
            Channel::MouthOoo => "mouth_ooo",
            Channel::MouthDelta => "mouth_delta",
            Channel::MouthLoweredCornerLeft => "mouth_lowered_corner_left",
            Channel::MouthLoweredCornerRight => "mouth_lowered_corner_right",
            Channel::MouthRaisedCornerLeft => "mouth_raised_corner_left",
            Channel::MouthRaisedCornerRight => "mouth_raised_corner_right",
            Channel::MouthSmirk => "mouth_smirk",
            Channel::IrisRotationX => "iris_rotation_x",
            Channel::IrisRotationY => "iris_rotation_y",
            Channel::HeadX => "head_x",
            Channel::HeadY => "head_y",
            Channel::NeckZ => "neck_z",
            Channel::BodyY => "body_y",
            Channel::BodyZ => "body_z",
            Channel::Breathing => "breathing",
        }
    }

    /// Look up a channel by name.
    ///
    /// Accepts the legacy `_index` suffix used by posedict files
    /// (`eye_wink_left_index`).
    pub fn from_name(name: &str) -> Option<Channel> {
        let name = name.strip_suffix("_index").unwrap_or(name);
        Channel::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn group(self) -> ChannelGroup {
        use Channel::*;
        match self {
            EyebrowTroubledLeft | EyebrowTroubledRight | EyebrowAngryLeft | EyebrowAngryRight
            | EyebrowLoweredLeft | EyebrowLoweredRight | EyebrowRaisedLeft | EyebrowRaisedRight
            | EyebrowHappyLeft | EyebrowHappyRight | EyebrowSeriousLeft | EyebrowSeriousRight => {
                ChannelGroup::Eyebrow
            }
            EyeWinkLeft | EyeWinkRight | EyeHappyWinkLeft | EyeHappyWinkRight
            | EyeSurprisedLeft | EyeSurprisedRight | EyeRelaxedLeft | EyeRelaxedRight
            | EyeUnimpressedLeft | EyeUnimpressedRight | EyeRaisedLowerEyelidLeft
            | EyeRaisedLowerEyelidRight => ChannelGroup::Eye,
            IrisSmallLeft | IrisSmallRight | IrisRotationX | IrisRotationY => ChannelGroup::Iris,
            MouthAaa | MouthIii | MouthUuu | MouthEee | MouthOoo | MouthDelta
            | MouthLoweredCornerLeft | MouthLoweredCornerRight | MouthRaisedCornerLeft
            | MouthRaisedCornerRight | MouthSmirk => ChannelGroup::Mouth,
            HeadX | HeadY | NeckZ => ChannelGroup::Head,
            BodyY | BodyZ => ChannelGroup::Body,
            Breathing => ChannelGroup::Breathing,
        }
    }

    /// Declared valid range
    pub fn range(self) -> ChannelRange {
        match self {
            Channel::IrisRotationX
            | Channel::IrisRotationY
            | Channel::HeadX
            | Channel::HeadY
            | Channel::NeckZ
            | Channel::BodyY
            | Channel::BodyZ => ChannelRange::SIGNED,
            _ => ChannelRange::UNIT,
        }
    }

    /// Rest value
    pub fn neutral(self) -> f32 {
        0.0
    }

    /// Combination rule used unless a template marks the channel override-only
    pub fn default_rule(self) -> CombineRule {
        match self {
            Channel::EyeWinkLeft | Channel::EyeWinkRight | Channel::MouthAaa | Channel::Breathing => {
                CombineRule::AdditiveClamped
            }
            Channel::HeadX | Channel::HeadY | Channel::NeckZ | Channel::BodyY | Channel::BodyZ => {
                CombineRule::Additive
            }
            _ => CombineRule::Override,
        }
    }

    /// The other side of a left/right pair
    pub fn mirror(self) -> Option<Channel> {
        let name = self.name();
        let other = if let Some(stem) = name.strip_suffix("_left") {
            format!("{stem}_right")
        } else if let Some(stem) = name.strip_suffix("_right") {
            format!("{stem}_left")
        } else {
            return None;
        };
        Channel::from_name(&other)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ThaError;

    fn from_str(s: &str) -> ThaResult<Self> {
        Channel::from_name(s).ok_or_else(|| ThaError::UnknownChannel(s.to_string()))
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Channel::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown channel `{name}`")))
    }
}
