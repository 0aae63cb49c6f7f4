//! Left/right channel pairs
//!
//! Posedict files and older clients drive symmetric expressions with a
//! single key (`eyebrow_troubled`). The model has separate left and right
//! channels for those, so a logical key is expanded through an explicit
//! mapping table. Per-side keys always take precedence over the logical key
//! for their side.

use std::collections::BTreeMap;

use tha_core::{Channel, ThaError, ThaResult};

/// Logical key → (left, right) mapping table
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPairs {
    pairs: BTreeMap<String, (Channel, Channel)>,
}

impl ChannelPairs {
    /// Table with one entry per `_left`/`_right` channel pair of the model
    pub fn standard() -> Self {
        let mut pairs = BTreeMap::new();
        for channel in Channel::ALL {
            let Some(stem) = channel.name().strip_suffix("_left") else {
                continue;
            };
            if let Some(right) = channel.mirror() {
                pairs.insert(stem.to_string(), (channel, right));
            }
        }
        Self { pairs }
    }

    pub fn empty() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<(Channel, Channel)> {
        self.pairs.get(strip_index(key)).copied()
    }

    /// Add or replace a mapping.
    ///
    /// A logical key may not shadow a physical channel name.
    pub fn insert(&mut self, key: &str, left: Channel, right: Channel) -> ThaResult<()> {
        let key = strip_index(key);
        if Channel::from_name(key).is_some() {
            return Err(ThaError::config(format!(
                "pair key {key:?} collides with a channel name"
            )));
        }
        if left == right {
            return Err(ThaError::config(format!(
                "pair {key:?} maps both sides to {left}"
            )));
        }
        self.pairs.insert(key.to_string(), (left, right));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, (Channel, Channel))> + '_ {
        self.pairs.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Turn named inputs into physical channel assignments.
    ///
    /// Accepts physical channel names, logical pair keys and the legacy
    /// `_index` suffix on either. Values must lie within the target
    /// channel's range.
    pub fn resolve<'a, I>(&self, inputs: I) -> ThaResult<BTreeMap<Channel, f32>>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut explicit = BTreeMap::new();
        let mut logical = BTreeMap::new();

        for (name, value) in inputs {
            if let Some(channel) = Channel::from_name(name) {
                check_value(channel, value)?;
                explicit.insert(channel, value);
            } else if let Some((left, right)) = self.get(name) {
                check_value(left, value)?;
                check_value(right, value)?;
                logical.insert(left, value);
                logical.insert(right, value);
            } else {
                return Err(ThaError::UnknownChannel(name.to_string()));
            }
        }

        for (channel, value) in logical {
            explicit.entry(channel).or_insert(value);
        }
        Ok(explicit)
    }
}

impl Default for ChannelPairs {
    fn default() -> Self {
        Self::standard()
    }
}

fn strip_index(key: &str) -> &str {
    key.strip_suffix("_index").unwrap_or(key)
}

fn check_value(channel: Channel, value: f32) -> ThaResult<()> {
    let range = channel.range();
    if value.is_finite() && range.contains(value) {
        Ok(())
    } else {
        Err(ThaError::OutOfRange {
            what: channel.name().to_string(),
            value: value as f64,
            min: range.min as f64,
            max: range.max as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let pairs = ChannelPairs::standard();
        assert_eq!(
            pairs.get("eyebrow_troubled"),
            Some((Channel::EyebrowTroubledLeft, Channel::EyebrowTroubledRight))
        );
        assert_eq!(
            pairs.get("eye_wink_index"),
            Some((Channel::EyeWinkLeft, Channel::EyeWinkRight))
        );
        assert!(pairs.get("mouth_aaa").is_none());
        // 6 eyebrow + 6 eye + iris_small + 2 mouth corner pairs
        assert_eq!(pairs.len(), 15);
    }

    #[test]
    fn test_logical_key_drives_both_sides() {
        let pairs = ChannelPairs::standard();
        let out = pairs.resolve([("eyebrow_happy", 0.7)]).unwrap();
        assert_eq!(out.get(&Channel::EyebrowHappyLeft), Some(&0.7));
        assert_eq!(out.get(&Channel::EyebrowHappyRight), Some(&0.7));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_explicit_side_wins_regardless_of_order() {
        let pairs = ChannelPairs::standard();

        let a = pairs
            .resolve([("eye_wink_left", 0.2), ("eye_wink", 0.9)])
            .unwrap();
        let b = pairs
            .resolve([("eye_wink", 0.9), ("eye_wink_left", 0.2)])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[&Channel::EyeWinkLeft], 0.2);
        assert_eq!(a[&Channel::EyeWinkRight], 0.9);
    }

    #[test]
    fn test_resolve_rejects_unknown_and_out_of_range() {
        let pairs = ChannelPairs::standard();
        assert!(matches!(
            pairs.resolve([("ear_wiggle", 0.5)]),
            Err(ThaError::UnknownChannel(_))
        ));
        assert!(matches!(
            pairs.resolve([("eyebrow_angry", 1.5)]),
            Err(ThaError::OutOfRange { .. })
        ));
        assert!(pairs.resolve([("head_x", -0.5)]).is_ok());
        assert!(pairs.resolve([("mouth_aaa", f32::NAN)]).is_err());
    }

    #[test]
    fn test_insert_custom_pair() {
        let mut pairs = ChannelPairs::empty();
        pairs
            .insert("mouth_corner_up", Channel::MouthRaisedCornerLeft, Channel::MouthRaisedCornerRight)
            .unwrap();
        assert!(pairs.resolve([("mouth_corner_up", 1.0)]).is_ok());
        assert!(pairs.insert("mouth_aaa", Channel::MouthAaa, Channel::MouthIii).is_err());
        assert!(pairs.insert("same", Channel::HeadX, Channel::HeadX).is_err());
    }
}
