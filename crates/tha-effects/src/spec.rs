//! Effect specifications
//!
//! Each filter identifier selects one variant of [`FilterSpec`] with its own
//! parameter struct. Parameters are checked when the spec is parsed or when
//! a chain is built, never while frames are being processed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tha_core::{ThaError, ThaResult};

/// Known filter identifiers
pub const FILTER_NAMES: [&str; 10] = [
    "bloom",
    "chromatic_aberration",
    "vignetting",
    "translucency",
    "alphanoise",
    "noise",
    "scanlines",
    "desaturate",
    "banding",
    "digital_glitches",
];

/// One filter with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterSpec {
    Bloom(BloomParams),
    ChromaticAberration(ChromaticAberrationParams),
    Vignetting(VignettingParams),
    Translucency(TranslucencyParams),
    Alphanoise(AlphaNoiseParams),
    Noise(NoiseParams),
    Scanlines(ScanlinesParams),
    Desaturate(DesaturateParams),
    Banding(BandingParams),
    DigitalGlitches(DigitalGlitchesParams),
}

impl FilterSpec {
    /// Build from an identifier and a JSON parameter object.
    ///
    /// The identifier is checked first, so a misspelled filter is reported
    /// as [`ThaError::UnknownFilter`] rather than a parameter error.
    pub fn from_parts(id: &str, params: Value) -> ThaResult<Self> {
        if !FILTER_NAMES.contains(&id) {
            return Err(ThaError::UnknownFilter(id.to_string()));
        }
        let mut object = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(ThaError::config(format!(
                    "parameters of {id} must be an object, got {other}"
                )))
            }
        };
        object.insert("filter".to_string(), Value::String(id.to_string()));
        let spec: FilterSpec = serde_json::from_value(Value::Object(object))
            .map_err(|e| ThaError::config(format!("{id}: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::Bloom(_) => "bloom",
            FilterSpec::ChromaticAberration(_) => "chromatic_aberration",
            FilterSpec::Vignetting(_) => "vignetting",
            FilterSpec::Translucency(_) => "translucency",
            FilterSpec::Alphanoise(_) => "alphanoise",
            FilterSpec::Noise(_) => "noise",
            FilterSpec::Scanlines(_) => "scanlines",
            FilterSpec::Desaturate(_) => "desaturate",
            FilterSpec::Banding(_) => "banding",
            FilterSpec::DigitalGlitches(_) => "digital_glitches",
        }
    }

    pub fn validate(&self) -> ThaResult<()> {
        match self {
            FilterSpec::Bloom(p) => {
                unit("bloom.threshold", p.threshold)?;
                non_negative("bloom.exposure", p.exposure)?;
                check("bloom.sigma", p.sigma, 0.0, MAX_BLUR_SIGMA)
            }
            FilterSpec::ChromaticAberration(p) => {
                check(
                    "chromatic_aberration.transverse_sigma",
                    p.transverse_sigma,
                    0.0,
                    MAX_BLUR_SIGMA,
                )?;
                check("chromatic_aberration.axial_scale", p.axial_scale, -0.1, 0.1)
            }
            FilterSpec::Vignetting(p) => unit("vignetting.strength", p.strength),
            FilterSpec::Translucency(p) => unit("translucency.alpha", p.alpha),
            FilterSpec::Alphanoise(p) => unit("alphanoise.magnitude", p.magnitude),
            FilterSpec::Noise(p) => unit("noise.strength", p.strength),
            FilterSpec::Scanlines(p) => {
                if p.field > 1 {
                    return Err(ThaError::OutOfRange {
                        what: "scanlines.field".into(),
                        value: p.field as f64,
                        min: 0.0,
                        max: 1.0,
                    });
                }
                unit("scanlines.darken", p.darken)
            }
            FilterSpec::Desaturate(p) => {
                unit("desaturate.strength", p.strength)?;
                for c in p.tint_rgb {
                    unit("desaturate.tint_rgb", c)?;
                }
                Ok(())
            }
            FilterSpec::Banding(p) => {
                unit("banding.strength", p.strength)?;
                check("banding.density", p.density, f32::MIN_POSITIVE, 1000.0)?;
                non_negative("banding.speed", p.speed)
            }
            FilterSpec::DigitalGlitches(p) => {
                non_negative("digital_glitches.rate", p.rate)?;
                check("digital_glitches.duration", p.duration, f32::MIN_POSITIVE, 10.0)?;
                unit("digital_glitches.max_shift", p.max_shift)?;
                unit("digital_glitches.block_height", p.block_height)?;
                if p.max_blocks == 0 {
                    return Err(ThaError::config("digital_glitches.max_blocks must be at least 1"));
                }
                Ok(())
            }
        }
    }
}

/// Largest accepted Gaussian sigma (pixels)
pub const MAX_BLUR_SIGMA: f32 = 64.0;

fn check(what: &str, value: f32, min: f32, max: f32) -> ThaResult<()> {
    ThaError::check_range(what, value as f64, min as f64, max as f64)
}

fn unit(what: &str, value: f32) -> ThaResult<()> {
    check(what, value, 0.0, 1.0)
}

fn non_negative(what: &str, value: f32) -> ThaResult<()> {
    check(what, value, 0.0, f32::MAX)
}

/// Glow around bright areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BloomParams {
    /// Luminance above which a pixel contributes to the glow
    pub threshold: f32,
    /// Overall brightness multiplier applied before the glow is added
    pub exposure: f32,
    /// Glow radius (Gaussian sigma, pixels)
    pub sigma: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.56,
            exposure: 0.84,
            sigma: 7.0,
        }
    }
}

/// Lens color fringing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChromaticAberrationParams {
    /// Blur of the red and blue channels (pixels)
    pub transverse_sigma: f32,
    /// Relative radial scale of red (outward) and blue (inward)
    pub axial_scale: f32,
}

impl Default for ChromaticAberrationParams {
    fn default() -> Self {
        Self {
            transverse_sigma: 0.5,
            axial_scale: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VignettingParams {
    /// Darkening at the corners
    pub strength: f32,
}

impl Default for VignettingParams {
    fn default() -> Self {
        Self { strength: 0.42 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslucencyParams {
    /// Alpha multiplier
    pub alpha: f32,
}

impl Default for TranslucencyParams {
    fn default() -> Self {
        Self { alpha: 0.9 }
    }
}

/// Hologram-style flicker of the alpha channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlphaNoiseParams {
    pub magnitude: f32,
}

impl Default for AlphaNoiseParams {
    fn default() -> Self {
        Self { magnitude: 0.1 }
    }
}

/// Luminance noise, fresh every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseParams {
    pub strength: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self { strength: 0.3 }
    }
}

/// CRT-style scanlines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanlinesParams {
    /// Which field (0 = even rows, 1 = odd rows) is darkened first
    pub field: u8,
    /// Alternate the field every frame
    pub dynamic: bool,
    /// Brightness removed from darkened rows
    pub darken: f32,
}

impl Default for ScanlinesParams {
    fn default() -> Self {
        Self {
            field: 0,
            dynamic: true,
            darken: 0.5,
        }
    }
}

/// Monochrome tint, e.g. for an old-monitor look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesaturateParams {
    pub strength: f32,
    pub tint_rgb: [f32; 3],
}

impl Default for DesaturateParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            tint_rgb: [1.0, 0.5294, 0.1765],
        }
    }
}

/// Scrolling horizontal light bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandingParams {
    pub strength: f32,
    /// Bands per frame height
    pub density: f32,
    /// Scroll speed (frame heights per second)
    pub speed: f32,
}

impl Default for BandingParams {
    fn default() -> Self {
        Self {
            strength: 0.4,
            density: 2.0,
            speed: 0.5,
        }
    }
}

/// Occasional horizontal block displacement lasting several frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigitalGlitchesParams {
    /// Expected glitches per second
    pub rate: f32,
    /// How long one glitch stays on screen (seconds)
    pub duration: f32,
    /// Largest horizontal shift (fraction of width)
    pub max_shift: f32,
    /// Most displaced blocks per glitch
    pub max_blocks: u32,
    /// Height of a displaced block (fraction of height)
    pub block_height: f32,
}

impl Default for DigitalGlitchesParams {
    fn default() -> Self {
        Self {
            rate: 0.5,
            duration: 0.15,
            max_shift: 0.05,
            max_blocks: 4,
            block_height: 0.03,
        }
    }
}

/// Ordered filter list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectSpec(pub Vec<FilterSpec>);

impl EffectSpec {
    pub fn new(filters: Vec<FilterSpec>) -> Self {
        Self(filters)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from `(identifier, parameters)` pairs, validating each
    pub fn from_parts<I, S>(parts: I) -> ThaResult<Self>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        parts
            .into_iter()
            .map(|(id, params)| FilterSpec::from_parts(id.as_ref(), params))
            .collect::<ThaResult<Vec<_>>>()
            .map(Self)
    }

    /// Parse either a tagged list (`[{"filter": "bloom", ...}]`) or the
    /// pair form (`[["bloom", {...}]]`) used by chat client settings.
    pub fn from_json_str(json: &str) -> ThaResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ThaError::config(format!("invalid effect chain: {e}")))?;
        let Value::Array(items) = value else {
            return Err(ThaError::config("effect chain must be a list"));
        };

        let mut filters = Vec::with_capacity(items.len());
        for item in items {
            let spec = match item {
                Value::Array(pair) => match <[Value; 2]>::try_from(pair) {
                    Ok([Value::String(id), params]) => FilterSpec::from_parts(&id, params)?,
                    _ => return Err(ThaError::config("expected [filter_name, {parameters}]")),
                },
                Value::Object(mut map) => match map.remove("filter") {
                    Some(Value::String(id)) => FilterSpec::from_parts(&id, Value::Object(map))?,
                    _ => return Err(ThaError::config("filter entry has no \"filter\" name")),
                },
                other => {
                    return Err(ThaError::config(format!("unexpected effect chain entry {other}")))
                }
            };
            filters.push(spec);
        }
        Ok(Self(filters))
    }

    pub fn validate(&self) -> ThaResult<()> {
        self.0.iter().try_for_each(FilterSpec::validate)
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
