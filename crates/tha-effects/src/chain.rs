//! Effect chain - ordered filters applied to every rendered frame

use tracing::trace;

use tha_core::ThaResult;

use crate::filters::{self, Filter};
use crate::{EffectSpec, Frame};

/// Built, validated filter pipeline
pub struct EffectChain {
    spec: EffectSpec,
    filters: Vec<Box<dyn Filter>>,
}

impl EffectChain {
    /// Create a new chain. Fails if any filter parameter is invalid.
    ///
    /// Stochastic filters get distinct seeds derived from `seed`, so two
    /// chains built from the same spec and seed produce identical output.
    pub fn new(spec: EffectSpec, seed: u64) -> ThaResult<Self> {
        spec.validate()?;
        let filters = spec
            .filters()
            .iter()
            .enumerate()
            .map(|(i, f)| filters::build(f, seed.wrapping_add(i as u64)))
            .collect();
        Ok(Self { spec, filters })
    }

    /// Chain that leaves frames untouched
    pub fn empty() -> Self {
        Self {
            spec: EffectSpec::empty(),
            filters: Vec::new(),
        }
    }

    /// Run every filter in order on `frame`
    pub fn apply(&mut self, frame: &mut Frame, dt: f64) {
        for filter in &mut self.filters {
            filter.apply(frame, dt);
            trace!(filter = filter.name(), "filter applied");
        }
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    pub fn spec(&self) -> &EffectSpec {
        &self.spec
    }

    /// Filter identifiers in application order
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("filters", &self.names())
            .finish()
    }
}
