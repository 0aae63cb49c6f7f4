//! THA Effects - Postprocessing for rendered frames
//!
//! An [`EffectSpec`] is an ordered list of filters, each with its own
//! parameters. It is validated once when an [`EffectChain`] is built; after
//! that, applying the chain to a frame cannot fail.
//!
//! Filters are independent: none assumes another ran before it. Animated
//! filters (scanline field flip, scrolling bands, glitches, noise) keep
//! their state inside their own instance.

pub mod chain;
pub mod filters;
pub mod frame;
pub mod spec;

pub use chain::*;
pub use filters::Filter;
pub use frame::*;
pub use spec::*;
