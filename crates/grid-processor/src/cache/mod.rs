//! Cache implementations for grid processing.

mod regridder_cache;

pub use regridder_cache::{RegridKey, RegridderCache};
