//! Remote API surface.

pub mod live;
