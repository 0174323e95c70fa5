//! Live session lifecycle: controller, event engine, and turn accumulation.

pub mod controller;
pub mod turn;

pub use controller::{SessionController, SessionState};
pub use turn::TurnAccumulator;
