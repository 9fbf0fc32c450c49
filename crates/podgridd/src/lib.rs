//! podgridd — scenario-driven cluster simulation.
//!
//! Library surface for the daemon binary and its integration tests:
//! scenario parsing and the tick driver that steps the control loops
//! over simulated time.

pub mod config;
pub mod driver;

pub use config::ScenarioConfig;
pub use driver::{FinalReport, SimDriver, TickReport};
