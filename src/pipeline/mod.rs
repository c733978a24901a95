//! Pipeline entry points for monitor operations.
//!
//! - `build_monitor`: Wire the reference collaborators from config
//! - `run_once`: One scan cycle followed by notification delivery
//! - `run_loop`: Repeat cycles on an interval until cancelled

pub mod assemble;
pub mod schedule;

pub use assemble::{Monitor, build_monitor};
pub use schedule::{run_loop, run_once};
