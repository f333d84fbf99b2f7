pub mod player;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use simulation::{SimulationPlan, SimulationSummary};
pub use tester::*;
