/// Tick clock for run-length management.
pub mod clock;
/// Seeded member departures and rejoins.
pub mod churn;
pub mod engine;
pub mod summary;
pub mod types;

pub use engine::Simulation;
pub use summary::GridSummary;
pub use types::TickReport;
