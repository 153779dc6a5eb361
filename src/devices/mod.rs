//! Simulated grid members used by the scenario driver.

/// Rechargeable energy cell storage.
pub mod cell;
/// Level emitter watcher host.
pub mod emitter;
/// Daylight-driven generator.
pub mod generator;
/// Machine with a periodic idle-draw profile.
pub mod machine;
pub mod types;

pub use cell::EnergyCell;
pub use emitter::LevelEmitter;
pub use generator::Generator;
pub use machine::Machine;
pub use types::Device;
pub use types::DeviceContext;
