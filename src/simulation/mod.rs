//! Simulated server lifecycles and the engine that reconciles them with the
//! persisted store.

pub mod engine;
pub mod pool;
pub mod random;
pub mod registry;
pub mod server;

pub use engine::{SimulationEngine, TickReport};
pub use pool::SimulatedPool;
pub use random::{RandomSource, StdRandom};
pub use registry::{SharedSimulation, SimulationRegistry};
pub use server::SimulatedServer;
