pub mod clock;
pub mod config;
pub mod error;
pub mod random;
pub mod types;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::CadenceConfig;
pub use error::{CadenceError, Result};
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use types::*;
