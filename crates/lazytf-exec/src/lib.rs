pub mod commands;
pub mod contracts;
pub mod engine;
pub mod executor;
pub mod lines;
pub mod simulated;

pub use commands::*;
pub use contracts::*;
pub use engine::*;
pub use executor::*;
pub use lines::*;
pub use simulated::*;
