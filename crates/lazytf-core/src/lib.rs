pub mod actions;
pub mod classify;
pub mod config;
pub mod execution;
pub mod output;
pub mod reducer;
pub mod registry;
pub mod resolve;
pub mod safety;
pub mod state;

pub use actions::*;
pub use classify::*;
pub use config::*;
pub use execution::*;
pub use output::*;
pub use reducer::*;
pub use registry::*;
pub use resolve::*;
pub use safety::*;
pub use state::*;
