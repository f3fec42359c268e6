pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod machine;
pub mod paths;
pub mod progress;
pub mod session;
pub mod simulator;
pub mod state;
pub mod types;

pub use error::{GuideError, Result};
