pub mod config;
pub mod transcribe;

pub use config::*;
pub use transcribe::*;
