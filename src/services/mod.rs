pub mod gemini;
pub mod runner;

pub use runner::Runner;
