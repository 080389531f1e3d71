pub mod brdf;
pub mod cli;
pub mod config;
pub mod cubemap;
pub mod pipeline;
pub mod prefilter;
pub mod rgbe;
pub mod sampling;

pub use pipeline::{run, BakeMode};
