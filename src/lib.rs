pub mod cli;
pub mod config;
pub mod exec;
pub mod extract;
pub mod outcome;
pub mod params;
pub mod pipeline;
pub mod stage;
pub mod toolchain;
pub mod util;
pub mod workspace;
