pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod run;
pub mod sink;
pub mod venues;
