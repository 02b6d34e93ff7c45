pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod path_serde;
pub mod platform;
pub mod report;
pub mod scan;
pub mod store;
pub mod util;

pub use error::{Error, Result};
