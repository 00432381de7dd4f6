pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod notify;
pub mod platform;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod store;
pub mod util;

pub use error::{Error, Result};
