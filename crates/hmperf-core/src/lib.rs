//! Start Android performance runs and upload their reports.
//!
//! Flows live in [`session`]; everything below it is a building block
//! that can be driven on its own.

pub mod activity;
pub mod adb;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod extract;
pub mod net;
pub mod report;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
