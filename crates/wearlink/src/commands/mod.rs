//! Command handlers.

pub mod catalog;
pub mod config_cmd;
pub mod decode;
pub mod simulate;
