pub mod main_handler;

pub mod accumulate;
pub mod config;
pub mod constraint;
pub mod control;
pub mod demos;
pub mod fixbank;
pub mod generate;
pub mod manifest;
pub mod oracle;
pub mod policies;
pub mod propose;
pub mod repair;
pub mod synthesize;
pub mod template;
pub mod util;
pub mod value;
