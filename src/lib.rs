#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unexpected_cfgs)]

pub mod aggregator;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod exposition;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod server;
pub(crate) mod datasource;
