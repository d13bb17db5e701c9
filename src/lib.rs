// Library for tests to access modules

pub mod config;
pub mod events;
pub mod gateway;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod runtime;
pub mod sampler;
pub mod version;
