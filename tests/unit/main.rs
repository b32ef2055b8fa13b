//! Unit tests exercising the public API of each module.

mod authorization;
mod config;
mod error;
