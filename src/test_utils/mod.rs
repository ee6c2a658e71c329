//! Shared test helpers: payload fixtures, config builders and mocks.

#![cfg(test)]

pub mod config;
pub mod fixtures;
pub mod mocks;
