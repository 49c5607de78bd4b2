//! Adapters implementing the domain ports.

pub mod engines;
pub mod tools;
