//! Types and helpers shared by the loading and routing stages

pub mod bbox;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph_data;
pub mod resort;
pub mod spatial;

#[cfg(test)]
pub(crate) mod fixtures;
