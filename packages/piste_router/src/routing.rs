//! Searching the navigation graph and turning the result into something a
//! skier can follow.

pub mod alternatives;
pub mod destinations;
pub mod diagnostics;
pub mod dijkstra;
pub mod optimise;
pub mod planner;
pub mod structs;
