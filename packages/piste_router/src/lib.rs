//! Time-optimal routing across a ski resort's network of runs and lifts.
//!
//! Resort geometry is turned into a directed, time-weighted graph
//! ([`loading::builder`]), extended per request with map clicks and points of
//! interest ([`loading::insertion`]), searched ([`routing::dijkstra`]) and the
//! resulting route tidied up for presentation ([`routing::optimise`]).

pub mod common;
pub mod loading;
pub mod routing;
