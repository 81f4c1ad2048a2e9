//! This module focuses on retrieving resort data (from JSON documents or a
//! postgres database) and using it to generate the navigation graph, along
//! with the copy-on-write transformations applied to that graph per request.

pub mod builder;
pub mod filters;
pub mod insertion;
pub mod json;
pub mod postgres;
