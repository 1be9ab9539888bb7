//! Concurrent evaluation of many input elements.

pub mod executor;
pub mod pipeline;
