//! Query endpoints

pub mod exemplars;
