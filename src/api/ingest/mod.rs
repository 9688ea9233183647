//! Ingestion endpoints

pub mod remote_write;
