//! Infrastructure layer: configuration, Postgres, transactional export pipeline.

pub mod config;
pub mod db;
pub mod export;
pub mod tx;
