pub mod adapters;
pub mod config;
pub mod execution;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod sqlite;
