pub mod adapters;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod web;
