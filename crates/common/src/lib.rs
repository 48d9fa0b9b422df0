//! Shared configuration, error taxonomy and domain types.

pub mod config;
pub mod db;
pub mod error;
pub mod types;
