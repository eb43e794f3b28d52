//! Use-case services composed from repositories.
//!
//! # Responsibility
//! - Orchestrate multi-step repository calls (version allocation, selection
//!   switching) behind storage-agnostic traits.

pub mod config_service;
