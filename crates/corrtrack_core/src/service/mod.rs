//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine, repositories and sinks into use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod correspondence_service;
pub mod dashboard_service;
pub mod sweep_service;
