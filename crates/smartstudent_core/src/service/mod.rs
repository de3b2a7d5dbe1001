//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate snapshot load, reconciliation and commit into use-case APIs.
//! - Keep hosts (CLI, embedding apps) decoupled from storage details.

pub mod classroom;
pub mod notification_service;
