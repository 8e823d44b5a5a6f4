//! # Teamboard API Server Library
//!
//! HTTP surface of Teamboard: teams with email invitations, projects shared
//! across teams, and tasks with comments.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `response`: Success envelope for mutations
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
