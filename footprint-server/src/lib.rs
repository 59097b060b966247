//! # Footprint Server
//!
//! HTTP API for discovering and curating a person's online presence.
//!
//! ## Overview
//!
//! - **Search jobs**: queue a username-enumeration search against an
//!   external producer, then poll, track, or resume it across sessions
//! - **Reconciliation**: merge a completed search into a person's known
//!   accounts without duplicates and without touching verified entries
//! - **People records**: CRUD plumbing around the account registry
//!
//! ## Architecture
//!
//! Built on Axum with PostgreSQL for job and person persistence; the
//! enumeration producer runs as an external subprocess.

pub mod errors;
pub mod infra;
pub mod people;
pub mod routes;
pub mod search;

/// Platform catalog compiled into the binary; operators can override it
/// with `FOOTPRINT_PLATFORMS_FILE`.
pub const EMBEDDED_PLATFORMS: &str = include_str!("../assets/platforms.json");
