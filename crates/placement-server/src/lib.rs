//! # placement-server
//!
//! In-memory reference backend for the placement chat and notification API.
//!
//! It serves every endpoint the client consumes, with the same tagged
//! response envelope, so the client can be run and tested locally:
//! - **Messages**: history and durable send (`/messages`)
//! - **Notifications**: unread count, bounded listing, mark-read and
//!   mark-all-read, plus admin-scoped creation
//! - **Live channel**: one WebSocket per open conversation (`/ws`)

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod store;

pub use api::{build_router, serve, spawn, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
pub use store::{Backend, LiveSignal};
