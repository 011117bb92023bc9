//! Network plumbing: the REST client and the per-conversation live socket.

pub mod http;
pub mod live;

pub use http::ApiClient;
pub use live::{LiveConnection, LiveEvent};
