//! In-process backend for driving the client end to end.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use placement_client::{ClientConfig, ClientState, Session, SessionContext};
use placement_server::{AppState, Backend, ServerConfig};
use placement_shared::{SenderRole, SubjectId};

pub const SUBJECT: &str = "student-1";

pub struct TestBackend {
    pub backend: Arc<Backend>,
    pub api_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn start_backend() -> TestBackend {
    let state = AppState::new(ServerConfig::default());
    let backend = state.backend.clone();
    let (addr, handle) = placement_server::spawn(state, ([127, 0, 0, 1], 0).into())
        .await
        .unwrap();
    TestBackend {
        backend,
        api_url: format!("http://{addr}/"),
        handle,
    }
}

/// Client state logged in as [`SUBJECT`], polling every 50 ms.
pub fn client_for(server: &TestBackend) -> ClientState {
    client_polling_every(server, Duration::from_millis(50))
}

/// Client state logged in as [`SUBJECT`]. The first poll fires immediately.
pub fn client_polling_every(server: &TestBackend, interval: Duration) -> ClientState {
    let mut config = ClientConfig::with_api_url(&server.api_url).unwrap();
    config.poll_interval = interval;
    config.request_timeout = Duration::from_secs(5);

    let session = SessionContext::new();
    session
        .login(Session::new(SubjectId::from(SUBJECT), SenderRole::Subject, None))
        .unwrap();
    ClientState::new(config, session).unwrap()
}

/// Poll `check` every 10 ms until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
