use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use placement_shared::{
    ConversationId, Envelope, MarkReadAck, Message, Notification, NotificationId,
    PostMessageRequest, SubjectId, UnreadCount,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::SessionContext;

/// HTTP client for the placement REST API.
///
/// Every response is decoded as an [`Envelope`]; failures come back as
/// [`ClientError::Server`] with the server's message untouched.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: Arc<ClientConfig>, session: SessionContext) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// `GET /messages?conversation={id}`
    pub async fn fetch_history(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        let mut url = self.config.endpoint(&["messages"])?;
        url.query_pairs_mut()
            .append_pair("conversation", conversation.as_str());
        self.execute(self.request(Method::GET, url)).await
    }

    /// `POST /messages`
    pub async fn post_message(&self, req: &PostMessageRequest) -> Result<Message> {
        let url = self.config.endpoint(&["messages"])?;
        self.execute(self.request(Method::POST, url).json(req)).await
    }

    /// `GET /notifications/{subjectId}/count`
    pub async fn unread_count(&self, subject: &SubjectId) -> Result<u64> {
        let url = self
            .config
            .endpoint(&["notifications", subject.as_str(), "count"])?;
        let count: UnreadCount = self.execute(self.request(Method::GET, url)).await?;
        Ok(count.unread)
    }

    /// `GET /notifications/{subjectId}?limit=N`
    pub async fn list_notifications(
        &self,
        subject: &SubjectId,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let mut url = self.config.endpoint(&["notifications", subject.as_str()])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.execute(self.request(Method::GET, url)).await
    }

    /// `POST /notifications/{id}/mark-read`
    pub async fn mark_read(&self, id: &NotificationId) -> Result<MarkReadAck> {
        let url = self
            .config
            .endpoint(&["notifications", id.as_str(), "mark-read"])?;
        self.execute(self.request(Method::POST, url)).await
    }

    /// `POST /notifications/{subjectId}/mark-all-read`
    pub async fn mark_all_read(&self, subject: &SubjectId) -> Result<MarkReadAck> {
        let url = self
            .config
            .endpoint(&["notifications", subject.as_str(), "mark-all-read"])?;
        self.execute(self.request(Method::POST, url)).await
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.session.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await?;
        let status = resp.status();
        let url = resp.url().path().to_string();
        let text = resp.text().await?;
        debug!(path = %url, status = status.as_u16(), len = text.len(), "API response");
        decode_response(status.as_u16(), status.is_success(), &text)
    }
}

/// Validate a response body against the envelope schema.
fn decode_response<T: DeserializeOwned>(status: u16, success: bool, text: &str) -> Result<T> {
    match serde_json::from_str::<Envelope<T>>(text) {
        Ok(Envelope::Ok { data }) if success => Ok(data),
        Ok(Envelope::Ok { .. }) => Err(ClientError::Server {
            status,
            message: format!("Server responded {status}"),
        }),
        Ok(Envelope::Error { error }) => Err(ClientError::Server {
            status,
            message: error.message,
        }),
        Err(_) if !success => Err(ClientError::Server {
            status,
            message: if text.trim().is_empty() {
                format!("Server responded {status}")
            } else {
                text.trim().to_string()
            },
        }),
        Err(e) => Err(e.into()),
    }
}
