use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::session_id::SessionId;
use crate::sse::process_events;
use crate::types::{ChatRequest, StreamEvent, WelcomeResponse};

/// A boxed stream of decoded reply events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The two server calls the controller depends on.
///
/// [`ChatClient`] implements this over HTTP; tests substitute scripted transports.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the welcome message. A non-success status is an error.
    async fn welcome(&self) -> Result<WelcomeResponse>;

    /// Send a message and open the reply's event stream.
    async fn open_chat_stream(
        &self,
        session_id: Option<&SessionId>,
        request: &ChatRequest,
    ) -> Result<EventStream>;
}

/// HTTP client for the chat server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    welcome_url: Url,
    chat_url: Url,
    session_header: HeaderName,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the server described by `config`.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let welcome_url = base_url.join(&config.welcome_path)?;
        let chat_url = base_url.join(&config.chat_path)?;
        let session_header = HeaderName::from_bytes(config.session_header.as_bytes())
            .map_err(|e| {
                Error::validation(
                    format!("invalid session header name: {e}"),
                    Some("session_header".to_string()),
                )
            })?;

        // The chat body stays open for as long as the reply streams, so only connecting is
        // bounded client-wide; the welcome call gets a whole-request timeout.
        let client = ReqwestClient::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            welcome_url,
            chat_url,
            session_header,
            timeout: config.timeout,
        })
    }

    /// Returns the welcome endpoint URL.
    pub fn welcome_url(&self) -> &Url {
        &self.welcome_url
    }

    /// Returns the chat endpoint URL.
    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    fn chat_headers(&self, session_id: Option<&SessionId>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        if let Some(session_id) = session_id {
            let value = HeaderValue::from_str(session_id.as_str()).map_err(|e| {
                Error::validation(
                    format!("session id is not a valid header value: {e}"),
                    Some("session_id".to_string()),
                )
            })?;
            headers.insert(self.session_header.clone(), value);
        }
        Ok(headers)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process an error response and convert it to our Error type.
    async fn process_error_response(response: Response) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status_code = response.status().as_u16();

        // FastAPI-style bodies carry the reason in `detail`; some also carry `error`.
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
            detail: Option<serde_json::Value>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ErrorResponse>(&error_body).ok();
        let message = parsed
            .and_then(|e| match e.detail {
                Some(serde_json::Value::String(detail)) => Some(detail),
                Some(detail) => Some(detail.to_string()),
                None => e.error,
            })
            .unwrap_or(error_body);
        Error::api(status_code, message)
    }
}

#[async_trait::async_trait]
impl ChatTransport for ChatClient {
    async fn welcome(&self) -> Result<WelcomeResponse> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = self
            .client
            .get(self.welcome_url.clone())
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<WelcomeResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse welcome response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    async fn open_chat_stream(
        &self,
        session_id: Option<&SessionId>,
        request: &ChatRequest,
    ) -> Result<EventStream> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = self
            .client
            .post(self.chat_url.clone())
            .headers(self.chat_headers(session_id)?)
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let bytes = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(process_events(bytes)))
    }
}
