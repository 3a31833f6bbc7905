// Previo API client: one searchReservations round trip per fetch
// Retry cadence is owned by the refresh coordinator, never by the client.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::previo_xml::{encode_search_request, parse_reservations, ProcessingError, ReservationRecord, Term};

pub const DEFAULT_BASE_URL: &str = "https://api.previo.app/x1/";
const SEARCH_RESERVATIONS_PATH: &str = "hotel/searchReservations";
const XML_CONTENT_TYPE: &str = "application/xml";

// Fetch failures; Clone so one outcome can be handed to every waiting caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorCode {
    Transport,
    HttpStatus(u16),
    Parse,
}

impl FetchError {
    pub fn code(&self) -> FetchErrorCode {
        match self {
            FetchError::Transport(_) => FetchErrorCode::Transport,
            FetchError::HttpStatus(status) => FetchErrorCode::HttpStatus(*status),
            FetchError::Parse(_) => FetchErrorCode::Parse,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transport(format!("request timed out: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<ProcessingError> for FetchError {
    fn from(err: ProcessingError) -> Self {
        FetchError::Parse(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Initialization error: {0}")]
    InitError(String),
}

// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Who is asking and for which hotel. The date window is chosen per fetch.
#[derive(Debug)]
pub struct SearchRequest {
    pub credentials: Credentials,
    pub hotel_id: String,
}

// Source of reservation records
#[async_trait]
pub trait ReservationFetcher: Send + Sync + 'static {
    // One round trip, no retries
    async fn fetch(
        &self,
        request: &SearchRequest,
        term: Term,
    ) -> Result<Vec<ReservationRecord>, FetchError>;
}

pub struct PrevioClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PrevioClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self::with_client(http, &config.base_url))
    }

    // Use a pre-built reqwest client
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            SEARCH_RESERVATIONS_PATH
        );
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReservationFetcher for PrevioClient {
    async fn fetch(
        &self,
        request: &SearchRequest,
        term: Term,
    ) -> Result<Vec<ReservationRecord>, FetchError> {
        let body = encode_search_request(
            &request.credentials.username,
            request.credentials.password.expose_secret(),
            &request.hotel_id,
            &term,
        )?;

        debug!(
            hotel_id = %request.hotel_id,
            from = %term.from,
            to = %term.to,
            "searching reservations"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(ACCEPT, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "failed to get reservations");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(FetchError::from_transport)?;
        let records = parse_reservations(&text)?;

        debug!(count = records.len(), "reservations received");
        Ok(records)
    }
}
