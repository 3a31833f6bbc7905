// Integration configuration collected by the setup form
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::previo_api::{ClientConfig, Credentials, SearchRequest};

pub const DEFAULT_ROOMS: &str = "14,32,21,27";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// Raw values as submitted by the setup form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetupForm {
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub hotel_id: Option<String>,
    pub rooms: Option<String>,
}

impl SetupForm {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn validate(self) -> Result<PrevioConfig, ConfigError> {
        let username = required_text("username", self.username)?;
        let hotel_id = required_text("hotel_id", self.hotel_id)?;

        let password = self
            .password
            .ok_or(ConfigError::MissingField("password"))?;
        if password.expose_secret().is_empty() {
            return Err(ConfigError::MissingField("password"));
        }

        let rooms = parse_rooms(self.rooms.as_deref().unwrap_or(DEFAULT_ROOMS))?;

        Ok(PrevioConfig {
            username,
            password,
            hotel_id,
            rooms,
            client: ClientConfig::default(),
            coordinator: CoordinatorConfig::default(),
        })
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn required_text(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField(field)),
    }
}

/// Split the comma-separated room list. Entries are trimmed and kept in
/// order; duplicates stay, each one gets its own sensor.
pub fn parse_rooms(rooms: &str) -> Result<Vec<String>, ConfigError> {
    rooms
        .split(',')
        .map(str::trim)
        .map(|room| {
            if room.is_empty() {
                Err(ConfigError::InvalidField {
                    field: "rooms",
                    reason: format!("empty room identifier in {:?}", rooms),
                })
            } else {
                Ok(room.to_string())
            }
        })
        .collect()
}

/// Validated configuration for one hotel.
#[derive(Debug)]
pub struct PrevioConfig {
    pub username: String,
    pub password: SecretString,
    pub hotel_id: String,
    pub rooms: Vec<String>,
    pub client: ClientConfig,
    pub coordinator: CoordinatorConfig,
}

impl PrevioConfig {
    pub fn with_client_config(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn with_coordinator_config(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }

    // Split into the pieces the coordinator owns
    pub fn into_parts(self) -> (SearchRequest, Vec<String>, ClientConfig, CoordinatorConfig) {
        let request = SearchRequest {
            credentials: Credentials::new(self.username, self.password),
            hotel_id: self.hotel_id,
        };
        (request, self.rooms, self.client, self.coordinator)
    }
}
