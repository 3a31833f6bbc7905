// Registry: setup and teardown entry points for one configured hotel
//
// Builds the coordinator, performs the first refresh, and hands one sensor
// per configured room to the host display layer.

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, PrevioConfig, SetupForm};
use crate::coordinator::{RefreshCoordinator, Refreshable};
use crate::previo_api::{ClientError, FetchError, PrevioClient, ReservationFetcher};
use crate::sensor::{Displayable, RoomSensor, RoomState};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Initial refresh failed: {0}")]
    NotReady(FetchError),
}

pub struct ReservationRegistry {
    coordinator: RefreshCoordinator,
    sensors: Vec<RoomSensor>,
}

impl ReservationRegistry {
    pub async fn setup_from_form(form: SetupForm) -> Result<Self, SetupError> {
        Self::setup(form.validate()?).await
    }

    pub async fn setup(config: PrevioConfig) -> Result<Self, SetupError> {
        let client = PrevioClient::new(config.client.clone())?;
        Self::setup_with_fetcher(config, Arc::new(client)).await
    }

    /// Nothing is exposed unless the first refresh succeeds; on failure the
    /// coordinator is shut down again.
    pub async fn setup_with_fetcher(
        config: PrevioConfig,
        fetcher: Arc<dyn ReservationFetcher>,
    ) -> Result<Self, SetupError> {
        let (request, rooms, _, coordinator_config) = config.into_parts();
        let coordinator = RefreshCoordinator::new(fetcher, request, coordinator_config);

        let snapshot = coordinator.force_refresh().await;
        if let Some(error) = &snapshot.error {
            coordinator.shutdown().await;
            return Err(SetupError::NotReady(error.clone()));
        }

        let shared: Arc<dyn Refreshable> = Arc::new(coordinator.clone());
        let sensors: Vec<RoomSensor> = rooms
            .into_iter()
            .map(|room| RoomSensor::new(room, Arc::clone(&shared)))
            .collect();

        coordinator.start();

        info!(
            hotel_id = %coordinator.hotel_id(),
            sensors = sensors.len(),
            records = snapshot.records.len(),
            "reservation sensors ready"
        );

        Ok(Self {
            coordinator,
            sensors,
        })
    }

    pub fn sensors(&self) -> &[RoomSensor] {
        &self.sensors
    }

    // First sensor with the given unique id
    pub fn sensor(&self, unique_id: &str) -> Option<&RoomSensor> {
        self.sensors
            .iter()
            .find(|sensor| sensor.unique_id() == unique_id)
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    // Every sensor refreshes at once; the coordinator collapses this into at most one fetch
    pub async fn update_all(&self) -> Vec<RoomState> {
        join_all(self.sensors.iter().map(|sensor| sensor.update())).await
    }

    pub async fn teardown(self) {
        self.coordinator.shutdown().await;
        info!(sensors = self.sensors.len(), "reservation sensors removed");
    }
}
