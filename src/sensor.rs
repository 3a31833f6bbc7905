// Room sensors: per-room projections of the shared reservation snapshot
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::coordinator::{Refreshable, Snapshot};
use crate::previo_xml::ReservationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Reserved,
    Available,
    None,
}

impl RoomStatus {
    // Display state as shown to the host
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Reserved => "reserved",
            RoomStatus::Available => "available",
            RoomStatus::None => "No reservation",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomState {
    pub room_identifier: String,
    pub status: RoomStatus,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub status_code: Option<String>,
}

impl RoomState {
    pub fn from_record(record: &ReservationRecord) -> Self {
        let status = if record.is_reserved() {
            RoomStatus::Reserved
        } else {
            RoomStatus::Available
        };

        Self {
            room_identifier: record.room_identifier.clone(),
            status,
            check_in: record.check_in,
            check_out: record.check_out,
            status_code: Some(record.status_code.clone()),
        }
    }

    pub fn no_reservation(room_identifier: &str) -> Self {
        Self {
            room_identifier: room_identifier.to_string(),
            status: RoomStatus::None,
            check_in: None,
            check_out: None,
            status_code: None,
        }
    }

    /// Attributes exposed next to the state. Empty when nothing matched.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        if self.status == RoomStatus::None {
            return attributes;
        }

        let date = |d: Option<NaiveDate>| {
            d.map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string()))
        };
        attributes.insert("check_in".to_string(), date(self.check_in));
        attributes.insert("check_out".to_string(), date(self.check_out));
        attributes.insert(
            "status_id".to_string(),
            self.status_code.clone().map_or(Value::Null, Value::String),
        );
        attributes.insert(
            "room_number".to_string(),
            Value::String(self.room_identifier.clone()),
        );
        attributes
    }
}

// First record for the room wins; overlapping bookings may list a room twice
pub fn find_reservation<'a>(
    records: &'a [ReservationRecord],
    room_identifier: &str,
) -> Option<&'a ReservationRecord> {
    records
        .iter()
        .find(|record| record.room_identifier == room_identifier)
}

pub fn project(snapshot: &Snapshot, room_identifier: &str) -> RoomState {
    match find_reservation(&snapshot.records, room_identifier) {
        Some(record) => RoomState::from_record(record),
        None => RoomState::no_reservation(room_identifier),
    }
}

/// What the host display layer reads on every refresh cycle.
pub trait Displayable: Send + Sync {
    fn name(&self) -> String;
    fn unique_id(&self) -> String;
    fn state(&self) -> String;
    fn extra_state_attributes(&self) -> Map<String, Value>;
}

/// One configured room. Holds no data of its own; every read re-derives
/// from the coordinator's current snapshot.
#[derive(Clone)]
pub struct RoomSensor {
    room_id: String,
    coordinator: Arc<dyn Refreshable>,
}

impl RoomSensor {
    pub fn new(room_id: impl Into<String>, coordinator: Arc<dyn Refreshable>) -> Self {
        Self {
            room_id: room_id.into(),
            coordinator,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    // Projection of the live snapshot, without refreshing
    pub fn room_state(&self) -> RoomState {
        project(&self.coordinator.current(), &self.room_id)
    }

    // Refresh through the coordinator if stale, then project
    pub async fn update(&self) -> RoomState {
        let snapshot = self.coordinator.get_snapshot().await;
        project(&snapshot, &self.room_id)
    }

    pub fn available(&self) -> bool {
        self.coordinator.current().last_update_success()
    }
}

impl fmt::Debug for RoomSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomSensor")
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}

impl Displayable for RoomSensor {
    fn name(&self) -> String {
        format!("Room {} Reservation", self.room_id)
    }

    fn unique_id(&self) -> String {
        format!("room_{}", self.room_id)
    }

    fn state(&self) -> String {
        self.room_state().status.to_string()
    }

    fn extra_state_attributes(&self) -> Map<String, Value> {
        self.room_state().attributes()
    }
}
