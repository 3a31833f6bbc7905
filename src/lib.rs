// Previo reservation sensors: polls hotel reservations and exposes per-room occupancy

pub mod config;
pub mod coordinator;
pub mod previo_api;
pub mod previo_xml;
pub mod registry;
pub mod sensor;

// Re-export key types for convenience
pub use config::{parse_rooms, ConfigError, PrevioConfig, SetupForm, DEFAULT_ROOMS};
pub use coordinator::{
    CoordinatorConfig, CoordinatorStatsReport, RefreshCoordinator, Refreshable, Snapshot,
};
pub use previo_api::{
    ClientConfig, ClientError, Credentials, FetchError, FetchErrorCode, PrevioClient,
    ReservationFetcher, SearchRequest,
};
pub use previo_xml::{ReservationRecord, Term, RESERVED_STATUS_CODE};
pub use registry::{ReservationRegistry, SetupError};
pub use sensor::{project, Displayable, RoomSensor, RoomState, RoomStatus};
