pub mod date;
pub mod models;
pub mod repository;

pub use date::{format_date, parse_date, InvalidDate};
pub use models::{Appointment, AppointmentView, Role, Vaccine};
pub use repository::{
    AppointmentLedger, Authenticator, AvailabilityStore, BookingStore, InventoryStore, StoreTx,
};

/// Failures reported by a store or the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Username taken: {0}")]
    UsernameTaken(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
