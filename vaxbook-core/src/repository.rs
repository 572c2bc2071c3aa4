use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Appointment, Role, Vaccine};
use crate::StoreResult;

/// Caregiver slots, at most one per (caregiver, date)
#[async_trait]
pub trait AvailabilityStore: Send {
    /// Insert a slot. `Conflict` if the caregiver already published this date
    /// or already has an appointment on it.
    async fn publish(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()>;

    /// The caregiver with the lexicographically smallest username holding a
    /// slot on `date`, or `NotFound`.
    async fn least_username(&mut self, date: NaiveDate) -> StoreResult<String>;

    /// Delete one slot. `NotFound` if it was already consumed.
    async fn consume(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()>;

    /// Every caregiver with a slot on `date`, ascending.
    async fn available_caregivers(&mut self, date: NaiveDate) -> StoreResult<Vec<String>>;
}

/// Vaccine name -> remaining doses
#[async_trait]
pub trait InventoryStore: Send {
    async fn get(&mut self, name: &str) -> StoreResult<i32>;

    /// Add `amount` doses, creating the vaccine if needed. Returns the new
    /// count. Negative amounts are `InvalidArgument`.
    async fn increase(&mut self, name: &str, amount: i32) -> StoreResult<i32>;

    async fn has_doses(&mut self, name: &str) -> StoreResult<bool>;

    /// All vaccines, ascending by name.
    async fn list(&mut self) -> StoreResult<Vec<Vaccine>>;
}

/// Append-only record of confirmed appointments
#[async_trait]
pub trait AppointmentLedger: Send {
    /// Append an appointment and return its freshly assigned id.
    async fn create(
        &mut self,
        date: NaiveDate,
        caregiver: &str,
        patient: &str,
        vaccine: &str,
    ) -> StoreResult<i64>;

    async fn list_for_patient(&mut self, patient: &str) -> StoreResult<Vec<Appointment>>;

    async fn list_for_caregiver(&mut self, caregiver: &str) -> StoreResult<Vec<Appointment>>;
}

/// One open transaction spanning all three tables.
///
/// Dropping a transaction without calling [`StoreTx::commit`] discards every
/// write made through it.
#[async_trait]
pub trait StoreTx: AvailabilityStore + InventoryStore + AppointmentLedger + Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Entry point to the durable store
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// Credential storage, owned outside the booking engine
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `UsernameTaken` if an account of this role already uses `username`.
    async fn create_user(&self, role: Role, username: &str, password: &str) -> StoreResult<()>;

    async fn verify_credentials(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> StoreResult<bool>;
}
