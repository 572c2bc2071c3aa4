//! In-process store for tests and demos.
//!
//! A transaction holds the store mutex from `begin` until it is committed or
//! dropped and works on a private copy of the state, so transactions are
//! strictly serialized and an uncommitted transaction leaves no trace.
//!
//! Faults can be armed to make the next `begin` or `consume` fail, which is
//! how rollback paths are exercised without a database.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use vaxbook_core::{
    Appointment, AppointmentLedger, Authenticator, AvailabilityStore, BookingStore,
    InventoryStore, Role, StoreError, StoreResult, StoreTx, Vaccine,
};

use crate::credentials::{Credential, DEFAULT_HASH_ITERATIONS};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    // ordered by date, then username: the first entry of a date is its least username
    slots: BTreeSet<(NaiveDate, String)>,
    vaccines: BTreeMap<String, i32>,
    appointments: Vec<Appointment>,
    last_appointment_id: i64,
    patients: HashMap<String, Credential>,
    caregivers: HashMap<String, Credential>,
}

impl MemoryState {
    fn accounts(&self, role: Role) -> &HashMap<String, Credential> {
        match role {
            Role::Patient => &self.patients,
            Role::Caregiver => &self.caregivers,
        }
    }

    fn accounts_mut(&mut self, role: Role) -> &mut HashMap<String, Credential> {
        match role {
            Role::Patient => &mut self.patients,
            Role::Caregiver => &mut self.caregivers,
        }
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    fail_next_begin: AtomicBool,
    fail_next_consume: AtomicBool,
}

pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultPlan>,
    hash_iterations: u32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_hash_iterations(DEFAULT_HASH_ITERATIONS)
    }

    pub fn with_hash_iterations(hash_iterations: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            faults: Arc::new(FaultPlan::default()),
            hash_iterations,
        }
    }

    /// Make the next `begin` fail as if the store were unreachable.
    pub fn fail_next_begin(&self) {
        self.faults.fail_next_begin.store(true, Ordering::SeqCst);
    }

    /// Make the next `consume` fail after whatever the transaction already wrote.
    pub fn fail_next_consume(&self) {
        self.faults.fail_next_consume.store(true, Ordering::SeqCst);
    }

    /// Committed appointments, in ledger order.
    pub async fn appointments(&self) -> Vec<Appointment> {
        self.state.lock().await.appointments.clone()
    }

    /// Committed slots as (caregiver, date), ordered by date then caregiver.
    pub async fn slots(&self) -> Vec<(String, NaiveDate)> {
        self.state
            .lock()
            .await
            .slots
            .iter()
            .map(|(date, caregiver)| (caregiver.clone(), *date))
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        if self.faults.fail_next_begin.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected begin failure".to_string()));
        }

        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

#[async_trait]
impl Authenticator for InMemoryStore {
    async fn create_user(&self, role: Role, username: &str, password: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let accounts = state.accounts_mut(role);
        if accounts.contains_key(username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        accounts.insert(username.to_string(), Credential::new(password, self.hash_iterations));
        Ok(())
    }

    async fn verify_credentials(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .accounts(role)
            .get(username)
            .is_some_and(|credential| credential.verify(password, self.hash_iterations)))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultPlan>,
}

#[async_trait]
impl AvailabilityStore for MemoryTx {
    async fn publish(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()> {
        if !self.working.caregivers.contains_key(caregiver) {
            return Err(StoreError::NotFound(format!("caregiver {}", caregiver)));
        }
        if self
            .working
            .appointments
            .iter()
            .any(|a| a.caregiver == caregiver && a.date == date)
        {
            return Err(StoreError::Conflict(format!(
                "{} is already booked on {}",
                caregiver, date
            )));
        }
        if !self.working.slots.insert((date, caregiver.to_string())) {
            return Err(StoreError::Conflict(format!(
                "{} already published availability for {}",
                caregiver, date
            )));
        }
        Ok(())
    }

    async fn least_username(&mut self, date: NaiveDate) -> StoreResult<String> {
        self.working
            .slots
            .range((date, String::new())..)
            .next()
            .filter(|(slot_date, _)| *slot_date == date)
            .map(|(_, caregiver)| caregiver.clone())
            .ok_or_else(|| StoreError::NotFound(format!("availability on {}", date)))
    }

    async fn consume(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()> {
        if self.faults.fail_next_consume.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected consume failure".to_string()));
        }
        if !self.working.slots.remove(&(date, caregiver.to_string())) {
            return Err(StoreError::NotFound(format!(
                "availability of {} on {}",
                caregiver, date
            )));
        }
        debug!("Consumed slot {} / {}", caregiver, date);
        Ok(())
    }

    async fn available_caregivers(&mut self, date: NaiveDate) -> StoreResult<Vec<String>> {
        Ok(self
            .working
            .slots
            .range((date, String::new())..)
            .take_while(|(slot_date, _)| *slot_date == date)
            .map(|(_, caregiver)| caregiver.clone())
            .collect())
    }
}

#[async_trait]
impl InventoryStore for MemoryTx {
    async fn get(&mut self, name: &str) -> StoreResult<i32> {
        self.working
            .vaccines
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("vaccine {}", name)))
    }

    async fn increase(&mut self, name: &str, amount: i32) -> StoreResult<i32> {
        if amount < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "dose amount must be non-negative, got {}",
                amount
            )));
        }

        let doses = self.working.vaccines.entry(name.to_string()).or_insert(0);
        *doses = doses.checked_add(amount).ok_or_else(|| {
            StoreError::InvalidArgument(format!("dose count for {} would overflow", name))
        })?;
        Ok(*doses)
    }

    async fn has_doses(&mut self, name: &str) -> StoreResult<bool> {
        Ok(self.working.vaccines.get(name).is_some_and(|doses| *doses > 0))
    }

    async fn list(&mut self) -> StoreResult<Vec<Vaccine>> {
        Ok(self
            .working
            .vaccines
            .iter()
            .map(|(name, doses)| Vaccine { name: name.clone(), doses: *doses })
            .collect())
    }
}

#[async_trait]
impl AppointmentLedger for MemoryTx {
    async fn create(
        &mut self,
        date: NaiveDate,
        caregiver: &str,
        patient: &str,
        vaccine: &str,
    ) -> StoreResult<i64> {
        let state = &mut self.working;
        if !state.caregivers.contains_key(caregiver)
            || !state.patients.contains_key(patient)
            || !state.vaccines.contains_key(vaccine)
        {
            return Err(StoreError::NotFound(format!(
                "appointment party for {} / {} / {}",
                caregiver, patient, vaccine
            )));
        }
        if state
            .appointments
            .iter()
            .any(|a| a.caregiver == caregiver && a.date == date)
        {
            return Err(StoreError::Conflict(format!(
                "{} already has an appointment on {}",
                caregiver, date
            )));
        }

        state.last_appointment_id += 1;
        let id = state.last_appointment_id;
        state.appointments.push(Appointment {
            id,
            date,
            caregiver: caregiver.to_string(),
            patient: patient.to_string(),
            vaccine: vaccine.to_string(),
        });
        Ok(id)
    }

    async fn list_for_patient(&mut self, patient: &str) -> StoreResult<Vec<Appointment>> {
        Ok(self
            .working
            .appointments
            .iter()
            .filter(|a| a.patient == patient)
            .cloned()
            .collect())
    }

    async fn list_for_caregiver(&mut self, caregiver: &str) -> StoreResult<Vec<Appointment>> {
        Ok(self
            .working
            .appointments
            .iter()
            .filter(|a| a.caregiver == caregiver)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
