use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vaxbook_core::{
    format_date, parse_date, AppointmentView, Authenticator, BookingStore, Role, StoreTx, Vaccine,
};

use crate::error::{BookingError, BookingResult};
use crate::session::Session;

/// Outcome of a successful reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub appointment_id: i64,
    pub caregiver: String,
}

/// Who can be booked on a date, and what stock there is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub caregivers: Vec<String>,
    pub vaccines: Vec<Vaccine>,
}

/// Runs every booking operation as one store transaction.
///
/// Session-taking methods apply the role guard and then delegate to the
/// `*_for` forms, which take an already validated identity.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    auth: Arc<dyn Authenticator>,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self { store, auth }
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    pub async fn register(&self, role: Role, username: &str, password: &str) -> BookingResult<()> {
        require_token("username", username)?;
        require_token("password", password)?;

        self.auth.create_user(role, username, password).await?;
        info!("Created {} account {}", role, username);
        Ok(())
    }

    pub async fn login(
        &self,
        session: &mut Session,
        role: Role,
        username: &str,
        password: &str,
    ) -> BookingResult<()> {
        session.ensure_logged_out()?;

        if !self.auth.verify_credentials(role, username, password).await? {
            warn!("Failed {} login for {}", role, username);
            return Err(BookingError::LoginFailed);
        }

        session.login(role, username)?;
        info!(session = %session.id(), "Logged in {} {}", role, username);
        Ok(())
    }

    pub fn logout(&self, session: &mut Session) -> BookingResult<String> {
        let username = session.logout()?;
        info!(session = %session.id(), "Logged out {}", username);
        Ok(username)
    }

    // ------------------------------------------------------------------
    // Session-gated operations
    // ------------------------------------------------------------------

    pub async fn reserve(
        &self,
        session: &Session,
        date_text: &str,
        vaccine: &str,
    ) -> BookingResult<Reservation> {
        let patient = session.require_role(Role::Patient)?;
        self.reserve_for(patient, date_text, vaccine).await
    }

    pub async fn publish_availability(
        &self,
        session: &Session,
        date_text: &str,
    ) -> BookingResult<NaiveDate> {
        let caregiver = session.require_role(Role::Caregiver)?;
        self.publish_availability_for(caregiver, date_text).await
    }

    pub async fn increase_doses(
        &self,
        session: &Session,
        vaccine: &str,
        amount: i32,
    ) -> BookingResult<i32> {
        session.require_role(Role::Caregiver)?;
        self.increase_doses_by(vaccine, amount).await
    }

    pub async fn list_appointments(&self, session: &Session) -> BookingResult<Vec<AppointmentView>> {
        let (username, role) = session.require_logged_in()?;
        self.list_appointments_for(username, role).await
    }

    pub async fn search_schedule(&self, session: &Session, date_text: &str) -> BookingResult<Schedule> {
        session.require_logged_in()?;
        self.search_schedule_on(date_text).await
    }

    // ------------------------------------------------------------------
    // Identity-level operations
    // ------------------------------------------------------------------

    /// Book the least-username caregiver free on the date against a vaccine
    /// that still has doses. Nothing is written unless every step succeeds.
    ///
    /// The dose count is checked but not decremented.
    pub async fn reserve_for(
        &self,
        patient: &str,
        date_text: &str,
        vaccine: &str,
    ) -> BookingResult<Reservation> {
        let date = parse_date(date_text)?;
        require_token("vaccine name", vaccine)?;

        let mut tx = self.store.begin().await?;
        let outcome = reserve_in(tx.as_mut(), patient, date, vaccine).await;
        let reservation = finish(tx, outcome).await?;

        info!(
            "Reserved appointment {} for {} with {} on {} ({})",
            reservation.appointment_id,
            patient,
            reservation.caregiver,
            format_date(date),
            vaccine
        );
        Ok(reservation)
    }

    pub async fn publish_availability_for(
        &self,
        caregiver: &str,
        date_text: &str,
    ) -> BookingResult<NaiveDate> {
        let date = parse_date(date_text)?;

        let mut tx = self.store.begin().await?;
        let outcome = tx.publish(caregiver, date).await.map_err(BookingError::from);
        finish(tx, outcome).await?;

        info!("{} published availability for {}", caregiver, format_date(date));
        Ok(date)
    }

    /// Add doses, creating the vaccine on first use. Returns the new count.
    pub async fn increase_doses_by(&self, vaccine: &str, amount: i32) -> BookingResult<i32> {
        require_token("vaccine name", vaccine)?;
        if amount < 0 {
            return Err(BookingError::InvalidArgument(format!(
                "dose amount must be non-negative, got {}",
                amount
            )));
        }

        let mut tx = self.store.begin().await?;
        let outcome = tx.increase(vaccine, amount).await.map_err(BookingError::from);
        let doses = finish(tx, outcome).await?;

        info!("Added {} doses of {}, now {}", amount, vaccine, doses);
        Ok(doses)
    }

    pub async fn dose_count(&self, vaccine: &str) -> BookingResult<i32> {
        let mut tx = self.store.begin().await?;
        let outcome = tx.get(vaccine).await.map_err(BookingError::from);
        finish(tx, outcome).await
    }

    /// Appointments of `username` in creation order, each showing the other party.
    pub async fn list_appointments_for(
        &self,
        username: &str,
        role: Role,
    ) -> BookingResult<Vec<AppointmentView>> {
        let mut tx = self.store.begin().await?;
        let outcome = match role {
            Role::Patient => tx.list_for_patient(username).await,
            Role::Caregiver => tx.list_for_caregiver(username).await,
        }
        .map_err(BookingError::from);
        let appointments = finish(tx, outcome).await?;

        Ok(appointments.iter().map(|a| a.view_for(role)).collect())
    }

    pub async fn search_schedule_on(&self, date_text: &str) -> BookingResult<Schedule> {
        let date = parse_date(date_text)?;

        let mut tx = self.store.begin().await?;
        let outcome = schedule_in(tx.as_mut(), date).await;
        finish(tx, outcome).await
    }
}

async fn reserve_in(
    tx: &mut dyn StoreTx,
    patient: &str,
    date: NaiveDate,
    vaccine: &str,
) -> BookingResult<Reservation> {
    let caregiver = match tx.least_username(date).await {
        Ok(caregiver) => caregiver,
        Err(e) if e.is_not_found() => {
            return Err(BookingError::NoCaregiverAvailable(format_date(date)))
        }
        Err(e) => return Err(e.into()),
    };

    if !tx.has_doses(vaccine).await? {
        return Err(BookingError::NoDosesAvailable(vaccine.to_string()));
    }

    let appointment_id = tx.create(date, &caregiver, patient, vaccine).await?;
    debug!("Wrote appointment {} for slot {} / {}", appointment_id, caregiver, date);

    tx.consume(&caregiver, date).await?;

    Ok(Reservation { appointment_id, caregiver })
}

async fn schedule_in(tx: &mut dyn StoreTx, date: NaiveDate) -> BookingResult<Schedule> {
    let caregivers = tx.available_caregivers(date).await?;
    if caregivers.is_empty() {
        return Err(BookingError::NoCaregiverAvailable(format_date(date)));
    }
    let vaccines = tx.list().await?;

    Ok(Schedule { date, caregivers, vaccines })
}

/// Commit on success; otherwise roll back and hand back the failure.
async fn finish<T>(tx: Box<dyn StoreTx>, outcome: BookingResult<T>) -> BookingResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after {}: {}", err, rollback_err);
            }
            debug!("Transaction rolled back: {}", err);
            Err(err)
        }
    }
}

fn require_token(what: &str, value: &str) -> BookingResult<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(BookingError::InvalidArgument(format!(
            "{} must be a single non-empty word",
            what
        )));
    }
    Ok(())
}
