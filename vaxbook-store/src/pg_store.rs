use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};

use vaxbook_core::{
    Appointment, AppointmentLedger, Authenticator, AvailabilityStore, BookingStore,
    InventoryStore, Role, StoreError, StoreResult, StoreTx, Vaccine,
};

use crate::credentials::Credential;

/// How many times a reservation re-reads a date's slots after the one it
/// waited on was consumed.
const MAX_LOCK_ATTEMPTS: u32 = 8;

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// A Postgres transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct VaccineRow {
    name: String,
    doses: i32,
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: i64,
    date: NaiveDate,
    caregiver: String,
    patient: String,
    vaccine: String,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.appointment_id,
            date: row.date,
            caregiver: row.caregiver,
            patient: row.patient,
            vaccine: row.vaccine,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    salt: Vec<u8>,
    hash: Vec<u8>,
}

fn db_err(e: sqlx::Error) -> StoreError {
    error!("Database error: {}", e);
    StoreError::Unavailable(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

// numeric_value_out_of_range
fn is_out_of_range(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("22003"))
}

fn account_table(role: Role) -> &'static str {
    match role {
        Role::Patient => "patients",
        Role::Caregiver => "caregivers",
    }
}

#[async_trait]
impl AvailabilityStore for PgTx {
    /// Insert the slot, then refuse it if the caregiver is already booked
    /// that day. The check runs after the insert so that a reservation
    /// holding the old slot row has committed by the time it is read.
    async fn publish(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()> {
        let result = sqlx::query("INSERT INTO availabilities (time, username) VALUES ($1, $2)")
            .bind(date)
            .bind(caregiver)
            .execute(&mut *self.tx)
            .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "{} already published availability for {}",
                    caregiver, date
                )))
            }
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(StoreError::NotFound(format!("caregiver {}", caregiver)))
            }
            Err(e) => return Err(db_err(e)),
        }

        let booked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM appointments WHERE caregiver = $1 AND date = $2)",
        )
        .bind(caregiver)
        .bind(date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if booked {
            return Err(StoreError::Conflict(format!(
                "{} is already booked on {}",
                caregiver, date
            )));
        }
        Ok(())
    }

    /// Lock the least-username slot on `date`.
    ///
    /// A concurrent reservation holding that row makes this one wait. If it
    /// commits, the row is gone and the locking read comes back empty even
    /// though other slots may remain, so the read is repeated against a
    /// fresh snapshot. If it rolls back, this reservation gets the row.
    async fn least_username(&mut self, date: NaiveDate) -> StoreResult<String> {
        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            let locked: Option<String> = sqlx::query_scalar(
                r#"
                SELECT username FROM availabilities
                WHERE time = $1
                ORDER BY username COLLATE "C" ASC
                LIMIT 1
                FOR UPDATE
                "#,
            )
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

            if let Some(username) = locked {
                return Ok(username);
            }

            let remaining: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM availabilities WHERE time = $1)")
                    .bind(date)
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(db_err)?;

            if !remaining {
                return Err(StoreError::NotFound(format!("availability on {}", date)));
            }
            debug!("Slot on {} taken while waiting, attempt {}", date, attempt);
        }

        Err(StoreError::Conflict(format!(
            "availability on {} kept changing under contention",
            date
        )))
    }

    /// Delete the slot locked by [`least_username`](Self::least_username).
    async fn consume(&mut self, caregiver: &str, date: NaiveDate) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM availabilities WHERE time = $1 AND username = $2")
            .bind(date)
            .bind(caregiver)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::NotFound(format!(
                "availability of {} on {}",
                caregiver, date
            )));
        }
        debug!("Consumed slot {} / {}", caregiver, date);
        Ok(())
    }

    async fn available_caregivers(&mut self, date: NaiveDate) -> StoreResult<Vec<String>> {
        sqlx::query_scalar(
            r#"SELECT username FROM availabilities WHERE time = $1 ORDER BY username COLLATE "C" ASC"#,
        )
        .bind(date)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl InventoryStore for PgTx {
    async fn get(&mut self, name: &str) -> StoreResult<i32> {
        let doses: Option<i32> = sqlx::query_scalar("SELECT doses FROM vaccines WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        doses.ok_or_else(|| StoreError::NotFound(format!("vaccine {}", name)))
    }

    /// Upsert the vaccine row. A total past `INTEGER` is `InvalidArgument`
    /// and leaves the row as it was.
    async fn increase(&mut self, name: &str, amount: i32) -> StoreResult<i32> {
        if amount < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "dose amount must be non-negative, got {}",
                amount
            )));
        }

        let result: Result<i32, sqlx::Error> = sqlx::query_scalar(
            r#"
            INSERT INTO vaccines (name, doses) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET doses = vaccines.doses + EXCLUDED.doses
            RETURNING doses
            "#,
        )
        .bind(name)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await;

        match result {
            Ok(doses) => Ok(doses),
            Err(e) if is_out_of_range(&e) => Err(StoreError::InvalidArgument(format!(
                "dose count for {} would overflow",
                name
            ))),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Reads under `FOR SHARE`, so the count cannot drop to zero before the
    /// reservation commits.
    async fn has_doses(&mut self, name: &str) -> StoreResult<bool> {
        let row: Option<i32> = sqlx::query_scalar(
            "SELECT doses FROM vaccines WHERE name = $1 AND doses > 0 FOR SHARE",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.is_some())
    }

    async fn list(&mut self) -> StoreResult<Vec<Vaccine>> {
        let rows: Vec<VaccineRow> =
            sqlx::query_as(r#"SELECT name, doses FROM vaccines ORDER BY name COLLATE "C" ASC"#)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Vaccine { name: row.name, doses: row.doses })
            .collect())
    }
}

#[async_trait]
impl AppointmentLedger for PgTx {
    async fn create(
        &mut self,
        date: NaiveDate,
        caregiver: &str,
        patient: &str,
        vaccine: &str,
    ) -> StoreResult<i64> {
        // ids come from the BIGSERIAL sequence and are not reused after a rollback
        let result: Result<i64, sqlx::Error> = sqlx::query_scalar(
            r#"
            INSERT INTO appointments (date, caregiver, patient, vaccine)
            VALUES ($1, $2, $3, $4)
            RETURNING appointment_id
            "#,
        )
        .bind(date)
        .bind(caregiver)
        .bind(patient)
        .bind(vaccine)
        .fetch_one(&mut *self.tx)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "{} already has an appointment on {}",
                caregiver, date
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(StoreError::NotFound(format!(
                "appointment party for {} / {} / {}",
                caregiver, patient, vaccine
            ))),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn list_for_patient(&mut self, patient: &str) -> StoreResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            r#"
            SELECT appointment_id, date, caregiver, patient, vaccine
            FROM appointments WHERE patient = $1
            ORDER BY appointment_id ASC
            "#,
        )
        .bind(patient)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn list_for_caregiver(&mut self, caregiver: &str) -> StoreResult<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            r#"
            SELECT appointment_id, date, caregiver, patient, vaccine
            FROM appointments WHERE caregiver = $1
            ORDER BY appointment_id ASC
            "#,
        )
        .bind(caregiver)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.rollback().await.map_err(db_err)
    }
}

/// Accounts kept in the `patients` and `caregivers` tables
pub struct PgAuthenticator {
    pool: PgPool,
    hash_iterations: u32,
}

impl PgAuthenticator {
    pub fn new(pool: PgPool, hash_iterations: u32) -> Self {
        Self { pool, hash_iterations }
    }
}

#[async_trait]
impl Authenticator for PgAuthenticator {
    async fn create_user(&self, role: Role, username: &str, password: &str) -> StoreResult<()> {
        let credential = Credential::new(password, self.hash_iterations);
        let sql = format!(
            "INSERT INTO {} (username, salt, hash) VALUES ($1, $2, $3)",
            account_table(role)
        );

        let result = sqlx::query(&sql)
            .bind(username)
            .bind(&credential.salt)
            .bind(&credential.hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::UsernameTaken(username.to_string()))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn verify_credentials(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> StoreResult<bool> {
        let sql = format!(
            "SELECT salt, hash FROM {} WHERE username = $1",
            account_table(role)
        );

        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.is_some_and(|row| {
            Credential { salt: row.salt, hash: row.hash }.verify(password, self.hash_iterations)
        }))
    }
}
