use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of account that can hold a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Caregiver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Caregiver => "caregiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-wide stock of one vaccine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vaccine {
    pub name: String,
    pub doses: i32,
}

/// A confirmed booking. Immutable once written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub date: NaiveDate,
    pub caregiver: String,
    pub patient: String,
    pub vaccine: String,
}

impl Appointment {
    /// Project the appointment as seen by one of its two parties.
    pub fn view_for(&self, role: Role) -> AppointmentView {
        let counterparty = match role {
            Role::Patient => self.caregiver.clone(),
            Role::Caregiver => self.patient.clone(),
        };

        AppointmentView {
            appointment_id: self.id,
            date: self.date,
            counterparty,
            vaccine: self.vaccine.clone(),
        }
    }
}

/// An appointment listed for one party; `counterparty` is the other one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub appointment_id: i64,
    pub date: NaiveDate,
    pub counterparty: String,
    pub vaccine: String,
}
