pub mod engine;
pub mod error;
pub mod session;

pub use engine::{BookingEngine, Reservation, Schedule};
pub use error::{BookingError, BookingResult};
pub use session::{Session, SessionState};
