use vaxbook_core::{InvalidDate, Role, StoreError};

/// Every way a booking-engine operation can fail. Each kind is distinct so
/// the front end can tell the user exactly what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No caregiver is available on {0}")]
    NoCaregiverAvailable(String),

    #[error("No doses available for {0}")]
    NoDosesAvailable(String),

    #[error("Not logged in")]
    Unauthorized,

    #[error("Operation requires a {required} session, current session is {actual}")]
    WrongRole {
        required: Role,
        actual: Role,
    },

    #[error("Already logged in as {0}")]
    AlreadyLoggedIn(String),

    #[error("No user is logged in")]
    NotLoggedIn,

    #[error("Login failed")]
    LoginFailed,

    #[error("Username taken: {0}")]
    UsernameTaken(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BookingError {
    /// Whether the store may be left in a state the caller cannot know; the
    /// front end should stop rather than carry on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BookingError::StoreUnavailable(_))
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => BookingError::Conflict(msg),
            StoreError::NotFound(msg) => BookingError::NotFound(msg),
            StoreError::InvalidArgument(msg) => BookingError::InvalidArgument(msg),
            StoreError::UsernameTaken(name) => BookingError::UsernameTaken(name),
            StoreError::Unavailable(msg) => BookingError::StoreUnavailable(msg),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
