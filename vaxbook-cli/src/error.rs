use vaxbook_booking::BookingError;
use crate::command::ParseError;

/// What the user sees for a failed operation. Every error kind gets its own
/// wording; store detail is logged, never echoed.
pub fn user_message(err: &BookingError) -> String {
    match err {
        BookingError::InvalidArgument(msg) => format!("Invalid input: {}", msg),
        BookingError::InvalidDate(_) => {
            "Please enter a valid date! (mm-dd-yyyy)".to_string()
        }
        BookingError::Conflict(msg) => format!("Already exists: {}", msg),
        BookingError::NotFound(msg) => format!("Nothing found: {}", msg),
        BookingError::NoCaregiverAvailable(date) => {
            format!("No caregiver is available on {}!", date)
        }
        BookingError::NoDosesAvailable(vaccine) => {
            format!("Not enough available doses of {}!", vaccine)
        }
        BookingError::Unauthorized => "Please login first!".to_string(),
        BookingError::WrongRole { required, .. } => format!("Please login as a {}!", required),
        BookingError::AlreadyLoggedIn(_) => "User already logged in.".to_string(),
        BookingError::NotLoggedIn => "No user is logged in.".to_string(),
        BookingError::LoginFailed => "Login failed.".to_string(),
        BookingError::UsernameTaken(_) => "Username taken, try again!".to_string(),
        BookingError::StoreUnavailable(_) => {
            tracing::error!("Store unavailable: {}", err);
            "The booking store is unavailable. Exiting.".to_string()
        }
    }
}

pub fn parse_message(err: &ParseError) -> String {
    match err {
        ParseError::Empty => String::new(),
        ParseError::UnknownOperation(_) => "Invalid operation name!".to_string(),
        ParseError::Arity { .. } => "Input format incorrect. Please try again!".to_string(),
        ParseError::InvalidAmount(_) => "Please enter a whole number of doses!".to_string(),
    }
}
