//! Line-oriented front end for the vaccine booking engine.
//!
//! [`command`] turns one input line into a [`Command`], [`shell`] runs it
//! against a [`vaxbook_booking::BookingEngine`] with its own session, and
//! [`error`] decides what the user is told when something fails.

pub mod command;
pub mod error;
pub mod shell;

pub use command::{parse, Command, ParseError};
pub use error::{parse_message, user_message};
pub use shell::{run, Shell, Step};
