use thiserror::Error;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreatePatient { username: String, password: String },
    CreateCaregiver { username: String, password: String },
    LoginPatient { username: String, password: String },
    LoginCaregiver { username: String, password: String },
    SearchCaregiverSchedule { date: String },
    Reserve { date: String, vaccine: String },
    UploadAvailability { date: String },
    Cancel,
    AddDoses { vaccine: String, amount: i32 },
    ShowAppointments,
    Logout,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("unknown operation {0}")]
    UnknownOperation(String),

    #[error("{operation} expects {expected} argument(s), got {got}")]
    Arity {
        operation: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("dose amount must be a whole number, got {0}")]
    InvalidAmount(String),
}

/// Help text listing every command, in the order it is printed.
pub const USAGE: &[&str] = &[
    "create_patient <username> <password>",
    "create_caregiver <username> <password>",
    "login_patient <username> <password>",
    "login_caregiver <username> <password>",
    "search_caregiver_schedule <date>",
    "reserve <date> <vaccine>",
    "upload_availability <date>",
    "cancel <appointment_id>",
    "add_doses <vaccine> <number>",
    "show_appointments",
    "logout",
    "quit",
];

/// Parse one line. The operation name is matched case-insensitively;
/// arguments are passed through untouched.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let operation = tokens.next().ok_or(ParseError::Empty)?.to_lowercase();
    let args: Vec<&str> = tokens.collect();

    let command = match operation.as_str() {
        "create_patient" => {
            let [username, password] = expect_args::<2>("create_patient", &args)?;
            Command::CreatePatient { username, password }
        }
        "create_caregiver" => {
            let [username, password] = expect_args::<2>("create_caregiver", &args)?;
            Command::CreateCaregiver { username, password }
        }
        "login_patient" => {
            let [username, password] = expect_args::<2>("login_patient", &args)?;
            Command::LoginPatient { username, password }
        }
        "login_caregiver" => {
            let [username, password] = expect_args::<2>("login_caregiver", &args)?;
            Command::LoginCaregiver { username, password }
        }
        "search_caregiver_schedule" => {
            let [date] = expect_args::<1>("search_caregiver_schedule", &args)?;
            Command::SearchCaregiverSchedule { date }
        }
        "reserve" => {
            let [date, vaccine] = expect_args::<2>("reserve", &args)?;
            Command::Reserve { date, vaccine }
        }
        "upload_availability" => {
            let [date] = expect_args::<1>("upload_availability", &args)?;
            Command::UploadAvailability { date }
        }
        "cancel" => Command::Cancel,
        "add_doses" => {
            let [vaccine, amount] = expect_args::<2>("add_doses", &args)?;
            let amount = amount
                .parse::<i32>()
                .map_err(|_| ParseError::InvalidAmount(amount.clone()))?;
            Command::AddDoses { vaccine, amount }
        }
        "show_appointments" => {
            let [] = expect_args::<0>("show_appointments", &args)?;
            Command::ShowAppointments
        }
        "logout" => {
            let [] = expect_args::<0>("logout", &args)?;
            Command::Logout
        }
        "quit" => Command::Quit,
        _ => return Err(ParseError::UnknownOperation(operation)),
    };

    Ok(command)
}

fn expect_args<const N: usize>(
    operation: &'static str,
    args: &[&str],
) -> Result<[String; N], ParseError> {
    if args.len() != N {
        return Err(ParseError::Arity {
            operation,
            expected: N,
            got: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| args[i].to_string()))
}
