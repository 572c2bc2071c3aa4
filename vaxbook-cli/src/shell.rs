use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, info_span, warn, Instrument};

use vaxbook_booking::{BookingEngine, BookingError, Session};
use vaxbook_core::{format_date, Role};

use crate::command::{parse, Command, USAGE};
use crate::error::{parse_message, user_message};

/// What one line produced: text for the user, and whether to stop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Step {
    fn say(line: impl Into<String>) -> Self {
        Self { lines: vec![line.into()], quit: false }
    }

    fn lines(lines: Vec<String>) -> Self {
        Self { lines, quit: false }
    }
}

/// One user's conversation with the engine. Owns its session.
pub struct Shell {
    engine: Arc<BookingEngine>,
    session: Session,
}

impl Shell {
    pub fn new(engine: Arc<BookingEngine>) -> Self {
        Self { engine, session: Session::new() }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run one input line. Recoverable failures come back as a message in
    /// the step; only a fatal engine error is returned as `Err`.
    pub async fn execute(&mut self, line: &str) -> Result<Step, BookingError> {
        let command = match parse(line) {
            Ok(command) => command,
            Err(err) => {
                let msg = parse_message(&err);
                if msg.is_empty() {
                    return Ok(Step::default());
                }
                warn!("Rejected input: {}", err);
                return Ok(Step::say(msg));
            }
        };

        match self.dispatch(command).await {
            Ok(step) => Ok(step),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("Operation failed: {}", err);
                Ok(Step::say(user_message(&err)))
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Step, BookingError> {
        let engine = self.engine.as_ref();

        match command {
            Command::CreatePatient { username, password } => {
                engine.register(Role::Patient, &username, &password).await?;
                Ok(Step::say(format!("Created user {}", username)))
            }
            Command::CreateCaregiver { username, password } => {
                engine.register(Role::Caregiver, &username, &password).await?;
                Ok(Step::say(format!("Created user {}", username)))
            }
            Command::LoginPatient { username, password } => {
                engine.login(&mut self.session, Role::Patient, &username, &password).await?;
                Ok(Step::say(format!("Logged in as: {}", username)))
            }
            Command::LoginCaregiver { username, password } => {
                engine.login(&mut self.session, Role::Caregiver, &username, &password).await?;
                Ok(Step::say(format!("Logged in as: {}", username)))
            }
            Command::SearchCaregiverSchedule { date } => {
                let schedule = engine.search_schedule(&self.session, &date).await?;
                let mut lines: Vec<String> = schedule
                    .caregivers
                    .iter()
                    .map(|name| format!("Caregiver Name: {}", name))
                    .collect();
                lines.extend(
                    schedule
                        .vaccines
                        .iter()
                        .map(|v| format!("Vaccine Name: {}, Doses Left: {}", v.name, v.doses)),
                );
                Ok(Step::lines(lines))
            }
            Command::Reserve { date, vaccine } => {
                let reservation = engine.reserve(&self.session, &date, &vaccine).await?;
                Ok(Step::say(format!(
                    "Appointment ID: {}, Caregiver username: {}",
                    reservation.appointment_id, reservation.caregiver
                )))
            }
            Command::UploadAvailability { date } => {
                engine.publish_availability(&self.session, &date).await?;
                Ok(Step::say("Availability uploaded!"))
            }
            Command::Cancel => Ok(Step::say("Cancelling an appointment is not supported.")),
            Command::AddDoses { vaccine, amount } => {
                let doses = engine.increase_doses(&self.session, &vaccine, amount).await?;
                Ok(Step::say(format!("Doses updated! {} now has {} doses.", vaccine, doses)))
            }
            Command::ShowAppointments => {
                let (_, role) = self.session.require_logged_in()?;
                let counterparty = match role {
                    Role::Patient => "Caregiver",
                    Role::Caregiver => "Patient",
                };

                let appointments = engine.list_appointments(&self.session).await?;
                if appointments.is_empty() {
                    return Ok(Step::say("No appointments scheduled."));
                }
                Ok(Step::lines(
                    appointments
                        .iter()
                        .map(|a| {
                            format!(
                                "Appointment ID: {}, Vaccine Name: {}, Date: {}, {} Name: {}",
                                a.appointment_id,
                                a.vaccine,
                                format_date(a.date),
                                counterparty,
                                a.counterparty
                            )
                        })
                        .collect(),
                ))
            }
            Command::Logout => {
                engine.logout(&mut self.session)?;
                Ok(Step::say("Successfully logged out!"))
            }
            Command::Quit => Ok(Step { lines: vec!["Bye!".to_string()], quit: true }),
        }
    }
}

/// Read commands from `input` until `quit` or end of input, writing replies
/// to `output`. A fatal engine error is reported to the user and returned.
pub async fn run<R, W>(shell: &mut Shell, input: R, output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let span = info_span!("session", id = %shell.session().id());
    drive(shell, input, output).instrument(span).await
}

async fn drive<R, W>(shell: &mut Shell, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Session started");
    write_lines(&mut output, &banner()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match shell.execute(&line).await {
            Ok(step) => {
                write_lines(&mut output, &step.lines).await?;
                if step.quit {
                    break;
                }
            }
            Err(err) => {
                write_lines(&mut output, &[user_message(&err)]).await?;
                return Err(err.into());
            }
        }
    }

    info!("Session ended");
    Ok(())
}

fn banner() -> Vec<String> {
    let mut lines = vec![
        "Welcome to the COVID-19 Vaccine Reservation Scheduling Application!".to_string(),
        " *** Please enter one of the following commands *** ".to_string(),
    ];
    lines.extend(USAGE.iter().map(|usage| format!("> {}", usage)));
    lines
}

async fn write_lines<W: AsyncWrite + Unpin>(output: &mut W, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await
}
