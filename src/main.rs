//! booking-client binary entry point.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use booking_client::api::{Booking, NewBooking, RegistrationRole, User, UserRole};
use booking_client::cli::{self, Command};
use booking_client::config::Config;
use booking_client::{
    logging, ApiClient, AuthEvent, BookingApi, FileTokenStore, SessionMachine, SessionStatus,
};
use tracing::debug;

type CliResult = std::result::Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'booking-client --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command.clone() else {
        cli::print_help();
        return ExitCode::from(2);
    };

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_filter());
    debug!(version = env!("CARGO_PKG_VERSION"), "booking-client starting");

    match run(&config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, command: Command) -> CliResult {
    let store = Arc::new(FileTokenStore::new(config.token_file()?));
    let client = Arc::new(ApiClient::new(config.to_client_config()?, store)?);
    let session = SessionMachine::new(Arc::clone(&client))?;
    let api = BookingApi::new(Arc::clone(&client));
    let mut events = client.subscribe();

    let result = execute(&session, &api, command).await;

    while let Ok(event) = events.try_recv() {
        if let AuthEvent::ForcedLogout { reason } = event {
            eprintln!("Your session has expired ({}). Please log in again.", reason);
        }
    }

    result
}

async fn execute(session: &SessionMachine, api: &BookingApi, command: Command) -> CliResult {
    let user = if command.needs_session() {
        Some(restore_session(session).await?)
    } else {
        None
    };

    match command {
        Command::Login { email, password } => {
            let user = session
                .login(&email, &password)
                .await
                .map_err(|_| session_error(session, "Login failed"))?;
            println!("Logged in as {}", describe_user(&user));
        }
        Command::Register {
            email,
            password,
            full_name,
            teacher,
        } => {
            let role = if teacher {
                RegistrationRole::Teacher
            } else {
                RegistrationRole::Student
            };
            let user = session
                .register(&email, &password, &full_name, role)
                .await
                .map_err(|_| session_error(session, "Registration failed"))?;
            println!("Registered and logged in as {}", describe_user(&user));
        }
        Command::Logout => {
            session.logout();
            println!("Logged out");
        }
        Command::WhoAmI => {
            if let Some(user) = user {
                println!("{}", describe_user(&user));
            }
        }
        Command::Teachers => {
            let teachers = api.list_teachers().await?;
            if teachers.is_empty() {
                println!("No teachers found");
            }
            for teacher in teachers {
                let specialization = teacher.specialization.as_deref().unwrap_or("-");
                println!(
                    "{:>5}  {:<24} {:<32} {}",
                    teacher.user.id, teacher.user.full_name, teacher.user.email, specialization
                );
            }
        }
        Command::Availability { teacher_id } => {
            let slots = api.teacher_availability(teacher_id).await?;
            if slots.is_empty() {
                println!("No availability published");
            }
            for slot in slots {
                let state = if slot.is_booked { "booked" } else { "open" };
                println!(
                    "{:>5}  {} - {}  {}",
                    slot.id, slot.start_time, slot.end_time, state
                );
            }
        }
        Command::Bookings => {
            let is_student = user.as_ref().map(|u| u.role) == Some(UserRole::Student);
            let bookings = if is_student {
                api.student_bookings().await?
            } else {
                api.my_bookings().await?
            };
            if bookings.is_empty() {
                println!("No bookings");
            }
            for booking in &bookings {
                println!("{}", describe_booking(booking));
            }
        }
        Command::Book {
            availability_id,
            notes,
        } => {
            let booking = api
                .create_booking(&NewBooking {
                    availability_id,
                    notes,
                })
                .await?;
            println!("Booked: {}", describe_booking(&booking));
        }
        Command::Confirm { booking_id } => {
            let booking = api.confirm_booking(booking_id).await?;
            println!("Confirmed: {}", describe_booking(&booking));
        }
        Command::Cancel { booking_id } => {
            api.cancel_booking(booking_id).await?;
            println!("Booking {} cancelled", booking_id);
        }
    }

    Ok(())
}

/// Restore the stored session or explain how to get one.
async fn restore_session(session: &SessionMachine) -> Result<User, Box<dyn Error>> {
    match session.load_user().await {
        SessionStatus::Authenticated => session
            .user()
            .ok_or_else(|| "session has no user".into()),
        _ => Err("not logged in; run 'booking-client login <email> <password>'".into()),
    }
}

fn session_error(session: &SessionMachine, fallback: &str) -> Box<dyn Error> {
    session
        .error()
        .unwrap_or_else(|| fallback.to_string())
        .into()
}

fn describe_user(user: &User) -> String {
    format!("{} <{}> ({})", user.full_name, user.email, user.role)
}

fn describe_booking(booking: &Booking) -> String {
    let when = match (&booking.start_time, &booking.end_time) {
        (Some(start), Some(end)) => format!("{} - {}", start, end),
        _ => format!("slot {}", booking.availability_id),
    };
    let with = booking
        .teacher_name
        .as_deref()
        .or(booking.student_name.as_deref())
        .unwrap_or("");
    format!("#{} {} {} {}", booking.id, booking.status, when, with)
        .trim_end()
        .to_string()
}
