//! Command-line interface for booking-client.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Subcommand to run against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login {
        email: String,
        password: String,
    },
    Register {
        email: String,
        password: String,
        full_name: String,
        teacher: bool,
    },
    Logout,
    WhoAmI,
    Teachers,
    Availability {
        teacher_id: i64,
    },
    Bookings,
    Book {
        availability_id: i64,
        notes: Option<String>,
    },
    Confirm {
        booking_id: i64,
    },
    Cancel {
        booking_id: i64,
    },
}

impl Command {
    /// Whether the command needs the stored session restored first.
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            Self::Login { .. } | Self::Register { .. } | Self::Logout
        )
    }
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Backend origin (overrides config file and environment).
    pub api_url: Option<String>,
    /// Path of the credential file.
    pub token_file: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Subcommand; `None` when only flags were given.
    pub command: Option<Command>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut positional: Vec<String> = Vec::new();
    let mut teacher = false;
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('u') | Long("api-url") => {
                result.api_url = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("token-file") => {
                result.token_file = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Long("teacher") => {
                teacher = true;
            }
            Value(val) => {
                positional.push(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if !positional.is_empty() {
        result.command = Some(parse_command(positional, teacher)?);
    } else if teacher {
        return Err(ArgsError::UnexpectedArgument("--teacher".into()));
    }

    Ok(result)
}

fn parse_command(positional: Vec<String>, teacher: bool) -> Result<Command, ArgsError> {
    let mut words = positional.into_iter();
    let name = words.next().unwrap_or_default();

    let command = match name.as_str() {
        "login" => Command::Login {
            email: required(&mut words, "email")?,
            password: required(&mut words, "password")?,
        },
        "register" => Command::Register {
            email: required(&mut words, "email")?,
            password: required(&mut words, "password")?,
            full_name: required(&mut words, "full-name")?,
            teacher,
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "teachers" => Command::Teachers,
        "availability" => Command::Availability {
            teacher_id: parse_id("teacher-id", required(&mut words, "teacher-id")?)?,
        },
        "bookings" => Command::Bookings,
        "book" => Command::Book {
            availability_id: parse_id("slot-id", required(&mut words, "slot-id")?)?,
            notes: words.next(),
        },
        "confirm" => Command::Confirm {
            booking_id: parse_id("booking-id", required(&mut words, "booking-id")?)?,
        },
        "cancel" => Command::Cancel {
            booking_id: parse_id("booking-id", required(&mut words, "booking-id")?)?,
        },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };

    if teacher && !matches!(command, Command::Register { .. }) {
        return Err(ArgsError::UnexpectedArgument("--teacher".into()));
    }
    if let Some(extra) = words.next() {
        return Err(ArgsError::UnexpectedArgument(extra));
    }

    Ok(command)
}

fn required<I>(words: &mut I, name: &'static str) -> Result<String, ArgsError>
where
    I: Iterator<Item = String>,
{
    words.next().ok_or(ArgsError::MissingArgument(name))
}

fn parse_id(name: &'static str, value: String) -> Result<i64, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"booking-client {version}
Command-line client for the lesson booking service

USAGE:
    booking-client [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    login <email> <password>                     Sign in and store credentials
    register <email> <password> <full-name>      Create an account and sign in
                                                 (add --teacher for a teacher account)
    logout                                       Forget stored credentials
    whoami                                       Show the signed-in user
    teachers                                     List teachers
    availability <teacher-id>                    List a teacher's open slots
    bookings                                     List your bookings
    book <slot-id> [notes]                       Book a slot
    confirm <booking-id>                         Confirm a booking (teachers)
    cancel <booking-id>                          Cancel a booking

OPTIONS:
    -u, --api-url <URL>     Backend URL [default: http://127.0.0.1:8004]
    -t, --token-file <FILE> Credential file [default: ~/.booking-client/tokens.json]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --timeout <SECS>    Request timeout in seconds
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    BOOKING_API_URL         Backend URL (overrides config)
    BOOKING_TOKEN_FILE      Credential file (overrides config)
    BOOKING_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Sign in against a local backend
    booking-client login ann@example.com secret1

    # Register as a teacher
    booking-client register tess@example.com secret1 "Tess Smith" --teacher

    # Book slot 12 with a note
    booking-client book 12 "First lesson"
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("booking-client {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// A command is missing one of its arguments.
    MissingArgument(&'static str),
    /// Unexpected positional argument or flag.
    UnexpectedArgument(String),
    /// Command name not recognized.
    UnknownCommand(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
            Self::MissingArgument(name) => write!(f, "missing argument: <{}>", name),
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
