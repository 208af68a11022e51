//! Client-side session.
//!
//! [`SessionMachine`] owns the [`Session`] value (current user, status and
//! last error) and is the only component that changes it. The UI observes
//! changes through a `tokio::sync::watch` receiver.

mod machine;
mod state;

pub use machine::{Session, SessionMachine};
pub use state::SessionStatus;
