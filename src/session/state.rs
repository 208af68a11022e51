//! Session state machine.

/// Whether the client currently holds an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Stored credentials have not been checked yet.
    #[default]
    Loading,
    /// Identity confirmed by the backend.
    Authenticated,
    /// No usable credentials.
    Anonymous,
}

impl SessionStatus {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Loading -> Authenticated | Anonymous
    /// - Authenticated -> Authenticated (re-login, profile update) | Anonymous
    /// - Anonymous -> Authenticated | Anonymous (repeated logout)
    ///
    /// Nothing returns to Loading.
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(target, Authenticated | Anonymous)
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionStatus) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::BookingClientError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if the initial credential check has finished.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionStatus::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }
}
