//! Per-session verification state machine.
//!
//! ```text
//! Idle ──ShowChallenge──▶ Initiating ──ScanChallenge──▶ ConfirmRespond
//!  └────────ScanChallenge────────────────────────────────────┘   │
//!                                               Confirm ▼
//!                                 Done ◀──Complete── Responding
//! any ──Fail──▶ Error        any ──Reset──▶ Idle
//! ```

use rapport_core::TrustError;
use std::fmt;
use std::future::Future;

use crate::identity::IdentityManager;
use crate::protocol::{confirm_and_respond, prepare_response, VerificationChallenge};
use crate::verification::Verification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Idle,
    /// Our challenge code is displayed.
    Initiating,
    /// A peer code was decoded; waiting for the user to confirm.
    ConfirmRespond,
    /// Signing and delivering the verification.
    Responding,
    Done,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Initiating => write!(f, "Initiating"),
            Self::ConfirmRespond => write!(f, "ConfirmRespond"),
            Self::Responding => write!(f, "Responding"),
            Self::Done => write!(f, "Done"),
            Self::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    ShowChallenge,
    ScanChallenge,
    Confirm,
    Complete,
    Fail,
    Reset,
}

pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Apply `event` to `current`, rejecting transitions outside the diagram.
    pub fn transition(
        current: SessionState,
        event: SessionEvent,
    ) -> Result<SessionState, TrustError> {
        let new_state = match (current, event) {
            (_, SessionEvent::Reset) => SessionState::Idle,
            (_, SessionEvent::Fail) => SessionState::Error,

            (SessionState::Idle, SessionEvent::ShowChallenge) => SessionState::Initiating,
            (SessionState::Idle, SessionEvent::ScanChallenge) => SessionState::ConfirmRespond,

            (SessionState::Initiating, SessionEvent::ScanChallenge) => {
                SessionState::ConfirmRespond
            }

            (SessionState::ConfirmRespond, SessionEvent::Confirm) => SessionState::Responding,

            (SessionState::Responding, SessionEvent::Complete) => SessionState::Done,

            _ => {
                return Err(TrustError::MalformedInput(format!(
                    "invalid session transition from {} on {:?}",
                    current, event
                )));
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "verification session transition"
        );

        Ok(new_state)
    }
}

/// One verification exchange on one device.
pub struct VerificationSession {
    state: SessionState,
    shown: Option<VerificationChallenge>,
    scanned: Option<VerificationChallenge>,
    verification: Option<Verification>,
    error: Option<TrustError>,
}

impl VerificationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            shown: None,
            scanned: None,
            verification: None,
            error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Challenge we are displaying, if any.
    pub fn shown_challenge(&self) -> Option<&VerificationChallenge> {
        self.shown.as_ref()
    }

    /// Peer challenge awaiting confirmation, if any.
    pub fn scanned_challenge(&self) -> Option<&VerificationChallenge> {
        self.scanned.as_ref()
    }

    pub fn verification(&self) -> Option<&Verification> {
        self.verification.as_ref()
    }

    pub fn last_error(&self) -> Option<&TrustError> {
        self.error.as_ref()
    }

    /// Produce a code to display.
    pub fn initiate(
        &mut self,
        identity: &IdentityManager,
        display_name: &str,
    ) -> Result<String, TrustError> {
        let next = SessionStateMachine::transition(self.state, SessionEvent::ShowChallenge)?;
        let result =
            VerificationChallenge::new(identity, display_name).and_then(|c| Ok((c.encode()?, c)));
        match result {
            Ok((code, challenge)) => {
                self.shown = Some(challenge);
                self.state = next;
                Ok(code)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Decode a peer's code and wait for confirmation.
    pub fn scan(&mut self, code: &str) -> Result<&VerificationChallenge, TrustError> {
        let next = SessionStateMachine::transition(self.state, SessionEvent::ScanChallenge)?;
        match prepare_response(code) {
            Ok(challenge) => {
                self.state = next;
                Ok(self.scanned.insert(challenge))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Sign the verification for the scanned peer and hand it to `deliver`.
    pub async fn confirm<F, Fut>(
        &mut self,
        identity: &IdentityManager,
        deliver: F,
    ) -> Result<Verification, TrustError>
    where
        F: FnOnce(Verification) -> Fut,
        Fut: Future<Output = Result<(), TrustError>>,
    {
        self.state = SessionStateMachine::transition(self.state, SessionEvent::Confirm)?;

        let challenge = match self.scanned.as_ref() {
            Some(c) => c,
            None => return Err(self.fail(TrustError::MalformedInput("no scanned code".into()))),
        };
        let verification = match confirm_and_respond(challenge, identity) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = deliver(verification.clone()).await {
            return Err(self.fail(e));
        }

        self.state = SessionStateMachine::transition(self.state, SessionEvent::Complete)?;
        self.verification = Some(verification.clone());
        Ok(verification)
    }

    /// Move to `Error`, remembering the cause. Returns the error for propagation.
    pub fn fail(&mut self, error: TrustError) -> TrustError {
        tracing::warn!(state = %self.state, error = %error, "verification session failed");
        self.state = SessionState::Error;
        self.error = Some(error.clone());
        error
    }

    /// Back to `Idle`, discarding all session data.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self::new()
    }
}
