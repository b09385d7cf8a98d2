//! Verification state machine for one gate view.
//!
//! ```text
//! Idle|Approved --file--> Scanning --decoded--> Decoded --> Verifying --ok--> Approved
//!                            |                                  |
//!                            +--error--> Idle <-----error-------+
//! Idle|Approved --manual token--> Verifying
//! ```
//!
//! At most one attempt is in flight; submits made meanwhile are ignored.
//! An attempt whose future is dropped before it settles returns to Idle.
//! Every transition is broadcast to [`GateSession::subscribe`] receivers.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::acquire::{FileInput, acquire};
use crate::engine::DecodeEngine;
use crate::error::GateError;
use crate::validator::{CredentialValidator, VerificationResult};

pub const SCANNING_MESSAGE: &str = "Scanning QR image...";
pub const DECODED_MESSAGE: &str = "QR detected. Verifying...";
pub const VERIFYING_MESSAGE: &str = "Verifying...";
pub const APPROVED_MESSAGE: &str = "Visitor verified and entry approved!";
pub const CANCELLED_MESSAGE: &str = "Verification cancelled";

/// Transitions buffered per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Decoded,
    Verifying,
    Approved,
}

impl ScanStatus {
    /// An attempt is running.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Scanning | Self::Decoded | Self::Verifying)
    }
}

/// State of the current attempt. `result` is set exactly when `status` is `Approved`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSession {
    pub token: String,
    pub status: ScanStatus,
    pub message: Option<String>,
    pub result: Option<VerificationResult>,
}

impl ScanSession {
    fn start(&mut self, status: ScanStatus, token: String, message: &str) {
        self.token = token;
        self.status = status;
        self.message = Some(message.to_string());
        self.result = None;
    }

    fn fail(&mut self, error: &GateError) {
        self.status = ScanStatus::Idle;
        self.message = Some(error.to_string());
        self.result = None;
    }
}

/// How a submit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Approved(VerificationResult),
    Failed(GateError),
    /// Another attempt was in flight; nothing was done.
    Ignored,
}

/// Shared session driving decode and verification.
pub struct GateSession {
    state: Mutex<ScanSession>,
    events: broadcast::Sender<ScanSession>,
    engine: Arc<DecodeEngine>,
    validator: CredentialValidator,
}

impl GateSession {
    pub fn new(engine: Arc<DecodeEngine>, validator: CredentialValidator) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(ScanSession::default()),
            events,
            engine,
            validator,
        }
    }

    fn state(&self) -> MutexGuard<'_, ScanSession> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` under the lock and broadcast the new state if it differs.
    fn update<R>(&self, change: impl FnOnce(&mut ScanSession) -> R) -> R {
        let mut state = self.state();
        let before = state.clone();
        let result = change(&mut *state);
        if *state != before {
            // No receivers is fine
            let _ = self.events.send(state.clone());
        }
        result
    }

    pub fn snapshot(&self) -> ScanSession {
        self.state().clone()
    }

    /// Receive every state the session moves through from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanSession> {
        self.events.subscribe()
    }

    /// Discard everything. Returns `false` (and does nothing) while an attempt is in flight.
    pub fn clear(&self) -> bool {
        self.update(|state| {
            if state.status.is_busy() {
                return false;
            }
            *state = ScanSession::default();
            true
        })
    }

    /// Decode an image file, then verify the token it carries.
    pub async fn submit_file(&self, input: FileInput) -> SubmitOutcome {
        let started = self.update(|state| {
            if state.status.is_busy() {
                debug!(status = ?state.status, "file submit ignored");
                return false;
            }
            state.start(ScanStatus::Scanning, String::new(), SCANNING_MESSAGE);
            true
        });
        if !started {
            return SubmitOutcome::Ignored;
        }
        let _in_flight = InFlight { session: self };

        let engine = Arc::clone(&self.engine);
        let decoded = tokio::task::spawn_blocking(move || {
            let image = acquire(&input)?;
            engine.decode(&image)
        })
        .await
        .unwrap_or_else(|e| Err(GateError::Environment(format!("Decode task failed: {}", e))));

        let code = match decoded {
            Ok(code) => code,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "scan failed");
                self.update(|state| state.fail(&e));
                return SubmitOutcome::Failed(e);
            }
        };

        let token = code.text;
        debug!(tier = code.tier, "token decoded");
        self.update(|state| state.start(ScanStatus::Decoded, token.clone(), DECODED_MESSAGE));
        self.update(|state| state.status = ScanStatus::Verifying);
        self.verify(&token).await
    }

    /// Verify a typed token. Blank input fails without contacting the authority.
    pub async fn submit_manual(&self, token: &str) -> SubmitOutcome {
        let token = token.trim();
        let rejected = self.update(|state| {
            if state.status.is_busy() {
                debug!(status = ?state.status, "manual submit ignored");
                return Some(SubmitOutcome::Ignored);
            }
            if token.is_empty() {
                let error = GateError::Input("Please enter a QR code".to_string());
                state.token.clear();
                state.fail(&error);
                return Some(SubmitOutcome::Failed(error));
            }
            state.start(ScanStatus::Verifying, token.to_string(), VERIFYING_MESSAGE);
            None
        });
        if let Some(outcome) = rejected {
            return outcome;
        }
        let _in_flight = InFlight { session: self };
        self.verify(token).await
    }

    async fn verify(&self, token: &str) -> SubmitOutcome {
        let outcome = self.validator.validate(token).await;
        self.update(|state| match outcome {
            Ok(result) => {
                info!(visitor = %result.visitor_name, "entry approved");
                state.token.clear();
                state.status = ScanStatus::Approved;
                state.message = Some(APPROVED_MESSAGE.to_string());
                state.result = Some(result.clone());
                SubmitOutcome::Approved(result)
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "verification failed");
                state.fail(&e);
                SubmitOutcome::Failed(e)
            }
        })
    }
}

/// Held for the life of a submit; resets a still-busy session when dropped.
struct InFlight<'a> {
    session: &'a GateSession,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.update(|state| {
            if state.status.is_busy() {
                warn!(status = ?state.status, "attempt dropped before it settled");
                state.status = ScanStatus::Idle;
                state.message = Some(CANCELLED_MESSAGE.to_string());
                state.result = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{AuthorityError, VerificationAuthority};
    use async_trait::async_trait;

    struct Reject;

    #[async_trait]
    impl VerificationAuthority for Reject {
        async fn verify(&self, _token: &str) -> Result<VerificationResult, AuthorityError> {
            Err(AuthorityError::with_message("Token expired"))
        }
    }

    fn session() -> GateSession {
        GateSession::new(
            Arc::new(DecodeEngine::default()),
            CredentialValidator::new(Arc::new(Reject)),
        )
    }

    #[test]
    fn test_busy_states() {
        assert!(!ScanStatus::Idle.is_busy());
        assert!(ScanStatus::Scanning.is_busy());
        assert!(ScanStatus::Decoded.is_busy());
        assert!(ScanStatus::Verifying.is_busy());
        assert!(!ScanStatus::Approved.is_busy());
    }

    #[tokio::test]
    async fn test_failed_manual_keeps_token() {
        let session = session();
        let outcome = session.submit_manual(" VISITOR-1-x ").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed(GateError::Validation("Token expired".into()))
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, ScanStatus::Idle);
        assert_eq!(snapshot.token, "VISITOR-1-x");
        assert_eq!(snapshot.message.as_deref(), Some("Token expired"));
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn test_blank_manual_entry() {
        let session = session();
        let outcome = session.submit_manual("   ").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(GateError::Input(_))));
        assert_eq!(session.snapshot().status, ScanStatus::Idle);
        assert!(session.snapshot().message.is_some());
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let session = session();
        session.submit_manual("abc").await;
        assert!(session.clear());
        assert_eq!(session.snapshot(), ScanSession::default());
    }

    #[tokio::test]
    async fn test_file_failure_clears_previous_token() {
        let session = session();
        session.submit_manual("old-token").await;
        let outcome = session
            .submit_file(FileInput::new(Some("notes.txt".into()), "text/plain", b"hi".to_vec()))
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed(GateError::Input("Please use an image file".into()))
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.token, "");
        assert_eq!(snapshot.status, ScanStatus::Idle);
        assert_eq!(snapshot.message.as_deref(), Some("Please use an image file"));
    }
}
