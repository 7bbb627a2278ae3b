//! Operator notices and the resync capability.
//!
//! Anything the operator must acknowledge is raised as a [`Notice`] on a
//! [`NoticeSink`]. A notice whose [`Recovery`] is [`Recovery::Resync`] asks
//! the front end to call [`ResyncHandle::request_resync`] once the operator
//! has dismissed it.

use std::fmt;

use parking_lot::Mutex;
use sle_proto::ValidationError;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ConsoleError, ServerFailure};

/// Fixed text shown for every 403.
pub const NOT_AUTHORIZED_MESSAGE: &str = "You are not authorized to perform this action.";

/// What the front end must do after the operator dismisses a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing; local state is still consistent with the server.
    None,
    /// Local state may have drifted; resynchronise from the server.
    Resync,
}

/// A blocking message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server answered 403.
    NotAuthorized,
    /// The server refused an action.
    ServerError {
        /// Failure details.
        failure: ServerFailure,
        /// Follow-up after dismissal.
        recovery: Recovery,
    },
    /// The forward provider rejected a throw event.
    ThrowFailed {
        /// Provider's explanation.
        message: String,
    },
    /// A profile edit failed validation and was not sent.
    Validation(Vec<ValidationError>),
    /// The websocket closed.
    CommunicationLost,
}

impl Notice {
    /// Follow-up after dismissal.
    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        match self {
            Self::ServerError { recovery, .. } => *recovery,
            Self::ThrowFailed { .. } => Recovery::Resync,
            Self::NotAuthorized | Self::Validation(_) | Self::CommunicationLost => Recovery::None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthorized => write!(f, "{NOT_AUTHORIZED_MESSAGE}"),
            Self::ServerError { failure, .. } => write!(f, "Server error: {failure}"),
            Self::ThrowFailed { message } => write!(f, "Throw event failed: {message}"),
            Self::Validation(errors) => {
                write!(f, "The following fields are not valid:")?;
                for error in errors {
                    write!(f, "\n - {error}")?;
                }
                Ok(())
            }
            Self::CommunicationLost => write!(f, "Communication with the proxy has been lost."),
        }
    }
}

/// Receives operator notices.
pub trait NoticeSink: Send + Sync {
    /// Present a notice.
    fn show(&self, notice: Notice);
}

/// Sink that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct NoticeBuffer {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices raised so far, oldest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Remove and return every buffered notice.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl NoticeSink for NoticeBuffer {
    fn show(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Raise the notice for a failed action, if the failure came from the
/// server. Local rejections are returned to the caller without a notice.
pub(crate) fn report_failure(sink: &dyn NoticeSink, error: &ConsoleError, recovery: Recovery) {
    if let ConsoleError::Server(failure) = error {
        sink.show(Notice::ServerError {
            failure: failure.clone(),
            recovery,
        });
    }
}

/// Cloneable capability to ask the console to resynchronise.
#[derive(Debug, Clone)]
pub struct ResyncHandle {
    tx: mpsc::UnboundedSender<()>,
}

/// Receiving side of [`ResyncHandle`].
pub type ResyncRequests = mpsc::UnboundedReceiver<()>;

impl ResyncHandle {
    /// Create a handle and the receiver its requests arrive on.
    #[must_use]
    pub fn channel() -> (Self, ResyncRequests) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Request a resync. Never blocks; requests made while nobody is
    /// listening are discarded.
    pub fn request_resync(&self) {
        if self.tx.send(()).is_err() {
            debug!("resync requested with no console running");
        }
    }
}
