//! Outbound mail collaborator seam.
//!
//! # Responsibility
//! - Define the contract used by the credential service to dispatch
//!   verification and reset codes.
//! - Ship a logging implementation for local runs and tests.
//!
//! # Invariants
//! - Implementations never log full codes at info level in production use;
//!   the default `LogMailer` is explicitly a development stand-in.

use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Mail dispatch failure reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError {
    pub recipient: String,
    pub message: String,
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mail delivery to `{}` failed: {}",
            self.recipient, self.message
        )
    }
}

impl Error for MailError {}

/// External mail collaborator.
///
/// Delivery failures must surface; the credential service maps them to its
/// delivery-failed error instead of swallowing them.
pub trait Mailer {
    fn send_verification_code(&self, email: &str, code: &str) -> Result<(), MailError>;
    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), MailError>;
}

/// Development mailer that logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        info!("event=mail_dispatch module=mail status=ok kind=verification recipient={email}");
        debug!("event=mail_code module=mail kind=verification recipient={email} code={code}");
        Ok(())
    }

    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), MailError> {
        info!("event=mail_dispatch module=mail status=ok kind=password_reset recipient={email}");
        debug!("event=mail_code module=mail kind=password_reset recipient={email} code={code}");
        Ok(())
    }
}
