use crate::config::SmtpSettings;
use crate::error::AppError;
use crate::notify::Notifier;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

/// Port that speaks TLS from the first byte; every other port upgrades with
/// STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends reminders as plain-text mail through an SMTP relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        let from_raw = settings.from.as_deref().unwrap_or(&settings.username);
        let from = from_raw.parse::<Mailbox>().map_err(|err| {
            AppError::config(format!("invalid sender address '{from_raw}': {err}"))
        })?;

        let builder = if uses_implicit_tls(settings.port) {
            SmtpTransport::relay(&settings.host)
        } else {
            SmtpTransport::starttls_relay(&settings.host)
        };
        let transport = builder
            .map_err(|err| AppError::config(format!("smtp relay {}: {err}", settings.host)))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message, AppError> {
        let to = recipient.parse::<Mailbox>().map_err(|err| {
            AppError::delivery(format!("invalid recipient address '{recipient}': {err}"))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| AppError::delivery(err.to_string()))
    }
}

fn uses_implicit_tls(port: u16) -> bool {
    port == IMPLICIT_TLS_PORT
}

impl Notifier for SmtpNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let message = self.build_message(recipient, subject, body)?;
        self.transport
            .send(&message)
            .map_err(|err| AppError::delivery(err.to_string()))?;
        info!(recipient, subject, "reminder mail sent");
        Ok(())
    }
}
