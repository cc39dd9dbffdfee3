use crate::config::Config;
use crate::error::AppError;
use std::sync::Arc;
use tracing::{debug, info};

mod smtp;
pub use smtp::SmtpNotifier;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::DesktopNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::DesktopNotifier;

pub const DISABLE_ENV_VAR: &str = "TASKMAIL_DISABLE_NOTIFICATIONS";

/// Delivers one message. Failures are [`AppError::Delivery`]; callers decide
/// whether to retry.
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), AppError> {
        debug!(recipient, subject, "notifications disabled, dropping message");
        Ok(())
    }
}

pub fn notifier_from_config(config: &Config) -> Result<Arc<dyn Notifier>, AppError> {
    if std::env::var_os(DISABLE_ENV_VAR).is_some() {
        info!("notifications disabled by {DISABLE_ENV_VAR}");
        return Ok(Arc::new(NoopNotifier));
    }

    if let Some(settings) = config.smtp.as_ref() {
        info!(host = %settings.host, port = settings.port, "using SMTP notifier");
        return Ok(Arc::new(SmtpNotifier::new(settings)?));
    }

    match platform_notifier() {
        Ok(notifier) => {
            info!("SMTP not configured, using desktop notifier");
            Ok(notifier)
        }
        Err(err) => match err {
            AppError::Config(_) => Ok(Arc::new(NoopNotifier)),
            other => Err(other),
        },
    }
}

#[cfg(any(target_os = "linux", windows))]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Ok(Arc::new(DesktopNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Arc<dyn Notifier>, AppError> {
    Err(AppError::config(
        "desktop notifications are not supported on this platform",
    ))
}
