use crate::error::AppError;
use crate::notify::Notifier;
use notify_rust::Notification;

/// Shows reminders as desktop notifications. The recipient is ignored; the
/// message goes to whoever is logged in.
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send(&self, _recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let mut notification = Notification::new();
        notification.appname("taskmail");
        notification.summary(subject);
        notification.body(body);

        notification
            .show()
            .map_err(|err| AppError::delivery(err.to_string()))?;
        Ok(())
    }
}
