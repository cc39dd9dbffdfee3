use crate::error::AppError;
use crate::notify::Notifier;
use tauri_winrt_notification::Toast;

pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send(&self, _recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        Toast::new(Toast::POWERSHELL_APP_ID)
            .title(subject)
            .text1(body)
            .show()
            .map_err(|err| AppError::delivery(err.to_string()))?;
        Ok(())
    }
}
