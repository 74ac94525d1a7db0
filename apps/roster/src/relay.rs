use roster_core::{NotificationRelay, TracingRelay};
use shared::error::ApiError;

/// Prints outcomes for the operator and mirrors them into the log.
pub struct ConsoleRelay;

impl NotificationRelay for ConsoleRelay {
    fn show_info(&self, message: &str) {
        TracingRelay.show_info(message);
        println!("{message}");
    }

    fn show_error(&self, error: &ApiError) {
        TracingRelay.show_error(error);
        match &error.detail {
            Some(detail) => eprintln!("error: {} ({detail})", error.message),
            None => eprintln!("error: {}", error.message),
        }
    }
}
