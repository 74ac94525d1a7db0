use shared::error::ApiError;
use tracing::{info, warn};

/// Surfaces outcomes to the operator. Both calls are fire-and-forget.
pub trait NotificationRelay: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_error(&self, error: &ApiError);
}

/// Relay that only writes to the log.
pub struct TracingRelay;

impl NotificationRelay for TracingRelay {
    fn show_info(&self, message: &str) {
        info!("notify: {message}");
    }

    fn show_error(&self, error: &ApiError) {
        warn!(
            code = ?error.code,
            detail = error.detail_or_unspecified(),
            "notify: {}",
            error.message
        );
    }
}
