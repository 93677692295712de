use crate::error::Error;

/// Consumer-provided sink for user-visible failures.
///
/// The client calls [`request_failed`](Notifier::request_failed) exactly once
/// per failed logical request, however many physical attempts it took. When
/// the failure is [`Error::SessionExpired`] it additionally calls
/// [`session_expired`](Notifier::session_expired), after the session has been
/// cleared, so the application can route back to its login entry point.
///
/// # Example
///
/// ```rust,ignore
/// impl Notifier for ToastNotifier {
///     fn request_failed(&self, error: &Error) {
///         self.toasts.push(error.to_string());
///     }
///
///     fn session_expired(&self) {
///         self.router.navigate("/login");
///     }
/// }
/// ```
pub trait Notifier: Send + Sync + 'static {
    fn request_failed(&self, error: &Error);

    /// Force-logout signal.
    fn session_expired(&self) {}
}

/// Default notifier: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn request_failed(&self, error: &Error) {
        tracing::error!(error = %error, status = ?error.status(), "Request failed");
    }

    fn session_expired(&self) {
        tracing::warn!("Session expired, sign-in required");
    }
}
