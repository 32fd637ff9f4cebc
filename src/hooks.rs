//! Side-effect collaborators invoked by the request interceptors.
//!
//! The client never shows UI or changes routes itself; it calls these
//! traits. The log-backed defaults suit headless use.

/// User-visible notifications (toasts and loading indicator).
pub trait Notifier: Send + Sync {
    /// Show an error message to the user.
    fn error(&self, msg: &str);

    /// A request that wants a loading indicator has started.
    fn show_loading(&self) {}

    /// A request that showed a loading indicator has finished.
    fn hide_loading(&self) {}
}

/// Route changes requested by the client.
pub trait Navigator: Send + Sync {
    /// Replace the current route with `path`.
    fn replace(&self, path: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, msg: &str) {
        log::error!("{}", msg);
    }
}

/// Logs navigation requests instead of acting on them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn replace(&self, path: &str) {
        log::warn!("Navigation requested: {}", path);
    }
}
