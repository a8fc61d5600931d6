//! Terminal stand-in for the notification and window host.

use storysync_core::edge::{ClientHost, Notification};
use storysync_core::Result;

pub struct TerminalHost {
    origin: String,
}

impl TerminalHost {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn window_url(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }
}

pub fn format_notification(notification: &Notification) -> String {
    format!("[{}] {}: {}", notification.icon, notification.title, notification.body)
}

impl ClientHost for TerminalHost {
    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        println!("{}", format_notification(notification));
        Ok(())
    }

    async fn close_notification(&self, notification: &Notification) -> Result<()> {
        println!("Closed notification \"{}\"", notification.title);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        tracing::debug!("Claimed clients for {}", self.origin);
        Ok(())
    }

    async fn focus_or_open(&self, url: &str) -> Result<()> {
        println!("Open {}", self.window_url(url));
        Ok(())
    }
}
