//! Notification subsystem.
//!
//! Telegram is currently the only channel. The [`Notifier`] facade hides
//! whether a channel is configured at all; delivery failures are the
//! caller's to log, never to abort on — by the time a notification goes
//! out the backup itself has already been pushed.

pub mod telegram;

use tracing::info;

use crate::config::TelegramConfig;
use crate::errors::NotificationError;

/// Everything the notification message is built from. Constructed once
/// after a successful push, consumed once, never persisted.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// The staged diff that was committed.
    pub diff_text: String,

    /// Full commit SHA.
    pub commit_sha: String,

    /// Base URL of the remote repository, for the commit link.
    pub repo_url: String,
}

/// Facade over the configured notification channel, if any.
pub struct Notifier {
    telegram: Option<telegram::TelegramNotifier>,
}

impl Notifier {
    /// Build a notifier from the Telegram configuration. A missing config
    /// table or an unresolved bot token means notifications are disabled.
    pub fn new(config: Option<&TelegramConfig>) -> Result<Self, NotificationError> {
        let telegram = match config {
            Some(tg) => match tg.bot_token.clone() {
                Some(token) => {
                    info!("Telegram notifications enabled");
                    Some(telegram::TelegramNotifier::new(tg, token)?)
                }
                None => {
                    info!("Telegram configured but bot token unresolved, notifications disabled");
                    None
                }
            },
            None => None,
        };
        Ok(Self { telegram })
    }

    /// Return whether any notification channel is configured.
    pub fn is_configured(&self) -> bool {
        self.telegram.is_some()
    }

    /// Deliver a sync notification. No-op when unconfigured.
    pub async fn notify_sync(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        if let Some(ref telegram) = self.telegram {
            telegram.send_sync_notification(payload).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_not_configured_without_table() {
        let notifier = Notifier::new(None).unwrap();
        assert!(!notifier.is_configured());
    }

    #[test]
    fn test_notifier_not_configured_without_token() {
        let config = TelegramConfig {
            bot_token_env: "UNSET".into(),
            chat_id: "42".into(),
            force_ipv4: false,
            api_url: "https://api.telegram.org".into(),
            bot_token: None,
        };
        let notifier = Notifier::new(Some(&config)).unwrap();
        assert!(!notifier.is_configured());
    }

    #[test]
    fn test_notifier_configured_with_token() {
        let config = TelegramConfig {
            bot_token_env: "SET".into(),
            chat_id: "42".into(),
            force_ipv4: false,
            api_url: "https://api.telegram.org".into(),
            bot_token: Some("123:abc".into()),
        };
        let notifier = Notifier::new(Some(&config)).unwrap();
        assert!(notifier.is_configured());
    }

    #[tokio::test]
    async fn test_notify_sync_is_noop_when_unconfigured() {
        let notifier = Notifier::new(None).unwrap();
        let payload = NotificationPayload {
            diff_text: "+x\n".into(),
            commit_sha: "abc".into(),
            repo_url: "https://example.test/repo".into(),
        };
        notifier.notify_sync(&payload).await.unwrap();
    }
}
