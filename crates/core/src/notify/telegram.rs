//! Telegram Bot API notification sender.
//!
//! Sends MarkdownV2-formatted messages to a chat via the `sendMessage`
//! endpoint. MarkdownV2 reserves most ASCII punctuation, so everything
//! interpolated into a message goes through the escaping helpers below;
//! an unescaped character makes the whole message bounce with HTTP 400.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::errors::NotificationError;

use super::NotificationPayload;

/// Telegram bot notifier bound to one chat.
pub struct TelegramNotifier {
    api_url: String,
    bot_token: String,
    chat_id: String,
    http: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier from the Telegram configuration and a resolved
    /// bot token.
    ///
    /// With `force_ipv4` the client binds to `0.0.0.0`, restricting name
    /// resolution and connections to IPv4. Some hosts advertise an IPv6
    /// route to api.telegram.org that silently blackholes.
    pub fn new(config: &TelegramConfig, bot_token: String) -> Result<Self, NotificationError> {
        info!(chat_id = %config.chat_id, "initializing Telegram notifier");
        let mut builder = reqwest::Client::builder();
        if config.force_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        let http = builder.build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id: config.chat_id.clone(),
            http,
        })
    }

    /// Send a sync notification for the given payload.
    pub async fn send_sync_notification(
        &self,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        let text = format_sync_message(payload);
        debug!(len = text.len(), "sending Telegram message");

        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(NotificationError::HttpError)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "Telegram API returned error");
            return Err(NotificationError::ApiError { status, body });
        }

        info!("Telegram message sent successfully");
        Ok(())
    }
}

/// Render the fixed-structure sync message: headline, linked short commit
/// reference, and the diff in a fenced code block.
pub fn format_sync_message(payload: &NotificationPayload) -> String {
    let short_sha = &payload.commit_sha[..7.min(payload.commit_sha.len())];
    let commit_url = format!("{}/commit/{}", payload.repo_url, payload.commit_sha);

    format!(
        "*Config sync notification*\n\
         A configuration update has been saved\\.\n\
         Commit: [{}]({})\n\
         *Details:*\n\
         ```\n{}\n```",
        escape_text(short_sha),
        escape_url(&commit_url),
        escape_code(&payload.diff_text),
    )
}

/// Escape everything MarkdownV2 reserves in plain message text.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                | '|' | '{' | '}' | '.' | '!' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape the characters reserved inside a fenced code block.
pub fn escape_code(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '`' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape the characters reserved inside an inline-link URL.
pub fn escape_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            diff_text: "+++ b/nginx/nginx.conf\n+worker_processes 4;\n".into(),
            commit_sha: "0123456789abcdef0123456789abcdef01234567".into(),
            repo_url: "https://github.com/acme/config-backup".into(),
        }
    }

    #[test]
    fn test_message_contains_short_sha_and_link() {
        let msg = format_sync_message(&payload());
        assert!(msg.contains("[0123456]"));
        assert!(msg.contains(
            "/commit/0123456789abcdef0123456789abcdef01234567"
        ));
        assert!(msg.starts_with("*Config sync notification*"));
    }

    #[test]
    fn test_message_embeds_diff_in_code_block() {
        let msg = format_sync_message(&payload());
        assert!(msg.contains("```\n+++ b/nginx/nginx.conf"));
        assert!(msg.ends_with("```"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a.b-c"), "a\\.b\\-c");
        assert_eq!(escape_text("v1_final!"), "v1\\_final\\!");
        assert_eq!(escape_text("back\\slash"), "back\\\\slash");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn test_escape_code_only_backtick_and_backslash() {
        assert_eq!(escape_code("a`b\\c"), "a\\`b\\\\c");
        assert_eq!(escape_code("-dots.and_marks!"), "-dots.and_marks!");
    }

    #[test]
    fn test_escape_url() {
        assert_eq!(
            escape_url("https://x.test/commit/abc)def"),
            "https://x.test/commit/abc\\)def"
        );
        assert_eq!(escape_url("https://x.test/a_b"), "https://x.test/a_b");
    }

    #[test]
    fn test_notifier_construction_strips_trailing_slash() {
        let config = TelegramConfig {
            bot_token_env: "T".into(),
            chat_id: "42".into(),
            force_ipv4: false,
            api_url: "https://api.telegram.org/".into(),
            bot_token: None,
        };
        let notifier = TelegramNotifier::new(&config, "123:abc".into()).unwrap();
        assert_eq!(notifier.api_url, "https://api.telegram.org");
        assert_eq!(notifier.chat_id, "42");
    }
}
