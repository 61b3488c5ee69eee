//! User-facing notifications.
//!
//! Desktop-style notifications are only sent when permission was already
//! granted; nothing in this crate asks for it. Toasts are transient UI
//! feedback for board moves.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;

use crate::config::NotificationConfig;
use crate::error::{Error, Result};

/// Notification permission as reported by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Never asked.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Replaces an earlier notification with the same tag.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn permission(&self) -> Permission;

    async fn notify(&self, notification: &Notification) -> Result<()>;

    async fn toast(&self, kind: ToastKind, message: &str) -> Result<()> {
        match kind {
            ToastKind::Error => tracing::warn!(target: "toast", "{}", message),
            _ => tracing::info!(target: "toast", "{}", message),
        }
        Ok(())
    }
}

/// Writes notifications to the log.
pub struct LogNotifier {
    permission: Permission,
}

impl LogNotifier {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            target: "notification",
            tag = notification.tag.as_deref().unwrap_or(""),
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// Sends notifications to a paired Telegram chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let text = format!("{}\n{}", notification.title, notification.body);
        self.bot
            .send_message(self.chat_id, text)
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;
        Ok(())
    }
}

/// Pick the notification sink from settings.
///
/// Telegram counts as granted once a bot token and chat are configured.
pub fn create_notifier(config: &NotificationConfig) -> Arc<dyn Notifier> {
    match (&config.telegram.bot_token, config.telegram.chat_id) {
        (Some(token), Some(chat_id)) if !token.trim().is_empty() => {
            Arc::new(TelegramNotifier::new(token.clone(), chat_id))
        }
        _ => {
            let permission = if config.log_permission_granted {
                Permission::Granted
            } else {
                Permission::Default
            };
            Arc::new(LogNotifier::new(permission))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramNotifyConfig;

    #[test]
    fn log_sink_is_not_granted_by_default() {
        let notifier = create_notifier(&NotificationConfig::default());
        assert_eq!(notifier.permission(), Permission::Default);
    }

    #[test]
    fn telegram_needs_token_and_chat() {
        let config = NotificationConfig {
            telegram: TelegramNotifyConfig {
                bot_token: Some("123:abc".to_string()),
                chat_id: None,
            },
            ..Default::default()
        };
        assert_eq!(create_notifier(&config).permission(), Permission::Default);

        let config = NotificationConfig {
            telegram: TelegramNotifyConfig {
                bot_token: Some("123:abc".to_string()),
                chat_id: Some(42),
            },
            ..Default::default()
        };
        assert_eq!(create_notifier(&config).permission(), Permission::Granted);
    }

    #[tokio::test]
    async fn log_sink_accepts_notifications() {
        let notifier = LogNotifier::new(Permission::Granted);
        let n = Notification {
            title: "Task updated".to_string(),
            body: "Status: Done".to_string(),
            tag: None,
        };
        assert!(notifier.notify(&n).await.is_ok());
        assert!(notifier.toast(ToastKind::Success, "ok").await.is_ok());
    }
}
