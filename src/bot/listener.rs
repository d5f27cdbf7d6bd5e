use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::session::Session;
use crate::alerts::telegram::{TelegramClient, Update};
use crate::alerts::NotificationError;
use crate::bot::commands::Command;
use crate::config::BotConfig;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls Telegram for commands and answers them.
pub struct CommandListener {
    client: Arc<TelegramClient>,
    session: Session,
    restrict_to_chat: bool,
    timeout_seconds: u64,
}

impl CommandListener {
    pub fn new(client: Arc<TelegramClient>, session: Session, config: &BotConfig) -> Self {
        Self {
            client,
            session,
            restrict_to_chat: config.restrict_to_chat,
            timeout_seconds: config.update_timeout_seconds,
        }
    }

    pub async fn run(&self) {
        info!(restrict_to_chat = self.restrict_to_chat, "Command listener started");
        let mut offset = 0;
        loop {
            match self.poll_once(offset).await {
                Ok(next) => offset = next,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Fetch one batch of updates, answer them, and return the next offset.
    pub async fn poll_once(&self, offset: i64) -> Result<i64, NotificationError> {
        let updates = self.client.get_updates(offset, self.timeout_seconds).await?;

        let mut next = offset;
        for update in &updates {
            next = next.max(update.update_id + 1);
            let Some((chat_id, reply)) = self.respond(update).await else {
                continue;
            };
            if let Err(e) = self.client.send_to(&chat_id, &reply).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to send command reply");
            }
        }
        Ok(next)
    }

    /// Apply the command carried by `update`, if any. Returns the chat to
    /// answer and the reply text.
    pub async fn respond(&self, update: &Update) -> Option<(String, String)> {
        let message = update.message.as_ref()?;
        let command = Command::parse(message.text.as_deref()?)?;
        let chat_id = message.chat.id.to_string();

        if self.restrict_to_chat && chat_id != self.client.chat_id() {
            debug!(chat_id = %chat_id, "Ignoring command from foreign chat");
            return None;
        }

        let reply = self.session.with(|state| command.apply(state)).await;
        info!(command = ?command, chat_id = %chat_id, "Command handled");
        Some((chat_id, reply))
    }
}
