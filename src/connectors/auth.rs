//! Credentials for the Telegram Bot API.

use crate::events::RecipientId;

/// Bot credentials plus the optional fixed recipient.
#[derive(Clone)]
pub struct BotCredentials {
    pub bot_token: String,
    /// Single-recipient deployments set `CHAT_ID`; it is subscribed at startup.
    pub chat_id: Option<RecipientId>,
}

impl BotCredentials {
    /// Creates credentials from explicit values.
    pub fn new(bot_token: String, chat_id: Option<RecipientId>) -> Self {
        Self { bot_token, chat_id }
    }
}

impl std::fmt::Debug for BotCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotCredentials")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}
