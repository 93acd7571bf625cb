//! Outbound result notifications.
//!
//! When a match concludes, each participant's own result is handed to a
//! [`ResultSink`]. Delivery is fire-and-forget: the coordinator never waits
//! for it and never sees its outcome.

use crate::config::TelegramConfig;
use duel_tictactoe::{PlayerRef, PlayerResult, ResultKind};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

/// Receives per-player results of concluded matches.
pub trait ResultSink: Send + Sync {
    /// Hands off `result` for `player`. Must not block.
    fn deliver(&self, player: &PlayerRef, result: &PlayerResult);
}

/// Sink that only records results in the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn deliver(&self, player: &PlayerRef, result: &PlayerResult) {
        info!(
            player_id = %player.id,
            result = %result.result,
            duration_seconds = result.duration_seconds,
            "Match result"
        );
    }
}

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Sink that messages each player through a Telegram bot.
///
/// The player id is used as the chat id, matching how the mini app launches
/// sessions.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    mini_app_url: Option<String>,
}

impl TelegramSink {
    /// Creates a sink from bot settings.
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: TELEGRAM_API.to_string(),
            bot_token: config.bot_token().clone(),
            mini_app_url: config.mini_app_url().clone(),
        }
    }

    /// Points the sink at a different Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Request body for `sendMessage`.
    pub fn payload(&self, chat_id: &str, result: &PlayerResult) -> Value {
        let mut body = json!({
            "chat_id": chat_id,
            "text": result_text(result),
        });
        if let Some(url) = &self.mini_app_url {
            body["reply_markup"] = json!({
                "inline_keyboard": [[
                    {"text": "🎮 Play Again", "web_app": {"url": url}}
                ]]
            });
        }
        body
    }
}

impl ResultSink for TelegramSink {
    #[instrument(skip(self, result), fields(player_id = %player.id, result = %result.result))]
    fn deliver(&self, player: &PlayerRef, result: &PlayerResult) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, dropping result notification");
            return;
        };

        let client = self.client.clone();
        let url = self.endpoint();
        let body = self.payload(&player.id, result);
        let player_id = player.id.clone();

        runtime.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%player_id, "Result notification delivered");
                }
                Ok(response) => {
                    warn!(%player_id, status = %response.status(), "Result notification refused");
                }
                Err(e) => {
                    warn!(%player_id, error = %e, "Result notification failed");
                }
            }
        });
    }
}

/// Message text for a result.
pub fn result_text(result: &PlayerResult) -> String {
    let duration = result.duration_seconds;
    match result.result {
        ResultKind::Win => {
            format!("🎉 Congratulations! You won the game!\n⏱️ Game duration: {duration}s")
        }
        ResultKind::Lose => {
            format!("😅 Better luck next time! You lost this round.\n⏱️ Game duration: {duration}s")
        }
        ResultKind::Draw => format!("🤝 It's a tie! Great game!\n⏱️ Game duration: {duration}s"),
    }
}
