use std::sync::Arc;

use crate::bot::BotConnector;
use crate::config::Config;
use crate::hub::NotificationHub;
use crate::store::CredentialStore;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Users and dashboard sessions.
    pub store: Arc<dyn CredentialStore>,
    /// Read access to the bot's connection state, plus disconnect.
    pub bot: Arc<dyn BotConnector>,
    /// Live dashboard viewers.
    pub hub: NotificationHub,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        bot: Arc<dyn BotConnector>,
        hub: NotificationHub,
        config: Config,
    ) -> Self {
        Self {
            store,
            bot,
            hub,
            config,
        }
    }
}
