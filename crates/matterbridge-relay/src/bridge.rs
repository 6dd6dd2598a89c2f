use crate::media::{GiphyClient, MediaSearch};
use crate::relay::{Relay, RelayOptions};
use matterbridge_core::{BridgeConfig, BridgeError, BridgeResult, RemoteMode};
use matterbridge_irc::{run_irc, IrcHandler, IrcLink, IrcSession, IrcTransport};
use matterbridge_mattermost::{spawn_session, ApiSession, HttpApi, RemoteSession, WebhookSession};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A configured bridge, ready to run.
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Build the Mattermost session variant selected by configuration.
    pub fn remote_session(&self) -> BridgeResult<Box<dyn RemoteSession>> {
        let mm = &self.config.mattermost;
        match mm.mode {
            RemoteMode::Api => {
                let api = HttpApi::new(&mm.server, mm.no_tls, mm.skip_tls_verify)?;
                Ok(Box::new(ApiSession::new(
                    api,
                    self.config.credentials()?,
                    mm.team.clone(),
                    self.config.general.backoff,
                )))
            }
            RemoteMode::Webhook => Ok(Box::new(WebhookSession::from_config(&self.config)?)),
        }
    }

    /// Run until `cancel` fires or either side fails fatally.
    pub async fn run(self, cancel: CancellationToken) -> BridgeResult<()> {
        let session = self.remote_session()?;
        let config = self.config;
        let channel_map = config.channel_map();

        let remote_channels = match config.mattermost.mode {
            RemoteMode::Api => channel_map.remote_channels(),
            RemoteMode::Webhook => Vec::new(),
        };
        let (remote, events, mut remote_task) = spawn_session(
            session,
            remote_channels,
            config.general.queue_capacity,
            cancel.clone(),
        );

        let link = Arc::new(IrcLink::new());
        let media: Arc<dyn MediaSearch> = Arc::new(GiphyClient::new(config.general.giphy_api_key.clone())?);
        let irc: Arc<dyn IrcTransport> = link.clone();
        let relay = Arc::new(Relay::new(
            channel_map.clone(),
            RelayOptions::from_config(&config),
            remote,
            irc,
            media,
        ));
        let pump = tokio::spawn(relay.clone().run_remote_pump(events, cancel.clone()));

        let irc_session = IrcSession::new(
            &config.irc,
            channel_map.irc_channels(),
            config.mattermost.show_join_part,
        );
        let handler: Arc<dyn IrcHandler> = relay;
        let mut irc_task = tokio::spawn(run_irc(
            config.irc.clone(),
            config.general.backoff,
            irc_session,
            link,
            handler,
            cancel.clone(),
        ));
        info!(
            mode = ?config.mattermost.mode,
            irc_channels = ?channel_map.irc_channels(),
            "Bridge running"
        );

        let result = tokio::select! {
            joined = &mut remote_task => {
                cancel.cancel();
                let _ = irc_task.await;
                flatten("mattermost", joined)
            }
            joined = &mut irc_task => {
                cancel.cancel();
                let _ = remote_task.await;
                flatten("irc", joined)
            }
        };
        let _ = pump.await;
        info!("Bridge stopped");
        result
    }
}

fn flatten(side: &str, joined: Result<BridgeResult<()>, tokio::task::JoinError>) -> BridgeResult<()> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!(side, error = %e, "Bridge task panicked");
            Err(BridgeError::Channel(format!("{side} task failed: {e}")))
        }
    }
}
