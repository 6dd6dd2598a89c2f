use crate::event::IrcEvent;
use crate::session::{IrcInbound, IrcSession, IrcState};
use crate::transport::IrcLink;
use async_trait::async_trait;
use futures_util::StreamExt;
use irc::client::prelude::{Client, Command, Config};
use matterbridge_core::{Backoff, BackoffPolicy, BridgeError, BridgeResult, IrcConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to keep flushing after QUIT on shutdown.
const QUIT_FLUSH: Duration = Duration::from_secs(2);

/// Receives what the IRC session produces.
#[async_trait]
pub trait IrcHandler: Send + Sync {
    /// Called on the connection task, in arrival order. `own_nick` is the nick
    /// the server assigned to the bridge.
    async fn on_inbound(&self, inbound: IrcInbound, own_nick: &str);
}

/// Client configuration for the `irc` crate. Channels are left empty: the
/// session joins them itself once registration completes.
pub fn client_config(config: &IrcConfig) -> Config {
    Config {
        nickname: Some(config.nick.clone()),
        alt_nicks: vec![format!("{}_", config.nick), format!("{}__", config.nick)],
        username: Some(config.nick.clone()),
        realname: Some("matterbridge".into()),
        server: Some(config.server.clone()),
        port: Some(config.port),
        password: config.password.clone().filter(|p| !p.is_empty()),
        use_tls: Some(config.use_tls),
        dangerously_accept_invalid_certs: Some(config.skip_tls_verify),
        ..Config::default()
    }
}

/// Keep an IRC connection up until `cancel` fires.
///
/// Each connection registers, lets the session join its channels and pumps
/// events through it into `handler`. Lost connections are retried with
/// `policy`; the delay resets once a connection reaches [`IrcState::Ready`].
pub async fn run_irc(
    config: IrcConfig,
    policy: BackoffPolicy,
    mut session: IrcSession,
    link: Arc<IrcLink>,
    handler: Arc<dyn IrcHandler>,
    cancel: CancellationToken,
) -> BridgeResult<()> {
    let mut backoff = Backoff::new(policy);
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        info!(server = %config.server, port = config.port, tls = config.use_tls, "Connecting to IRC");
        let result = connect_once(&config, &mut session, &link, handler.as_ref(), &mut backoff, &cancel).await;
        link.detach();
        session.on_disconnected();

        match result {
            Ok(()) if cancel.is_cancelled() => return Ok(()),
            Ok(()) => warn!("IRC connection closed"),
            Err(e) => warn!(error = %e, "IRC connection failed"),
        }

        let delay = backoff.next_delay();
        info!(
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to IRC"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn connect_once(
    config: &IrcConfig,
    session: &mut IrcSession,
    link: &IrcLink,
    handler: &dyn IrcHandler,
    backoff: &mut Backoff,
    cancel: &CancellationToken,
) -> BridgeResult<()> {
    let mut client = Client::from_config(client_config(config))
        .await
        .map_err(irc_error)?;
    client.identify().map_err(irc_error)?;
    let mut stream = client.stream().map_err(irc_error)?;
    link.attach(client.sender());
    session.on_connected();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Leaving IRC");
                let _ = client.send(Command::QUIT(Some("bridge shutting down".into())));
                let _ = tokio::time::timeout(QUIT_FLUSH, async {
                    while let Some(Ok(_)) = stream.next().await {}
                })
                .await;
                return Ok(());
            }
            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return Err(irc_error(e)),
                    None => return Ok(()),
                };
                let event = IrcEvent::from_message(&message);
                if let IrcEvent::Other { code } = &event {
                    debug!(code = %code, "<- irc");
                }
                let inbound = session.handle(event, link);
                if session.state() == IrcState::Ready && backoff.attempts() > 0 {
                    backoff.reset();
                }
                if let Some(inbound) = inbound {
                    handler.on_inbound(inbound, session.nick()).await;
                }
            }
        }
    }
}

fn irc_error(e: irc::error::Error) -> BridgeError {
    BridgeError::Irc(e.to_string())
}
