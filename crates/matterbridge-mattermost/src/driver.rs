use crate::session::{OutboundPost, RemoteEvent, RemoteIdentity, RemoteSession};
use matterbridge_core::{BridgeError, BridgeResult};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound for waiting on a member listing.
const USERNAMES_TIMEOUT: Duration = Duration::from_secs(10);

/// Work the session task performs on behalf of other tasks.
#[derive(Debug)]
pub enum RemoteCommand {
    Send {
        post: OutboundPost,
        reply: Option<oneshot::Sender<BridgeResult<()>>>,
    },
    JoinChannel {
        name: String,
        reply: oneshot::Sender<BridgeResult<()>>,
    },
    Usernames {
        channel: String,
        reply: oneshot::Sender<BridgeResult<Vec<String>>>,
    },
}

/// Cloneable handle to a session owned by its own task.
#[derive(Clone)]
pub struct RemoteHandle {
    commands: mpsc::Sender<RemoteCommand>,
    identity: watch::Receiver<Option<RemoteIdentity>>,
}

impl RemoteHandle {
    /// The session's identity as of its last successful connect.
    pub fn identity(&self) -> Option<RemoteIdentity> {
        self.identity.borrow().clone()
    }

    /// Queue a post without waiting for delivery.
    ///
    /// Never blocks: when the session is backed up the post is dropped and
    /// an error returned.
    pub fn send(&self, post: OutboundPost) -> BridgeResult<()> {
        self.commands
            .try_send(RemoteCommand::Send { post, reply: None })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    BridgeError::Channel("Mattermost outbound queue is full".into())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    BridgeError::Channel("Mattermost session has stopped".into())
                }
            })
    }

    /// Post and wait for the outcome.
    pub async fn send_and_wait(&self, post: OutboundPost) -> BridgeResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(RemoteCommand::Send {
            post,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn join_channel(&self, name: &str) -> BridgeResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(RemoteCommand::JoinChannel {
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    /// Member usernames of a channel, bounded by a timeout.
    pub async fn usernames_in_channel(&self, channel: &str) -> BridgeResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(RemoteCommand::Usernames {
            channel: channel.to_string(),
            reply,
        })
        .await?;
        match tokio::time::timeout(USERNAMES_TIMEOUT, rx).await {
            Ok(result) => result.map_err(|_| stopped())?,
            Err(_) => Err(BridgeError::Remote(format!(
                "Timed out listing members of '{channel}'"
            ))),
        }
    }

    async fn request(&self, command: RemoteCommand) -> BridgeResult<()> {
        self.commands.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> BridgeError {
    BridgeError::Channel("Mattermost session has stopped".into())
}

/// Move a session into its own task.
///
/// The task connects, joins `channels`, then forwards events to the
/// returned receiver while executing commands from the handle. A lost
/// connection is re-established (and `channels` joined again); a fatal
/// error ends the task with that error.
pub fn spawn_session(
    session: Box<dyn RemoteSession>,
    channels: Vec<String>,
    capacity: usize,
    cancel: CancellationToken,
) -> (
    RemoteHandle,
    mpsc::Receiver<RemoteEvent>,
    JoinHandle<BridgeResult<()>>,
) {
    let capacity = capacity.max(1);
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (identity_tx, identity_rx) = watch::channel(None);

    let driver = SessionDriver {
        session,
        channels,
        commands: commands_rx,
        events: events_tx,
        identity: identity_tx,
        cancel,
    };
    let task = tokio::spawn(driver.run());
    let handle = RemoteHandle {
        commands: commands_tx,
        identity: identity_rx,
    };
    (handle, events_rx, task)
}

struct SessionDriver {
    session: Box<dyn RemoteSession>,
    channels: Vec<String>,
    commands: mpsc::Receiver<RemoteCommand>,
    events: mpsc::Sender<RemoteEvent>,
    identity: watch::Sender<Option<RemoteIdentity>>,
    cancel: CancellationToken,
}

impl SessionDriver {
    async fn run(mut self) -> BridgeResult<()> {
        let name = self.session.name().to_string();
        info!(session = %name, "Connecting to Mattermost");
        if !self.establish(false).await? {
            return Ok(());
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(session = %name, "Mattermost session shutting down");
                    return Ok(());
                }
                Some(command) = self.commands.recv() => self.execute(command).await,
                incoming = self.session.recv_incoming() => match incoming {
                    Ok(true) => {
                        // Resolution may refresh directories; it must not be
                        // interrupted by the next command.
                        let Some(event) = self.session.take_event().await else {
                            continue;
                        };
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Ok(()),
                            sent = self.events.send(event) => {
                                if sent.is_err() {
                                    debug!("Event receiver dropped, stopping session");
                                    return Ok(());
                                }
                            }
                        }
                    }
                    Ok(false) => {
                        warn!(session = %name, "Mattermost connection lost, reconnecting");
                        if !self.establish(true).await? {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        error!(session = %name, error = %e, "Mattermost session failed");
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Connect (or reconnect) and join the configured channels.
    /// `Ok(false)` when cancelled first.
    async fn establish(&mut self, reconnect: bool) -> BridgeResult<bool> {
        let cancel = self.cancel.clone();
        let session = &mut self.session;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            result = async {
                if reconnect {
                    session.reconnect().await
                } else {
                    session.connect().await
                }
            } => result,
        };
        if let Err(e) = result {
            error!(error = %e, "Mattermost connection failed");
            return Err(e);
        }

        self.identity.send_replace(self.session.identity());
        for channel in &self.channels {
            if let Err(e) = self.session.join_channel(channel).await {
                warn!(channel = %channel, error = %e, "Failed to join Mattermost channel");
            }
        }
        Ok(true)
    }

    async fn execute(&mut self, command: RemoteCommand) {
        match command {
            RemoteCommand::Send { post, reply } => {
                let result = self.session.send(&post).await;
                if let Err(e) = &result {
                    warn!(channel = %post.channel, error = %e, "Failed to post to Mattermost");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            RemoteCommand::JoinChannel { name, reply } => {
                let _ = reply.send(self.session.join_channel(&name).await);
            }
            RemoteCommand::Usernames { channel, reply } => {
                let _ = reply.send(self.session.usernames_in_channel(&channel).await);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use matterbridge_core::MessageKind;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Record {
        connects: u32,
        joins: Vec<String>,
        sent: Vec<OutboundPost>,
        script: VecDeque<BridgeResult<Option<RemoteEvent>>>,
        pending: Option<RemoteEvent>,
        fail_connect: Option<BridgeError>,
    }

    struct ScriptedSession {
        record: Arc<Mutex<Record>>,
    }

    #[async_trait]
    impl RemoteSession for ScriptedSession {
        fn name(&self) -> &str {
            "scripted"
        }

        fn identity(&self) -> Option<RemoteIdentity> {
            Some(RemoteIdentity {
                user_id: Some("me".into()),
                username: "matterbot".into(),
            })
        }

        async fn connect(&mut self) -> BridgeResult<()> {
            let mut record = self.record.lock().unwrap();
            record.connects += 1;
            match record.fail_connect.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn send(&mut self, post: &OutboundPost) -> BridgeResult<()> {
            self.record.lock().unwrap().sent.push(post.clone());
            Ok(())
        }

        async fn join_channel(&mut self, name: &str) -> BridgeResult<()> {
            self.record.lock().unwrap().joins.push(name.to_string());
            Ok(())
        }

        async fn usernames_in_channel(&mut self, _channel: &str) -> BridgeResult<Vec<String>> {
            Ok(vec!["bob".into(), "alice".into()])
        }

        async fn recv_incoming(&mut self) -> BridgeResult<bool> {
            let next = {
                let mut record = self.record.lock().unwrap();
                if record.pending.is_some() {
                    return Ok(true);
                }
                record.script.pop_front()
            };
            match next {
                Some(Ok(Some(event))) => {
                    self.record.lock().unwrap().pending = Some(event);
                    Ok(true)
                }
                Some(Ok(None)) => Ok(false),
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }

        async fn take_event(&mut self) -> Option<RemoteEvent> {
            self.record.lock().unwrap().pending.take()
        }
    }

    fn scripted(script: Vec<BridgeResult<Option<RemoteEvent>>>) -> (Box<dyn RemoteSession>, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record {
            script: script.into(),
            ..Default::default()
        }));
        (
            Box::new(ScriptedSession {
                record: record.clone(),
            }),
            record,
        )
    }

    #[tokio::test]
    async fn test_events_forwarded_and_reconnect_rejoins() {
        let (session, record) = scripted(vec![
            Ok(Some(RemoteEvent::posted("town-square", None, "bob", "one"))),
            Ok(None),
            Ok(Some(RemoteEvent::posted("town-square", None, "bob", "two"))),
        ]);
        let cancel = CancellationToken::new();
        let (handle, mut events, task) =
            spawn_session(session, vec!["town-square".into()], 8, cancel.clone());

        assert_eq!(events.recv().await.unwrap().text, "one");
        assert_eq!(events.recv().await.unwrap().text, "two");
        assert_eq!(handle.identity().unwrap().username, "matterbot");
        {
            let record = record.lock().unwrap();
            assert_eq!(record.connects, 2);
            assert_eq!(record.joins, vec!["town-square", "town-square"]);
        }

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_fatal_error_ends_task() {
        let (session, _record) = scripted(vec![Err(BridgeError::AuthRejected("expired".into()))]);
        let (_handle, _events, task) = spawn_session(session, vec![], 8, CancellationToken::new());
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::AuthRejected(_)));
    }

    #[tokio::test]
    async fn test_failed_connect_ends_task() {
        let (session, record) = scripted(vec![]);
        record.lock().unwrap().fail_connect = Some(BridgeError::TeamNotFound("eng".into()));
        let (handle, _events, task) = spawn_session(session, vec![], 8, CancellationToken::new());

        assert!(task.await.unwrap().is_err());
        assert!(handle.send(OutboundPost::new("c", "a", "t", MessageKind::Normal)).is_err());
    }

    #[tokio::test]
    async fn test_commands_executed_between_events() {
        let (session, record) = scripted(vec![]);
        let cancel = CancellationToken::new();
        let (handle, _events, task) = spawn_session(session, vec![], 8, cancel.clone());

        handle
            .send_and_wait(OutboundPost::new("team-dev", "irc-alice", "hi", MessageKind::Normal))
            .await
            .unwrap();
        handle.join_channel("team-dev").await.unwrap();
        let names = handle.usernames_in_channel("team-dev").await.unwrap();

        assert_eq!(names, vec!["bob", "alice"]);
        {
            let record = record.lock().unwrap();
            assert_eq!(record.sent.len(), 1);
            assert_eq!(record.sent[0].text, "hi");
            assert_eq!(record.joins, vec!["team-dev"]);
        }

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
