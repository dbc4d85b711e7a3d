use std::{
    collections::HashSet,
    sync::{Arc, Weak},
};

use futures_util::StreamExt;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::Shared,
    config::ReconnectPolicy,
    error::TransportError,
    model::UserId,
    push::{PushIdentity, PushStream, PushTransport},
};

/// Ids of everyone currently connected. Always replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet(HashSet<UserId>);

impl PresenceSet {
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.0.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

impl FromIterator<UserId> for PresenceSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

/// The one push connection of a live session. Dropping it stops the task.
#[derive(Debug)]
pub(crate) struct PresenceChannel {
    id: ChannelId,
    task: JoinHandle<()>,
}

impl PresenceChannel {
    pub(crate) fn open(
        shared: Weak<Shared>,
        transport: Arc<dyn PushTransport>,
        identity: PushIdentity,
        policy: ReconnectPolicy,
    ) -> Self {
        let id = ChannelId::new();
        debug!("opening presence channel {:?} for u/{}", id, identity.user_id);
        let task = tokio::spawn(run(id, shared, transport, identity, policy));
        Self { id, task }
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PresenceChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Pumped {
    /// The stream ended, possibly after delivering some events.
    Ended { delivered: bool, error: Option<TransportError> },
    /// The channel no longer belongs to a session.
    Retired,
}

async fn run(
    id: ChannelId,
    shared: Weak<Shared>,
    transport: Arc<dyn PushTransport>,
    identity: PushIdentity,
    policy: ReconnectPolicy,
) {
    let mut failures = 0u32;
    loop {
        let lost = match transport.connect(&identity).await {
            Ok(events) => {
                let opened = Instant::now();
                let Some(owner) = shared.upgrade() else { return };
                if !owner.channel_connected(id).await {
                    return;
                }
                drop(owner);

                match pump(id, &shared, events).await {
                    Pumped::Retired => return,
                    Pumped::Ended { delivered, error } => {
                        if policy.was_stable(opened.elapsed(), delivered) {
                            failures = 0;
                        } else {
                            failures += 1;
                        }
                        error.unwrap_or_else(|| TransportError::Stream("connection closed".to_owned()))
                    }
                }
            }
            Err(err) => {
                failures += 1;
                err
            }
        };

        let Some(owner) = shared.upgrade() else { return };
        if failures >= policy.max_attempts.max(1) {
            warn!("presence channel giving up after {failures} attempts: {lost}");
            owner
                .channel_abandoned(id, TransportError::Abandoned { attempts: failures })
                .await;
            return;
        }
        if !owner.channel_lost(id, lost).await {
            return;
        }
        drop(owner);

        let delay = policy.delay_for(failures.max(1));
        debug!("presence channel retrying in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

async fn pump(id: ChannelId, shared: &Weak<Shared>, mut events: PushStream) -> Pumped {
    let mut delivered = false;
    while let Some(item) = events.next().await {
        let Some(owner) = shared.upgrade() else {
            return Pumped::Retired;
        };
        match item {
            Ok(event) => {
                if !owner.handle_push(id, event).await {
                    return Pumped::Retired;
                }
                delivered = true;
            }
            Err(err) => {
                return Pumped::Ended {
                    delivered,
                    error: Some(err),
                };
            }
        }
    }
    info!("presence stream closed");
    Pumped::Ended {
        delivered,
        error: None,
    }
}
