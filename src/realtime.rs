use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

/// Events buffered per channel before slow subscribers start losing them.
const CHANNEL_CAPACITY: usize = 64;

/// Payload delivered on a user's private channel (`user.{id}`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserEvent {
    pub user: EventUser,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventUser {
    pub id: i32,
    pub name: String,
}

impl UserEvent {
    pub fn new(user_id: i32, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user: EventUser {
                id: user_id,
                name: name.into(),
            },
            message: message.into(),
        }
    }

    /// Channel name as exposed to clients.
    pub fn channel(&self) -> String {
        format!("user.{}", self.user.id)
    }
}

/// Registry of per-user broadcast channels.
///
/// Senders are created lazily on first subscribe or publish. Delivery is
/// fire-and-forget: publishing to a channel nobody is listening on drops the
/// event, and a lagging subscriber skips whatever the ring buffer evicted.
#[derive(Clone, Default)]
pub struct UserChannels {
    channels: Arc<RwLock<HashMap<i32, broadcast::Sender<UserEvent>>>>,
}

impl UserChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, user_id: i32) -> broadcast::Sender<UserEvent> {
        if let Some(tx) = self.channels.read().unwrap().get(&user_id) {
            return tx.clone();
        }
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Open a live tail on a user's private channel.
    pub fn subscribe(&self, user_id: i32) -> broadcast::Receiver<UserEvent> {
        self.sender(user_id).subscribe()
    }

    /// Deliver an event to the addressed user's channel. Returns how many
    /// live subscribers received it (0 when nobody is connected).
    pub fn publish(&self, event: UserEvent) -> usize {
        let tx = self.sender(event.user.id);
        tracing::debug!(channel = %event.channel(), "publishing user event");
        tx.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_embeds_user_id() {
        let event = UserEvent::new(7, "Diane", "hello");
        assert_eq!(event.channel(), "user.7");
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let channels = UserChannels::new();
        let mut rx = channels.subscribe(1);

        let delivered = channels.publish(UserEvent::new(1, "Diane", "Project Updated"));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user.id, 1);
        assert_eq!(event.message, "Project Updated");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let channels = UserChannels::new();
        assert_eq!(channels.publish(UserEvent::new(9, "Ghost", "unseen")), 0);
    }

    #[tokio::test]
    async fn channels_are_isolated_per_user() {
        let channels = UserChannels::new();
        let mut rx_a = channels.subscribe(1);
        let mut rx_b = channels.subscribe(2);

        channels.publish(UserEvent::new(2, "Bea", "for b only"));

        let event = rx_b.recv().await.unwrap();
        assert_eq!(event.user.id, 2);
        // User 1's channel stays empty.
        assert!(matches!(
            rx_a.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn every_subscriber_of_a_channel_gets_the_event() {
        let channels = UserChannels::new();
        let mut first = channels.subscribe(5);
        let mut second = channels.subscribe(5);

        let delivered = channels.publish(UserEvent::new(5, "Max", "both tabs"));
        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().message, "both tabs");
        assert_eq!(second.recv().await.unwrap().message, "both tabs");
    }
}
