use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Topic carrying seat numbers of newly sold seats for one event.
pub fn seats_topic(event_id: i64) -> String {
    format!("/topic/events/{}/seats", event_id)
}

/// Fire-and-forget fan-out of seat state changes.
///
/// Delivery is at most once with no acknowledgement; implementations must
/// swallow their own failures.
pub trait NotificationBroadcaster: Send + Sync {
    fn publish(&self, topic: &str, seat_number: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatNotification {
    pub topic: String,
    pub seat_number: String,
}

/// In-process broadcaster over a bounded `tokio::sync::broadcast` channel.
/// Slow subscribers lose the oldest messages.
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<SeatNotification>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatNotification> {
        self.sender.subscribe()
    }
}

impl NotificationBroadcaster for ChannelBroadcaster {
    fn publish(&self, topic: &str, seat_number: &str) {
        let notification = SeatNotification {
            topic: topic.to_string(),
            seat_number: seat_number.to_string(),
        };
        // Err only means nobody is listening right now
        if self.sender.send(notification).is_err() {
            trace!(topic, seat_number, "No subscribers for seat notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let broadcaster = ChannelBroadcaster::new(4);
        broadcaster.publish(&seats_topic(1), "A1");
    }

    #[tokio::test]
    async fn subscribers_receive_published_seats() {
        let broadcaster = ChannelBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(&seats_topic(3), "B2");

        let got = rx.recv().await.unwrap();
        assert_eq!(got.topic, "/topic/events/3/seats");
        assert_eq!(got.seat_number, "B2");
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_old_messages() {
        let broadcaster = ChannelBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for seat in ["A1", "A2", "A3"] {
            broadcaster.publish(&seats_topic(1), seat);
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().seat_number, "A2");
    }
}
