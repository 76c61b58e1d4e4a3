//! Change notifications published by the session.
//!
//! Every mutator emits one [`SessionEvent`] after updating state. Each event
//! belongs to a [`Topic`] naming the slice of state it touched, and a
//! [`Subscription`] only yields events of the topics it asked for, so a
//! consumer that renders the timeline is not woken by file content arriving.

use crate::models::ObjectId;
use crate::windows::WindowId;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Repository,
    Commits,
    Cursor,
    Playback,
    FileTree,
    Windows,
    Content,
    Changes,
    Errors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RepositoryOpening { path: String },
    RepositoryReady { commits_count: usize },
    RepositoryFailed { message: String },
    BatchLoaded { batch_index: usize, records: usize },
    CursorMoved { index: usize },
    PlaybackChanged { is_playing: bool, speed: u32 },
    FileTreeUpdated { index: usize },
    WindowsChanged,
    WindowNavigated { window: WindowId },
    ContentUpdated { object_id: ObjectId },
    ContentEvicted { object_id: ObjectId },
    SizesUpdated { batch_index: usize },
    RankingUpdated { batch_index: usize },
    FetchFailed { resource: String, message: String },
}

impl SessionEvent {
    pub fn topic(&self) -> Topic {
        match self {
            SessionEvent::RepositoryOpening { .. }
            | SessionEvent::RepositoryReady { .. }
            | SessionEvent::RepositoryFailed { .. } => Topic::Repository,
            SessionEvent::BatchLoaded { .. } => Topic::Commits,
            SessionEvent::CursorMoved { .. } => Topic::Cursor,
            SessionEvent::PlaybackChanged { .. } => Topic::Playback,
            SessionEvent::FileTreeUpdated { .. } => Topic::FileTree,
            SessionEvent::WindowsChanged | SessionEvent::WindowNavigated { .. } => Topic::Windows,
            SessionEvent::ContentUpdated { .. } | SessionEvent::ContentEvicted { .. } => {
                Topic::Content
            }
            SessionEvent::SizesUpdated { .. } | SessionEvent::RankingUpdated { .. } => {
                Topic::Changes
            }
            SessionEvent::FetchFailed { .. } => Topic::Errors,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is the common headless case.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topics: topics.to_vec(),
        }
    }

    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&[])
    }
}

/// A filtered view of the event stream. An empty topic list means every topic.
pub struct Subscription {
    receiver: broadcast::Receiver<SessionEvent>,
    topics: Vec<Topic>,
}

impl Subscription {
    fn wants(&self, event: &SessionEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }

    /// Next event of a subscribed topic, or `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drains already-published events without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_topics() {
        let bus = EventBus::new(16);
        let mut cursor_only = bus.subscribe(&[Topic::Cursor]);
        let mut everything = bus.subscribe_all();

        bus.publish(SessionEvent::ContentUpdated {
            object_id: "abc".into(),
        });
        bus.publish(SessionEvent::CursorMoved { index: 3 });

        assert_eq!(
            cursor_only.recv().await,
            Some(SessionEvent::CursorMoved { index: 3 })
        );
        assert_eq!(everything.try_recv().unwrap().topic(), Topic::Content);
        assert_eq!(everything.try_recv().unwrap().topic(), Topic::Cursor);
        assert!(everything.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(SessionEvent::WindowsChanged);
    }

    #[test]
    fn test_lagged_subscriber_keeps_newest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(&[Topic::Cursor]);
        for index in 0..5 {
            bus.publish(SessionEvent::CursorMoved { index });
        }
        assert_eq!(sub.try_recv(), Some(SessionEvent::CursorMoved { index: 3 }));
        assert_eq!(sub.try_recv(), Some(SessionEvent::CursorMoved { index: 4 }));
        assert_eq!(sub.try_recv(), None);
    }
}
