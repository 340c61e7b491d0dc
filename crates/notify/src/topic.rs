use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};

/// What happened when an address was removed from a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnsubscribeOutcome {
    /// The subscription was never confirmed and cannot be removed yet.
    pub pending_confirmation: bool,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub subject: String,
    pub message: String,
}

/// Fan-out channel for series announcements. Failures are logged by the
/// implementation and never surface to callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the topic reference to persist.
    async fn create_topic(&self, name: &str) -> String;
    async fn delete_topic(&self, topic: &str) -> bool;
    async fn subscribe(&self, topic: &str, email: &str) -> Option<String>;
    async fn unsubscribe(&self, topic: &str, email: &str) -> UnsubscribeOutcome;
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Subscription {
    email: String,
    confirmed: bool,
}

/// In-process topics addressed as `arn:local:sns:{name}`.
#[derive(Debug, Default)]
pub struct LocalNotifier {
    topics: DashMap<String, Vec<Subscription>>,
    published: DashMap<String, Vec<Publication>>,
    require_confirmation: bool,
}

pub const LOCAL_TOPIC_PREFIX: &str = "arn:local:sns:";

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// New subscriptions stay pending until [`LocalNotifier::confirm`] is called.
    pub fn with_confirmation() -> Self {
        Self {
            require_confirmation: true,
            ..Self::default()
        }
    }

    pub fn topic_ref(name: &str) -> String {
        format!("{LOCAL_TOPIC_PREFIX}{name}")
    }

    pub fn confirm(&self, topic: &str, email: &str) -> bool {
        let Some(mut subs) = self.topics.get_mut(topic) else {
            return false;
        };
        match subs.iter_mut().find(|s| s.email == email) {
            Some(sub) => {
                sub.confirmed = true;
                true
            }
            None => false,
        }
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn subscribers(&self, topic: &str) -> Vec<String> {
        self.topics
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.email.clone()).collect())
            .unwrap_or_default()
    }

    pub fn publications(&self, topic: &str) -> Vec<Publication> {
        self.published
            .get(topic)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn create_topic(&self, name: &str) -> String {
        let topic = Self::topic_ref(name);
        self.topics.entry(topic.clone()).or_default();
        info!(topic = %topic, "Created notification topic");
        topic
    }

    async fn delete_topic(&self, topic: &str) -> bool {
        self.published.remove(topic);
        if self.topics.remove(topic).is_none() {
            warn!(topic = %topic, "Deleting unknown notification topic");
        }
        true
    }

    async fn subscribe(&self, topic: &str, email: &str) -> Option<String> {
        let Some(mut subs) = self.topics.get_mut(topic) else {
            warn!(topic = %topic, "Subscribe to unknown topic");
            return None;
        };
        if !subs.iter().any(|s| s.email == email) {
            subs.push(Subscription {
                email: email.to_string(),
                confirmed: !self.require_confirmation,
            });
        }
        info!(topic = %topic, email = %email, "Subscribed address to topic");
        Some(format!("arn:local:sub:{email}"))
    }

    async fn unsubscribe(&self, topic: &str, email: &str) -> UnsubscribeOutcome {
        let Some(mut subs) = self.topics.get_mut(topic) else {
            return UnsubscribeOutcome::default();
        };
        let Some(index) = subs.iter().position(|s| s.email == email) else {
            return UnsubscribeOutcome::default();
        };
        if !subs[index].confirmed {
            return UnsubscribeOutcome {
                pending_confirmation: true,
                removed: false,
            };
        }
        subs.remove(index);
        info!(topic = %topic, email = %email, "Unsubscribed address from topic");
        UnsubscribeOutcome {
            pending_confirmation: false,
            removed: true,
        }
    }

    async fn publish(&self, topic: &str, subject: &str, message: &str) -> bool {
        let recipients = self
            .topics
            .get(topic)
            .map(|subs| subs.iter().filter(|s| s.confirmed).count())
            .unwrap_or(0);
        info!(topic = %topic, subject = %subject, recipients, "Published to topic");
        self.published
            .entry(topic.to_string())
            .or_default()
            .push(Publication {
                topic: topic.to_string(),
                subject: subject.to_string(),
                message: message.to_string(),
            });
        true
    }
}
