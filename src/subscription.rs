use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::UserId;
use tracing::{debug, error};

/// A user's standing in a chat, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MembershipStatus {
    /// Only full members, admins and the owner count as subscribed.
    pub fn is_subscribed(self) -> bool {
        matches!(
            self,
            MembershipStatus::Creator | MembershipStatus::Administrator | MembershipStatus::Member
        )
    }
}

/// Looks up a user's membership in a channel.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn status(&self, channel: &str, user_id: UserId) -> Result<MembershipStatus>;
}

/// Gate that admits only subscribers of the required channel.
pub struct SubscriptionChecker {
    lookup: Arc<dyn MembershipLookup>,
    channel: String,
}

impl SubscriptionChecker {
    pub fn new(lookup: Arc<dyn MembershipLookup>, channel: impl Into<String>) -> Self {
        Self {
            lookup,
            channel: channel.into(),
        }
    }

    /// One lookup, no retry. A failed lookup counts as "not subscribed".
    pub async fn is_subscribed(&self, user_id: UserId) -> bool {
        match self.lookup.status(&self.channel, user_id).await {
            Ok(status) => {
                debug!(user_id = user_id.0, ?status, "Membership status");
                status.is_subscribed()
            }
            Err(e) => {
                error!(
                    user_id = user_id.0,
                    channel = %self.channel,
                    "Error checking subscription: {:#}",
                    e
                );
                false
            }
        }
    }
}
