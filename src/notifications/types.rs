//! Notification type definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    KarmaGained,     // Someone upvoted your content
    KarmaLost,       // A vote against you, or an upvote taken back
    ContentApproved, // A post or edit you submitted went live
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::KarmaGained => "karma_gained",
            Self::KarmaLost => "karma_lost",
            Self::ContentApproved => "content_approved",
        }
    }
}
