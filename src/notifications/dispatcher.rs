//! Turns committed karma changes into notifications.
//!
//! Flows that change karma publish their receipts on a [`KarmaEvents`]
//! handle once their transaction has committed. A single background task
//! drains the channel and writes the notifications, so a slow or failing
//! notification insert never holds up a request.

use crate::karma::{KarmaMetadata, KarmaReceipt};
use crate::notifications::{create_notification, NotificationType};
use crate::orm::sea_orm_active_enums::{KarmaAction, VoteType};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use sea_orm::{DatabaseConnection, DbErr};

/// Sending half of the karma event channel. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct KarmaEvents {
    tx: Option<UnboundedSender<KarmaReceipt>>,
}

impl KarmaEvents {
    pub fn channel() -> (Self, UnboundedReceiver<KarmaReceipt>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// A handle that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, receipt: &KarmaReceipt) {
        if receipt.karma_change == 0 {
            return;
        }

        if let Some(tx) = &self.tx {
            if let Err(e) = tx.unbounded_send(receipt.clone()) {
                log::warn!(
                    "Dropped karma event for ledger entry {}: {}",
                    receipt.log_id,
                    e
                );
            }
        }
    }
}

/// Consumes events until every [`KarmaEvents`] sender has been dropped.
pub async fn run_dispatcher(db: DatabaseConnection, mut rx: UnboundedReceiver<KarmaReceipt>) {
    log::info!("Karma event dispatcher started");

    while let Some(receipt) = rx.next().await {
        if let Err(e) = notify_karma_change(&db, &receipt).await {
            log::warn!(
                "Failed to notify user {} of ledger entry {}: {}",
                receipt.user_id,
                receipt.log_id,
                e
            );
        }
    }

    log::info!("Karma event dispatcher stopped");
}

/// Writes the notification for one receipt. Returns the notification id, or
/// `None` when the change doesn't warrant one.
pub async fn notify_karma_change(
    db: &DatabaseConnection,
    receipt: &KarmaReceipt,
) -> Result<Option<i32>, DbErr> {
    // Don't notify yourself
    if receipt.karma_change == 0 || receipt.user_id == receipt.from_user_id {
        return Ok(None);
    }

    let (notification_type, title, message) = describe(receipt);
    let url = receipt.post_id.map(|id| format!("/post/{}", id));

    let id = create_notification(
        db,
        receipt.user_id,
        notification_type,
        title,
        message,
        url,
        Some(receipt.from_user_id),
    )
    .await?;

    Ok(Some(id))
}

fn describe(receipt: &KarmaReceipt) -> (NotificationType, String, String) {
    let points = format!("{:+} karma", receipt.karma_change);
    let subject = match receipt.metadata.post_title() {
        Some(title) => format!("\"{}\"", title),
        None => "your post".to_string(),
    };

    match (receipt.action, &receipt.metadata) {
        (KarmaAction::PostApproval, _) => (
            NotificationType::ContentApproved,
            "Your post was approved".to_string(),
            format!("{} is now live. {}", subject, points),
        ),
        (KarmaAction::PostEditApproval, _) => (
            NotificationType::ContentApproved,
            "Your edit was approved".to_string(),
            format!("Your changes to {} are now live. {}", subject, points),
        ),
        (KarmaAction::PostVote, KarmaMetadata::Vote { vote_type, .. }) => vote_message(
            receipt.karma_change,
            format!("Your post {} received {}", subject, vote_word(*vote_type)),
            points,
        ),
        (KarmaAction::CommentVote, KarmaMetadata::Vote { vote_type, .. }) => vote_message(
            receipt.karma_change,
            format!("Your comment received {}", vote_word(*vote_type)),
            points,
        ),
        (KarmaAction::PostVoteRemoval | KarmaAction::CommentVoteRemoval, _) => vote_message(
            receipt.karma_change,
            "A vote on your content was withdrawn".to_string(),
            points,
        ),
        _ => vote_message(
            receipt.karma_change,
            "Your karma changed".to_string(),
            points,
        ),
    }
}

fn vote_word(vote_type: VoteType) -> &'static str {
    match vote_type {
        VoteType::Up => "an upvote",
        VoteType::Down => "a downvote",
    }
}

fn vote_message(change: i32, title: String, points: String) -> (NotificationType, String, String) {
    let notification_type = if change > 0 {
        NotificationType::KarmaGained
    } else {
        NotificationType::KarmaLost
    };
    (notification_type, title, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::sea_orm_active_enums::PostType;

    fn receipt(action: KarmaAction, karma_change: i32, metadata: KarmaMetadata) -> KarmaReceipt {
        KarmaReceipt {
            log_id: 1,
            user_id: 2,
            from_user_id: 3,
            action,
            karma_change,
            new_karma: 10,
            post_id: Some(4),
            comment_id: None,
            metadata,
        }
    }

    #[test]
    fn test_describe_approval() {
        let (kind, title, message) = describe(&receipt(
            KarmaAction::PostApproval,
            20,
            KarmaMetadata::PostApproval {
                post_type: Some(PostType::Challenge),
                post_title: Some("Two Sum".to_string()),
                is_approver: false,
            },
        ));
        assert_eq!(kind, NotificationType::ContentApproved);
        assert_eq!(title, "Your post was approved");
        assert_eq!(message, "\"Two Sum\" is now live. +20 karma");
    }

    #[test]
    fn test_describe_downvote() {
        let (kind, title, message) = describe(&receipt(
            KarmaAction::CommentVote,
            -1,
            KarmaMetadata::Vote {
                vote_type: VoteType::Down,
                post_title: None,
            },
        ));
        assert_eq!(kind, NotificationType::KarmaLost);
        assert_eq!(title, "Your comment received a downvote");
        assert_eq!(message, "-1 karma");
    }

    #[test]
    fn test_disabled_handle_drops_events() {
        let events = KarmaEvents::disabled();
        events.publish(&receipt(
            KarmaAction::PostVote,
            1,
            KarmaMetadata::Vote {
                vote_type: VoteType::Up,
                post_title: None,
            },
        ));
    }

    #[test]
    fn test_publish_skips_zero_changes() {
        let (events, mut rx) = KarmaEvents::channel();
        let metadata = KarmaMetadata::Vote {
            vote_type: VoteType::Up,
            post_title: None,
        };
        events.publish(&receipt(KarmaAction::PostVote, 0, metadata.clone()));
        events.publish(&receipt(KarmaAction::PostVote, 1, metadata));
        drop(events);

        let mut received = Vec::new();
        while let Ok(Some(r)) = rx.try_next() {
            received.push(r);
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].karma_change, 1);
    }
}
