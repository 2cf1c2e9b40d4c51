//! Karma point table.
//!
//! Pure functions only: the same action and metadata always produce the same
//! delta.

use crate::orm::sea_orm_active_enums::{KarmaAction, PostType, VoteType};
use serde::{Deserialize, Serialize};

/// Context recorded with every ledger entry, shaped by the kind of action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KarmaMetadata {
    /// Approval of a post or of an edit to a post.
    PostApproval {
        post_type: Option<PostType>,
        post_title: Option<String>,
        /// True on the entry crediting the moderator rather than the author.
        #[serde(default)]
        is_approver: bool,
    },
    /// A vote being cast, or the vote being removed for removal actions.
    Vote {
        vote_type: VoteType,
        post_title: Option<String>,
    },
}

impl KarmaMetadata {
    pub fn post_title(&self) -> Option<&str> {
        match self {
            KarmaMetadata::PostApproval { post_title, .. } => post_title.as_deref(),
            KarmaMetadata::Vote { post_title, .. } => post_title.as_deref(),
        }
    }
}

/// Points for a newly approved post.
pub fn approval_karma(post_type: Option<PostType>) -> i32 {
    match post_type {
        Some(PostType::Question) => 5,
        Some(PostType::Challenge) => 20,
        Some(PostType::SystemDesign) => 20,
        Some(PostType::Blogs) => 10,
        None => 5,
    }
}

/// Points for an approved edit. Literal table, not `approval_karma / 2`.
pub fn edit_approval_karma(post_type: Option<PostType>) -> i32 {
    match post_type {
        Some(PostType::Question) => 3,
        Some(PostType::Challenge) => 10,
        Some(PostType::SystemDesign) => 10,
        Some(PostType::Blogs) => 5,
        None => 3,
    }
}

/// Maps an action and its metadata to a signed karma delta.
///
/// Metadata that doesn't belong to the action yields zero.
pub fn calculate_karma(action: KarmaAction, metadata: &KarmaMetadata) -> i32 {
    use KarmaAction::*;

    match (action, metadata) {
        (PostApproval, KarmaMetadata::PostApproval { post_type, .. }) => approval_karma(*post_type),
        (PostEditApproval, KarmaMetadata::PostApproval { post_type, .. }) => {
            edit_approval_karma(*post_type)
        }
        (PostVote | CommentVote, KarmaMetadata::Vote { vote_type, .. }) => vote_type.weight(),
        // Reverses the contribution of the vote being removed.
        (PostVoteRemoval | CommentVoteRemoval, KarmaMetadata::Vote { vote_type, .. }) => {
            -vote_type.weight()
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(post_type: Option<PostType>) -> KarmaMetadata {
        KarmaMetadata::PostApproval {
            post_type,
            post_title: None,
            is_approver: false,
        }
    }

    fn vote(vote_type: VoteType) -> KarmaMetadata {
        KarmaMetadata::Vote {
            vote_type,
            post_title: None,
        }
    }

    #[test]
    fn test_post_approval_table() {
        let cases = [
            (Some(PostType::Question), 5),
            (Some(PostType::Challenge), 20),
            (Some(PostType::SystemDesign), 20),
            (Some(PostType::Blogs), 10),
            (None, 5),
        ];
        for (post_type, expected) in cases {
            assert_eq!(
                calculate_karma(KarmaAction::PostApproval, &approval(post_type)),
                expected,
                "{:?}",
                post_type
            );
        }
    }

    #[test]
    fn test_edit_approval_table() {
        let cases = [
            (Some(PostType::Question), 3),
            (Some(PostType::Challenge), 10),
            (Some(PostType::SystemDesign), 10),
            (Some(PostType::Blogs), 5),
            (None, 3),
        ];
        for (post_type, expected) in cases {
            assert_eq!(
                calculate_karma(KarmaAction::PostEditApproval, &approval(post_type)),
                expected,
                "{:?}",
                post_type
            );
        }
    }

    #[test]
    fn test_votes_and_removals() {
        for action in [KarmaAction::PostVote, KarmaAction::CommentVote] {
            assert_eq!(calculate_karma(action, &vote(VoteType::Up)), 1);
            assert_eq!(calculate_karma(action, &vote(VoteType::Down)), -1);
        }
        for action in [
            KarmaAction::PostVoteRemoval,
            KarmaAction::CommentVoteRemoval,
        ] {
            assert_eq!(calculate_karma(action, &vote(VoteType::Up)), -1);
            assert_eq!(calculate_karma(action, &vote(VoteType::Down)), 1);
        }
    }

    #[test]
    fn test_vote_then_removal_nets_zero() {
        for vote_type in [VoteType::Up, VoteType::Down] {
            let cast = calculate_karma(KarmaAction::PostVote, &vote(vote_type));
            let removed = calculate_karma(KarmaAction::PostVoteRemoval, &vote(vote_type));
            assert_eq!(cast + removed, 0);
        }
    }

    #[test]
    fn test_mismatched_metadata_is_zero() {
        assert_eq!(
            calculate_karma(KarmaAction::PostApproval, &vote(VoteType::Up)),
            0
        );
        assert_eq!(
            calculate_karma(KarmaAction::CommentVote, &approval(Some(PostType::Blogs))),
            0
        );
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let meta = approval(Some(PostType::Challenge));
        let first = calculate_karma(KarmaAction::PostApproval, &meta);
        for _ in 0..10 {
            assert_eq!(calculate_karma(KarmaAction::PostApproval, &meta), first);
        }
    }

    #[test]
    fn test_metadata_json_is_tagged() {
        let json = serde_json::to_value(&vote(VoteType::Down)).unwrap();
        assert_eq!(json["kind"], "vote");
        assert_eq!(json["vote_type"], "DOWN");

        let json = serde_json::to_value(&approval(Some(PostType::SystemDesign))).unwrap();
        assert_eq!(json["kind"], "post_approval");
        assert_eq!(json["post_type"], "SYSTEMDESIGN");
        assert_eq!(json["is_approver"], false);
    }
}
