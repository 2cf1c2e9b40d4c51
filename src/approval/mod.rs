//! Moderation lifecycle of posts and post edits.
//!
//! Content moves `Draft -> Pending -> Approved`. The database stores this as
//! two columns (`status`, `approval_status`); [`ApprovalState`] is the single
//! view of them that every transition and visibility check goes through.

pub mod edits;
pub mod posts;
pub mod queue;

use crate::karma::KarmaReceipt;
use crate::orm::sea_orm_active_enums::{ApprovalStatus, PostStatus};
use crate::orm::{post_edits, posts as post_entity, users};
use crate::role::has_editor_access;
use crate::AppError;
use derive_more::Display;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    /// Only the author can see it.
    #[display(fmt = "a draft")]
    Draft,
    /// Submitted and waiting in the review queue.
    #[display(fmt = "pending approval")]
    Pending,
    /// Live for everyone.
    #[display(fmt = "approved")]
    Approved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ApprovalEvent {
    #[display(fmt = "submit")]
    Submit,
    #[display(fmt = "withdraw")]
    Withdraw,
    #[display(fmt = "approve")]
    Approve,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[display(fmt = "Cannot {} content that is {}", event, from)]
pub struct TransitionError {
    pub from: ApprovalState,
    pub event: ApprovalEvent,
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvariantViolation(err.to_string())
    }
}

impl ApprovalState {
    pub fn from_columns(status: PostStatus, approval_status: ApprovalStatus) -> Self {
        match (status, approval_status) {
            (PostStatus::Draft, _) => ApprovalState::Draft,
            (PostStatus::Published, ApprovalStatus::Pending) => ApprovalState::Pending,
            (PostStatus::Published, ApprovalStatus::Approved) => ApprovalState::Approved,
        }
    }

    pub fn columns(self) -> (PostStatus, ApprovalStatus) {
        match self {
            ApprovalState::Draft => (PostStatus::Draft, ApprovalStatus::Pending),
            ApprovalState::Pending => (PostStatus::Published, ApprovalStatus::Pending),
            ApprovalState::Approved => (PostStatus::Published, ApprovalStatus::Approved),
        }
    }

    pub fn of_post(post: &post_entity::Model) -> Self {
        Self::from_columns(post.status, post.approval_status)
    }

    pub fn of_edit(edit: &post_edits::Model) -> Self {
        Self::from_columns(edit.status, edit.approval_status)
    }

    /// The author may still change the content in place.
    pub fn is_editable(self) -> bool {
        matches!(self, ApprovalState::Draft | ApprovalState::Pending)
    }
}

/// The only legal moves. Everything else is rejected.
pub fn transition(
    from: ApprovalState,
    event: ApprovalEvent,
) -> Result<ApprovalState, TransitionError> {
    match (from, event) {
        (ApprovalState::Draft, ApprovalEvent::Submit) => Ok(ApprovalState::Pending),
        (ApprovalState::Pending, ApprovalEvent::Withdraw) => Ok(ApprovalState::Draft),
        (ApprovalState::Pending, ApprovalEvent::Approve) => Ok(ApprovalState::Approved),
        _ => Err(TransitionError { from, event }),
    }
}

/// Fetch-time guard: unapproved content is visible to its author only.
pub fn can_view(state: ApprovalState, author_id: i32, requester: Option<i32>) -> bool {
    match state {
        ApprovalState::Approved => true,
        ApprovalState::Draft | ApprovalState::Pending => requester == Some(author_id),
    }
}

/// Approvers are editors or above, and never the author of what they approve.
pub fn ensure_can_approve(approver: &users::Model, author_id: i32) -> Result<(), AppError> {
    if !has_editor_access(approver.role) {
        return Err(AppError::forbidden(
            "Editor access is required to approve content",
        ));
    }
    if approver.id == author_id {
        return Err(AppError::forbidden("You cannot approve your own submission"));
    }
    Ok(())
}

/// An approved item together with the karma entries its approval wrote.
#[derive(Clone, Debug)]
pub struct Approved<T> {
    pub item: T,
    pub receipts: Vec<KarmaReceipt>,
}

pub(crate) fn encode_list(values: &[String]) -> String {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|v| v == value) {
            cleaned.push(value.to_owned());
        }
    }
    serde_json::to_string(&cleaned).unwrap_or_else(|_| "[]".to_owned())
}

pub(crate) fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let pending = transition(ApprovalState::Draft, ApprovalEvent::Submit).unwrap();
        assert_eq!(pending, ApprovalState::Pending);
        let approved = transition(pending, ApprovalEvent::Approve).unwrap();
        assert_eq!(approved, ApprovalState::Approved);
    }

    #[test]
    fn test_withdraw_returns_to_draft() {
        assert_eq!(
            transition(ApprovalState::Pending, ApprovalEvent::Withdraw),
            Ok(ApprovalState::Draft)
        );
    }

    #[test]
    fn test_illegal_transitions() {
        let illegal = [
            (ApprovalState::Draft, ApprovalEvent::Approve),
            (ApprovalState::Draft, ApprovalEvent::Withdraw),
            (ApprovalState::Pending, ApprovalEvent::Submit),
            (ApprovalState::Approved, ApprovalEvent::Submit),
            (ApprovalState::Approved, ApprovalEvent::Approve),
            (ApprovalState::Approved, ApprovalEvent::Withdraw),
        ];
        for (from, event) in illegal {
            assert_eq!(
                transition(from, event),
                Err(TransitionError { from, event }),
                "{:?} on {:?}",
                event,
                from
            );
        }
    }

    #[test]
    fn test_transition_error_message() {
        let err = transition(ApprovalState::Approved, ApprovalEvent::Approve).unwrap_err();
        assert_eq!(err.to_string(), "Cannot approve content that is approved");
    }

    #[test]
    fn test_columns_round_trip() {
        for state in [
            ApprovalState::Draft,
            ApprovalState::Pending,
            ApprovalState::Approved,
        ] {
            let (status, approval) = state.columns();
            assert_eq!(ApprovalState::from_columns(status, approval), state);
        }
        // A draft is a draft whatever its approval column says.
        assert_eq!(
            ApprovalState::from_columns(PostStatus::Draft, ApprovalStatus::Approved),
            ApprovalState::Draft
        );
    }

    #[test]
    fn test_visibility() {
        let author = 7;
        for state in [ApprovalState::Draft, ApprovalState::Pending] {
            assert!(can_view(state, author, Some(author)));
            assert!(!can_view(state, author, Some(8)));
            assert!(!can_view(state, author, None));
        }
        assert!(can_view(ApprovalState::Approved, author, None));
        assert!(can_view(ApprovalState::Approved, author, Some(8)));
    }

    #[test]
    fn test_list_encoding() {
        let raw = encode_list(&[
            " Google ".to_owned(),
            "".to_owned(),
            "Google".to_owned(),
            "Meta".to_owned(),
        ]);
        assert_eq!(raw, r#"["Google","Meta"]"#);
        assert_eq!(decode_list(&raw), vec!["Google", "Meta"]);
        assert!(decode_list("not json").is_empty());
    }
}
