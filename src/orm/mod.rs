pub mod comment_votes;
pub mod comments;
pub mod karma_logs;
pub mod notifications;
pub mod post_edits;
pub mod post_votes;
pub mod posts;
pub mod sea_orm_active_enums;
pub mod users;
