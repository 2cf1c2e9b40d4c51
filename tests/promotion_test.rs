//! Integration tests for karma-driven promotion and role assignment
mod common;

use codelore::approval::posts::approve_post;
use codelore::approval::ApprovalState;
use codelore::karma::{award_karma, KarmaAward, KarmaMetadata};
use codelore::notifications::dispatcher::KarmaEvents;
use codelore::orm::sea_orm_active_enums::{KarmaAction, PostType, Role, VoteType};
use codelore::role::promotion::{assign_role, promote_if_due};
use codelore::AppError;
use common::{database::*, fixtures::*};

fn upvotes(user_id: i32, points: i32) -> KarmaAward {
    let mut award = KarmaAward::computed(
        user_id,
        KarmaAction::PostVote,
        KarmaMetadata::Vote {
            vote_type: VoteType::Up,
            post_title: None,
        },
    );
    award.karma_change = points;
    award
}

#[actix_rt::test]
async fn test_challenge_approval_promotes_to_editor() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 99).await.unwrap();
    let editor = create_test_user(&db, "editor", Role::Editor, 300).await.unwrap();
    let post = create_test_post(&db, author.id, "LRU cache", PostType::Challenge, ApprovalState::Pending)
        .await
        .unwrap();

    let approved = approve_post(&db, &KarmaEvents::disabled(), false, &editor, post.id)
        .await
        .expect("Approval should succeed");

    assert_eq!(approved.receipts.len(), 1);
    assert_eq!(approved.receipts[0].karma_change, 20);

    let author = get_user(&db, author.id).await;
    assert_eq!(author.karma_points, 119);
    assert_eq!(author.role, Role::Editor);
}

#[actix_rt::test]
async fn test_promotion_boundary() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let short = create_test_user(&db, "short", Role::User, 94).await.unwrap();
    let exact = create_test_user(&db, "exact", Role::User, 95).await.unwrap();
    let actor = create_test_user(&db, "actor", Role::User, 0).await.unwrap();
    let events = KarmaEvents::disabled();

    award_karma(&db, &events, Some(actor.id), upvotes(short.id, 5)).await.unwrap();
    award_karma(&db, &events, Some(actor.id), upvotes(exact.id, 5)).await.unwrap();

    let short = get_user(&db, short.id).await;
    assert_eq!(short.karma_points, 99);
    assert_eq!(short.role, Role::User);

    let exact = get_user(&db, exact.id).await;
    assert_eq!(exact.karma_points, 100);
    assert_eq!(exact.role, Role::Editor);
}

#[actix_rt::test]
async fn test_promotion_skips_to_highest_reached_rank() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let user = create_test_user(&db, "user", Role::User, 1990).await.unwrap();
    let actor = create_test_user(&db, "actor", Role::User, 0).await.unwrap();

    award_karma(&db, &KarmaEvents::disabled(), Some(actor.id), upvotes(user.id, 20))
        .await
        .unwrap();

    assert_eq!(get_user(&db, user.id).await.role, Role::Moderator);
}

#[actix_rt::test]
async fn test_promotion_never_demotes_or_reaches_admin() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let admin = create_test_user(&db, "admin", Role::Admin, 10).await.unwrap();
    let moderator = create_test_user(&db, "moderator", Role::Moderator, 50_000).await.unwrap();

    assert_eq!(promote_if_due(&db, admin.id).await.unwrap(), None);
    assert_eq!(promote_if_due(&db, moderator.id).await.unwrap(), None);
    assert_eq!(promote_if_due(&db, 4242).await.unwrap(), None);

    assert_eq!(get_user(&db, admin.id).await.role, Role::Admin);
    assert_eq!(get_user(&db, moderator.id).await.role, Role::Moderator);
}

#[actix_rt::test]
async fn test_assign_role_rules() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let super_admin = create_test_user(&db, "root", Role::SuperAdmin, 0).await.unwrap();
    let admin = create_test_user(&db, "admin", Role::Admin, 0).await.unwrap();
    let other_admin = create_test_user(&db, "admin2", Role::Admin, 0).await.unwrap();
    let moderator = create_test_user(&db, "moderator", Role::Moderator, 0).await.unwrap();
    let user = create_test_user(&db, "user", Role::User, 0).await.unwrap();

    // Admins hand out ranks below their own.
    let updated = assign_role(&db, &admin, user.id, Role::Moderator).await.unwrap();
    assert_eq!(updated.role, Role::Moderator);
    assert_eq!(get_user(&db, user.id).await.role, Role::Moderator);

    // ...but not their own rank.
    let err = assign_role(&db, &admin, user.id, Role::Admin).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Peers can't change each other.
    let err = assign_role(&db, &admin, other_admin.id, Role::User).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Moderators have no admin access at all.
    let err = assign_role(&db, &moderator, user.id, Role::User).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Nobody changes their own role.
    let err = assign_role(&db, &super_admin, super_admin.id, Role::User).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Super admins may appoint admins.
    let updated = assign_role(&db, &super_admin, user.id, Role::Admin).await.unwrap();
    assert_eq!(updated.role, Role::Admin);

    let err = assign_role(&db, &super_admin, 9999, Role::User).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
