//! Integration tests for the karma award operation and ledger
mod common;

use codelore::karma::{
    award_karma, calculate_karma, list_karma_history, KarmaAward, KarmaError, KarmaMetadata,
};
use codelore::notifications::dispatcher::{run_dispatcher, KarmaEvents};
use codelore::notifications::{count_unread_notifications, get_user_notifications};
use codelore::orm::sea_orm_active_enums::{KarmaAction, PostType, Role, VoteType};
use common::{database::*, fixtures::*};
use sea_orm::{ConnectionTrait, Statement};

fn question_approval(user_id: i32) -> KarmaAward {
    KarmaAward::computed(
        user_id,
        KarmaAction::PostApproval,
        KarmaMetadata::PostApproval {
            post_type: Some(PostType::Question),
            post_title: Some("Reverse a linked list".to_string()),
            is_approver: false,
        },
    )
}

fn vote(user_id: i32, action: KarmaAction, vote_type: VoteType) -> KarmaAward {
    KarmaAward::computed(
        user_id,
        action,
        KarmaMetadata::Vote {
            vote_type,
            post_title: None,
        },
    )
}

#[actix_rt::test]
async fn test_first_question_approval() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 0).await.unwrap();
    let editor = create_test_user(&db, "editor", Role::Editor, 150).await.unwrap();

    let receipt = award_karma(
        &db,
        &KarmaEvents::disabled(),
        Some(editor.id),
        question_approval(author.id),
    )
    .await
    .expect("Award should succeed");

    assert_eq!(receipt.karma_change, 5);
    assert_eq!(receipt.new_karma, 5);

    let author = get_user(&db, author.id).await;
    assert_eq!(author.karma_points, 5);
    assert_eq!(author.role, Role::User, "5 karma is no promotion");

    let ledger = ledger_for(&db, author.id).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].id, receipt.log_id);
    assert_eq!(ledger[0].action, KarmaAction::PostApproval);
    assert_eq!(ledger[0].karma_change, 5);
    assert_eq!(ledger[0].from_user_id, Some(editor.id));
}

#[actix_rt::test]
async fn test_explicit_change_overrides_table() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let user = create_test_user(&db, "user", Role::User, 0).await.unwrap();

    let mut award = question_approval(user.id);
    award.karma_change = 7;
    let receipt = award_karma(&db, &KarmaEvents::disabled(), Some(user.id), award)
        .await
        .unwrap();

    assert_eq!(receipt.karma_change, 7);
    assert_eq!(get_user(&db, user.id).await.karma_points, 7);
}

#[actix_rt::test]
async fn test_unauthenticated_award_persists_nothing() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let user = create_test_user(&db, "user", Role::User, 0).await.unwrap();

    let result = award_karma(&db, &KarmaEvents::disabled(), None, question_approval(user.id)).await;

    assert!(matches!(result, Err(KarmaError::NotAuthenticated)));
    assert_eq!(result.unwrap_err().to_string(), "User not authenticated");
    assert_eq!(get_user(&db, user.id).await.karma_points, 0);
    assert!(ledger_for(&db, user.id).await.is_empty());
}

#[actix_rt::test]
async fn test_missing_beneficiary() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let actor = create_test_user(&db, "actor", Role::User, 0).await.unwrap();

    let result = award_karma(&db, &KarmaEvents::disabled(), Some(actor.id), question_approval(9999)).await;

    assert!(matches!(result, Err(KarmaError::UserNotFound)));
    assert_eq!(result.unwrap_err().to_string(), "Target user not found");
}

#[actix_rt::test]
async fn test_karma_never_goes_negative() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 0).await.unwrap();
    let voter = create_test_user(&db, "voter", Role::User, 0).await.unwrap();

    let result = award_karma(
        &db,
        &KarmaEvents::disabled(),
        Some(voter.id),
        vote(author.id, KarmaAction::PostVote, VoteType::Down),
    )
    .await;

    assert!(matches!(result, Err(KarmaError::InsufficientKarma)));
    assert_eq!(
        result.unwrap_err().to_string(),
        "Insufficient karma for operation"
    );
    assert_eq!(get_user(&db, author.id).await.karma_points, 0);
    assert!(ledger_for(&db, author.id).await.is_empty());

    // Dropping exactly to zero is allowed.
    let mut award = vote(author.id, KarmaAction::PostVote, VoteType::Up);
    award.karma_change = 3;
    award_karma(&db, &KarmaEvents::disabled(), Some(voter.id), award)
        .await
        .unwrap();
    let mut award = vote(author.id, KarmaAction::PostVoteRemoval, VoteType::Up);
    award.karma_change = -3;
    let receipt = award_karma(&db, &KarmaEvents::disabled(), Some(voter.id), award)
        .await
        .unwrap();
    assert_eq!(receipt.new_karma, 0);
}

#[actix_rt::test]
async fn test_failed_ledger_write_rolls_back_points() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let user = create_test_user(&db, "user", Role::User, 10).await.unwrap();

    // Make the ledger insert fail after the points update has run.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE karma_logs".to_owned(),
    ))
    .await
    .unwrap();

    let result = award_karma(
        &db,
        &KarmaEvents::disabled(),
        Some(user.id),
        question_approval(user.id),
    )
    .await;

    assert!(matches!(result, Err(KarmaError::Database(_))));
    assert_eq!(result.unwrap_err().to_string(), "Failed to award karma");
    assert_eq!(get_user(&db, user.id).await.karma_points, 10);
}

#[actix_rt::test]
async fn test_upvote_then_removal_nets_zero() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 4).await.unwrap();
    let voter = create_test_user(&db, "voter", Role::User, 0).await.unwrap();
    let events = KarmaEvents::disabled();

    award_karma(&db, &events, Some(voter.id), vote(author.id, KarmaAction::PostVote, VoteType::Up))
        .await
        .unwrap();
    award_karma(
        &db,
        &events,
        Some(voter.id),
        vote(author.id, KarmaAction::PostVoteRemoval, VoteType::Up),
    )
    .await
    .unwrap();

    assert_eq!(get_user(&db, author.id).await.karma_points, 4);
    let changes: Vec<i32> = ledger_for(&db, author.id)
        .await
        .iter()
        .map(|e| e.karma_change)
        .collect();
    assert_eq!(changes, vec![1, -1]);
}

#[actix_rt::test]
async fn test_calculator_is_deterministic() {
    let metadata = KarmaMetadata::PostApproval {
        post_type: Some(PostType::SystemDesign),
        post_title: None,
        is_approver: false,
    };
    let first = calculate_karma(KarmaAction::PostApproval, &metadata);
    for _ in 0..10 {
        assert_eq!(calculate_karma(KarmaAction::PostApproval, &metadata), first);
    }
    assert_eq!(first, 20);
}

#[actix_rt::test]
async fn test_history_is_newest_first() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 0).await.unwrap();
    let voter = create_test_user(&db, "voter", Role::User, 0).await.unwrap();
    let events = KarmaEvents::disabled();

    award_karma(&db, &events, Some(voter.id), question_approval(author.id))
        .await
        .unwrap();
    award_karma(&db, &events, Some(voter.id), vote(author.id, KarmaAction::PostVote, VoteType::Up))
        .await
        .unwrap();
    award_karma(&db, &events, Some(voter.id), vote(author.id, KarmaAction::CommentVote, VoteType::Up))
        .await
        .unwrap();

    let history = list_karma_history(&db, author.id, 2, 0).await.unwrap();
    assert_eq!(history.total, 3);
    assert_eq!(history.entries.len(), 2);
    assert_eq!(history.entries[0].action, KarmaAction::CommentVote);
    assert_eq!(history.entries[1].action, KarmaAction::PostVote);
    assert_eq!(history.entries[0].from_user_name.as_deref(), Some("voter"));
    assert!(matches!(
        history.entries[0].metadata,
        Some(KarmaMetadata::Vote { vote_type: VoteType::Up, .. })
    ));

    let rest = list_karma_history(&db, author.id, 2, 2).await.unwrap();
    assert_eq!(rest.entries.len(), 1);
    assert_eq!(rest.entries[0].action, KarmaAction::PostApproval);
    assert_eq!(rest.entries[0].karma_change, 5);
}

#[actix_rt::test]
async fn test_awards_reach_the_dispatcher() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let author = create_test_user(&db, "author", Role::User, 0).await.unwrap();
    let editor = create_test_user(&db, "editor", Role::Editor, 100).await.unwrap();
    let (events, receiver) = KarmaEvents::channel();

    award_karma(&db, &events, Some(editor.id), question_approval(author.id))
        .await
        .unwrap();
    // Zero-point entries are recorded but not announced.
    let mut nothing = question_approval(author.id);
    nothing.action = KarmaAction::PostVote;
    let receipt = award_karma(&db, &events, Some(editor.id), nothing)
        .await
        .unwrap();
    assert_eq!(receipt.karma_change, 0);
    // Self-awards are not announced either.
    award_karma(&db, &events, Some(author.id), vote(author.id, KarmaAction::PostVote, VoteType::Up))
        .await
        .unwrap();

    drop(events);
    run_dispatcher(db.clone(), receiver).await;

    let notifications = get_user_notifications(&db, author.id, 10).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].type_, "content_approved");
    assert_eq!(notifications[0].source_user_id, Some(editor.id));
    assert!(notifications[0].message.contains("+5 karma"));
    assert_eq!(count_unread_notifications(&db, author.id).await.unwrap(), 1);
}
