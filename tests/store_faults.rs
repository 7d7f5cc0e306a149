use std::time::Duration;

use quiz_arena_back::{
    dao::{models::GameMode, session_store::SessionStore},
    error::{Rejection, ServiceError},
    services::session_service,
    state::game::RoundPhase,
};
use tokio::time::sleep;

mod common;

use common::{Harness, find, names, player, settle};

async fn phase(h: &Harness, id: &str) -> RoundPhase {
    let session = h.store.get_session(id.to_owned()).await.unwrap().unwrap();
    RoundPhase::of(&session)
}

async fn team_names(h: &Harness, id: &str, player_id: &str) -> Vec<String> {
    h.store
        .list_teams(id.to_owned())
        .await
        .unwrap()
        .into_iter()
        .filter(|team| team.has_member(player_id))
        .map(|team| team.name)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn failed_reveal_push_still_moves_to_the_next_question() {
    let (h, flaky) = Harness::flaky(2).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("hard"), None, &["Red", "Blue"])
        .await;
    session_service::join_session(&h.state, Some(&alice), &id, Some("Red"))
        .await
        .unwrap();
    session_service::join_session(&h.state, Some(&bob), &id, Some("Blue"))
        .await
        .unwrap();
    let mut rx = h.listen(&id, &alice.id);
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();
    assert_eq!(names(&rx.drain()), ["gameStarted", "newQuestion"]);

    // The reveal reads the answers once; that read fails.
    flaky.fail_answer_lists(1);
    sleep(Duration::from_secs(5) + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(phase(&h, &id).await, RoundPhase::Revealing { resolved_index: 0 });
    assert!(rx.drain().is_empty());

    sleep(h.reveal_window() + Duration::from_millis(10)).await;
    settle().await;
    assert!(matches!(
        phase(&h, &id).await,
        RoundPhase::Open { index: 1, .. }
    ));
    let events = rx.drain();
    let question = find(&events, "newQuestion").expect("question 2 dispatched");
    assert_eq!(question.data["question_index"], 2);
    assert_eq!(h.state.scheduler().pending(&id).unwrap().question_index, 1);
}

#[tokio::test]
async fn concurrent_scrum_join_cannot_overflow_the_quota() {
    let (h, flaky) = Harness::flaky(1).await;
    let alice = player("alice");
    let bob = player("bob");
    let carol = player("carol");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(2), &[])
        .await;

    // Carol lands after Bob read the roster but before his membership is written.
    flaky.interleave_join(&id, carol.as_member());
    let err = session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Rejected(Rejection::SessionFull)));

    assert_eq!(h.store.count_participants(id.clone()).await.unwrap(), 2);
    assert!(team_names(&h, &id, &bob.id).await.is_empty());
    assert_eq!(team_names(&h, &id, &carol.id).await, ["carol-name"]);
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_team_switch_keeps_the_original_team() {
    let (h, flaky) = Harness::flaky(1).await;
    let alice = player("alice");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("easy"), None, &["Red", "Blue"])
        .await;
    session_service::join_session(&h.state, Some(&alice), &id, Some("Red"))
        .await
        .unwrap();

    flaky.fail_member_adds(1);
    let err = session_service::switch_team(&h.state, Some(&alice), &id, "Blue")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert_eq!(team_names(&h, &id, &alice.id).await, ["Red"]);
}
