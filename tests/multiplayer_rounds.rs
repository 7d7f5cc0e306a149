use std::time::Duration;

use quiz_arena_back::{
    dao::{models::GameMode, session_store::SessionStore},
    dto::events::Ranking,
    error::{Rejection, ServiceError},
    services::{answer_service, room_events, session_service},
    state::game::RoundPhase,
};
use tokio::time::sleep;

mod common;

use common::{CORRECT, Harness, WRONG, find, names, player, settle};

async fn phase(h: &Harness, id: &str) -> RoundPhase {
    let session = h
        .store
        .get_session(id.to_owned())
        .await
        .unwrap()
        .expect("session exists");
    RoundPhase::of(&session)
}

#[tokio::test(start_paused = true)]
async fn scrum_round_closes_on_the_first_correct_answer() {
    let h = Harness::new(3).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(2), &[])
        .await;
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();

    let mut alice_rx = h.listen(&id, &alice.id);
    let mut bob_rx = h.listen(&id, &bob.id);
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();

    let events = bob_rx.drain();
    assert_eq!(names(&events), ["gameStarted", "newQuestion"]);
    let question = find(&events, "newQuestion").unwrap();
    assert_eq!(question.data["question_index"], 1);
    assert_eq!(question.data["time_limit"], 30);
    alice_rx.drain();

    sleep(Duration::from_secs(3)).await;
    let receipt = answer_service::submit_answer(&h.state, &id, Some(&alice), 1, CORRECT)
        .await
        .unwrap();
    assert!(receipt.is_correct);
    assert!(receipt.resolved);
    assert!(h.state.scheduler().pending(&id).is_none());

    // The reveal goes out right away, long before the 30s timeout.
    let alice_events = alice_rx.drain();
    assert_eq!(names(&alice_events), ["isCorrectAnswer", "answerResult"]);
    assert_eq!(alice_events[0].data["is_correct"], true);
    let bob_events = bob_rx.drain();
    assert_eq!(bob_events[0].data["is_correct"], false);
    assert_eq!(bob_events[1].data["correct_option_index"], CORRECT);
    assert_eq!(bob_events[1].data["question_index"], 1);

    let late = answer_service::submit_answer(&h.state, &id, Some(&bob), 1, WRONG)
        .await
        .unwrap_err();
    assert!(matches!(
        late,
        ServiceError::Rejected(Rejection::InvalidQuestionIndex)
    ));
    assert_eq!(phase(&h, &id).await, RoundPhase::Revealing { resolved_index: 0 });

    sleep(h.reveal_window() + Duration::from_millis(10)).await;
    settle().await;
    let events = bob_rx.drain();
    assert_eq!(names(&events), ["newQuestion"]);
    assert_eq!(events[0].data["question_index"], 2);
    assert_eq!(h.state.scheduler().pending(&id).unwrap().question_index, 1);

    let alice_next = alice_rx.drain();
    assert_eq!(alice_next[0].data["correct_answers_nb"], 1);
    assert_eq!(events[0].data["correct_answers_nb"], 0);
}

#[tokio::test(start_paused = true)]
async fn scrum_round_closes_once_everyone_answered_wrong() {
    let h = Harness::new(2).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(2), &[])
        .await;
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();

    let first = answer_service::submit_answer(&h.state, &id, Some(&alice), 1, WRONG)
        .await
        .unwrap();
    assert!(!first.resolved);

    let again = answer_service::submit_answer(&h.state, &id, Some(&alice), 1, CORRECT)
        .await
        .unwrap_err();
    assert!(matches!(
        again,
        ServiceError::Rejected(Rejection::AlreadyAnswered)
    ));

    let second = answer_service::submit_answer(&h.state, &id, Some(&bob), 1, WRONG)
        .await
        .unwrap();
    assert!(second.resolved);
}

#[tokio::test(start_paused = true)]
async fn team_round_runs_its_full_duration() {
    let h = Harness::new(2).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("easy"), None, &["Red", "Blue"])
        .await;
    session_service::join_session(&h.state, Some(&alice), &id, Some("Red"))
        .await
        .unwrap();
    session_service::join_session(&h.state, Some(&bob), &id, Some("Blue"))
        .await
        .unwrap();

    let mut alice_rx = h.listen(&id, &alice.id);
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();
    alice_rx.drain();

    sleep(Duration::from_secs(2)).await;
    let receipt = answer_service::submit_answer(&h.state, &id, Some(&alice), 1, CORRECT)
        .await
        .unwrap();
    assert!(receipt.is_correct);
    assert!(!receipt.resolved);

    sleep(Duration::from_secs(27)).await;
    assert!(matches!(
        phase(&h, &id).await,
        RoundPhase::Open { index: 0, .. }
    ));
    assert!(alice_rx.drain().is_empty());

    sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(phase(&h, &id).await, RoundPhase::Revealing { resolved_index: 0 });
    let events = alice_rx.drain();
    assert_eq!(names(&events), ["isCorrectAnswer", "answerResult"]);
    assert_eq!(events[0].data["is_correct"], true);

    let ranking = session_service::session_ranking(&h.state, Some(&bob), &id)
        .await
        .unwrap();
    let Ranking::Teams(teams) = ranking else {
        panic!("team sessions rank teams");
    };
    let order: Vec<&str> = teams.keys().map(String::as_str).collect();
    assert_eq!(order, ["Red", "Blue"]);
    assert_eq!(teams["Red"].total_score, 1);
    assert_eq!(teams["Blue"].total_score, 0);
    assert_eq!(teams["Blue"].average_score, 0.0);
}

#[tokio::test]
async fn scrum_start_waits_for_the_quota() {
    let h = Harness::new(2).await;
    let alice = player("alice");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(3), &[])
        .await;
    session_service::join_session(&h.state, Some(&player("bob")), &id, None)
        .await
        .unwrap();

    let refused = session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap_err();
    assert!(refused.client_message().contains("2/3"));

    session_service::join_session(&h.state, Some(&player("carol")), &id, None)
        .await
        .unwrap();
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();

    let full = session_service::join_session(&h.state, Some(&player("dave")), &id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        full,
        ServiceError::Rejected(Rejection::AlreadyStarted)
    ));
}

#[tokio::test]
async fn only_the_creator_starts() {
    let h = Harness::new(1).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(2), &[])
        .await;
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();

    let err = session_service::start_session(&h.state, Some(&bob), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Rejected(Rejection::NotOwner)));
}

#[tokio::test]
async fn joining_twice_leaves_the_roster_untouched() {
    let h = Harness::new(1).await;
    let alice = player("alice");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("medium"), None, &["Red", "Blue"])
        .await;
    session_service::join_session(&h.state, Some(&alice), &id, Some("Red"))
        .await
        .unwrap();

    let err = session_service::join_session(&h.state, Some(&alice), &id, Some("Blue"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Rejected(Rejection::AlreadyJoined)));
    assert_eq!(err.client_message(), "You have already joined this game.");

    let summary = session_service::session_summary(&h.state, &id).await.unwrap();
    let red = summary.teams.iter().find(|team| team.name == "Red").unwrap();
    let blue = summary.teams.iter().find(|team| team.name == "Blue").unwrap();
    assert_eq!(red.members.len(), 1);
    assert!(blue.members.is_empty());
}

#[tokio::test]
async fn team_join_needs_a_known_team() {
    let h = Harness::new(1).await;
    let alice = player("alice");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("hard"), None, &["Red", "Blue"])
        .await;

    let missing = session_service::join_session(&h.state, Some(&alice), &id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        ServiceError::Rejected(Rejection::TeamNameRequired)
    ));
    let unknown = session_service::join_session(&h.state, Some(&alice), &id, Some("Green"))
        .await
        .unwrap_err();
    assert!(matches!(
        unknown,
        ServiceError::Rejected(Rejection::UnknownTeam)
    ));
}

#[tokio::test]
async fn switching_and_leaving_broadcast_the_roster() {
    let h = Harness::new(1).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Team, Some("easy"), None, &["Red", "Blue"])
        .await;
    session_service::join_session(&h.state, Some(&alice), &id, Some("Red"))
        .await
        .unwrap();
    session_service::join_session(&h.state, Some(&bob), &id, Some("Red"))
        .await
        .unwrap();
    let mut alice_rx = h.listen(&id, &alice.id);

    let receipt = session_service::switch_team(&h.state, Some(&bob), &id, "Blue")
        .await
        .unwrap();
    assert_eq!(receipt.team_name, "Blue");
    session_service::leave_session(&h.state, Some(&bob), &id)
        .await
        .unwrap();

    let events = alice_rx.drain();
    assert_eq!(names(&events), ["teamSwitch", "playerLeft"]);
    assert_eq!(events[0].data["player"]["player_id"], "bob");

    let again = session_service::leave_session(&h.state, Some(&bob), &id)
        .await
        .unwrap_err();
    assert!(matches!(again, ServiceError::Rejected(Rejection::NotMember)));
}

#[tokio::test]
async fn scrum_rejoin_reuses_the_empty_singleton_team() {
    let h = Harness::new(1).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(3), &[])
        .await;
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();
    session_service::leave_session(&h.state, Some(&bob), &id)
        .await
        .unwrap();
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();

    let teams = h.store.list_teams(id.clone()).await.unwrap();
    assert_eq!(teams.len(), 2);
    assert!(teams.iter().any(|team| team.has_member(&bob.id)));
}

#[tokio::test(start_paused = true)]
async fn resync_replays_the_current_phase() {
    let h = Harness::new(2).await;
    let alice = player("alice");
    let bob = player("bob");
    let id = h
        .create(Some(&alice), GameMode::Scrum, None, Some(2), &[])
        .await;
    session_service::join_session(&h.state, Some(&bob), &id, None)
        .await
        .unwrap();

    let lobby = room_events::current_view(&h.state, &id, Some(&bob)).await.unwrap();
    assert_eq!(lobby.phase(), "lobby");

    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();
    let open = room_events::current_view(&h.state, &id, Some(&bob)).await.unwrap();
    assert_eq!(open.phase(), "question");
    assert_eq!(names(&open.into_events()), ["newQuestion"]);

    answer_service::submit_answer(&h.state, &id, Some(&bob), 1, CORRECT)
        .await
        .unwrap();
    let reveal = room_events::current_view(&h.state, &id, Some(&bob)).await.unwrap();
    let events = reveal.into_events();
    assert_eq!(names(&events), ["isCorrectAnswer", "answerResult"]);
    assert_eq!(events[0].data["is_correct"], true);
    assert_eq!(events[1].data["time_remaining"], 5_000);

    let outsider = room_events::current_view(&h.state, &id, Some(&player("eve")))
        .await
        .unwrap_err();
    assert!(matches!(
        outsider,
        ServiceError::Rejected(Rejection::NotMember)
    ));
}

#[tokio::test(start_paused = true)]
async fn late_answer_is_rejected_when_the_timer_is_gone() {
    let h = Harness::new(2).await;
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
    session_service::start_session(&h.state, Some(&alice), &id)
        .await
        .unwrap();

    sleep(Duration::from_secs(4)).await;
    assert!(
        answer_service::submit_answer(&h.state, &id, Some(&bob), 1, WRONG)
            .await
            .is_ok()
    );

    // A lost timer leaves the round open; the deadline still holds.
    h.state.scheduler().cancel(&id);
    sleep(Duration::from_secs(60)).await;
    let err = answer_service::submit_answer(&h.state, &id, Some(&alice), 1, CORRECT)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(Rejection::TimeoutExceeded)
    ));
    assert!(matches!(
        phase(&h, &id).await,
        RoundPhase::Open { index: 0, .. }
    ));
}
