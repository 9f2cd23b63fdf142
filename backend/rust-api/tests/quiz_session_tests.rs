use cybershield_api::{
    config::QuizTiming,
    models::{
        history::Verdict,
        session::{SessionPhase, SessionSnapshot},
        Difficulty, QuizMode,
    },
};
use std::sync::atomic::Ordering;
use std::time::Duration;

mod common;

fn opponents(snapshot: &SessionSnapshot) -> Vec<(String, u32, u64)> {
    let mut rows: Vec<_> = snapshot
        .standings
        .iter()
        .filter(|s| !s.is_me)
        .map(|s| (s.name.clone(), s.score, s.total_time_ms))
        .collect();
    rows.sort();
    rows
}

fn quick_reveal() -> QuizTiming {
    QuizTiming {
        answer_reveal_ms: 10,
        timeout_reveal_ms: 10,
        ..QuizTiming::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_solo_correct_answer_with_twenty_seconds_left_scores_1333() {
    let test = common::create_controller(common::ScriptedGenerator::new(1), QuizTiming::default());
    let session = test.controller.start_solo(5, Difficulty::Medium).unwrap();

    let snapshot = session
        .wait_for(|s| s.turn.as_ref().is_some_and(|t| t.time_remaining == 20))
        .await
        .unwrap();
    assert_eq!(snapshot.turn.as_ref().unwrap().time_limit, 30);

    let receipt = session.answer(1).await.unwrap();
    assert!(receipt.correct);
    assert_eq!(receipt.points, 1333);
    assert_eq!(receipt.total_score, 1333);

    let results = session
        .wait_for(|s| s.phase == SessionPhase::Results)
        .await
        .unwrap();
    assert_eq!(results.score, 1333);
    assert_eq!(results.correct_answers, 1);
    assert_eq!(results.verdict, Some(Verdict::Excellent));
    assert_eq!(
        results.verdict_message.as_deref(),
        Some(Verdict::Excellent.message())
    );

    let history = test.history.read_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, 1333);
    assert_eq!(history[0].total, 1);
    assert_eq!(history[0].correct, 1);
    assert_eq!(history[0].mode, QuizMode::Solo);
    assert_eq!(history[0].difficulty, Some(Difficulty::Medium));
}

#[tokio::test(start_paused = true)]
async fn test_solo_timeout_scores_zero_and_still_finishes() {
    let test = common::create_controller(common::ScriptedGenerator::new(1), QuizTiming::default());
    let session = test.controller.start_solo(5, Difficulty::Medium).unwrap();

    let expired = session
        .wait_for(|s| s.turn.as_ref().is_some_and(|t| t.answered))
        .await
        .unwrap();
    let turn = expired.turn.unwrap();
    assert_eq!(turn.time_remaining, 0);
    let reveal = turn.reveal.unwrap();
    assert_eq!(reveal.chosen_option, None);
    assert_eq!(reveal.correct_option, 1);
    assert!(expired.standings[0].answered_this_turn);

    let results = session
        .wait_for(|s| s.phase == SessionPhase::Results)
        .await
        .unwrap();
    assert_eq!(results.score, 0);
    assert_eq!(results.correct_answers, 0);
    assert_eq!(results.verdict, Some(Verdict::Alert));

    let history = test.history.read_history().await.unwrap();
    assert_eq!(history[0].score, 0);
    assert_eq!(history[0].total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_answer_after_timeout_is_rejected() {
    let test = common::create_controller(common::ScriptedGenerator::new(2), QuizTiming::default());
    let session = test.controller.start_solo(5, Difficulty::Hard).unwrap();

    session
        .wait_for(|s| s.turn.as_ref().is_some_and(|t| t.answered))
        .await
        .unwrap();

    assert!(session.answer(1).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_opponent_timers_do_not_outlive_their_turn() {
    let test = common::create_controller(common::ScriptedGenerator::new(2), quick_reveal());
    let room = test.controller.create_room(5, Difficulty::Medium).unwrap();
    room.start().await.unwrap();

    room.wait_for(|s| s.phase == SessionPhase::Playing)
        .await
        .unwrap();
    room.answer(1).await.unwrap();

    // Next turn starts with a clean answered set and no opponent points
    let second = room
        .wait_for(|s| s.turn.as_ref().is_some_and(|t| t.index == 1))
        .await
        .unwrap();
    for standing in second.standings.iter().filter(|s| !s.is_me) {
        assert!(!standing.answered_this_turn);
        assert_eq!(standing.score, 0);
        assert_eq!(standing.last_gain, None);
    }
    let human = second.standings.iter().find(|s| s.is_me).unwrap();
    assert!(!human.answered_this_turn);
    assert_eq!(human.last_gain, None);

    room.answer(1).await.unwrap();
    let results = room
        .wait_for(|s| s.phase == SessionPhase::Results)
        .await
        .unwrap();

    // Turn-one and turn-two opponent timers would all have fired by now
    tokio::time::sleep(Duration::from_secs(60)).await;

    let after = room.snapshot();
    assert_eq!(opponents(&after), opponents(&results));
    for (_, score, time) in opponents(&after) {
        assert_eq!(score, 0);
        assert_eq!(time, 0);
    }
    assert_eq!(after.score, results.score);
}

#[tokio::test(start_paused = true)]
async fn test_single_turn_room_has_no_phantom_points_after_results() {
    let test = common::create_controller(common::ScriptedGenerator::new(1), QuizTiming::default());
    let room = test.controller.create_room(5, Difficulty::Hard).unwrap();
    room.start().await.unwrap();
    room.wait_for(|s| s.phase == SessionPhase::Playing)
        .await
        .unwrap();

    room.answer(1).await.unwrap();
    let results = room
        .wait_for(|s| s.phase == SessionPhase::Results)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    let after = room.snapshot();

    assert_eq!(after.standings.len(), 4);
    assert_eq!(opponents(&after), opponents(&results));
    for (_, score, _) in opponents(&after) {
        assert!(score == 0 || (1000..1500).contains(&score));
    }
}

#[tokio::test(start_paused = true)]
async fn test_multiplayer_session_runs_to_results() {
    let test = common::create_controller(common::ScriptedGenerator::new(5), QuizTiming::default());
    let room = test.controller.create_room(5, Difficulty::Easy).unwrap();
    room.start().await.unwrap();

    let mut answered_turns = 0;
    loop {
        let snapshot = room
            .wait_for(|s| {
                s.phase == SessionPhase::Results
                    || s.turn.as_ref().is_some_and(|t| !t.answered && t.index == answered_turns)
            })
            .await
            .unwrap();
        if snapshot.phase == SessionPhase::Results {
            break;
        }
        room.answer(answered_turns % 4).await.unwrap();
        answered_turns += 1;
    }
    assert_eq!(answered_turns, 5);

    let results = room.snapshot();
    assert_eq!(results.standings.len(), 4);
    let ranks: Vec<usize> = results.standings.iter().map(|s| s.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    for pair in results.standings.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Answers 0,1,2,3,0 against correct index 1: exactly one hit
    assert_eq!(results.correct_answers, 1);

    let history = test.history.read_history().await.unwrap();
    assert_eq!(history[0].mode, QuizMode::Multi);
    assert_eq!(history[0].score, results.score);

    let outcome = room.exit().await.unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.result.score, results.score);
    assert_eq!(test.exits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exit_mid_quiz_does_not_persist() {
    let test = common::create_controller(common::ScriptedGenerator::new(3), QuizTiming::default());
    let session = test.controller.start_solo(10, Difficulty::Medium).unwrap();
    session
        .wait_for(|s| s.phase == SessionPhase::Playing)
        .await
        .unwrap();
    session.answer(1).await.unwrap();

    let outcome = session.exit().await.unwrap();

    assert!(!outcome.completed);
    assert!(outcome.result.score > 1000);
    assert_eq!(test.exits.load(Ordering::SeqCst), 1);
    assert!(test.history.read_history().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(session.snapshot().phase, SessionPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_guest_session_auto_starts_after_lobby_delay() {
    let generator = common::ScriptedGenerator::new(2);
    let test = common::create_controller(generator.clone(), QuizTiming::default());
    let guest = test.controller.join_room("x9y8z7").unwrap();

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let lobby = guest.snapshot();
    assert_eq!(lobby.phase, SessionPhase::Idle);
    assert_eq!(lobby.standings.len(), 5);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    let playing = guest
        .wait_for(|s| s.phase == SessionPhase::Playing)
        .await
        .unwrap();
    assert_eq!(playing.room_code.as_deref(), Some("X9Y8Z7"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}
