use std::sync::Arc;
use std::time::Duration;

use api::InMemoryApi;
use lesson_core::UiMode;
use lesson_core::model::{Lesson, LessonId, Problem, ProblemId, ValidationResult};
use lesson_core::time::fixed_clock;
use services::{AppServices, MemoryUsernameStore, SessionSettings};
use tokio::time::sleep;

fn catalog(first_lesson_problems: u64) -> InMemoryApi {
    let api = InMemoryApi::new();
    let first = LessonId::new(1);
    api.add_lesson(
        Lesson::new(first, "Basics", "Start here"),
        (1..=first_lesson_problems)
            .map(|n| Problem::new(ProblemId::new(n), first, format!("q{n}"), format!("a{n}")))
            .collect(),
    );
    let second = LessonId::new(2);
    api.add_lesson(
        Lesson::new(second, "Next steps", "More"),
        vec![Problem::new(ProblemId::new(100), second, "q100", "a100")],
    );
    api
}

async fn practicing(api: &InMemoryApi) -> AppServices {
    let services = AppServices::new(
        Arc::new(api.clone()),
        Arc::new(MemoryUsernameStore::default()),
        SessionSettings::default(),
        fixed_clock(),
    );
    services.login().login_with_username("ada").await.unwrap();
    services.start_practice(LessonId::new(1)).await.unwrap();
    services
}

#[tokio::test(start_paused = true)]
async fn next_problem_wraps_after_a_full_cycle() {
    for count in 1..=4 {
        let api = catalog(count);
        let services = practicing(&api).await;
        let practice = services.practice();
        for _ in 0..count {
            practice.next_problem();
        }
        assert_eq!(practice.snapshot().index, 0, "lesson with {count} problems");
    }
}

#[tokio::test(start_paused = true)]
async fn correct_answer_auto_advances_after_delay() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    let feedback = practice.submit_answer(" a1 ").await.unwrap();
    assert!(feedback.ok());
    assert_eq!(practice.snapshot().streak, 1);
    assert!(practice.snapshot().loading_next);

    sleep(Duration::from_millis(1499)).await;
    assert_eq!(practice.snapshot().index, 0);

    sleep(Duration::from_millis(2)).await;
    let snapshot = practice.snapshot();
    assert_eq!(snapshot.problem.map(|p| p.id), Some(ProblemId::new(2)));
    assert!(snapshot.answer.is_empty());
    assert!(snapshot.feedback.is_none());
    assert!(!snapshot.loading_next);
}

#[tokio::test(start_paused = true)]
async fn manual_next_voids_pending_auto_advance() {
    let api = catalog(3);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.submit_answer("a1").await.unwrap();
    sleep(Duration::from_millis(100)).await;
    practice.next_problem();
    assert_eq!(practice.snapshot().index, 1);
    assert!(!practice.snapshot().advance_pending);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(practice.snapshot().index, 1);
}

#[tokio::test(start_paused = true)]
async fn streak_counts_each_correct_answer_once() {
    let api = catalog(5);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.submit_answer("a1").await.unwrap();
    assert_eq!(practice.snapshot().streak, 1);
    sleep(Duration::from_millis(1501)).await;

    practice.submit_answer("a2").await.unwrap();
    assert_eq!(practice.snapshot().streak, 2);

    practice.next_problem();
    let feedback = practice.submit_answer("nope").await.unwrap();
    assert!(!feedback.ok());
    assert_eq!(practice.snapshot().streak, 0);
}

#[tokio::test(start_paused = true)]
async fn third_correct_answer_proposes_unlock_once_and_stops_advancing() {
    let api = catalog(3);
    let services = practicing(&api).await;
    let practice = services.practice();
    let shell = services.shell();

    for n in 1..=2 {
        practice.submit_answer(&format!("a{n}")).await.unwrap();
        practice.next_problem();
    }
    practice.submit_answer("a3").await.unwrap();
    let snapshot = practice.snapshot();
    assert_eq!(snapshot.streak, 3);
    assert!(snapshot.unlock_proposed);
    assert!(!snapshot.advance_pending);

    let mut changes = shell.subscribe();
    practice.submit_answer("a3").await.unwrap();
    assert!(!changes.has_changed().unwrap());
    assert!(!practice.snapshot().advance_pending);

    sleep(Duration::from_millis(5000)).await;
    assert_eq!(practice.snapshot().index, 2);
    assert_eq!(shell.mode(), UiMode::UnlockModal);
}

#[tokio::test(start_paused = true)]
async fn reveal_shows_answer_and_blocks_scoring_until_next() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    assert!(practice.confirm_reveal().is_none());
    assert!(practice.reveal_current());
    assert!(practice.snapshot().reveal_requested);
    let feedback = practice.confirm_reveal().unwrap();
    assert!(feedback.message().starts_with("Answer: a1"));
    assert!(practice.snapshot().is_revealed);

    for _ in 0..2 {
        let gated = practice.submit_answer("a1").await.unwrap();
        assert!(!gated.ok());
        assert!(gated.message().contains("revealed"));
    }
    assert_eq!(api.validate_calls(), 0);
    assert_eq!(practice.snapshot().streak, 0);

    practice.next_problem();
    assert!(practice.submit_answer("a2").await.unwrap().ok());
}

#[tokio::test(start_paused = true)]
async fn confirmed_reveal_advances_after_reveal_delay() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.reveal_current();
    practice.confirm_reveal().unwrap();
    sleep(Duration::from_millis(2999)).await;
    assert_eq!(practice.snapshot().index, 0);
    sleep(Duration::from_millis(2)).await;
    assert_eq!(practice.snapshot().index, 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_reveal_discloses_nothing() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.reveal_current();
    practice.cancel_reveal();
    assert!(practice.confirm_reveal().is_none());
    assert!(!practice.snapshot().is_revealed);
}

#[tokio::test(start_paused = true)]
async fn reveal_is_refused_behind_login() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    services.auth().open_login();
    assert!(!practice.reveal_current());
    assert!(practice.confirm_reveal().is_none());
    assert!(!practice.snapshot().is_revealed);

    // A request made before login opened is dropped on confirm.
    services.auth().close_login();
    assert!(practice.reveal_current());
    services.auth().open_login();
    assert!(practice.confirm_reveal().is_none());
    assert!(!practice.snapshot().is_revealed);
    assert!(!practice.snapshot().advance_pending);
}

#[tokio::test(start_paused = true)]
async fn revealed_problem_cannot_be_revealed_again() {
    let api = catalog(3);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.reveal_current();
    practice.confirm_reveal().unwrap();
    practice.clear_advance_timer();

    assert!(!practice.reveal_current());
    assert!(practice.confirm_reveal().is_none());
    assert!(!practice.snapshot().advance_pending);
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(practice.snapshot().index, 0);
}

#[tokio::test(start_paused = true)]
async fn empty_input_never_reaches_the_judge() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    let feedback = practice.submit_answer("   ").await.unwrap();
    assert_eq!(feedback.message(), "Type your answer first");
    assert_eq!(api.validate_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn judge_ok_with_literal_mismatch_is_wrong_format() {
    let api = catalog(2);
    api.set_validation_override(Some(ValidationResult::passed(None)));
    let services = practicing(&api).await;
    let practice = services.practice();

    let feedback = practice.submit_answer("(a1)").await.unwrap();
    assert_eq!(feedback.message(), "Incorrect format.");
    assert_eq!(practice.snapshot().streak, 0);
    assert!(!practice.snapshot().advance_pending);
}

#[tokio::test(start_paused = true)]
async fn validator_error_is_shown_without_advancing() {
    let api = catalog(2);
    api.fail_validation(Some("judge offline".into()));
    let services = practicing(&api).await;
    let practice = services.practice();

    let feedback = practice.submit_answer("a1").await.unwrap();
    assert_eq!(feedback.message(), "Validation failed: judge offline");
    assert!(!practice.snapshot().advance_pending);
    sleep(Duration::from_millis(10)).await;
    assert!(api.attempts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn attempts_are_recorded_in_the_background() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.submit_answer("a1").await.unwrap();
    sleep(Duration::from_millis(1)).await;
    let attempts = api.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].username, "ada");
    assert!(attempts[0].is_correct);
}

#[tokio::test(start_paused = true)]
async fn recording_failure_keeps_the_verdict() {
    let api = catalog(2);
    api.fail_recording(true);
    let services = practicing(&api).await;
    let practice = services.practice();

    let feedback = practice.submit_answer("a1").await.unwrap();
    sleep(Duration::from_millis(1)).await;
    assert!(feedback.ok());
    assert_eq!(practice.snapshot().feedback, Some(feedback));
    assert_eq!(practice.snapshot().streak, 1);
}

#[tokio::test(start_paused = true)]
async fn login_overlay_swallows_submissions_and_auto_advance() {
    let api = catalog(2);
    let services = practicing(&api).await;
    let practice = services.practice();

    practice.submit_answer("a1").await.unwrap();
    services.auth().open_login();
    sleep(Duration::from_millis(1501)).await;
    assert_eq!(practice.snapshot().index, 0);

    assert!(practice.submit_answer("a1").await.is_none());
    assert_eq!(api.validate_calls(), 1);
}

async fn reach_unlock(services: &AppServices) {
    let practice = services.practice();
    for n in 1..=3 {
        practice.submit_answer(&format!("a{n}")).await.unwrap();
        if n < 3 {
            practice.next_problem();
        }
    }
    assert!(practice.snapshot().unlock_proposed);
}

#[tokio::test(start_paused = true)]
async fn confirming_unlock_moves_to_the_next_lesson() {
    let api = catalog(3);
    let services = practicing(&api).await;
    reach_unlock(&services).await;

    let practice = services.practice();
    let feedback = practice.confirm_lesson_advance().await.unwrap();
    assert_eq!(feedback.message(), "Next lesson unlocked!");

    let snapshot = practice.snapshot();
    assert_eq!(snapshot.lesson_id, Some(LessonId::new(2)));
    assert_eq!(snapshot.streak, 0);
    assert!(!snapshot.unlock_proposed);
    assert_eq!(services.shell().mode(), UiMode::Practice);
    assert_eq!(
        services.lessons().current_lesson().map(|l| l.id),
        Some(LessonId::new(2))
    );
    assert!(services.auth().user().unwrap().has_lesson(LessonId::new(2)));
}

#[tokio::test(start_paused = true)]
async fn failed_unlock_keeps_the_proposal() {
    let api = catalog(3);
    api.fail_advance(Some("No next lesson to unlock.".into()));
    let services = practicing(&api).await;
    reach_unlock(&services).await;

    let practice = services.practice();
    let feedback = practice.confirm_lesson_advance().await.unwrap();
    assert!(!feedback.ok());
    assert_eq!(feedback.message(), "No next lesson to unlock.");
    assert!(practice.snapshot().unlock_proposed);
    assert_eq!(practice.snapshot().streak, 3);
}

#[tokio::test(start_paused = true)]
async fn declining_unlock_resets_streak() {
    let api = catalog(3);
    let services = practicing(&api).await;
    reach_unlock(&services).await;

    let practice = services.practice();
    practice.reset_streak_and_dismiss();
    let snapshot = practice.snapshot();
    assert_eq!(snapshot.streak, 0);
    assert!(!snapshot.unlock_proposed);
    assert_eq!(snapshot.lesson_id, Some(LessonId::new(1)));
    assert!(practice.confirm_lesson_advance().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_problem_load_leaves_no_stale_problems() {
    let api = catalog(2);
    let services = practicing(&api).await;
    api.fail_problems_for(LessonId::new(2));

    assert!(services.start_practice(LessonId::new(2)).await.is_err());
    let snapshot = services.practice().snapshot();
    assert_eq!(snapshot.total, 0);
    assert!(snapshot.problem.is_none());
    assert_eq!(snapshot.lesson_id, Some(LessonId::new(2)));
}
