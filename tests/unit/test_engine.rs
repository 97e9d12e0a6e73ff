//! Unit tests for the test-taking engine
//!
//! Tests cover:
//! - Full attempt: answer, navigate, finish, grade
//! - Pass threshold at exactly the pass score
//! - Finished sessions refusing further input
//! - Restart after a finished attempt
//! - Countdown expiry finishing the attempt

use lectern::api::types::{CorrectAnswer, MatchingPair, Question, QuestionType, Test, TextCheckType};
use lectern::engine::{
    spawn_countdown, Answer, SessionState, TestSession, TimerEvent, Verdict,
};
use lectern::errors::EngineError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

fn test(pass_score: u32, minutes: u32) -> Test {
    Test {
        id: "t1".into(),
        course_id: "c1".into(),
        title: "Checkpoint".into(),
        pass_score,
        time_limit: minutes,
        attempts: 2,
        ..Default::default()
    }
}

fn single(id: &str, order: u32) -> Question {
    Question {
        id: id.into(),
        kind: QuestionType::Single,
        text: format!("Question {}", id),
        options: vec!["a".into(), "b".into()],
        correct_answer: CorrectAnswer::One("a".into()),
        points: 1,
        order,
        ..Default::default()
    }
}

fn matching(id: &str, order: u32) -> Question {
    Question {
        id: id.into(),
        kind: QuestionType::Matching,
        text: "Match".into(),
        matching_pairs: vec![
            MatchingPair {
                left: "H2O".into(),
                right: "water".into(),
            },
            MatchingPair {
                left: "NaCl".into(),
                right: "salt".into(),
            },
        ],
        points: 2,
        order,
        ..Default::default()
    }
}

// ============================================================================
// Attempt flow
// ============================================================================

mod flow_tests {
    use super::*;

    #[test]
    fn test_questions_follow_order_field() {
        let session = TestSession::new(test(50, 5), vec![single("b", 2), single("a", 1)]).unwrap();
        assert_eq!(session.current_question().unwrap().id, "a");
        assert_eq!(session.remaining_secs(), 300);
    }

    #[test]
    fn test_half_right_passes_at_fifty() {
        let mut session =
            TestSession::new(test(50, 5), vec![single("q1", 0), single("q2", 1)]).unwrap();
        session.answer("q1", Answer::Choice("a".into())).unwrap();
        session.next().unwrap();
        session.answer("q2", Answer::Choice("b".into())).unwrap();

        let result = session.finish().unwrap();

        assert_eq!(result.score, 50);
        assert!(result.passed);
        assert_eq!(result.correct, 1);
        assert!(!result.timed_out);
        assert_eq!(result.outcomes[1].verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_threshold_seventy_with_two_questions() {
        let questions = vec![single("q1", 0), single("q2", 1)];

        let mut both = TestSession::new(test(70, 5), questions.clone()).unwrap();
        both.answer("q1", Answer::Choice("a".into())).unwrap();
        both.answer("q2", Answer::Choice("a".into())).unwrap();
        let result = both.finish().unwrap();
        assert_eq!((result.score, result.passed), (100, true));

        let mut one = TestSession::new(test(70, 5), questions).unwrap();
        one.answer("q1", Answer::Choice("a".into())).unwrap();
        one.answer("q2", Answer::Choice("b".into())).unwrap();
        let result = one.finish().unwrap();
        assert_eq!((result.score, result.passed), (50, false));
    }

    #[test]
    fn test_navigation_keeps_answers() {
        let mut session =
            TestSession::new(test(80, 5), vec![single("q1", 0), matching("q2", 1)]).unwrap();
        session.jump_to(1).unwrap();
        let mut pairs = BTreeMap::new();
        pairs.insert("H2O".to_string(), "water".to_string());
        pairs.insert("NaCl".to_string(), "salt".to_string());
        session.answer("q2", Answer::Pairs(pairs)).unwrap();
        session.previous().unwrap();
        session.previous().unwrap();
        assert_eq!(session.current_index(), Some(0));

        let result = session.finish().unwrap();

        assert_eq!(result.earned, 2);
        assert_eq!(result.max, 3);
        assert_eq!(result.score, 67);
        assert!(!result.passed);
        assert_eq!(result.outcomes[0].verdict, Verdict::Unanswered);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let mut session = TestSession::new(test(50, 5), vec![single("q1", 0)]).unwrap();
        let err = session
            .answer("q1", Answer::Choices(BTreeSet::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::AnswerKindMismatch { .. }));
        assert!(session.answer("nope", Answer::Choice("a".into())).is_err());
    }

    #[test]
    fn test_manual_text_flagged_for_review() {
        let question = Question {
            id: "essay".into(),
            kind: QuestionType::Text,
            text: "Explain".into(),
            correct_answer: CorrectAnswer::Many(vec!["Fire".into(), "Flame".into()]),
            text_check_type: Some(TextCheckType::Manual),
            points: 1,
            ..Default::default()
        };
        let mut session = TestSession::new(test(100, 5), vec![question]).unwrap();
        session.answer("essay", Answer::Text("  flame ".into())).unwrap();

        let result = session.finish().unwrap();

        assert!(result.passed);
        assert_eq!(result.needs_review, vec!["essay".to_string()]);
    }

    #[test]
    fn test_finished_session_is_frozen() {
        let mut session = TestSession::new(test(50, 5), vec![single("q1", 0)]).unwrap();
        session.finish().unwrap();

        assert!(session.answer("q1", Answer::Choice("a".into())).is_err());
        assert!(session.next().is_err());
        assert!(session.finish().is_err());
        assert!(session.tick().is_err());
        assert!(session.current_question().is_none());
    }

    #[test]
    fn test_restart_resets_attempt() {
        let mut session = TestSession::new(test(50, 1), vec![single("q1", 0)]).unwrap();
        assert_eq!(session.restart().unwrap_err(), EngineError::NotFinished);
        session.answer("q1", Answer::Choice("a".into())).unwrap();
        session.finish().unwrap();

        session.restart().unwrap();

        assert_eq!(session.answered_count(), 0);
        assert_eq!(session.attempts_used(), 2);
        assert_eq!(session.attempts_remaining(), 0);
        assert_eq!(
            session.state(),
            &SessionState::InProgress {
                index: 0,
                remaining_secs: 60
            }
        );
    }

    #[test]
    fn test_empty_test_refused() {
        assert_eq!(
            TestSession::new(test(50, 5), vec![]).unwrap_err(),
            EngineError::Empty
        );
    }
}

// ============================================================================
// Countdown
// ============================================================================

mod timer_tests {
    use super::*;

    #[tokio::test]
    async fn test_expiry_finishes_with_given_answers() {
        let mut session =
            TestSession::new(test(50, 1), vec![single("q1", 0), single("q2", 1)]).unwrap();
        session.answer("q1", Answer::Choice("a".into())).unwrap();
        let shared = Arc::new(Mutex::new(session));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = spawn_countdown(Arc::clone(&shared), Duration::from_millis(1), tx);

        let mut ticks = 0;
        let result = loop {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(TimerEvent::Tick { .. })) => ticks += 1,
                Ok(Some(TimerEvent::Expired(result))) => break result,
                other => panic!("countdown stalled: {:?}", other),
            }
        };

        assert_eq!(ticks, 59);
        assert!(result.timed_out);
        assert_eq!(result.score, 50);
        assert!(shared.lock().await.is_finished());
        handle.join().await;
    }

    #[tokio::test]
    async fn test_manual_finish_stops_countdown() {
        let session = TestSession::new(test(50, 10), vec![single("q1", 0)]).unwrap();
        let shared = Arc::new(Mutex::new(session));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_countdown(Arc::clone(&shared), Duration::from_millis(1), tx);

        assert!(matches!(rx.recv().await, Some(TimerEvent::Tick { .. })));
        shared.lock().await.finish().unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
        let remaining = shared.lock().await.remaining_secs();
        assert_eq!(remaining, 0);
    }
}
