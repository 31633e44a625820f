//! SM-2 spaced repetition arithmetic.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout
//! - 1: Incorrect, the answer was recognised on seeing it
//! - 2: Incorrect, but the answer seemed easy to recall
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect recall
//!
//! Everything here is pure; persistence and locking live in
//! [`ReviewScheduler`](crate::ReviewScheduler).

use chrono::NaiveDate;
use serde::Serialize;

use recall_core::{Error, Result, ReviewState, MAX_INTERVAL_DAYS, MIN_EASINESS};

/// Qualities shown when previewing a card's next intervals.
const PREVIEW_QUALITIES: [u8; 4] = [1, 3, 4, 5];

/// Reject anything outside 0..=5. Out-of-range input is never clamped.
pub fn validate_quality(quality: i64) -> Result<u8> {
    match u8::try_from(quality) {
        Ok(q) if q <= 5 => Ok(q),
        _ => Err(Error::InvalidQuality(quality)),
    }
}

/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3.
pub fn update_easiness(easiness: f64, quality: u8) -> f64 {
    let miss = f64::from(5 - quality.min(5));
    (easiness + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS)
}

/// State after answering with `quality` on `today`.
///
/// The interval of a third or later success multiplies the previous interval
/// by the easiness factor held *before* this review, capped at
/// [`MAX_INTERVAL_DAYS`].
pub fn next_state(state: &ReviewState, quality: u8, today: NaiveDate) -> ReviewState {
    let (repetition_count, interval_days) = if quality < 3 {
        (0, 1)
    } else {
        let reps = state.repetition_count + 1;
        let interval = match reps {
            1 => 1,
            2 => 6,
            _ => (f64::from(state.interval_days) * state.easiness_factor)
                .round()
                .min(f64::from(MAX_INTERVAL_DAYS)) as u32,
        };
        (reps, interval)
    };

    ReviewState {
        repetition_count,
        easiness_factor: update_easiness(state.easiness_factor, quality),
        interval_days,
        due_date: ReviewState::next_due_from(today, interval_days),
        last_quality: Some(quality),
        review_count: state.review_count + 1,
        correct_count: state.correct_count + u32::from(quality >= 3),
        last_reviewed: Some(today),
    }
}

/// Map a 0.0-1.0 grading score onto an SM-2 quality.
pub fn quality_from_score(score: f64) -> u8 {
    match score {
        s if s >= 0.9 => 5,
        s if s >= 0.8 => 4,
        s if s >= 0.6 => 3,
        s if s >= 0.4 => 2,
        s if s >= 0.2 => 1,
        _ => 0,
    }
}

/// Outcome a given quality would produce, without applying it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalPreview {
    pub quality: u8,
    pub interval_days: u32,
    pub due_date: NaiveDate,
    pub easiness_factor: f64,
}

pub fn preview(state: &ReviewState, today: NaiveDate) -> Vec<IntervalPreview> {
    PREVIEW_QUALITIES
        .iter()
        .map(|&quality| {
            let next = next_state(state, quality, today);
            IntervalPreview {
                quality,
                interval_days: next.interval_days,
                due_date: next.due_date,
                easiness_factor: next.easiness_factor,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::INITIAL_EASINESS;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_quality_validation() {
        for q in 0..=5 {
            assert_eq!(validate_quality(q).unwrap(), q as u8);
        }
        assert!(matches!(validate_quality(6), Err(Error::InvalidQuality(6))));
        assert!(matches!(validate_quality(-1), Err(Error::InvalidQuality(-1))));
        assert!(matches!(validate_quality(300), Err(Error::InvalidQuality(300))));
    }

    #[test]
    fn test_easiness_formula() {
        assert!((update_easiness(2.5, 5) - 2.6).abs() < 1e-9);
        assert!((update_easiness(2.5, 4) - 2.5).abs() < 1e-9);
        assert!((update_easiness(2.5, 3) - 2.36).abs() < 1e-9);
        assert!((update_easiness(2.5, 0) - 1.7).abs() < 1e-9);
        assert_eq!(update_easiness(1.4, 0), MIN_EASINESS);
    }

    #[test]
    fn test_three_perfect_reviews() {
        let s0 = ReviewState::new(today());
        let s1 = next_state(&s0, 5, today());
        let s2 = next_state(&s1, 5, today());
        let s3 = next_state(&s2, 5, today());

        assert_eq!(s1.interval_days, 1);
        assert_eq!(s2.interval_days, 6);
        let expected = (6.0 * s2.easiness_factor).round() as u32;
        assert_eq!(s3.interval_days, expected);
        assert_eq!(s3.interval_days, 16);
        assert_eq!(s3.repetition_count, 3);
        assert_eq!(s3.due_date, NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());
    }

    #[test]
    fn test_long_streak_caps_interval() {
        let mut state = ReviewState::new(today());
        for _ in 0..40 {
            state = next_state(&state, 5, today());
            assert!(state.interval_days <= MAX_INTERVAL_DAYS);
            assert!(state.due_date > today());
        }
        assert_eq!(state.interval_days, MAX_INTERVAL_DAYS);
        assert_eq!(state.repetition_count, 40);
        assert_eq!(
            state.due_date,
            ReviewState::next_due_from(today(), MAX_INTERVAL_DAYS)
        );
    }

    #[test]
    fn test_due_date_saturates() {
        assert_eq!(
            ReviewState::next_due_from(NaiveDate::MAX, 10),
            NaiveDate::MAX
        );
    }

    #[test]
    fn test_failure_resets_and_still_moves_easiness() {
        for q in 0..3u8 {
            let mut state = ReviewState::new(today());
            state.repetition_count = 4;
            state.interval_days = 40;
            state.last_quality = Some(5);
            let next = next_state(&state, q, today());
            assert_eq!(next.repetition_count, 0);
            assert_eq!(next.interval_days, 1);
            assert!(next.easiness_factor < INITIAL_EASINESS);
            assert_eq!(next.correct_count, 0);
            assert_eq!(next.review_count, 1);
        }
    }

    #[test]
    fn test_easiness_never_below_floor() {
        let mut state = ReviewState::new(today());
        for _ in 0..50 {
            state = next_state(&state, 0, today());
            assert!(state.easiness_factor >= MIN_EASINESS);
        }
        assert_eq!(state.easiness_factor, MIN_EASINESS);
    }

    #[test]
    fn test_lapse_after_two_successes() {
        let s1 = next_state(&ReviewState::new(today()), 5, today());
        let s2 = next_state(&s1, 5, today());
        let s3 = next_state(&s2, 1, today());
        assert_eq!(s2.repetition_count, 2);
        assert_eq!(s3.repetition_count, 0);
        assert_eq!(s3.interval_days, 1);
        assert_eq!(s3.last_quality, Some(1));
        assert_eq!(s3.review_count, 3);
        assert_eq!(s3.correct_count, 2);
    }

    #[test]
    fn test_quality_from_score_bands() {
        assert_eq!(quality_from_score(1.0), 5);
        assert_eq!(quality_from_score(0.9), 5);
        assert_eq!(quality_from_score(0.85), 4);
        assert_eq!(quality_from_score(0.6), 3);
        assert_eq!(quality_from_score(0.45), 2);
        assert_eq!(quality_from_score(0.2), 1);
        assert_eq!(quality_from_score(0.1), 0);
        assert_eq!(quality_from_score(-3.0), 0);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let state = ReviewState::new(today());
        let options = preview(&state, today());
        assert_eq!(
            options.iter().map(|p| p.quality).collect::<Vec<_>>(),
            vec![1, 3, 4, 5]
        );
        assert!(options.iter().all(|p| p.interval_days == 1));
        assert_eq!(state, ReviewState::new(today()));
    }
}
