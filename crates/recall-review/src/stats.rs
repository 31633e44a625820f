//! Aggregate review statistics and the upcoming review forecast.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use recall_core::{Error, Flashcard, Phase, Result};

/// Estimated study time per card in the forecast.
const MINUTES_PER_CARD: u32 = 2;
/// Longest forecast window a caller may ask for.
pub const MAX_FORECAST_DAYS: u32 = 365;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    pub mastered: usize,
    pub due_today: usize,
    /// Never reviewed.
    pub new: usize,
    /// Reviewed cards by phase.
    pub learning: usize,
    pub young: usize,
    pub mature: usize,
    pub total_reviews: u64,
    pub correct_reviews: u64,
    /// `correct_reviews / total_reviews`, 0 when nothing has been reviewed.
    pub accuracy_rate: f64,
    /// Mean easiness over all cards, 0 for an empty collection.
    pub average_easiness: f64,
}

pub fn review_stats(cards: &[Flashcard], as_of: NaiveDate) -> ReviewStats {
    let mut stats = ReviewStats {
        total: cards.len(),
        ..Default::default()
    };
    let mut easiness_sum = 0.0;

    for card in cards {
        let review = &card.review;
        easiness_sum += review.easiness_factor;
        stats.total_reviews += u64::from(review.review_count);
        stats.correct_reviews += u64::from(review.correct_count);
        if review.is_mastered() {
            stats.mastered += 1;
        }
        if review.is_due(as_of) {
            stats.due_today += 1;
        }
        if review.is_new() {
            stats.new += 1;
            continue;
        }
        match review.phase() {
            Phase::Learning => stats.learning += 1,
            Phase::Young => stats.young += 1,
            Phase::Mature => stats.mature += 1,
        }
    }

    if stats.total_reviews > 0 {
        stats.accuracy_rate = stats.correct_reviews as f64 / stats.total_reviews as f64;
    }
    if !cards.is_empty() {
        stats.average_easiness = easiness_sum / cards.len() as f64;
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub count: usize,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub from: NaiveDate,
    pub days: Vec<ForecastDay>,
    pub total_cards: usize,
    pub total_minutes: u32,
}

/// Reviewed cards falling due on each of `days_ahead` days starting at
/// `from`. Overdue cards count towards `from`; cards due after the window
/// are left out.
pub fn forecast(cards: &[Flashcard], from: NaiveDate, days_ahead: u32) -> Result<Forecast> {
    if days_ahead == 0 || days_ahead > MAX_FORECAST_DAYS {
        return Err(Error::InvalidInput(format!(
            "days_ahead must be between 1 and {MAX_FORECAST_DAYS}, got {days_ahead}"
        )));
    }
    if from.checked_add_days(Days::new(u64::from(days_ahead - 1))).is_none() {
        return Err(Error::InvalidInput(format!(
            "forecast window starting {from} runs past the last supported date"
        )));
    }

    let mut counts = vec![0usize; days_ahead as usize];
    for card in cards.iter().filter(|c| !c.review.is_new()) {
        let offset = (card.review.due_date - from).num_days().max(0);
        if let Some(slot) = counts.get_mut(offset as usize) {
            *slot += 1;
        }
    }

    let days: Vec<ForecastDay> = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| ForecastDay {
            date: from + Days::new(i as u64),
            count,
            estimated_minutes: count as u32 * MINUTES_PER_CARD,
        })
        .collect();
    let total_cards = days.iter().map(|d| d.count).sum();
    let total_minutes = days.iter().map(|d| d.estimated_minutes).sum();

    Ok(Forecast {
        from,
        days,
        total_cards,
        total_minutes,
    })
}
