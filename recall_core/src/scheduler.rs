//! Spaced-repetition scheduler.
//!
//! Given a card's scheduling state and a rating, [`Scheduler::update`] computes
//! the card's next state. The lifecycle is a four-state machine:
//!
//! - **New** -> Learning on any rating, seeding difficulty and stability
//! - **Learning** walks the configured learning steps; Good/Easy advance,
//!   Hard repeats the step, Again restarts the ladder. Passing the last
//!   step graduates the card to Review.
//! - **Review** applies the forgetting-curve update. Again is a lapse and
//!   drops the card into Relearning.
//! - **Relearning** walks the relearning steps the same way and returns to
//!   Review with the stability it was left with after the lapse.
//!
//! Retrievability follows `R = exp(ln(0.9) * t / S)`, so a card's stability
//! is exactly the number of days after which recall falls to 90%.
//!
//! `update` is pure: identical inputs give identical outputs, which is what
//! lets [`Scheduler::preview`] show every rating's outcome before one is committed.

use crate::{
    Card, CardSchedulingState, CardState, Error, Rating, Result, ReviewEvent, SchedulerConfig,
    MAX_DIFFICULTY, MIN_DIFFICULTY,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Retention reached when the elapsed time equals the stability
pub const REFERENCE_RETENTION: f64 = 0.9;

/// Floor for stability after any update
pub const MIN_STABILITY: f64 = 0.01;

/// Ceiling for stability after any update (100 years)
pub const MAX_STABILITY: f64 = 36500.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Probability of recall after `elapsed_days` for a card with `stability`
pub fn forgetting_curve(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (REFERENCE_RETENTION.ln() * elapsed_days.max(0.0) / stability).exp()
}

fn clamp_difficulty(d: f64) -> f64 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

fn days_to_duration(days: f64) -> Result<Duration> {
    Duration::try_milliseconds((days * MILLIS_PER_DAY).round() as i64).ok_or_else(|| {
        Error::ContractViolation(format!("interval of {} days is out of range", days))
    })
}

/// `now + offset`, failing instead of overflowing the calendar
fn due_after(now: DateTime<Utc>, offset: Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(offset).ok_or_else(|| {
        Error::ContractViolation(format!("due date {} + {} is out of range", now, offset))
    })
}

/// The state a card would reach under each rating
#[derive(Clone, Debug)]
pub struct Preview {
    outcomes: [CardSchedulingState; 4],
}

impl Preview {
    pub fn get(&self, rating: Rating) -> &CardSchedulingState {
        &self.outcomes[rating.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rating, &CardSchedulingState)> {
        Rating::ALL.into_iter().zip(self.outcomes.iter())
    }
}

/// Result of committing a rating: the new state plus its audit record
#[derive(Clone, Debug)]
pub struct ReviewOutcome {
    pub state: CardSchedulingState,
    pub event: ReviewEvent,
}

/// Stateless scheduler parameterised by a validated [`SchedulerConfig`]
#[derive(Clone, Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current probability of recall for a card (0 for cards never reviewed)
    pub fn retrievability(&self, state: &CardSchedulingState, now: DateTime<Utc>) -> f64 {
        forgetting_curve(state.elapsed_days(now), state.stability)
    }

    /// Days until retrievability decays to the requested retention, clamped
    /// to the configured interval bounds
    pub fn next_interval_days(&self, stability: f64) -> f64 {
        let raw = stability * self.config.request_retention.ln() / REFERENCE_RETENTION.ln();
        raw.clamp(self.config.min_interval_days, self.config.max_interval_days)
    }

    /// Compute the state that follows `rating` at `now`.
    ///
    /// Returns [`Error::ContractViolation`] for inconsistent input states or a
    /// `now` earlier than the card's last review. These are caller bugs and
    /// must not be retried.
    pub fn update(
        &self,
        state: &CardSchedulingState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<CardSchedulingState> {
        state.validate()?;
        if let Some(last) = state.last_review_at {
            if now < last {
                return Err(Error::ContractViolation(format!(
                    "review at {} precedes last review at {}",
                    now, last
                )));
            }
        }

        let next = match state.state {
            CardState::New => self.first_rating(rating, now)?,
            CardState::Learning | CardState::Relearning => self.ladder_rating(state, rating, now)?,
            CardState::Review => self.review_rating(state, rating, now)?,
        };

        tracing::debug!(
            "{} -> {} on {}: d={:.2} s={:.3} due={}",
            state.state,
            next.state,
            rating,
            next.difficulty,
            next.stability,
            next.due_at
        );

        Ok(next)
    }

    /// Outcome of every rating without committing any of them
    pub fn preview(&self, state: &CardSchedulingState, now: DateTime<Utc>) -> Result<Preview> {
        let outcomes = [
            self.update(state, Rating::Again, now)?,
            self.update(state, Rating::Hard, now)?,
            self.update(state, Rating::Good, now)?,
            self.update(state, Rating::Easy, now)?,
        ];
        Ok(Preview { outcomes })
    }

    /// Rate a card within a session, producing the next state and the event
    /// the persistence layer appends to its log
    pub fn review(
        &self,
        card: &Card,
        session_id: Uuid,
        rating: Rating,
        now: DateTime<Utc>,
        time_to_answer: Option<Duration>,
    ) -> Result<ReviewOutcome> {
        if card.suspended {
            return Err(Error::ContractViolation(format!(
                "card {} is suspended",
                card.id
            )));
        }

        let before = &card.scheduling;
        let state = self.update(before, rating, now)?;

        let event = ReviewEvent {
            id: Uuid::new_v4(),
            card_id: card.id.clone(),
            session_id,
            rating,
            reviewed_at: now,
            time_to_answer_ms: time_to_answer.map(|d| d.num_milliseconds().max(0) as u64),
            elapsed_days: before.elapsed_days(now),
            scheduled_days: (state.due_at - now).num_milliseconds() as f64 / MILLIS_PER_DAY,
            before: before.snapshot(),
            after: state.snapshot(),
        };

        Ok(ReviewOutcome { state, event })
    }

    fn steps(&self, ladder: CardState) -> &[u32] {
        match ladder {
            CardState::Relearning => &self.config.relearning_steps_minutes,
            _ => &self.config.learning_steps_minutes,
        }
    }

    fn step_duration(&self, ladder: CardState, index: usize) -> Duration {
        let steps = self.steps(ladder);
        let minutes = steps.get(index).or(steps.last()).copied().unwrap_or(1);
        Duration::minutes(i64::from(minutes))
    }

    fn first_rating(&self, rating: Rating, now: DateTime<Utc>) -> Result<CardSchedulingState> {
        let w = &self.config.weights;
        let g = f64::from(rating.value());

        Ok(CardSchedulingState {
            difficulty: clamp_difficulty(w.initial_difficulty - w.difficulty_rating_step * (g - 3.0)),
            stability: w.initial_stability[rating.index()].max(MIN_STABILITY),
            state: CardState::Learning,
            last_review_at: Some(now),
            due_at: due_after(now, self.step_duration(CardState::Learning, 0))?,
            reps: 1,
            lapses: 0,
            current_step_index: 0,
        })
    }

    fn ladder_rating(
        &self,
        state: &CardSchedulingState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<CardSchedulingState> {
        let ladder = state.state;
        let len = self.steps(ladder).len();
        let mut index = state.current_step_index;
        if index >= len {
            tracing::warn!(
                "step index {} beyond {} ladder of {} steps, treating as last step",
                index,
                ladder,
                len
            );
            index = len.saturating_sub(1);
        }

        let mut next = state.clone();
        next.last_review_at = Some(now);
        next.reps += 1;

        // Relearning keeps the post-lapse stability until it graduates
        if ladder == CardState::Learning {
            next.stability = self.short_term_stability(state.stability, rating);
        }

        match rating {
            Rating::Again => {
                next.current_step_index = 0;
                next.due_at = due_after(now, self.step_duration(ladder, 0))?;
            }
            Rating::Hard => {
                next.current_step_index = index;
                next.due_at = due_after(now, self.step_duration(ladder, index))?;
            }
            Rating::Good | Rating::Easy => {
                let advanced = index + 1;
                if advanced >= len {
                    next.state = CardState::Review;
                    next.current_step_index = 0;
                    next.stability = next.stability.max(MIN_STABILITY);
                    next.due_at = due_after(now, days_to_duration(self.next_interval_days(next.stability))?)?;
                } else {
                    next.current_step_index = advanced;
                    next.due_at = due_after(now, self.step_duration(ladder, advanced))?;
                }
            }
        }

        Ok(next)
    }

    fn review_rating(
        &self,
        state: &CardSchedulingState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<CardSchedulingState> {
        let r = self.retrievability(state, now);
        let difficulty = self.next_difficulty(state.difficulty, rating);

        let mut next = state.clone();
        next.difficulty = difficulty;
        next.last_review_at = Some(now);
        next.reps += 1;

        if rating == Rating::Again {
            next.stability = self.lapse_stability(difficulty, state.stability, r);
            next.state = CardState::Relearning;
            next.lapses += 1;
            next.current_step_index = 0;
            next.due_at = due_after(now, self.step_duration(CardState::Relearning, 0))?;
        } else {
            next.stability = self.recall_stability(difficulty, state.stability, r, rating);
            next.due_at = due_after(now, days_to_duration(self.next_interval_days(next.stability))?)?;
        }

        Ok(next)
    }

    /// Again/Hard push difficulty up, Easy pulls it down; the step shrinks
    /// linearly as the difficulty approaches the bound it is moving towards
    fn next_difficulty(&self, d: f64, rating: Rating) -> f64 {
        let g = f64::from(rating.value());
        let delta = -self.config.weights.difficulty_delta * (g - 3.0);
        let damped = if delta > 0.0 {
            delta * (MAX_DIFFICULTY - d) / (MAX_DIFFICULTY - MIN_DIFFICULTY)
        } else {
            delta * (d - MIN_DIFFICULTY) / (MAX_DIFFICULTY - MIN_DIFFICULTY)
        };
        clamp_difficulty(d + damped)
    }

    fn recall_stability(&self, d: f64, s: f64, r: f64, rating: Rating) -> f64 {
        let w = &self.config.weights;
        let modifier = match rating {
            Rating::Hard => w.hard_penalty,
            Rating::Easy => w.easy_bonus,
            _ => 1.0,
        };
        let growth = w.growth_factor.exp()
            * (11.0 - d)
            * s.powf(-w.stability_decay)
            * ((w.retrievability_gain * (1.0 - r)).exp() - 1.0)
            * modifier;

        (s * (1.0 + growth)).max(s).clamp(MIN_STABILITY, MAX_STABILITY)
    }

    fn lapse_stability(&self, d: f64, s: f64, r: f64) -> f64 {
        let w = &self.config.weights;
        let raw = w.forget_base
            * d.powf(-w.forget_difficulty)
            * ((s + 1.0).powf(w.forget_stability) - 1.0)
            * (w.forget_retrievability * (1.0 - r)).exp();

        raw.min(s).max(MIN_STABILITY)
    }

    fn short_term_stability(&self, s: f64, rating: Rating) -> f64 {
        let w = &self.config.weights;
        let base = if s > 0.0 {
            s
        } else {
            w.initial_stability[rating.index()]
        };
        let g = f64::from(rating.value());
        let factor = (w.short_term_factor * (g - 3.0 + w.short_term_offset)).exp();

        (base * factor).clamp(MIN_STABILITY, MAX_STABILITY)
    }
}
