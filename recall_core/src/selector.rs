//! Due-set selection for review sessions.
//!
//! A card is due when its `due_at` has passed and it is not suspended.
//! The due set is ordered so the most overdue cards come first; ties go to
//! cards on a step ladder (relearning, then learning) before review cards,
//! and finally to the card id so the order is fully deterministic.

use crate::{Card, CardState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Select up to `limit` due cards, in presentation order.
///
/// A `limit` of zero yields no cards; fewer due cards than `limit` yields all of them.
pub fn select_due(cards: &[Card], now: DateTime<Utc>, limit: usize) -> Vec<&Card> {
    if limit == 0 {
        return Vec::new();
    }

    let mut due: Vec<&Card> = cards
        .iter()
        .filter(|c| !c.suspended && c.scheduling.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        a.scheduling
            .due_at
            .cmp(&b.scheduling.due_at)
            .then_with(|| {
                a.scheduling
                    .state
                    .due_priority()
                    .cmp(&b.scheduling.state.due_priority())
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    let eligible = due.len();
    due.truncate(limit);

    tracing::debug!(
        "Selected {} of {} due cards (limit {})",
        due.len(),
        eligible,
        limit
    );

    due
}

/// Number of due cards per lifecycle state, ignoring any limit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DueCounts {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub relearning: usize,
    pub suspended: usize,
}

impl DueCounts {
    pub fn total(&self) -> usize {
        self.new + self.learning + self.review + self.relearning
    }
}

/// Count due cards by state; suspended cards are tallied separately whether due or not
pub fn due_counts(cards: &[Card], now: DateTime<Utc>) -> DueCounts {
    let mut counts = DueCounts::default();

    for card in cards {
        if card.suspended {
            counts.suspended += 1;
            continue;
        }
        if !card.scheduling.is_due(now) {
            continue;
        }
        match card.scheduling.state {
            CardState::New => counts.new += 1,
            CardState::Learning => counts.learning += 1,
            CardState::Review => counts.review += 1,
            CardState::Relearning => counts.relearning += 1,
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn card(id: &str, due_at: DateTime<Utc>, state: CardState) -> Card {
        let mut card = Card::new(id, id, id, due_at - Duration::days(30));
        card.scheduling.due_at = due_at;
        card.scheduling.state = state;
        if state != CardState::New {
            card.scheduling.reps = 1;
            card.scheduling.stability = 1.0;
            card.scheduling.last_review_at = Some(due_at - Duration::days(1));
        }
        card
    }

    fn ids(selected: &[&Card]) -> Vec<String> {
        selected.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_selects_only_past_due_in_order() {
        let t = now();
        let cards = vec![
            card("tomorrow", t + Duration::days(1), CardState::Review),
            card("yesterday", t - Duration::days(1), CardState::Review),
            card("two_days_ago", t - Duration::days(2), CardState::Review),
        ];

        let selected = select_due(&cards, t, 10);
        assert_eq!(ids(&selected), vec!["two_days_ago", "yesterday"]);
    }

    #[test]
    fn test_due_exactly_now_is_included() {
        let t = now();
        let cards = vec![card("now", t, CardState::Review)];
        assert_eq!(select_due(&cards, t, 5).len(), 1);
    }

    #[test]
    fn test_limit_truncates() {
        let t = now();
        let cards: Vec<Card> = (0..20)
            .map(|i| card(&format!("c{:02}", i), t - Duration::hours(i), CardState::Review))
            .collect();

        for limit in [0, 1, 5, 20, 50] {
            let selected = select_due(&cards, t, limit);
            assert_eq!(selected.len(), limit.min(20));
        }

        let top = select_due(&cards, t, 3);
        assert_eq!(ids(&top), vec!["c19", "c18", "c17"]);
    }

    #[test]
    fn test_zero_limit_yields_nothing() {
        let t = now();
        let cards = vec![card("a", t - Duration::days(1), CardState::Review)];
        assert!(select_due(&cards, t, 0).is_empty());
    }

    #[test]
    fn test_suspended_cards_are_skipped() {
        let t = now();
        let mut suspended = card("suspended", t - Duration::days(5), CardState::Review);
        suspended.suspended = true;
        let cards = vec![suspended, card("active", t - Duration::days(1), CardState::Review)];

        assert_eq!(ids(&select_due(&cards, t, 10)), vec!["active"]);
    }

    #[test]
    fn test_ties_prefer_struggling_cards_then_id() {
        let t = now();
        let due = t - Duration::hours(3);
        let cards = vec![
            card("b_review", due, CardState::Review),
            card("a_review", due, CardState::Review),
            card("new", due, CardState::New),
            card("learning", due, CardState::Learning),
            card("relearning", due, CardState::Relearning),
        ];

        assert_eq!(
            ids(&select_due(&cards, t, 10)),
            vec!["relearning", "learning", "a_review", "b_review", "new"]
        );
    }

    #[test]
    fn test_output_sorted_by_due_within_state() {
        let t = now();
        let cards: Vec<Card> = (0..12)
            .map(|i| {
                let state = if i % 2 == 0 {
                    CardState::Review
                } else {
                    CardState::Learning
                };
                card(&format!("c{}", i), t - Duration::minutes((i * 37) % 11), state)
            })
            .collect();

        let selected = select_due(&cards, t, 12);
        for pair in selected.windows(2) {
            assert!(pair[0].scheduling.due_at <= pair[1].scheduling.due_at);
        }
    }

    #[test]
    fn test_due_counts() {
        let t = now();
        let mut suspended = card("s", t - Duration::days(1), CardState::Review);
        suspended.suspended = true;
        let cards = vec![
            card("n", t, CardState::New),
            card("l", t - Duration::minutes(5), CardState::Learning),
            card("r1", t - Duration::days(1), CardState::Review),
            card("r2", t + Duration::days(1), CardState::Review),
            suspended,
        ];

        let counts = due_counts(&cards, t);
        assert_eq!(counts.new, 1);
        assert_eq!(counts.learning, 1);
        assert_eq!(counts.review, 1);
        assert_eq!(counts.relearning, 0);
        assert_eq!(counts.suspended, 1);
        assert_eq!(counts.total(), 3);
    }
}
