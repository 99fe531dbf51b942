//! Deck persistence with file locking.
//!
//! The deck file holds every card together with its scheduling state.
//! Saves are atomic (temp file + rename) so a crash never leaves a torn deck.

use crate::{Card, CardSchedulingState, Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// All cards known to the learner
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Deck {
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Deck {
    /// Load a deck from a file with shared locking
    ///
    /// Returns an empty deck if the file doesn't exist. Unlike a cache, a
    /// corrupted deck is an error: silently starting over would lose every
    /// card's schedule on the next save.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No deck file at {:?}, starting with an empty deck", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let deck: Deck = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded {} cards from {:?}", deck.cards.len(), path);
        Ok(deck)
    }

    /// Save the deck with exclusive locking
    ///
    /// Atomically writes the deck by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Other(format!("deck path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} cards to {:?}", self.cards.len(), path);
        Ok(())
    }

    /// Load the deck, modify it, and save it back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Deck) -> Result<()>,
    {
        let mut deck = Self::load(path)?;
        f(&mut deck)?;
        deck.save(path)?;
        Ok(deck)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Add a card; ids must be unique within the deck
    pub fn add(&mut self, card: Card) -> Result<()> {
        if self.get(&card.id).is_some() {
            return Err(Error::DuplicateCard(card.id));
        }
        tracing::info!("Added card {}", card.id);
        self.cards.push(card);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Like [`Deck::get`], but a missing card is an error
    pub fn card(&self, id: &str) -> Result<&Card> {
        self.get(id).ok_or_else(|| Error::CardNotFound(id.to_string()))
    }

    pub fn set_suspended(&mut self, id: &str, suspended: bool) -> Result<()> {
        let card = self
            .get_mut(id)
            .ok_or_else(|| Error::CardNotFound(id.to_string()))?;
        card.suspended = suspended;
        tracing::info!("Card {} suspended={}", id, suspended);
        Ok(())
    }

    /// Write back a scheduling state returned by the scheduler
    pub fn apply(&mut self, id: &str, scheduling: CardSchedulingState) -> Result<()> {
        let card = self
            .get_mut(id)
            .ok_or_else(|| Error::CardNotFound(id.to_string()))?;
        card.scheduling = scheduling;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CardState, Rating, Scheduler};
    use chrono::Utc;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let deck_path = temp_dir.path().join("deck.json");

        let mut deck = Deck::default();
        deck.add(Card::new("perro", "el perro", "the dog", Utc::now()))
            .unwrap();
        deck.add(Card::new("gato", "el gato", "the cat", Utc::now()))
            .unwrap();
        deck.save(&deck_path).unwrap();

        let loaded = Deck::load(&deck_path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.card("gato").unwrap().back, "the cat");
        assert_eq!(
            loaded.card("perro").unwrap().scheduling.state,
            CardState::New
        );
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let deck = Deck::load(&temp_dir.path().join("missing.json")).unwrap();
        assert!(deck.is_empty());
    }

    #[test]
    fn test_corrupted_deck_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let deck_path = temp_dir.path().join("deck.json");
        std::fs::write(&deck_path, "{ invalid json }").unwrap();

        assert!(matches!(Deck::load(&deck_path), Err(Error::Json(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut deck = Deck::default();
        deck.add(Card::new("a", "a", "a", Utc::now())).unwrap();
        let result = deck.add(Card::new("a", "b", "b", Utc::now()));
        assert!(matches!(result, Err(Error::DuplicateCard(id)) if id == "a"));
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn test_update_pattern_persists_schedule() {
        let temp_dir = tempfile::tempdir().unwrap();
        let deck_path = temp_dir.path().join("deck.json");
        let now = Utc::now();
        let scheduler = Scheduler::default();

        Deck::update(&deck_path, |deck| {
            deck.add(Card::new("uno", "uno", "one", now))
        })
        .unwrap();

        Deck::update(&deck_path, |deck| {
            let next = scheduler.update(&deck.card("uno")?.scheduling, Rating::Good, now)?;
            deck.apply("uno", next)
        })
        .unwrap();

        let loaded = Deck::load(&deck_path).unwrap();
        let card = loaded.card("uno").unwrap();
        assert_eq!(card.scheduling.state, CardState::Learning);
        assert_eq!(card.scheduling.reps, 1);
    }

    #[test]
    fn test_suspend_unknown_card() {
        let mut deck = Deck::default();
        assert!(matches!(
            deck.set_suspended("ghost", true),
            Err(Error::CardNotFound(_))
        ));
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let deck_path = temp_dir.path().join("deck.json");

        Deck::default().save(&deck_path).unwrap();

        assert!(deck_path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "deck.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only deck.json, found extras: {:?}",
            extras
        );
    }
}
