use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, Moment};
use crate::db::CardStore;
use crate::error::{Error, Result};
use crate::memory::MemoryModel;
use crate::models::{Card, DisplayTier, Lifecycle, Rating, Scheme, Seed};
use crate::script::LineSource;

/// Due-ness, lookup and the only write path to the card store.
pub struct Scheduler<S: CardStore, L: LineSource> {
    store: S,
    lines: L,
    model: Box<dyn MemoryModel>,
    clock: Box<dyn Clock>,
    due_soon: Duration,
}

/// Read-only aggregation over every card in the store.
#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub scheme: Option<Scheme>,
    pub total: usize,
    pub due: usize,
    pub reviewable: usize,
    /// Keyed by local due date; overdue cards are counted under today.
    pub by_due_day: BTreeMap<String, usize>,
    /// Ease or difficulty rounded down to a whole number.
    pub by_hardness: BTreeMap<i64, usize>,
    pub by_display: BTreeMap<DisplayTier, usize>,
    pub by_lifecycle: BTreeMap<Lifecycle, usize>,
}

impl<S: CardStore, L: LineSource> Scheduler<S, L> {
    /// Binds the store to the model's scheme; a populated store bound to the
    /// other scheme is refused.
    pub fn new(
        store: S,
        lines: L,
        model: Box<dyn MemoryModel>,
        clock: Box<dyn Clock>,
        due_soon: Duration,
    ) -> Result<Self> {
        store.bind_scheme(model.scheme())?;
        Ok(Self {
            store,
            lines,
            model,
            clock,
            due_soon,
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn moment(&self) -> Moment {
        self.clock.moment()
    }

    pub fn card(&self, id: &str) -> Result<Option<Card>> {
        self.store.get(id)
    }

    pub fn is_learnt(&self, id: &str) -> Result<bool> {
        Ok(self.store.get(id)?.is_some())
    }

    /// False for lines without a card.
    pub fn is_due(&self, id: &str) -> Result<bool> {
        let at = self.moment();
        Ok(self
            .store
            .get(id)?
            .is_some_and(|card| self.model.is_due(&card, &at)))
    }

    pub fn is_reviewable(&self, id: &str) -> Result<bool> {
        let at = self.moment();
        Ok(self
            .store
            .get(id)?
            .is_some_and(|card| self.card_reviewable(&card, &at)))
    }

    // Due, or due soon and not already touched today.
    fn card_reviewable(&self, card: &Card, at: &Moment) -> bool {
        if self.model.is_due(card, at) {
            return true;
        }
        let due_soon = card.due <= at.now + self.due_soon;
        due_soon && !at.is_today(card.last_review)
    }

    pub fn any_due(&self, ids: &[String]) -> Result<bool> {
        for id in ids {
            if self.is_due(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn any_reviewable(&self, ids: &[String]) -> Result<bool> {
        for id in ids {
            if self.is_reviewable(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reviewable cards for lines still in the script, earliest first.
    ///
    /// The ease scheme orders by due day and then by oldest review; FSRS
    /// follows the due index.
    pub fn reviewable_cards(&self) -> Result<Vec<Card>> {
        let at = self.moment();
        let mut cards: Vec<Card> = match self.model.scheme() {
            Scheme::Ease => {
                let mut cards = self.store.get_all()?;
                cards.sort_by_key(|c| (at.day_of(c.due), c.last_review));
                cards
            }
            Scheme::Fsrs => self
                .store
                .query_by_due_range(DateTime::<Utc>::UNIX_EPOCH, at.now + self.due_soon)?,
        };
        cards.retain(|c| self.lines.contains(&c.id) && self.card_reviewable(c, &at));
        Ok(cards)
    }

    pub fn find_earliest_due(&self) -> Result<Option<String>> {
        Ok(self.reviewable_cards()?.into_iter().next().map(|c| c.id))
    }

    pub fn find_first_unlearnt(&self) -> Result<Option<String>> {
        let known: HashSet<String> = self.store.get_all_keys()?.into_iter().collect();
        let first = self
            .lines
            .all_line_ids()
            .into_iter()
            .find(|id| !known.contains(id));
        if first.is_none() {
            info!("nothing left to learn");
        }
        Ok(first)
    }

    /// Applies `rating` to an existing card and persists the result.
    pub fn record_review(&mut self, id: &str, rating: Rating) -> Result<Card> {
        self.require_line(id)?;
        let card = self
            .store
            .get(id)?
            .ok_or_else(|| Error::CardMissing(id.to_string()))?;
        let at = self.moment();
        let next = self.model.review(&card, rating, &at)?;
        self.store.put(&next)?;
        debug!(
            line = id,
            %rating,
            display = next.display.label(),
            due = %next.due,
            "recorded review"
        );
        Ok(next)
    }

    pub fn add_new(&mut self, id: &str, seed: Seed) -> Result<Card> {
        self.require_line(id)?;
        if self.store.get(id)?.is_some() {
            return Err(Error::CardExists(id.to_string()));
        }
        let at = self.moment();
        let card = self.model.create(id, seed, &at);
        self.store.put(&card)?;
        debug!(line = id, ?seed, due = %card.due, "created card");
        Ok(card)
    }

    /// Deletes every card whose line is no longer in the script.
    pub fn prune_orphaned_lines(&self) -> Result<Vec<String>> {
        let current: HashSet<String> = self.lines.all_line_ids().into_iter().collect();
        let mut pruned = Vec::new();
        for id in self.store.get_all_keys()? {
            if !current.contains(&id) && self.store.delete(&id)? {
                info!(line = %id, "pruned orphaned line");
                pruned.push(id);
            }
        }
        Ok(pruned)
    }

    pub fn stats(&self) -> Result<Stats> {
        let at = self.moment();
        let today = at.today();
        let mut stats = Stats {
            scheme: self.store.scheme()?,
            ..Stats::default()
        };

        for card in self.store.get_all()? {
            stats.total += 1;
            if self.model.is_due(&card, &at) {
                stats.due += 1;
            }
            if self.card_reviewable(&card, &at) {
                stats.reviewable += 1;
            }
            let day = at.day_of(card.due).max(today);
            *stats.by_due_day.entry(day.to_string()).or_default() += 1;
            *stats
                .by_hardness
                .entry(card.state.hardness().floor() as i64)
                .or_default() += 1;
            *stats.by_display.entry(card.display).or_default() += 1;
            if let Some(lifecycle) = card.state.lifecycle() {
                *stats.by_lifecycle.entry(lifecycle).or_default() += 1;
            }
        }
        Ok(stats)
    }

    /// Same as [`stats`](Self::stats), also written to the log.
    pub fn log_stats(&self) -> Result<Stats> {
        let stats = self.stats()?;
        info!(
            total = stats.total,
            due = stats.due,
            reviewable = stats.reviewable,
            "card stats"
        );
        for (day, count) in &stats.by_due_day {
            info!(day = %day, count, "due by day");
        }
        for (bucket, count) in &stats.by_hardness {
            info!(bucket, count, "cards by hardness");
        }
        for (tier, count) in &stats.by_display {
            info!(display = tier.label(), count, "cards by display");
        }
        for (lifecycle, count) in &stats.by_lifecycle {
            info!(lifecycle = lifecycle.label(), count, "cards by lifecycle");
        }
        Ok(stats)
    }

    fn require_line(&self, id: &str) -> Result<()> {
        if self.lines.contains(id) {
            Ok(())
        } else {
            Err(Error::UnknownLine(id.to_string()))
        }
    }
}
