//! Session rounds built on the scheduler: ingest, learn, review and scene
//! run-throughs.
//!
//! Every round is strictly sequential. A round asks the [`Drill`] for one
//! rating at a time and writes each card as soon as its rating arrives, so
//! abandoning part way keeps whatever was already recorded.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PlannerConfig;
use crate::db::CardStore;
use crate::error::Result;
use crate::models::{DisplayTier, Rating, Seed};
use crate::scheduler::Scheduler;
use crate::script::{scene_bounds, LineSource};

/// One line as it should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub id: String,
    pub display: DisplayTier,
}

/// The rating source a round drives.
pub trait Drill {
    /// Replaces whatever is on screen with `cues`.
    fn present(&mut self, cues: &[Cue]) -> Result<()>;

    /// Blocks until the learner rates `line`, which is shown at `hint`.
    /// `None` means the learner abandoned the round.
    fn rate(&mut self, line: &str, hint: DisplayTier) -> Result<Option<Rating>>;

    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Ratings collected, recorded or not.
    pub drilled: usize,
    /// Cards created or updated.
    pub recorded: usize,
    /// Last line rated.
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Round {
    /// Nothing to learn or review.
    Idle,
    Completed(Summary),
    /// Cut short by the learner; earlier records stay committed.
    Abandoned(Summary),
}

/// A contiguous run of reviewable lines with the context either side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewWindow {
    pub prefix: Vec<String>,
    pub lines: Vec<String>,
    pub suffix: Vec<String>,
}

impl ReviewWindow {
    pub fn all(&self) -> Vec<String> {
        self.prefix
            .iter()
            .chain(&self.lines)
            .chain(&self.suffix)
            .cloned()
            .collect()
    }
}

/// Expanding rehearsal: every suffix of `lines` of length 1 up to
/// `max_chunk`, shortest first.
pub fn chunks(lines: &[String], max_chunk: usize) -> Vec<&[String]> {
    let k = max_chunk.min(lines.len());
    (1..=k).map(|len| &lines[lines.len() - len..]).collect()
}

pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Enters already-known lines from a single rating each.
    pub fn ingest<S: CardStore, L: LineSource>(
        &self,
        scheduler: &mut Scheduler<S, L>,
        drill: &mut dyn Drill,
    ) -> Result<Round> {
        let Some(target) = scheduler.find_first_unlearnt()? else {
            return Ok(Round::Idle);
        };
        let prefix = scheduler
            .lines()
            .lines_before(&target, self.config.ingest_prefix)?;
        let span = self.unlearnt_run(scheduler, &target, self.config.ingest_cap)?;

        let mut cues = natural_cues(scheduler, &prefix)?;
        cues.extend(span.iter().map(|id| Cue {
            id: id.clone(),
            display: DisplayTier::LineInitials,
        }));
        drill.present(&cues)?;

        let mut summary = Summary::default();
        for id in &span {
            let Some(rating) = drill.rate(id, DisplayTier::LineInitials)? else {
                drill.clear()?;
                return Ok(Round::Abandoned(summary));
            };
            summary.drilled += 1;
            summary.cursor = Some(id.clone());
            scheduler.add_new(id, Seed::Ingested(rating))?;
            summary.recorded += 1;
        }
        drill.clear()?;
        info!(lines = summary.recorded, "ingested");
        Ok(Round::Completed(summary))
    }

    /// Introduces new lines by chunked rehearsal, then records a single
    /// outcome per new line.
    pub fn learn<S: CardStore, L: LineSource>(
        &self,
        scheduler: &mut Scheduler<S, L>,
        drill: &mut dyn Drill,
    ) -> Result<Round> {
        let Some(target) = scheduler.find_first_unlearnt()? else {
            return Ok(Round::Idle);
        };
        let context = scheduler
            .lines()
            .lines_before(&target, self.config.learn_context)?;
        let new_lines = self.unlearnt_run(scheduler, &target, self.config.learn_new_lines)?;

        let mut summary = Summary::default();
        for i in 0..new_lines.len() {
            let so_far: Vec<String> = context.iter().chain(&new_lines[..=i]).cloned().collect();
            for chunk in chunks(&so_far, self.config.max_chunk) {
                let cues = natural_cues(scheduler, chunk)?;
                if !run_through(drill, &cues, &mut summary)? {
                    drill.clear()?;
                    return Ok(Round::Abandoned(summary));
                }
            }
        }

        for id in &new_lines {
            scheduler.add_new(id, Seed::Learned(self.config.learn_rating))?;
            summary.recorded += 1;
        }
        drill.clear()?;
        info!(lines = summary.recorded, drills = summary.drilled, "learnt");
        Ok(Round::Completed(summary))
    }

    /// Reviews the window around the earliest due line.
    pub fn review<S: CardStore, L: LineSource>(
        &self,
        scheduler: &mut Scheduler<S, L>,
        drill: &mut dyn Drill,
    ) -> Result<Round> {
        let Some(start) = scheduler.find_earliest_due()? else {
            info!("nothing due for review");
            return Ok(Round::Idle);
        };
        let window = self.review_window(scheduler, &start)?;
        debug!(
            prefix = window.prefix.len(),
            lines = window.lines.len(),
            suffix = window.suffix.len(),
            "review window"
        );
        let shown = window.all();
        self.drill_recording(scheduler, drill, &shown, &window.lines)
    }

    /// Reviews every line of the scene enclosing `target`, due or not.
    /// Lines without a card are drilled but not recorded.
    pub fn review_scene<S: CardStore, L: LineSource>(
        &self,
        scheduler: &mut Scheduler<S, L>,
        drill: &mut dyn Drill,
        target: &str,
    ) -> Result<Round> {
        let (first, last) = scene_bounds(scheduler.lines(), target)?;
        let all = scheduler.lines().all_line_ids();
        let lo = all.iter().position(|id| *id == first).unwrap_or(0);
        let hi = all.iter().position(|id| *id == last).unwrap_or(lo);
        let scene = all[lo..=hi].to_vec();
        self.drill_recording(scheduler, drill, &scene, &scene)
    }

    /// Rehearses up to `relearn_span` lines ending at `failed`, longest
    /// suffix last. Records nothing. False if the learner abandoned.
    pub fn relearn<S: CardStore, L: LineSource>(
        &self,
        scheduler: &Scheduler<S, L>,
        drill: &mut dyn Drill,
        failed: &str,
    ) -> Result<bool> {
        let mut lines = scheduler
            .lines()
            .lines_before(failed, self.config.relearn_span.saturating_sub(1))?;
        lines.push(failed.to_string());

        let mut summary = Summary::default();
        for i in (0..lines.len()).rev() {
            let cues = natural_cues(scheduler, &lines[i..])?;
            if !run_through(drill, &cues, &mut summary)? {
                return Ok(false);
            }
        }
        debug!(line = failed, drills = summary.drilled, "relearnt");
        Ok(true)
    }

    /// Grows a window from `start` in groups of `extension_run` lines while
    /// each new group holds something reviewable, then trims both ends back
    /// to the outermost reviewable lines. Unlearnt lines end the growth in
    /// that direction, as does either end of the script.
    pub fn review_window<S: CardStore, L: LineSource>(
        &self,
        scheduler: &Scheduler<S, L>,
        start: &str,
    ) -> Result<ReviewWindow> {
        let run = self.config.extension_run;
        let mut span = vec![start.to_string()];

        loop {
            let before = scheduler.lines().lines_before(&span[0], run)?;
            let (group, blocked) = learnt_group(scheduler, before, false)?;
            if group.is_empty() {
                break;
            }
            let reviewable = scheduler.any_reviewable(&group)?;
            span = group.into_iter().chain(span).collect();
            if !reviewable || blocked {
                break;
            }
        }

        loop {
            let last = span.len() - 1;
            let after = scheduler.lines().lines_after(&span[last], run)?;
            let (group, blocked) = learnt_group(scheduler, after, true)?;
            if group.is_empty() {
                break;
            }
            let reviewable = scheduler.any_reviewable(&group)?;
            span.extend(group);
            if !reviewable || blocked {
                break;
            }
        }

        let mut flags = Vec::with_capacity(span.len());
        for id in &span {
            flags.push(scheduler.is_reviewable(id)?);
        }
        let (Some(lo), Some(hi)) = (
            flags.iter().position(|&f| f),
            flags.iter().rposition(|&f| f),
        ) else {
            return Ok(ReviewWindow {
                lines: vec![start.to_string()],
                ..ReviewWindow::default()
            });
        };
        Ok(ReviewWindow {
            prefix: span[..lo].to_vec(),
            lines: span[lo..=hi].to_vec(),
            suffix: span[hi + 1..].to_vec(),
        })
    }

    // `target` and the unlearnt lines straight after it, at most `cap`.
    fn unlearnt_run<S: CardStore, L: LineSource>(
        &self,
        scheduler: &Scheduler<S, L>,
        target: &str,
        cap: usize,
    ) -> Result<Vec<String>> {
        let mut run = vec![target.to_string()];
        let following = scheduler
            .lines()
            .lines_after(target, cap.saturating_sub(1))?;
        for id in following {
            if scheduler.is_learnt(&id)? {
                break;
            }
            run.push(id);
        }
        Ok(run)
    }

    // Shows `shown`, rates each of `targets` at its stored tier and records
    // the outcome where a card exists. A failure triggers relearn, after
    // which the window is shown again with refreshed tiers.
    fn drill_recording<S: CardStore, L: LineSource>(
        &self,
        scheduler: &mut Scheduler<S, L>,
        drill: &mut dyn Drill,
        shown: &[String],
        targets: &[String],
    ) -> Result<Round> {
        drill.present(&natural_cues(scheduler, shown)?)?;

        let mut summary = Summary::default();
        for id in targets {
            let card = scheduler.card(id)?;
            let hint = card.as_ref().map_or(DisplayTier::LOWEST, |c| c.display);
            let Some(rating) = drill.rate(id, hint)? else {
                drill.clear()?;
                return Ok(Round::Abandoned(summary));
            };
            summary.drilled += 1;
            summary.cursor = Some(id.clone());
            if card.is_some() {
                scheduler.record_review(id, rating)?;
                summary.recorded += 1;
            }
            if rating.is_failure() {
                if !self.relearn(scheduler, drill, id)? {
                    drill.clear()?;
                    return Ok(Round::Abandoned(summary));
                }
                drill.present(&natural_cues(scheduler, shown)?)?;
            }
        }
        drill.clear()?;
        info!(drilled = summary.drilled, recorded = summary.recorded, "review finished");
        Ok(Round::Completed(summary))
    }
}

fn natural_cues<S: CardStore, L: LineSource>(
    scheduler: &Scheduler<S, L>,
    ids: &[String],
) -> Result<Vec<Cue>> {
    ids.iter()
        .map(|id| {
            let display = scheduler
                .card(id)?
                .map_or(DisplayTier::LOWEST, |card| card.display);
            Ok(Cue {
                id: id.clone(),
                display,
            })
        })
        .collect()
}

// Presents `cues` and rates each without recording. False if abandoned.
fn run_through(drill: &mut dyn Drill, cues: &[Cue], summary: &mut Summary) -> Result<bool> {
    drill.present(cues)?;
    for cue in cues {
        if drill.rate(&cue.id, cue.display)?.is_none() {
            return Ok(false);
        }
        summary.drilled += 1;
        summary.cursor = Some(cue.id.clone());
    }
    Ok(true)
}

// The learnt lines of `ids` nearest the window, stopping at the first
// unlearnt one. `ids` is in document order; `forward` says which end is
// nearest. The flag reports whether an unlearnt line cut the group short.
fn learnt_group<S: CardStore, L: LineSource>(
    scheduler: &Scheduler<S, L>,
    ids: Vec<String>,
    forward: bool,
) -> Result<(Vec<String>, bool)> {
    let nearest_first: Vec<String> = if forward {
        ids
    } else {
        ids.into_iter().rev().collect()
    };
    let mut group = Vec::new();
    let mut blocked = false;
    for id in nearest_first {
        if !scheduler.is_learnt(&id)? {
            blocked = true;
            break;
        }
        group.push(id);
    }
    if !forward {
        group.reverse();
    }
    Ok((group, blocked))
}
