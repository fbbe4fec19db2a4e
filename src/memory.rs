//! Review outcome -> memory state transitions.
//!
//! Two interchangeable models sit behind [`MemoryModel`]:
//!
//! - [`EaseModel`]: an ease/streak scheme. Ease moves by a per-rating delta
//!   and doubles as the mean of a normally distributed interval in days, so
//!   lines with the same ease do not all fall due on the same day.
//! - [`FsrsModel`]: FSRS-6 difficulty/stability updates with an explicit
//!   lifecycle, plus a warm-up sequence of synthetic ratings that paces the
//!   first reviews of a freshly learnt line.
//!
//! Both share the [`DisplayLadder`], which decides how many hints a line
//! keeps as its success streak grows.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Moment;
use crate::config::{Advancement, Config, EaseConfig, FsrsConfig, FSRS_WEIGHT_COUNT};
use crate::error::{Error, Result};
use crate::models::{
    Card, CardState, DisplayTier, EaseState, FsrsState, Lifecycle, Rating, Scheme, Seed,
};

pub trait MemoryModel {
    fn scheme(&self) -> Scheme;

    /// State for a line that has just been learnt or ingested.
    fn create(&mut self, id: &str, seed: Seed, at: &Moment) -> Card;

    /// State after `rating` is recorded for `card` at `at`.
    fn review(&mut self, card: &Card, rating: Rating, at: &Moment) -> Result<Card>;

    fn is_due(&self, card: &Card, at: &Moment) -> bool;
}

/// Builds the model selected by `config.scheme`. A fixed `seed` makes the
/// interval jitter reproducible.
pub fn build(config: &Config, seed: Option<u64>) -> Result<Box<dyn MemoryModel>> {
    let rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let ladder = DisplayLadder::new(config.display.advancement);
    Ok(match config.scheme {
        Scheme::Ease => Box::new(EaseModel::new(config.ease.clone(), ladder, rng)),
        Scheme::Fsrs => Box::new(FsrsModel::new(config.fsrs.clone(), ladder, rng)?),
    })
}

/// Tier a line starts at when ingested with `rating`.
pub fn initial_display(rating: Rating) -> DisplayTier {
    match rating {
        Rating::Again | Rating::Hard => DisplayTier::All,
        Rating::Good => DisplayTier::WordInitials,
        Rating::Easy => DisplayTier::LineInitials,
    }
}

fn initial_ease(rating: Rating) -> f64 {
    match rating {
        Rating::Again => 0.0,
        Rating::Hard => 1.0,
        Rating::Good => 2.0,
        Rating::Easy => 4.0,
    }
}

/// Box-Muller transform over two independent uniform draws.
pub fn sample_normal<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // (0, 1] so the log is finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + z * std_dev
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayLadder {
    advancement: Advancement,
}

impl DisplayLadder {
    pub fn new(advancement: Advancement) -> Self {
        Self { advancement }
    }

    /// New `(display, streak)` after `rating`. Failure drops to the lowest
    /// tier; a success that crosses the milestone advances one tier and
    /// restarts the streak.
    pub fn climb<R: Rng>(
        &self,
        display: DisplayTier,
        streak: u32,
        rating: Rating,
        rng: &mut R,
    ) -> (DisplayTier, u32) {
        if rating.is_failure() {
            return (DisplayTier::LOWEST, 0);
        }
        let streak = streak + 1;
        if display == DisplayTier::HIGHEST || !self.crosses(streak, rng) {
            return (display, streak);
        }
        (display.advance(), 0)
    }

    fn crosses<R: Rng>(&self, streak: u32, rng: &mut R) -> bool {
        match self.advancement {
            Advancement::Fixed { threshold } => streak >= threshold,
            Advancement::Probabilistic => {
                let p = (streak as f64 - 3.0) / 3.0;
                if p <= 0.0 {
                    false
                } else if p >= 1.0 {
                    true
                } else {
                    rng.gen_bool(p)
                }
            }
        }
    }
}

pub struct EaseModel {
    config: EaseConfig,
    ladder: DisplayLadder,
    rng: StdRng,
}

impl EaseModel {
    pub fn new(config: EaseConfig, ladder: DisplayLadder, rng: StdRng) -> Self {
        Self {
            config,
            ladder,
            rng,
        }
    }

    fn clamp(&self, ease: f64) -> f64 {
        ease.clamp(self.config.min, self.config.max)
    }

    /// Today plus a jittered whole number of days, never before `at.now`.
    fn schedule(&mut self, ease: f64, at: &Moment) -> DateTime<Utc> {
        let sampled = sample_normal(&mut self.rng, ease, ease / 4.0);
        let days = sampled
            .round()
            .clamp(0.0, self.config.max_interval_days as f64) as i64;
        at.start_of_day_in(days).max(at.now)
    }

    // Reviewed earlier today and not due again until a later day. A card
    // whose due day has come is always credited.
    fn repeated_today(card: &Card, at: &Moment) -> bool {
        at.is_today(card.last_review) && at.day_of(card.due) > at.today()
    }
}

impl MemoryModel for EaseModel {
    fn scheme(&self) -> Scheme {
        Scheme::Ease
    }

    fn create(&mut self, id: &str, seed: Seed, at: &Moment) -> Card {
        let ease = self.clamp(initial_ease(seed.rating()));
        let (display, due) = match seed {
            Seed::Learned(_) => (DisplayTier::LOWEST, at.now),
            Seed::Ingested(rating) => (initial_display(rating), self.schedule(ease, at)),
        };
        Card {
            id: id.to_string(),
            due,
            last_review: at.now,
            display,
            state: CardState::Ease(EaseState { ease, streak: 0 }),
        }
    }

    fn review(&mut self, card: &Card, rating: Rating, at: &Moment) -> Result<Card> {
        let state = match &card.state {
            CardState::Ease(s) => s,
            other => {
                return Err(Error::SchemeMismatch {
                    stored: other.scheme(),
                    configured: Scheme::Ease,
                })
            }
        };

        let (ease, streak, display) = if rating.is_failure() {
            (self.config.fail_floor, 0, DisplayTier::LOWEST)
        } else if Self::repeated_today(card, at) {
            (state.ease, state.streak, card.display)
        } else {
            let ease = self.clamp(state.ease + self.config.delta(rating));
            let (display, streak) =
                self.ladder
                    .climb(card.display, state.streak, rating, &mut self.rng);
            (ease, streak, display)
        };

        Ok(Card {
            id: card.id.clone(),
            due: self.schedule(ease, at),
            last_review: at.now,
            display,
            state: CardState::Ease(EaseState { ease, streak }),
        })
    }

    /// Day granularity: due any time today counts.
    fn is_due(&self, card: &Card, at: &Moment) -> bool {
        at.day_of(card.due) <= at.today()
    }
}

const MIN_STABILITY: f64 = 0.01;
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;

pub struct FsrsModel {
    config: FsrsConfig,
    weights: Vec<f32>,
    ladder: DisplayLadder,
    rng: StdRng,
}

impl FsrsModel {
    pub fn new(config: FsrsConfig, ladder: DisplayLadder, rng: StdRng) -> Result<Self> {
        let weights = config
            .weights
            .clone()
            .unwrap_or_else(|| fsrs::DEFAULT_PARAMETERS.to_vec());
        if weights.len() < FSRS_WEIGHT_COUNT {
            return Err(Error::InvalidParameters(format!(
                "FSRS needs {} weights, got {}",
                FSRS_WEIGHT_COUNT,
                weights.len()
            )));
        }
        Ok(Self {
            config,
            weights,
            ladder,
            rng,
        })
    }

    fn w(&self, i: usize) -> f64 {
        self.weights[i] as f64
    }

    fn decay(&self) -> f64 {
        self.w(20)
    }

    fn factor(&self) -> f64 {
        0.9f64.powf(-1.0 / self.decay()) - 1.0
    }

    fn initial_stability(&self, rating: Rating) -> f64 {
        self.w(rating.as_u8() as usize - 1).max(MIN_STABILITY)
    }

    fn raw_initial_difficulty(&self, rating: Rating) -> f64 {
        let g = rating.as_u8() as f64;
        self.w(4) - (self.w(5) * (g - 1.0)).exp() + 1.0
    }

    fn initial_difficulty(&self, rating: Rating) -> f64 {
        self.raw_initial_difficulty(rating)
            .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    /// Linear damping toward 10, then mean reversion toward D0(Easy).
    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let g = rating.as_u8() as f64;
        let delta = -self.w(6) * (g - 3.0);
        let damped = difficulty + delta * (10.0 - difficulty) / 9.0;
        let reverted =
            self.w(7) * self.raw_initial_difficulty(Rating::Easy) + (1.0 - self.w(7)) * damped;
        reverted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn retrievability(&self, elapsed_days: i64, stability: f64, difficulty: f64) -> f64 {
        let state = fsrs::MemoryState {
            stability: stability as f32,
            difficulty: difficulty as f32,
        };
        fsrs::current_retrievability(state, elapsed_days as f32, self.decay() as f32) as f64
    }

    fn recall_stability(&self, d: f64, s: f64, r: f64, rating: Rating) -> f64 {
        let hard_penalty = if rating == Rating::Hard { self.w(15) } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { self.w(16) } else { 1.0 };
        s * (1.0
            + self.w(8).exp()
                * (11.0 - d)
                * s.powf(-self.w(9))
                * ((self.w(10) * (1.0 - r)).exp() - 1.0)
                * hard_penalty
                * easy_bonus)
    }

    fn forget_stability(&self, d: f64, s: f64, r: f64) -> f64 {
        let forgotten = self.w(11)
            * d.powf(-self.w(12))
            * ((s + 1.0).powf(self.w(13)) - 1.0)
            * (self.w(14) * (1.0 - r)).exp();
        forgotten.min(s)
    }

    // Same-day review
    fn short_term_stability(&self, s: f64, rating: Rating) -> f64 {
        let g = rating.as_u8() as f64;
        let mut increase = (self.w(17) * (g - 3.0 + self.w(18))).exp() * s.powf(-self.w(19));
        if g >= 3.0 {
            increase = increase.max(1.0);
        }
        s * increase
    }

    fn interval_days(&self, stability: f64) -> i64 {
        let retention = self.config.desired_retention;
        let interval =
            stability / self.factor() * (retention.powf(1.0 / -self.decay()) - 1.0);
        (interval.round() as i64).clamp(1, self.config.max_interval_days.max(1))
    }

    fn next_lifecycle(lifecycle: Lifecycle, rating: Rating) -> Lifecycle {
        match (lifecycle, rating) {
            (Lifecycle::New | Lifecycle::Learning, Rating::Again | Rating::Hard) => {
                Lifecycle::Learning
            }
            (Lifecycle::New | Lifecycle::Learning, _) => Lifecycle::Review,
            (Lifecycle::Review, Rating::Again) => Lifecycle::Relearning,
            (Lifecycle::Review, _) => Lifecycle::Review,
            (Lifecycle::Relearning, Rating::Again | Rating::Hard) => Lifecycle::Relearning,
            (Lifecycle::Relearning, _) => Lifecycle::Review,
        }
    }

    /// Again in a learning state comes back after one learning step, Hard
    /// comes back tomorrow; review states wait out the FSRS interval.
    fn due_for(
        &self,
        lifecycle: Lifecycle,
        rating: Rating,
        stability: f64,
        at: &Moment,
    ) -> DateTime<Utc> {
        match lifecycle {
            Lifecycle::Review => at.start_of_day_in(self.interval_days(stability)),
            _ if rating.is_failure() => {
                at.now + Duration::minutes(self.config.learning_step_minutes.max(0))
            }
            _ => at.start_of_day_in(1),
        }
    }

    fn warmup_len(&self) -> u32 {
        self.config.warmup.len() as u32
    }
}

impl MemoryModel for FsrsModel {
    fn scheme(&self) -> Scheme {
        Scheme::Fsrs
    }

    fn create(&mut self, id: &str, seed: Seed, at: &Moment) -> Card {
        let rating = seed.rating();
        let stability = self.initial_stability(rating);
        let (lifecycle, warmup, display, due) = match seed {
            Seed::Learned(_) => (
                Lifecycle::Learning,
                0,
                DisplayTier::LOWEST,
                at.now + Duration::minutes(self.config.learning_step_minutes.max(0)),
            ),
            Seed::Ingested(_) => {
                let lifecycle = Self::next_lifecycle(Lifecycle::New, rating);
                (
                    lifecycle,
                    self.warmup_len(),
                    initial_display(rating),
                    self.due_for(lifecycle, rating, stability, at),
                )
            }
        };
        Card {
            id: id.to_string(),
            due,
            last_review: at.now,
            display,
            state: CardState::Fsrs(FsrsState {
                difficulty: self.initial_difficulty(rating),
                stability,
                lifecycle,
                reps: 1,
                lapses: 0,
                streak: 0,
                warmup,
            }),
        }
    }

    fn review(&mut self, card: &Card, user_rating: Rating, at: &Moment) -> Result<Card> {
        let state = match &card.state {
            CardState::Fsrs(s) => s,
            other => {
                return Err(Error::SchemeMismatch {
                    stored: other.scheme(),
                    configured: Scheme::Fsrs,
                })
            }
        };

        // Warm-up ratings replace the learner's until the sequence runs out
        let (rating, warmup) = match self.config.warmup.get(state.warmup as usize) {
            Some(&synthetic) => (synthetic, state.warmup + 1),
            None => (user_rating, state.warmup),
        };

        let (difficulty, stability) = if state.lifecycle == Lifecycle::New {
            (self.initial_difficulty(rating), self.initial_stability(rating))
        } else {
            let elapsed = (at.today() - at.day_of(card.last_review)).num_days().max(0);
            let s = if elapsed == 0 {
                self.short_term_stability(state.stability, rating)
            } else {
                let r = self.retrievability(elapsed, state.stability, state.difficulty);
                if rating.is_failure() {
                    self.forget_stability(state.difficulty, state.stability, r)
                } else {
                    self.recall_stability(state.difficulty, state.stability, r, rating)
                }
            };
            (self.next_difficulty(state.difficulty, rating), s.max(MIN_STABILITY))
        };

        let lifecycle = Self::next_lifecycle(state.lifecycle, rating);
        let lapses = if state.lifecycle == Lifecycle::Review && rating.is_failure() {
            state.lapses + 1
        } else {
            state.lapses
        };
        let (display, streak) =
            self.ladder
                .climb(card.display, state.streak, user_rating, &mut self.rng);

        Ok(Card {
            id: card.id.clone(),
            due: self.due_for(lifecycle, rating, stability, at),
            last_review: at.now,
            display,
            state: CardState::Fsrs(FsrsState {
                difficulty,
                stability,
                lifecycle,
                reps: state.reps + 1,
                lapses,
                streak,
                warmup,
            }),
        })
    }

    fn is_due(&self, card: &Card, at: &Moment) -> bool {
        card.due <= at.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
    }

    fn moment(now: DateTime<Utc>) -> Moment {
        Moment::new(now, FixedOffset::east_opt(0).unwrap())
    }

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn fixed_ladder(threshold: u32) -> DisplayLadder {
        DisplayLadder::new(Advancement::Fixed { threshold })
    }

    fn ease_model() -> EaseModel {
        EaseModel::new(EaseConfig::default(), fixed_ladder(3), rng(7))
    }

    fn fsrs_model() -> FsrsModel {
        FsrsModel::new(FsrsConfig::default(), fixed_ladder(3), rng(7)).unwrap()
    }

    fn ease_card(ease: f64, streak: u32, display: DisplayTier, reviewed: DateTime<Utc>) -> Card {
        Card {
            id: "L5".into(),
            due: reviewed + Duration::days(1),
            last_review: reviewed,
            display,
            state: CardState::Ease(EaseState { ease, streak }),
        }
    }

    fn ease_of(card: &Card) -> &EaseState {
        match &card.state {
            CardState::Ease(s) => s,
            _ => panic!("expected ease state"),
        }
    }

    fn fsrs_of(card: &Card) -> &FsrsState {
        match &card.state {
            CardState::Fsrs(s) => s,
            _ => panic!("expected fsrs state"),
        }
    }

    fn random_rating(rng: &mut StdRng) -> Rating {
        Rating::ALL[rng.gen_range(0..4)]
    }

    mod normal_tests {
        use super::*;

        #[test]
        fn sample_mean_and_spread() {
            let mut r = rng(42);
            let samples: Vec<f64> = (0..20_000).map(|_| sample_normal(&mut r, 4.0, 1.0)).collect();
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let var =
                samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
            assert!((mean - 4.0).abs() < 0.05, "mean {}", mean);
            assert!((var.sqrt() - 1.0).abs() < 0.05, "std {}", var.sqrt());
        }

        #[test]
        fn zero_spread_returns_mean() {
            let mut r = rng(1);
            assert_eq!(sample_normal(&mut r, 3.0, 0.0), 3.0);
        }
    }

    mod ladder_tests {
        use super::*;

        #[test]
        fn failure_resets_to_lowest() {
            let ladder = fixed_ladder(3);
            let (display, streak) = ladder.climb(DisplayTier::None, 5, Rating::Again, &mut rng(1));
            assert_eq!(display, DisplayTier::All);
            assert_eq!(streak, 0);
        }

        #[test]
        fn fixed_threshold_advances_and_resets_streak() {
            let ladder = fixed_ladder(3);
            let mut r = rng(1);
            assert_eq!(
                ladder.climb(DisplayTier::All, 1, Rating::Good, &mut r),
                (DisplayTier::All, 2)
            );
            assert_eq!(
                ladder.climb(DisplayTier::All, 2, Rating::Hard, &mut r),
                (DisplayTier::WordInitials, 0)
            );
        }

        #[test]
        fn top_tier_keeps_counting() {
            let ladder = fixed_ladder(3);
            assert_eq!(
                ladder.climb(DisplayTier::None, 7, Rating::Easy, &mut rng(1)),
                (DisplayTier::None, 8)
            );
        }

        #[test]
        fn probabilistic_never_before_four_always_at_six() {
            let ladder = DisplayLadder::new(Advancement::Probabilistic);
            let mut r = rng(3);
            for _ in 0..200 {
                assert_eq!(
                    ladder.climb(DisplayTier::All, 2, Rating::Good, &mut r),
                    (DisplayTier::All, 3)
                );
                assert_eq!(
                    ladder.climb(DisplayTier::All, 5, Rating::Good, &mut r),
                    (DisplayTier::WordInitials, 0)
                );
            }
        }

        #[test]
        fn probabilistic_sometimes_at_four() {
            let ladder = DisplayLadder::new(Advancement::Probabilistic);
            let mut r = rng(9);
            let advanced = (0..300)
                .filter(|_| ladder.climb(DisplayTier::All, 3, Rating::Good, &mut r).1 == 0)
                .count();
            assert!(advanced > 50 && advanced < 150, "advanced {}", advanced);
        }
    }

    mod ease_tests {
        use super::*;

        #[test]
        fn good_review_crosses_streak_milestone() {
            let mut model = ease_model();
            let yesterday = noon() - Duration::days(1);
            let card = ease_card(4.0, 2, DisplayTier::All, yesterday);
            let next = model.review(&card, Rating::Good, &moment(noon())).unwrap();
            let state = ease_of(&next);
            assert_eq!(state.ease, 6.0);
            assert_eq!(state.streak, 0);
            assert_eq!(next.display, DisplayTier::WordInitials);
        }

        #[test]
        fn good_review_below_milestone_keeps_tier() {
            let mut model = EaseModel::new(EaseConfig::default(), fixed_ladder(4), rng(7));
            let card = ease_card(4.0, 2, DisplayTier::All, noon() - Duration::days(1));
            let next = model.review(&card, Rating::Good, &moment(noon())).unwrap();
            assert_eq!(ease_of(&next).streak, 3);
            assert_eq!(next.display, DisplayTier::All);
        }

        #[test]
        fn failure_resets_everything() {
            let mut model = ease_model();
            let card = ease_card(7.0, 2, DisplayTier::LineInitials, noon() - Duration::days(3));
            let next = model.review(&card, Rating::Again, &moment(noon())).unwrap();
            assert_eq!(ease_of(&next).ease, EaseConfig::default().fail_floor);
            assert_eq!(ease_of(&next).streak, 0);
            assert_eq!(next.display, DisplayTier::All);
        }

        #[test]
        fn failure_from_all_stays_at_lowest() {
            let mut model = ease_model();
            let card = ease_card(5.0, 1, DisplayTier::All, noon() - Duration::days(2));
            let next = model.review(&card, Rating::Again, &moment(noon())).unwrap();
            assert_eq!(next.display, DisplayTier::LOWEST);
        }

        #[test]
        fn same_day_repeat_is_not_credited() {
            let mut model = ease_model();
            let card = ease_card(4.0, 1, DisplayTier::All, noon() - Duration::days(1));
            let first = model.review(&card, Rating::Good, &moment(noon())).unwrap();
            let later = moment(noon() + Duration::hours(2));
            let second = model.review(&first, Rating::Easy, &later).unwrap();
            assert_eq!(ease_of(&second), ease_of(&first));
            assert_eq!(second.display, first.display);
            assert_eq!(second.last_review, later.now);
        }

        #[test]
        fn same_day_failure_still_resets() {
            let mut model = ease_model();
            let card = ease_card(4.0, 1, DisplayTier::WordInitials, noon() - Duration::days(1));
            let first = model.review(&card, Rating::Good, &moment(noon())).unwrap();
            let second = model
                .review(&first, Rating::Again, &moment(noon() + Duration::hours(1)))
                .unwrap();
            assert_eq!(ease_of(&second).ease, 0.0);
            assert_eq!(second.display, DisplayTier::All);
        }

        #[test]
        fn learned_card_is_due_now_at_lowest_tier() {
            let mut model = ease_model();
            let at = moment(noon());
            let card = model.create("L1", Seed::Learned(Rating::Hard), &at);
            assert_eq!(card.due, noon());
            assert_eq!(card.display, DisplayTier::All);
            assert_eq!(ease_of(&card).streak, 0);
            assert!(model.is_due(&card, &at));
        }

        #[test]
        fn learning_day_success_is_credited() {
            let mut model = ease_model();
            let card = model.create("L1", Seed::Learned(Rating::Hard), &moment(noon()));
            let next = model
                .review(&card, Rating::Good, &moment(noon() + Duration::hours(1)))
                .unwrap();
            assert_eq!(ease_of(&next).ease, 3.0);
            assert_eq!(ease_of(&next).streak, 1);
        }

        #[test]
        fn success_after_same_day_failure_is_credited() {
            let mut model = ease_model();
            let card = ease_card(5.0, 2, DisplayTier::WordInitials, noon() - Duration::days(4));
            let failed = model.review(&card, Rating::Again, &moment(noon())).unwrap();
            assert_eq!(failed.due, noon());

            let later = moment(noon() + Duration::hours(1));
            let next = model.review(&failed, Rating::Easy, &later).unwrap();
            assert_eq!(ease_of(&next).ease, 3.0);
            assert_eq!(ease_of(&next).streak, 1);
            assert!(next.due > later.now);
            assert!(!model.is_due(&next, &later));

            // Now scheduled for a later day, so a further same-day success is a repeat
            let again_later = moment(noon() + Duration::hours(2));
            let repeat = model.review(&next, Rating::Easy, &again_later).unwrap();
            assert_eq!(ease_of(&repeat), ease_of(&next));
        }

        #[test]
        fn ingested_as_again_recovers_the_same_day() {
            let mut model = ease_model();
            let card = model.create("L1", Seed::Ingested(Rating::Again), &moment(noon()));
            assert_eq!(ease_of(&card).ease, 0.0);
            assert!(model.is_due(&card, &moment(noon())));

            let later = moment(noon() + Duration::hours(1));
            let next = model.review(&card, Rating::Easy, &later).unwrap();
            assert_eq!(ease_of(&next).ease, 3.0);
            assert!(!model.is_due(&next, &later));
        }

        #[test]
        fn ingested_card_follows_rating_table() {
            let mut model = ease_model();
            let card = model.create("L1", Seed::Ingested(Rating::Easy), &moment(noon()));
            assert_eq!(ease_of(&card).ease, 4.0);
            assert_eq!(card.display, DisplayTier::LineInitials);
            assert!(card.due >= noon());
        }

        #[test]
        fn interval_is_capped() {
            let mut model = ease_model();
            let at = moment(noon());
            for _ in 0..200 {
                let due = model.schedule(8.0, &at);
                assert!(due <= at.start_of_day_in(14));
                assert!(due >= at.now);
            }
        }

        #[test]
        fn ease_stays_clamped_and_due_never_precedes_review() {
            let mut model = ease_model();
            let mut ratings = rng(11);
            let mut now = noon();
            let config = EaseConfig::default();
            let mut card = model.create("L1", Seed::Ingested(Rating::Good), &moment(now));
            for _ in 0..1_000 {
                now += Duration::hours(ratings.gen_range(1..60));
                let rating = random_rating(&mut ratings);
                card = model.review(&card, rating, &moment(now)).unwrap();
                let ease = ease_of(&card).ease;
                assert!(ease >= config.min && ease <= config.max, "ease {}", ease);
                assert!(card.due >= now);
            }
        }

        #[test]
        fn due_is_day_granular() {
            let model = ease_model();
            let mut card = ease_card(3.0, 0, DisplayTier::All, noon() - Duration::days(1));
            card.due = noon() + Duration::hours(6);
            assert!(model.is_due(&card, &moment(noon())));
            card.due = noon() + Duration::hours(13);
            assert!(!model.is_due(&card, &moment(noon())));
        }

        #[test]
        fn rejects_fsrs_card() {
            let mut model = ease_model();
            let card = fsrs_model().create("L1", Seed::Learned(Rating::Hard), &moment(noon()));
            let err = model.review(&card, Rating::Good, &moment(noon())).unwrap_err();
            assert!(matches!(err, Error::SchemeMismatch { .. }));
        }
    }

    mod fsrs_tests {
        use super::*;

        #[test]
        fn learned_card_starts_warmup() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Learned(Rating::Hard), &moment(noon()));
            let state = fsrs_of(&card);
            assert_eq!(state.lifecycle, Lifecycle::Learning);
            assert_eq!(state.warmup, 0);
            assert_eq!(state.reps, 1);
            assert_eq!(card.display, DisplayTier::All);
            assert_eq!(card.due, noon() + Duration::minutes(10));
        }

        #[test]
        fn warmup_forces_same_day_then_next_day() {
            let mut model = fsrs_model();
            let mut now = noon();
            let card = model.create("L1", Seed::Learned(Rating::Hard), &moment(now));

            // Synthetic Again: back within the learning step, same day
            now += Duration::minutes(15);
            let first = model.review(&card, Rating::Easy, &moment(now)).unwrap();
            assert_eq!(fsrs_of(&first).warmup, 1);
            assert_eq!(fsrs_of(&first).lifecycle, Lifecycle::Learning);
            assert_eq!(first.due, now + Duration::minutes(10));

            // Synthetic Hard: tomorrow
            now += Duration::minutes(15);
            let second = model.review(&first, Rating::Easy, &moment(now)).unwrap();
            assert_eq!(fsrs_of(&second).warmup, 2);
            assert_eq!(second.due, moment(now).start_of_day_in(1));

            now = second.due + Duration::hours(9);
            let third = model.review(&second, Rating::Again, &moment(now)).unwrap();
            assert_eq!(fsrs_of(&third).lifecycle, Lifecycle::Learning);

            now = third.due + Duration::hours(9);
            let fourth = model.review(&third, Rating::Again, &moment(now)).unwrap();
            let state = fsrs_of(&fourth);
            assert_eq!(state.warmup, 4);
            assert_eq!(state.lifecycle, Lifecycle::Review);
            assert!(fourth.due >= moment(now).start_of_day_in(1));
        }

        #[test]
        fn user_rating_drives_display_during_warmup() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Learned(Rating::Hard), &moment(noon()));
            let next = model
                .review(&card, Rating::Good, &moment(noon() + Duration::minutes(20)))
                .unwrap();
            assert_eq!(fsrs_of(&next).streak, 1);
        }

        #[test]
        fn ingested_card_skips_warmup() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Ingested(Rating::Good), &moment(noon()));
            let state = fsrs_of(&card);
            assert_eq!(state.warmup, 4);
            assert_eq!(state.lifecycle, Lifecycle::Review);
            assert_eq!(card.display, DisplayTier::WordInitials);
            assert!(card.due >= moment(noon()).start_of_day_in(1));
        }

        #[test]
        fn lapse_moves_to_relearning() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Ingested(Rating::Good), &moment(noon()));
            let later = card.due + Duration::hours(10);
            let next = model.review(&card, Rating::Again, &moment(later)).unwrap();
            let state = fsrs_of(&next);
            assert_eq!(state.lifecycle, Lifecycle::Relearning);
            assert_eq!(state.lapses, 1);
            assert_eq!(next.display, DisplayTier::All);
            assert!(state.stability <= fsrs_of(&card).stability);
            assert_eq!(next.due, later + Duration::minutes(10));
        }

        #[test]
        fn relearning_recovers_with_good() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Ingested(Rating::Good), &moment(noon()));
            let lapse_at = card.due + Duration::hours(10);
            let lapsed = model.review(&card, Rating::Again, &moment(lapse_at)).unwrap();
            let recovered = model
                .review(&lapsed, Rating::Good, &moment(lapse_at + Duration::minutes(30)))
                .unwrap();
            assert_eq!(fsrs_of(&recovered).lifecycle, Lifecycle::Review);
        }

        #[test]
        fn successful_review_grows_stability() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Ingested(Rating::Good), &moment(noon()));
            let next = model
                .review(&card, Rating::Good, &moment(card.due + Duration::hours(10)))
                .unwrap();
            assert!(fsrs_of(&next).stability > fsrs_of(&card).stability);
        }

        #[test]
        fn easy_lowers_difficulty_again_raises_it() {
            let model = fsrs_model();
            assert!(model.next_difficulty(5.0, Rating::Easy) < 5.0);
            assert!(model.next_difficulty(5.0, Rating::Again) > 5.0);
        }

        #[test]
        fn difficulty_stays_clamped_and_due_never_precedes_review() {
            let mut model = fsrs_model();
            let mut ratings = rng(5);
            let mut now = noon();
            let mut card = model.create("L1", Seed::Learned(Rating::Hard), &moment(now));
            for _ in 0..1_000 {
                now += Duration::hours(ratings.gen_range(1..200));
                let rating = random_rating(&mut ratings);
                card = model.review(&card, rating, &moment(now)).unwrap();
                let state = fsrs_of(&card);
                assert!(
                    (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&state.difficulty),
                    "difficulty {}",
                    state.difficulty
                );
                assert!(state.stability >= MIN_STABILITY);
                assert!(card.due >= now);
            }
        }

        #[test]
        fn default_retention_interval_tracks_stability() {
            let model = fsrs_model();
            assert_eq!(model.interval_days(10.0), 10);
            assert_eq!(model.interval_days(0.2), 1);
        }

        #[test]
        fn rejects_short_weight_vector() {
            let config = FsrsConfig {
                weights: Some(vec![0.5; 4]),
                ..FsrsConfig::default()
            };
            assert!(FsrsModel::new(config, fixed_ladder(3), rng(1)).is_err());
        }

        #[test]
        fn due_is_instant_granular() {
            let mut model = fsrs_model();
            let card = model.create("L1", Seed::Learned(Rating::Hard), &moment(noon()));
            assert!(!model.is_due(&card, &moment(noon() + Duration::minutes(9))));
            assert!(model.is_due(&card, &moment(noon() + Duration::minutes(10))));
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn builds_configured_scheme() {
            let mut config = Config::default();
            assert_eq!(build(&config, Some(1)).unwrap().scheme(), Scheme::Ease);
            config.scheme = Scheme::Fsrs;
            assert_eq!(build(&config, Some(1)).unwrap().scheme(), Scheme::Fsrs);
        }
    }
}
