mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

use crate::db::CardStore;
use crate::error::Result;
use crate::models::{DisplayTier, Rating};
use crate::planner::{Cue, Drill, Planner, Round};
use crate::scheduler::{Scheduler, Stats};
use crate::script::{LineSource, Script};

const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Menu,
    Drill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Waiting,
    Current,
    Rated(Rating),
}

pub struct ShownLine {
    pub id: String,
    pub text: String,
    pub display: DisplayTier,
    pub state: LineState,
}

/// Everything the draw functions read.
pub struct View {
    pub mode: Mode,
    pub title: String,
    pub lines: Vec<ShownLine>,
    pub status: String,
    pub stats: Option<Stats>,
}

/// Which single round a non-session command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundKind {
    Learn,
    Ingest,
    Review,
    Scene(String),
}

impl RoundKind {
    fn label(&self) -> &'static str {
        match self {
            RoundKind::Learn => "Learn",
            RoundKind::Ingest => "Ingest",
            RoundKind::Review => "Review",
            RoundKind::Scene(_) => "Scene",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrillKey {
    Rate(Rating),
    Peek,
    Abandon,
}

fn drill_key(code: KeyCode, modifiers: KeyModifiers) -> Option<DrillKey> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(DrillKey::Abandon),
        KeyCode::Char('1') | KeyCode::Char('a') => Some(DrillKey::Rate(Rating::Again)),
        KeyCode::Char('2') | KeyCode::Char('h') => Some(DrillKey::Rate(Rating::Hard)),
        KeyCode::Char('3') | KeyCode::Char('g') => Some(DrillKey::Rate(Rating::Good)),
        KeyCode::Char('4') | KeyCode::Char('e') => Some(DrillKey::Rate(Rating::Easy)),
        KeyCode::Char(' ') => Some(DrillKey::Peek),
        KeyCode::Char('q') | KeyCode::Esc => Some(DrillKey::Abandon),
        _ => None,
    }
}

fn menu_key(code: KeyCode, modifiers: KeyModifiers) -> Option<MenuAction> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(MenuAction::Quit),
        KeyCode::Char('l') => Some(MenuAction::Round(RoundKind::Learn)),
        KeyCode::Char('i') => Some(MenuAction::Round(RoundKind::Ingest)),
        KeyCode::Char('r') => Some(MenuAction::Round(RoundKind::Review)),
        KeyCode::Char('s') => Some(MenuAction::Scene),
        KeyCode::Char('q') | KeyCode::Esc => Some(MenuAction::Quit),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MenuAction {
    Round(RoundKind),
    /// Run-through of the scene holding the last drilled line.
    Scene,
    Quit,
}

/// The terminal, drawn from a [`View`] and driven as a [`Drill`].
pub struct Screen {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    script: Script,
    view: View,
}

impl Screen {
    fn open(script: Script) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            script,
            view: View {
                mode: Mode::Menu,
                title: String::new(),
                lines: Vec::new(),
                status: String::new(),
                stats: None,
            },
        })
    }

    fn close(mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let view = &self.view;
        self.terminal.draw(|f| ui::draw(f, view))?;
        Ok(())
    }

    // Blocks until a key press arrives.
    fn next_key(&mut self) -> Result<(KeyCode, KeyModifiers)> {
        loop {
            if event::poll(POLL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        return Ok((key.code, key.modifiers));
                    }
                }
            }
        }
    }

    fn shown(&mut self, id: &str) -> Option<&mut ShownLine> {
        self.view.lines.iter_mut().rev().find(|l| l.id == id)
    }
}

impl Drill for Screen {
    fn present(&mut self, cues: &[Cue]) -> Result<()> {
        self.view.mode = Mode::Drill;
        self.view.lines = cues
            .iter()
            .map(|cue| ShownLine {
                id: cue.id.clone(),
                text: self.script.text(&cue.id).unwrap_or_default().to_string(),
                display: cue.display,
                state: LineState::Waiting,
            })
            .collect();
        self.draw()
    }

    fn rate(&mut self, line: &str, hint: DisplayTier) -> Result<Option<Rating>> {
        if let Some(shown) = self.shown(line) {
            shown.display = hint;
            shown.state = LineState::Current;
        }
        loop {
            self.draw()?;
            let (code, modifiers) = self.next_key()?;
            match drill_key(code, modifiers) {
                Some(DrillKey::Rate(rating)) => {
                    if let Some(shown) = self.shown(line) {
                        shown.state = LineState::Rated(rating);
                    }
                    return Ok(Some(rating));
                }
                Some(DrillKey::Peek) => {
                    if let Some(shown) = self.shown(line) {
                        shown.display = shown.display.reveal();
                    }
                }
                Some(DrillKey::Abandon) => return Ok(None),
                None => {}
            }
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.view.mode = Mode::Menu;
        self.view.lines.clear();
        self.draw()
    }
}

/// Runs one round on the alternate screen and restores the terminal
/// whatever the outcome.
pub fn run_round<S: CardStore, L: LineSource>(
    scheduler: &mut Scheduler<S, L>,
    planner: &Planner,
    script: Script,
    kind: RoundKind,
) -> Result<Round> {
    let mut screen = Screen::open(script)?;
    screen.view.title = kind.label().to_string();
    let result = play(scheduler, planner, &mut screen, &kind);
    screen.close()?;
    result
}

/// The interactive loop: prunes orphans once, then runs rounds until quit.
/// A failed round is logged and shown; the loop carries on.
pub fn run_session<S: CardStore, L: LineSource>(
    scheduler: &mut Scheduler<S, L>,
    planner: &Planner,
    script: Script,
) -> Result<()> {
    let pruned = scheduler.prune_orphaned_lines()?;
    let due = scheduler.any_due(&scheduler.lines().all_line_ids())?;
    let mut screen = Screen::open(script)?;
    screen.view.status = opening_status(pruned.len(), due);
    let result = session_loop(scheduler, planner, &mut screen);
    screen.close()?;
    result
}

fn session_loop<S: CardStore, L: LineSource>(
    scheduler: &mut Scheduler<S, L>,
    planner: &Planner,
    screen: &mut Screen,
) -> Result<()> {
    let mut cursor: Option<String> = None;
    loop {
        screen.view.mode = Mode::Menu;
        screen.view.title = "Session".into();
        match scheduler.log_stats() {
            Ok(stats) => screen.view.stats = Some(stats),
            Err(e) => error!(error = %e, "could not gather stats"),
        }
        screen.draw()?;

        let (code, modifiers) = screen.next_key()?;
        let kind = match menu_key(code, modifiers) {
            Some(MenuAction::Quit) => return Ok(()),
            Some(MenuAction::Round(kind)) => kind,
            Some(MenuAction::Scene) => match &cursor {
                Some(line) => RoundKind::Scene(line.clone()),
                None => {
                    screen.view.status = "Drill something first to pick a scene".into();
                    continue;
                }
            },
            None => continue,
        };

        screen.view.title = kind.label().to_string();
        screen.view.status = match play(scheduler, planner, screen, &kind) {
            Ok(round) => {
                if let Round::Completed(summary) | Round::Abandoned(summary) = &round {
                    if summary.cursor.is_some() {
                        cursor = summary.cursor.clone();
                    }
                }
                describe(&kind, &round)
            }
            Err(e) => {
                error!(error = %e, round = kind.label(), "round failed");
                format!("{} failed: {}", kind.label(), e)
            }
        };
    }
}

fn play<S: CardStore, L: LineSource>(
    scheduler: &mut Scheduler<S, L>,
    planner: &Planner,
    screen: &mut Screen,
    kind: &RoundKind,
) -> Result<Round> {
    let round = match kind {
        RoundKind::Learn => planner.learn(scheduler, screen)?,
        RoundKind::Ingest => planner.ingest(scheduler, screen)?,
        RoundKind::Review => planner.review(scheduler, screen)?,
        RoundKind::Scene(line) => planner.review_scene(scheduler, screen, line)?,
    };
    info!(round = kind.label(), outcome = ?round, "round finished");
    Ok(round)
}

fn opening_status(pruned: usize, due: bool) -> String {
    let mut parts = Vec::new();
    if pruned > 0 {
        parts.push(format!("Pruned {} orphaned line(s)", pruned));
    }
    if due {
        parts.push("Lines are due, press r to review".to_string());
    }
    parts.join(". ")
}

fn describe(kind: &RoundKind, round: &Round) -> String {
    match (kind, round) {
        (RoundKind::Learn | RoundKind::Ingest, Round::Idle) => "Nothing left to learn".into(),
        (_, Round::Idle) => "Nothing due for review".into(),
        (_, Round::Completed(s)) => format!(
            "{}: {} drilled, {} recorded",
            kind.label(),
            s.drilled,
            s.recorded
        ),
        (_, Round::Abandoned(s)) => format!(
            "{} abandoned after {} recorded",
            kind.label(),
            s.recorded
        ),
    }
}
