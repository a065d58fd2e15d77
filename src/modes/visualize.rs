//! Terminal board view
//!
//! Shows the agent playing in the terminal. In the default mode the stored
//! Q-table is loaded read-only and played greedily. With
//! [`VisualizeMode::learning`] the agent trains while it plays: every move
//! updates the table, saves happen on the training cadence, and the table is
//! flushed when the view closes. Finished games restart automatically.
//!
//! # Controls
//!
//! - Space/P: Pause/unpause
//! - R: Restart the game
//! - 1-4: Speed control (1=slow, 2=normal, 3=fast, 4=very fast)
//! - Q/Esc: Quit

use std::io::{Stderr, stderr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::time::{Interval, interval};

use super::{EpisodeOutcome, EvaluateMode, TrainMode};
use crate::config::Settings;
use crate::game::GameState;
use crate::input::{InputHandler, KeyAction, PlaybackSpeed};
use crate::metrics::SessionMetrics;
use crate::render::{PlaybackStatus, Renderer};

/// Who is at the controls
enum Player {
    /// Stored policy, never updated
    Greedy(EvaluateMode),
    /// Learning agent; owns the table flush
    Learning(Box<TrainMode>),
}

impl Player {
    fn state(&self) -> &GameState {
        match self {
            Player::Greedy(mode) => mode.state(),
            Player::Learning(mode) => mode.state(),
        }
    }

    fn step(&mut self) -> Option<EpisodeOutcome> {
        match self {
            Player::Greedy(mode) => mode.step(),
            Player::Learning(mode) => mode.step(),
        }
    }

    fn start_episode(&mut self) {
        match self {
            Player::Greedy(mode) => mode.start_episode(),
            Player::Learning(mode) => mode.start_episode(),
        }
    }

    fn states(&self) -> usize {
        match self {
            Player::Greedy(mode) => mode.agent().table_len(),
            Player::Learning(mode) => mode.agent().table_len(),
        }
    }

    fn epsilon(&self) -> Option<f64> {
        match self {
            Player::Greedy(_) => None,
            Player::Learning(mode) => Some(mode.agent().epsilon()),
        }
    }

    /// Training budget spent
    fn done(&self) -> bool {
        match self {
            Player::Greedy(_) => false,
            Player::Learning(mode) => mode.budget_exhausted(),
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            Player::Greedy(_) => Ok(()),
            Player::Learning(mode) => mode.finish().map(drop),
        }
    }
}

/// Terminal view of an agent playing
pub struct VisualizeMode {
    player: Player,
    representation: &'static str,
    renderer: Renderer,
    input: InputHandler,
    metrics: SessionMetrics,
    should_quit: bool,
    paused: bool,
    speed: PlaybackSpeed,
}

impl VisualizeMode {
    /// Watch the stored policy play greedily
    pub fn new(settings: &Settings) -> Result<Self> {
        let mode = EvaluateMode::new(settings.clone())?;

        println!("{}", "=".repeat(60));
        println!("Loaded Policy");
        println!("{}", "=".repeat(60));
        println!("Q-table: {:?}", settings.qvalues_path());
        println!("Representation: {}", settings.state_representation);
        println!("States: {}", mode.agent().table_len());
        println!("{}", "=".repeat(60));
        println!();

        Ok(Self::with_player(Player::Greedy(mode), settings))
    }

    /// Watch the agent learn; the run ends on quit, interrupt or budget
    pub fn learning(settings: &Settings) -> Result<Self> {
        let mode = TrainMode::new(settings.clone())?;
        mode.print_header();

        Ok(Self::with_player(Player::Learning(Box::new(mode)), settings))
    }

    fn with_player(player: Player, settings: &Settings) -> Self {
        Self {
            player,
            representation: settings.state_representation.name(),
            renderer: Renderer::new(),
            input: InputHandler::new(),
            metrics: SessionMetrics::new(),
            should_quit: false,
            paused: false,
            speed: PlaybackSpeed::default(),
        }
    }

    /// Run the visualization loop
    ///
    /// Sets up the terminal, plays until the user quits or `stop` is set,
    /// and restores the terminal on the way out. A learning agent makes its
    /// final save last.
    pub async fn run(mut self, stop: &AtomicBool) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        let result = self.run_visualization_loop(&mut terminal, stop).await;

        self.cleanup_terminal(&mut terminal)?;

        result?;
        self.player.finish()
    }

    async fn run_visualization_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
        stop: &AtomicBool,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();
        let mut tick_timer = interval(self.speed.tick_interval());

        // Render at 30 FPS
        let mut render_timer = interval(Duration::from_millis(33));

        self.metrics.start_game();

        loop {
            tokio::select! {
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event, &mut tick_timer);
                    }
                }

                _ = tick_timer.tick() => {
                    if !self.paused {
                        self.tick();
                    }
                }

                _ = render_timer.tick() => {
                    terminal.draw(|frame| {
                        let status = PlaybackStatus {
                            representation: self.representation,
                            states: self.player.states(),
                            speed: self.speed,
                            paused: self.paused,
                            epsilon: self.player.epsilon(),
                        };
                        self.renderer.render(frame, self.player.state(), &self.metrics, &status);
                    }).context("Failed to draw frame")?;
                }
            }

            if self.should_quit || stop.load(Ordering::Relaxed) {
                break;
            }
        }

        Ok(())
    }

    /// Advance the game by one move, or start the next game
    fn tick(&mut self) {
        if !self.player.state().is_alive {
            if self.player.done() {
                self.should_quit = true;
                return;
            }
            self.restart();
            return;
        }

        if let Some(outcome) = self.player.step() {
            self.metrics.finish_game(outcome.score, outcome.reason);
        }
    }

    fn restart(&mut self) {
        self.player.start_episode();
        self.metrics.start_game();
    }

    fn handle_event(&mut self, event: Event, tick_timer: &mut Interval) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        match self.input.handle_key_event(key) {
            KeyAction::Quit => self.should_quit = true,
            KeyAction::TogglePause => self.paused = !self.paused,
            KeyAction::Restart => self.restart(),
            KeyAction::SetSpeed(speed) => {
                self.speed = speed;
                tick_timer.reset_after(speed.tick_interval());
            }
            KeyAction::None => {}
        }
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}
