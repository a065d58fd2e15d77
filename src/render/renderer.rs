use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::game::{GameState, Position};
use crate::input::PlaybackSpeed;
use crate::metrics::{SessionMetrics, format_clock};

/// Playback details shown next to the board
#[derive(Debug, Clone, Copy)]
pub struct PlaybackStatus<'a> {
    pub representation: &'a str,
    pub states: usize,
    pub speed: PlaybackSpeed,
    pub paused: bool,
    /// Exploration rate while the agent learns; `None` when it only plays
    pub epsilon: Option<f64>,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        state: &GameState,
        metrics: &SessionMetrics,
        status: &PlaybackStatus<'_>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(3), // Footer
            ])
            .split(frame.area());

        frame.render_widget(self.render_stats(state, metrics, status), chunks[0]);

        let game_area = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(10),
                Constraint::Percentage(80),
                Constraint::Percentage(10),
            ])
            .split(chunks[1])[1];

        if state.is_alive {
            frame.render_widget(self.render_grid(state), game_area);
        } else {
            frame.render_widget(self.render_game_over(state), game_area);
        }

        frame.render_widget(self.render_controls(), chunks[2]);
    }

    fn render_grid(&self, state: &GameState) -> Paragraph<'_> {
        let mut lines = Vec::with_capacity(state.grid.height);

        for y in 0..state.grid.height {
            let mut spans = Vec::with_capacity(state.grid.width);

            for x in 0..state.grid.width {
                let pos = Position::new(x as i32, y as i32);

                let cell = if pos == state.snake.head() {
                    Span::styled(
                        "■ ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                } else if state.snake.body_segments().contains(&pos) {
                    Span::styled("□ ", Style::default().fg(Color::Green))
                } else if pos == state.food {
                    Span::styled(
                        "O ",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::styled(". ", Style::default().fg(Color::DarkGray))
                };

                spans.push(cell);
            }

            lines.push(Line::from(spans));
        }

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(Color::White))
                    .title(" Snake "),
            )
            .alignment(Alignment::Center)
    }

    fn render_stats(
        &self,
        state: &GameState,
        metrics: &SessionMetrics,
        status: &PlaybackStatus<'_>,
    ) -> Paragraph<'_> {
        let label = Style::default().fg(Color::Yellow);
        let value = Style::default().fg(Color::White);
        let last = metrics
            .last_end()
            .map_or_else(|| "-".to_string(), |(score, reason)| format!("{reason} ({score})"));
        let agent = match status.epsilon {
            Some(epsilon) => format!("learning, ε {epsilon:.3}"),
            None => "greedy".to_string(),
        };

        let text = vec![
            Line::from(vec![
                Span::styled("Game: ", label),
                Span::styled(metrics.current_game().to_string(), value),
                Span::raw("    "),
                Span::styled("Score: ", label),
                Span::styled(
                    state.score.to_string(),
                    value.add_modifier(Modifier::BOLD),
                ),
                Span::raw("    "),
                Span::styled("Best: ", label),
                Span::styled(metrics.best_score().to_string(), value),
                Span::raw("    "),
                Span::styled("Avg: ", label),
                Span::styled(format!("{:.1}", metrics.mean_score()), value),
                Span::raw("    "),
                Span::styled("Steps: ", label),
                Span::styled(state.steps.to_string(), value),
                Span::raw("    "),
                Span::styled("Time: ", label),
                Span::styled(format_clock(metrics.game_time()), value),
            ]),
            Line::from(vec![
                Span::styled("Policy: ", label),
                Span::styled(
                    format!(
                        "{} ({} states, {agent})",
                        status.representation, status.states
                    ),
                    value,
                ),
                Span::raw("    "),
                Span::styled("Last: ", label),
                Span::styled(last, value),
                Span::raw("    "),
                Span::styled("Speed: ", label),
                Span::styled(status.speed.as_str(), value),
                if status.paused {
                    Span::styled(
                        "    PAUSED",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("")
                },
            ]),
        ];

        Paragraph::new(text).alignment(Alignment::Center)
    }

    fn render_game_over(&self, state: &GameState) -> Paragraph<'_> {
        let reason = state.reason.map_or("unknown", |r| r.as_str());
        let text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "GAME OVER",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Final Score: ", Style::default().fg(Color::Yellow)),
                Span::styled(
                    state.score.to_string(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("    "),
                Span::styled("Reason: ", Style::default().fg(Color::Yellow)),
                Span::styled(reason, Style::default().fg(Color::White)),
            ]),
        ];

        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
    }

    fn render_controls(&self) -> Paragraph<'_> {
        let key = Style::default().fg(Color::Cyan);
        let text = vec![Line::from(vec![
            Span::styled("Space", key),
            Span::raw(" pause | "),
            Span::styled("R", key),
            Span::raw(" restart | "),
            Span::styled("1-4", key),
            Span::raw(" speed | "),
            Span::styled("Q", Style::default().fg(Color::Red)),
            Span::raw(" quit"),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
