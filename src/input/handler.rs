use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Playback speed of the visualizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackSpeed {
    /// 2 Hz
    Slow,
    /// 8 Hz
    #[default]
    Normal,
    /// 20 Hz
    Fast,
    /// ~60 Hz
    VeryFast,
}

impl PlaybackSpeed {
    pub fn tick_interval(&self) -> Duration {
        match self {
            Self::Slow => Duration::from_millis(500),
            Self::Normal => Duration::from_millis(125),
            Self::Fast => Duration::from_millis(50),
            Self::VeryFast => Duration::from_millis(16),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "Slow",
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::VeryFast => "Very Fast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    Restart,
    SetSpeed(PlaybackSpeed),
    Quit,
    None,
}

pub struct InputHandler;

impl InputHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> KeyAction {
        // Raw mode swallows SIGINT, so Ctrl+C arrives as a key
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }

        match key.code {
            KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => KeyAction::TogglePause,
            KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Restart,

            KeyCode::Char('1') => KeyAction::SetSpeed(PlaybackSpeed::Slow),
            KeyCode::Char('2') => KeyAction::SetSpeed(PlaybackSpeed::Normal),
            KeyCode::Char('3') => KeyAction::SetSpeed(PlaybackSpeed::Fast),
            KeyCode::Char('4') => KeyAction::SetSpeed(PlaybackSpeed::VeryFast),

            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,

            _ => KeyAction::None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_speed_keys() {
        let handler = InputHandler::new();

        assert_eq!(
            handler.handle_key_event(press(KeyCode::Char('1'))),
            KeyAction::SetSpeed(PlaybackSpeed::Slow)
        );
        assert_eq!(
            handler.handle_key_event(press(KeyCode::Char('4'))),
            KeyAction::SetSpeed(PlaybackSpeed::VeryFast)
        );
    }

    #[test]
    fn test_speed_intervals() {
        assert_eq!(PlaybackSpeed::Slow.tick_interval(), Duration::from_millis(500));
        assert_eq!(PlaybackSpeed::default().tick_interval(), Duration::from_millis(125));
        assert!(PlaybackSpeed::VeryFast.tick_interval() < PlaybackSpeed::Fast.tick_interval());
    }

    #[test]
    fn test_pause_and_restart() {
        let handler = InputHandler::new();

        assert_eq!(handler.handle_key_event(press(KeyCode::Char(' '))), KeyAction::TogglePause);
        assert_eq!(
            handler.handle_key_event(KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT)),
            KeyAction::Restart
        );
    }

    #[test]
    fn test_quit_keys() {
        let handler = InputHandler::new();

        assert_eq!(handler.handle_key_event(press(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(handler.handle_key_event(press(KeyCode::Esc)), KeyAction::Quit);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handler.handle_key_event(ctrl_c), KeyAction::Quit);
    }

    #[test]
    fn test_unknown_key() {
        let handler = InputHandler::new();
        assert_eq!(handler.handle_key_event(press(KeyCode::Char('x'))), KeyAction::None);
        assert_eq!(handler.handle_key_event(press(KeyCode::Up)), KeyAction::None);
    }
}
