pub mod renderer;

pub use renderer::{PlaybackStatus, Renderer};
