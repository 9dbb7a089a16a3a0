pub mod engine;
pub mod runner;

pub use engine::{
    MousePosition, PlaybackEngine, PlaybackError, PlaybackPhase, PlaybackState, RenderedFrame,
    ScrollPosition,
};
pub use runner::{spawn_player, PlaybackFrame, PlaybackHandle, PlayerCommand};
