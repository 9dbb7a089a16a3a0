use crate::timeline::{ClickSample, SessionTimeline};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Lifecycle of a replay: `Idle → Playing ⇄ Paused → Finished`.
///
/// `Finished` is entered when the virtual clock reaches the timeline's
/// duration while playing, and is left only through `seek` or `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Playing,
    Paused,
    Finished,
}

/// Snapshot of the transport controls, mirrored to the player UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MousePosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

/// The reconstructed visual state at one virtual time: interpolated mouse
/// position plus the last-seen click and scroll ("last value wins").
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub time: f64,
    pub mouse: Option<MousePosition>,
    pub click: Option<ClickSample>,
    pub scroll: Option<ScrollPosition>,
}

/// Virtual-clock state machine over one loaded timeline.
///
/// Pure and synchronous; the async tick loop lives in
/// [`super::runner`]. The engine owns its timeline exclusively.
pub struct PlaybackEngine {
    timeline: SessionTimeline,
    phase: PlaybackPhase,
    current_time: f64,
    speed: f64,
    // Last expressed play/pause intent, used when seeking out of Finished.
    wants_playing: bool,
}

impl PlaybackEngine {
    pub fn new(timeline: SessionTimeline) -> Self {
        Self {
            timeline,
            phase: PlaybackPhase::Idle,
            current_time: 0.0,
            speed: 1.0,
            wants_playing: false,
        }
    }

    pub fn timeline(&self) -> &SessionTimeline {
        &self.timeline
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.phase == PlaybackPhase::Playing,
            current_time: self.current_time,
            duration: self.timeline.duration(),
            speed: self.speed,
        }
    }

    /// Start or resume playback. From `Finished`, restarts from 0. No-op if
    /// already playing.
    pub fn play(&mut self) {
        self.wants_playing = true;
        match self.phase {
            PlaybackPhase::Playing => {}
            PlaybackPhase::Finished => {
                self.current_time = 0.0;
                self.phase = PlaybackPhase::Playing;
            }
            PlaybackPhase::Idle | PlaybackPhase::Paused => {
                self.phase = PlaybackPhase::Playing;
            }
        }
    }

    /// Hold the clock. Only valid from `Playing`; a no-op otherwise, so
    /// pausing an `Idle` engine leaves it `Idle`.
    pub fn pause(&mut self) {
        if self.phase == PlaybackPhase::Playing {
            self.phase = PlaybackPhase::Paused;
        }
        self.wants_playing = false;
    }

    /// Jump the clock to `t`, clamped to `[0, duration]`. A non-finite `t`
    /// is ignored; NaN would pass through `clamp` and poison the clock. Does
    /// not change the play/pause intent; leaving `Finished`, the engine
    /// resumes `Playing` or `Paused` according to that intent.
    pub fn seek(&mut self, t: f64) {
        if !t.is_finite() {
            return;
        }
        self.current_time = t.clamp(0.0, self.timeline.duration());
        if self.phase == PlaybackPhase::Finished && self.current_time < self.timeline.duration() {
            self.phase = if self.wants_playing {
                PlaybackPhase::Playing
            } else {
                PlaybackPhase::Paused
            };
        }
    }

    /// Set the wall-clock multiplier. Takes effect on the next tick, never
    /// retroactively.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), PlaybackError> {
        if !(speed > 0.0) || !speed.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed must be a positive number, got {}",
                speed
            )));
        }
        self.speed = speed;
        Ok(())
    }

    /// Advance the virtual clock by `speed × elapsed`. Only moves while
    /// `Playing`; reaching the end transitions to `Finished`.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        self.current_time += self.speed * elapsed.as_secs_f64() * 1000.0;
        if self.current_time >= self.timeline.duration() {
            self.current_time = self.timeline.duration();
            self.phase = PlaybackPhase::Finished;
        }
    }

    /// The rendered frame at the current virtual time.
    pub fn current_frame(&self) -> RenderedFrame {
        self.sample_at(self.current_time)
    }

    /// Reconstruct the visual state at virtual time `t`.
    ///
    /// Mouse position is linearly interpolated between the two samples
    /// bracketing `t`; outside the captured range it clamps to the nearest
    /// sample, so a timeline with capture gaps degrades to "last known
    /// state held" instead of jumping. Clicks and scrolls are discrete state
    /// changes: the most recent sample at or before `t` wins.
    pub fn sample_at(&self, t: f64) -> RenderedFrame {
        RenderedFrame {
            time: t,
            mouse: self.mouse_at(t),
            click: self.click_at(t),
            scroll: self.scroll_at(t),
        }
    }

    fn mouse_at(&self, t: f64) -> Option<MousePosition> {
        let track = self.timeline.mouse_track();
        if track.is_empty() {
            return None;
        }

        // Index of the first sample strictly after t.
        let next = track.partition_point(|sample| sample.offset <= t);
        if next == 0 {
            let first = &track[0];
            return Some(MousePosition {
                x: first.x,
                y: first.y,
            });
        }
        if next == track.len() {
            let last = &track[track.len() - 1];
            return Some(MousePosition {
                x: last.x,
                y: last.y,
            });
        }

        let p0 = &track[next - 1];
        let p1 = &track[next];
        let span = p1.offset - p0.offset;
        if span <= f64::EPSILON {
            return Some(MousePosition { x: p0.x, y: p0.y });
        }
        let frac = (t - p0.offset) / span;
        Some(MousePosition {
            x: p0.x + (p1.x - p0.x) * frac,
            y: p0.y + (p1.y - p0.y) * frac,
        })
    }

    fn click_at(&self, t: f64) -> Option<ClickSample> {
        let track = self.timeline.click_track();
        let idx = track.partition_point(|sample| sample.offset <= t);
        if idx == 0 {
            None
        } else {
            Some(track[idx - 1].clone())
        }
    }

    fn scroll_at(&self, t: f64) -> Option<ScrollPosition> {
        let track = self.timeline.scroll_track();
        let idx = track.partition_point(|sample| sample.offset <= t);
        if idx == 0 {
            None
        } else {
            let sample = &track[idx - 1];
            Some(ScrollPosition {
                x: sample.x,
                y: sample.y,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClickData, InteractionEvent, MouseMoveData, ScrollData, Session};
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: "s1".to_string(),
            website_id: "w1".to_string(),
            started_at: Utc::now(),
        }
    }

    fn mouse_move(timestamp: i64, x: f64, y: f64) -> InteractionEvent {
        InteractionEvent::MouseMove {
            timestamp,
            data: MouseMoveData { x, y },
        }
    }

    fn click(timestamp: i64, x: f64, y: f64, target: &str) -> InteractionEvent {
        InteractionEvent::Click {
            timestamp,
            data: ClickData {
                x,
                y,
                target: target.to_string(),
            },
        }
    }

    fn scroll(timestamp: i64, y: f64) -> InteractionEvent {
        InteractionEvent::Scroll {
            timestamp,
            data: ScrollData {
                scroll_x: 0.0,
                scroll_y: y,
            },
        }
    }

    fn engine_with(events: Vec<InteractionEvent>) -> PlaybackEngine {
        PlaybackEngine::new(SessionTimeline::from_events(session(), events))
    }

    /// Timeline from the worked scenario: MouseMove@0 (0,0), MouseMove@100
    /// (100,0), Click@150 on #btn.
    fn scenario_engine() -> PlaybackEngine {
        engine_with(vec![
            mouse_move(0, 0.0, 0.0),
            mouse_move(100, 100.0, 0.0),
            click(150, 100.0, 0.0, "#btn"),
        ])
    }

    #[test]
    fn test_initial_state_is_idle() {
        let engine = scenario_engine();
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        let state = engine.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 150.0);
        assert_eq!(state.speed, 1.0);
    }

    #[test]
    fn test_interpolation_midpoint() {
        let engine = scenario_engine();

        let frame = engine.sample_at(50.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 50.0, y: 0.0 }));
        assert!(frame.click.is_none());

        let frame = engine.sample_at(150.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 100.0, y: 0.0 }));
        assert_eq!(frame.click.as_ref().unwrap().target, "#btn");

        // Past the last sample: same rendered state, held.
        let late = engine.sample_at(200.0);
        assert_eq!(late.mouse, frame.mouse);
        assert_eq!(late.click, frame.click);
    }

    #[test]
    fn test_interpolation_clamps_before_first_and_after_last() {
        let engine = engine_with(vec![
            mouse_move(100, 10.0, 20.0),
            mouse_move(200, 30.0, 40.0),
            click(0, 0.0, 0.0, "#early"),
        ]);

        // Before the first mouse sample: first position unchanged.
        let frame = engine.sample_at(0.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 10.0, y: 20.0 }));

        // After the last: last position unchanged.
        let frame = engine.sample_at(500.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 30.0, y: 40.0 }));
    }

    #[test]
    fn test_sample_at_is_idempotent() {
        let engine = scenario_engine();
        let a = engine.sample_at(75.0);
        let b = engine.sample_at(75.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_samples_tolerated() {
        // At-least-once delivery can duplicate an event; the duplicate is a
        // redundant interpolation point, not an error.
        let engine = engine_with(vec![
            mouse_move(0, 0.0, 0.0),
            mouse_move(100, 100.0, 0.0),
            mouse_move(100, 100.0, 0.0),
        ]);
        let frame = engine.sample_at(100.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 100.0, y: 0.0 }));
        let frame = engine.sample_at(50.0);
        assert_eq!(frame.mouse, Some(MousePosition { x: 50.0, y: 0.0 }));
    }

    #[test]
    fn test_scroll_last_value_wins() {
        let engine = engine_with(vec![scroll(0, 50.0), scroll(100, 200.0)]);

        assert_eq!(
            engine.sample_at(99.0).scroll,
            Some(ScrollPosition { x: 0.0, y: 50.0 })
        );
        assert_eq!(
            engine.sample_at(100.0).scroll,
            Some(ScrollPosition { x: 0.0, y: 200.0 })
        );
    }

    #[test]
    fn test_no_samples_yields_empty_frame() {
        let engine = engine_with(vec![]);
        let frame = engine.sample_at(0.0);
        assert!(frame.mouse.is_none());
        assert!(frame.click.is_none());
        assert!(frame.scroll.is_none());
    }

    #[test]
    fn test_pause_from_idle_is_noop() {
        let mut engine = scenario_engine();
        engine.pause();
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(!engine.state().is_playing);
    }

    #[test]
    fn test_play_seek_to_end_then_tick_finishes() {
        let mut engine = scenario_engine();
        engine.play();
        engine.seek(engine.state().duration);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);

        engine.advance(Duration::from_millis(1));
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.state().current_time, 150.0);
    }

    #[test]
    fn test_play_from_finished_restarts() {
        let mut engine = scenario_engine();
        engine.play();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.phase(), PlaybackPhase::Finished);

        engine.play();
        assert_eq!(engine.phase(), PlaybackPhase::Playing);
        assert_eq!(engine.state().current_time, 0.0);
    }

    #[test]
    fn test_seek_out_of_finished_respects_intent() {
        // Finished while playing: a seek back resumes playing.
        let mut engine = scenario_engine();
        engine.play();
        engine.advance(Duration::from_secs(1));
        engine.seek(50.0);
        assert_eq!(engine.phase(), PlaybackPhase::Playing);

        // Paused before finishing via seek: seek back lands in Paused.
        let mut engine = scenario_engine();
        engine.play();
        engine.pause();
        engine.seek(engine.state().duration);
        engine.play();
        engine.advance(Duration::from_millis(1));
        engine.pause();
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        engine.seek(10.0);
        assert_eq!(engine.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_seek_clamps_to_bounds() {
        let mut engine = scenario_engine();
        engine.seek(-10.0);
        assert_eq!(engine.state().current_time, 0.0);
        engine.seek(1e9);
        assert_eq!(engine.state().current_time, 150.0);
    }

    #[test]
    fn test_seek_ignores_non_finite_time() {
        let mut engine = scenario_engine();
        engine.seek(50.0);
        engine.seek(f64::NAN);
        assert_eq!(engine.state().current_time, 50.0);
        engine.seek(f64::INFINITY);
        assert_eq!(engine.state().current_time, 50.0);

        // The clock still runs to completion afterwards.
        engine.play();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
        assert_eq!(engine.state().current_time, 150.0);
    }

    #[test]
    fn test_seek_does_not_change_play_state() {
        let mut engine = scenario_engine();
        engine.seek(50.0);
        assert!(!engine.state().is_playing);

        engine.play();
        engine.seek(20.0);
        assert!(engine.state().is_playing);
    }

    #[test]
    fn test_speed_scales_clock_advance() {
        let mut engine = scenario_engine();
        engine.play();
        engine.set_speed(2.0).unwrap();
        engine.advance(Duration::from_millis(50));
        assert!((engine.state().current_time - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_speed_rejects_non_positive() {
        let mut engine = scenario_engine();
        assert!(matches!(
            engine.set_speed(0.0),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.set_speed(-1.0),
            Err(PlaybackError::InvalidArgument(_))
        ));
        assert!(engine.set_speed(0.5).is_ok());
        assert_eq!(engine.state().speed, 0.5);
    }

    #[test]
    fn test_advance_is_noop_unless_playing() {
        let mut engine = scenario_engine();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.state().current_time, 0.0);

        engine.play();
        engine.pause();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.state().current_time, 0.0);
    }

    #[test]
    fn test_empty_timeline_finishes_on_first_tick() {
        let mut engine = engine_with(vec![]);
        engine.play();
        engine.advance(Duration::from_millis(1));
        assert_eq!(engine.phase(), PlaybackPhase::Finished);
    }
}
