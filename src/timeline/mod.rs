use crate::event::{InteractionEvent, Session};
use crate::storage::{Storage, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One event placed on the replay clock. `offset` is milliseconds relative
/// to the first event of the session, so the absolute timestamp base cancels
/// out of all playback math.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    pub offset: f64,
    pub event: InteractionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseSample {
    pub offset: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickSample {
    pub offset: f64,
    pub x: f64,
    pub y: f64,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub offset: f64,
    pub x: f64,
    pub y: f64,
}

/// The full ordered event history of one session, loaded once and immutable
/// thereafter.
///
/// Events are sorted ascending by timestamp; ties keep their original
/// arrival order so repeated loads replay identically. Per-variant tracks
/// are split out so the playback engine can bracket each kind independently.
#[derive(Debug, Clone)]
pub struct SessionTimeline {
    session: Session,
    events: Vec<TimelineEvent>,
    mouse: Vec<MouseSample>,
    clicks: Vec<ClickSample>,
    scrolls: Vec<ScrollSample>,
    duration: f64,
}

impl SessionTimeline {
    /// Fetch a session's persisted events and build its timeline.
    ///
    /// Fails with `NotFound` for an unknown session id. An existing session
    /// with no events yields an empty timeline with duration 0.
    pub async fn load(
        storage: &dyn Storage,
        session_id: &str,
    ) -> Result<Self, TimelineError> {
        let session = storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| TimelineError::NotFound(session_id.to_string()))?;

        let rows = storage.session_event_rows(session_id).await?;
        Ok(Self::from_events(
            session,
            rows.into_iter().map(|row| row.event).collect(),
        ))
    }

    /// Build a timeline from an already-fetched event list (e.g. the replay
    /// client's session fetch). The input may be in any order; ties keep
    /// their input order.
    pub fn from_events(session: Session, mut events: Vec<InteractionEvent>) -> Self {
        // Stable sort: equal timestamps keep arrival order.
        events.sort_by_key(|event| event.timestamp());

        let base = events.first().map(|event| event.timestamp()).unwrap_or(0);
        let events: Vec<TimelineEvent> = events
            .into_iter()
            .map(|event| TimelineEvent {
                offset: (event.timestamp() - base) as f64,
                event,
            })
            .collect();

        let duration = events.last().map(|entry| entry.offset).unwrap_or(0.0);

        let mut mouse = Vec::new();
        let mut clicks = Vec::new();
        let mut scrolls = Vec::new();
        for entry in &events {
            match &entry.event {
                InteractionEvent::MouseMove { data, .. } => mouse.push(MouseSample {
                    offset: entry.offset,
                    x: data.x,
                    y: data.y,
                }),
                InteractionEvent::Click { data, .. } => clicks.push(ClickSample {
                    offset: entry.offset,
                    x: data.x,
                    y: data.y,
                    target: data.target.clone(),
                }),
                InteractionEvent::Scroll { data, .. } => scrolls.push(ScrollSample {
                    offset: entry.offset,
                    x: data.scroll_x,
                    y: data.scroll_y,
                }),
            }
        }

        Self {
            session,
            events,
            mouse,
            clicks,
            scrolls,
            duration,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replay length in milliseconds: last offset minus first. Zero for an
    /// empty or single-event timeline.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// All events with offset in `[t0, t1]`, in replay order. Located by
    /// binary search over the sorted sequence.
    pub fn events_in_range(&self, t0: f64, t1: f64) -> &[TimelineEvent] {
        if t1 < t0 {
            return &[];
        }
        let start = self.events.partition_point(|entry| entry.offset < t0);
        let end = self.events.partition_point(|entry| entry.offset <= t1);
        &self.events[start..end]
    }

    pub fn mouse_track(&self) -> &[MouseSample] {
        &self.mouse
    }

    pub fn click_track(&self) -> &[ClickSample] {
        &self.clicks
    }

    pub fn scroll_track(&self) -> &[ScrollSample] {
        &self.scrolls
    }
}
