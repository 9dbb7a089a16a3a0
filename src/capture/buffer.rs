use crate::event::{EventBatch, InteractionEvent};
use std::time::Duration;

/// Accumulates interaction events between flushes.
///
/// MouseMove events are rate-limited to one per sampling interval; raw
/// pointer-move frequency would overwhelm both bandwidth and the timeline,
/// and the replay engine interpolates between the sparse samples. Clicks
/// and scrolls are discrete state changes and always buffered.
pub struct CaptureBuffer {
    session_id: String,
    website_id: String,
    mouse_sample_interval_ms: i64,
    max_events: usize,
    pending: Vec<InteractionEvent>,
    last_mouse_ms: Option<i64>,
}

impl CaptureBuffer {
    pub fn new(
        session_id: String,
        website_id: String,
        mouse_sample_interval: Duration,
        max_events: usize,
    ) -> Self {
        Self {
            session_id,
            website_id,
            mouse_sample_interval_ms: mouse_sample_interval.as_millis() as i64,
            max_events: max_events.max(1),
            pending: Vec::new(),
            last_mouse_ms: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Buffer an event. Returns false when a mouseMove falls inside the
    /// sampling interval and is dropped.
    pub fn push(&mut self, event: InteractionEvent) -> bool {
        if let InteractionEvent::MouseMove { timestamp, .. } = &event {
            if let Some(last) = self.last_mouse_ms {
                if timestamp - last < self.mouse_sample_interval_ms {
                    return false;
                }
            }
            self.last_mouse_ms = Some(*timestamp);
        }

        self.pending.push(event);
        true
    }

    /// The size threshold half of the hybrid flush policy.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.max_events
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain the pending events into a batch; None when there is nothing to
    /// send. The sampling clock is not reset, so a flush never re-opens the
    /// mouse sampling window.
    pub fn take_batch(&mut self) -> Option<EventBatch> {
        if self.pending.is_empty() {
            return None;
        }
        Some(EventBatch {
            session_id: self.session_id.clone(),
            website_id: self.website_id.clone(),
            events: std::mem::take(&mut self.pending),
        })
    }
}
