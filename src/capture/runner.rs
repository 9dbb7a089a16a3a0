use super::buffer::CaptureBuffer;
use super::transport::{deliver_with_retry, Transport};
use crate::config::CaptureConfig;
use crate::event::{EventBatch, InteractionEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture pipeline is no longer running")]
    Closed,
}

/// Producer side of the capture pipeline. Recording an event is a bounded
/// channel send and never waits on an in-flight flush.
#[derive(Clone)]
pub struct CaptureHandle {
    events: mpsc::Sender<InteractionEvent>,
}

impl CaptureHandle {
    pub async fn record(&self, event: InteractionEvent) -> Result<(), CaptureError> {
        self.events.send(event).await.map_err(|_| CaptureError::Closed)
    }
}

/// Spawn the capture intake loop.
///
/// Events flow in over the handle; the loop buffers them and flushes on a
/// hybrid trigger: the flush interval elapses OR the buffer hits its size
/// threshold, whichever comes first. Each flush is a fire-and-forget spawned
/// send so intake is never blocked by the network. Closing the handle drains
/// the buffer, waits for in-flight sends, and ends the loop.
pub fn spawn_capture(
    buffer: CaptureBuffer,
    transport: Arc<dyn Transport>,
    config: &CaptureConfig,
) -> (CaptureHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(run_capture(rx, buffer, transport, config.clone()));
    (CaptureHandle { events: tx }, task)
}

async fn run_capture(
    mut input: mpsc::Receiver<InteractionEvent>,
    mut buffer: CaptureBuffer,
    transport: Arc<dyn Transport>,
    config: CaptureConfig,
) {
    let mut flush_interval = tokio::time::interval(config.flush_interval);
    // The first tick fires immediately; skip it so an empty startup buffer
    // is not flushed.
    flush_interval.tick().await;

    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    info!(session_id = %buffer.session_id(), "Capture pipeline started");

    loop {
        tokio::select! {
            event = input.recv() => {
                match event {
                    Some(event) => {
                        if !buffer.push(event) {
                            continue;
                        }
                        if buffer.is_full() {
                            flush(&mut buffer, &transport, &config, &mut in_flight, "size threshold");
                        }
                    }
                    None => {
                        info!("Capture input closed, draining buffer");
                        break;
                    }
                }
            }

            _ = flush_interval.tick() => {
                flush(&mut buffer, &transport, &config, &mut in_flight, "interval");
            }
        }

        in_flight.retain(|handle| !handle.is_finished());
    }

    // Final flush, then wait for every in-flight send to settle.
    flush(&mut buffer, &transport, &config, &mut in_flight, "shutdown");
    for result in futures::future::join_all(in_flight).await {
        if let Err(e) = result {
            warn!(error = %e, "Flush task failed");
        }
    }

    info!("Capture pipeline shutdown complete");
}

fn flush(
    buffer: &mut CaptureBuffer,
    transport: &Arc<dyn Transport>,
    config: &CaptureConfig,
    in_flight: &mut Vec<JoinHandle<()>>,
    trigger: &'static str,
) {
    let Some(batch) = buffer.take_batch() else {
        return;
    };

    debug!(events = batch.events.len(), trigger, "Flushing capture batch");

    let transport = transport.clone();
    let retry = config.retry.clone();
    in_flight.push(tokio::spawn(async move {
        send_batch(transport, batch, retry).await;
    }));
}

async fn send_batch(
    transport: Arc<dyn Transport>,
    batch: EventBatch,
    retry: crate::config::RetryConfig,
) {
    let events = batch.events.len();
    match deliver_with_retry(transport.as_ref(), &batch, &retry).await {
        Ok(receipt) => {
            debug!(
                session_id = %receipt.session_id,
                events_processed = receipt.events_processed,
                "Batch delivered"
            );
        }
        Err(e) => {
            // Bounded retries are exhausted: drop the batch rather than
            // stall capture behind a dead collector.
            warn!(
                session_id = %batch.session_id,
                events = events,
                error = %e,
                "Dropping undeliverable batch"
            );
        }
    }
}
