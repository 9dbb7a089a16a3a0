use crate::capture::{spawn_capture, CaptureBuffer, HttpTransport};
use crate::config::parse::load_config;
use crate::config::CaptureConfig;
use crate::event::{ClickData, InteractionEvent, MouseMoveData, ScrollData};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const VIEWPORT_W: f64 = 1280.0;
const VIEWPORT_H: f64 = 720.0;

const CLICK_TARGETS: &[&str] = &["#signup", "#pricing", "nav .logo", "#cta-button", "footer a"];

/// Drive the real capture pipeline with synthetic pointer paths, clicks,
/// and scrolls against a running collector, then print the session id so it
/// can be replayed.
pub async fn simulate(
    config_path: Option<PathBuf>,
    events: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let capture_config = match config_path {
        Some(path) => load_config(&path)?.capture,
        None => CaptureConfig::default(),
    };

    let session_id = Uuid::new_v4().to_string();
    info!(
        session_id = %session_id,
        endpoint = %capture_config.endpoint,
        events = events,
        "Simulating capture traffic"
    );

    let transport = Arc::new(HttpTransport::new(capture_config.endpoint.clone())?);
    let buffer = CaptureBuffer::new(
        session_id.clone(),
        capture_config.website_id.clone(),
        capture_config.mouse_sample_interval,
        capture_config.max_batch_events,
    );
    let (handle, task) = spawn_capture(buffer, transport, &capture_config);

    let base_ts = Utc::now().timestamp_millis();
    let mut scroll_y = 0.0;

    for i in 0..events {
        // 20ms of virtual session time per raw event; the buffer's sampling
        // thins the pointer track.
        let timestamp = base_ts + (i as i64) * 20;
        let phase = i as f64;

        let x = VIEWPORT_W / 2.0 + (VIEWPORT_W / 2.5) * (phase * 0.05).sin();
        let y = VIEWPORT_H / 2.0 + (VIEWPORT_H / 2.5) * (phase * 0.073).cos();

        handle
            .record(InteractionEvent::MouseMove {
                timestamp,
                data: MouseMoveData { x, y },
            })
            .await?;

        if i > 0 && i % 40 == 0 {
            let target = CLICK_TARGETS[(i / 40) % CLICK_TARGETS.len()];
            handle
                .record(InteractionEvent::Click {
                    timestamp: timestamp + 1,
                    data: ClickData {
                        x,
                        y,
                        target: target.to_string(),
                    },
                })
                .await?;
        }

        if i > 0 && i % 25 == 0 {
            scroll_y += 120.0;
            handle
                .record(InteractionEvent::Scroll {
                    timestamp: timestamp + 2,
                    data: ScrollData {
                        scroll_x: 0.0,
                        scroll_y,
                    },
                })
                .await?;
        }

        // Keep the intake loop and flush tasks breathing.
        if i % 50 == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    drop(handle);
    task.await?;

    println!("Recorded session: {}", session_id);
    println!("Replay it with: rewind replay {}", session_id);

    Ok(())
}
