use crate::config::parse::load_config;
use crate::config::{CaptureConfig, ReplayConfig};
use crate::playback::{
    spawn_player, PlaybackEngine, PlaybackFrame, PlaybackHandle, PlayerCommand,
};
use crate::timeline::SessionTimeline;
use crate::web::SessionClient;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Points},
        Block, Borders, Gauge, Paragraph,
    },
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::path::PathBuf;
use tracing::info;

const VIEWPORT_W: f64 = 1280.0;
const VIEWPORT_H: f64 = 720.0;

const SEEK_STEP_MS: f64 = 5_000.0;
const MAX_SPEED: f64 = 16.0;
const MIN_SPEED: f64 = 0.25;

/// A click marker stays on screen this long (in virtual ms) after it fires.
const CLICK_FLASH_MS: f64 = 500.0;

/// Guard that restores terminal state on drop.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}

/// Fetch a recorded session from the collector and play it back in the
/// terminal at a controllable speed.
pub async fn replay(
    config_path: Option<PathBuf>,
    session_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (capture_config, replay_config) = match config_path {
        Some(path) => {
            let config = load_config(&path)?;
            (config.capture, config.replay)
        }
        None => (CaptureConfig::default(), ReplayConfig::default()),
    };

    info!(
        session_id = session_id,
        endpoint = %capture_config.endpoint,
        "Fetching session"
    );
    let client = SessionClient::new(capture_config.endpoint.clone())?;
    let detail = client.fetch_session(session_id).await?;

    let timeline = SessionTimeline::from_events(detail.session, detail.events);
    let mut engine = PlaybackEngine::new(timeline);
    engine.set_speed(replay_config.initial_speed)?;

    let handle = spawn_player(engine, replay_config.tick_interval);
    handle.send(PlayerCommand::Play).await;

    let mut guard = TerminalGuard::new()?;
    let result = run_player_ui(&mut guard.terminal, &handle, session_id).await;
    handle.shutdown().await;
    drop(guard);

    result
}

async fn run_player_ui(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    handle: &PlaybackHandle,
    session_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut frames = handle.frames();
    let mut input = EventStream::new();

    loop {
        let frame = frames.borrow_and_update().clone();
        terminal.draw(|f| draw_player(f, &frame, session_id))?;

        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            maybe_event = input.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let state = frames.borrow().state;
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => break,
                            KeyCode::Char(' ') => {
                                if state.is_playing {
                                    handle.send(PlayerCommand::Pause).await;
                                } else {
                                    handle.send(PlayerCommand::Play).await;
                                }
                            }
                            KeyCode::Left => {
                                handle.send(PlayerCommand::SeekBy(-SEEK_STEP_MS)).await;
                            }
                            KeyCode::Right => {
                                handle.send(PlayerCommand::SeekBy(SEEK_STEP_MS)).await;
                            }
                            KeyCode::Up => {
                                let speed = (state.speed * 2.0).min(MAX_SPEED);
                                handle.send(PlayerCommand::SetSpeed(speed)).await;
                            }
                            KeyCode::Down => {
                                let speed = (state.speed / 2.0).max(MIN_SPEED);
                                handle.send(PlayerCommand::SetSpeed(speed)).await;
                            }
                            KeyCode::Char('r') => {
                                handle.send(PlayerCommand::Restart).await;
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn draw_player(f: &mut Frame, playback: &PlaybackFrame, session_id: &str) {
    let chunks = Layout::vertical([
        Constraint::Min(10),
        Constraint::Length(3),
        Constraint::Length(2),
    ])
    .split(f.area());

    draw_viewport(f, chunks[0], playback, session_id);
    draw_progress(f, chunks[1], playback);
    draw_help(f, chunks[2]);
}

fn draw_viewport(f: &mut Frame, area: Rect, playback: &PlaybackFrame, session_id: &str) {
    let frame = &playback.frame;

    let mut title = format!(" {} ", session_id);
    if let Some(scroll) = &frame.scroll {
        title.push_str(&format!("· scroll {:.0},{:.0} ", scroll.x, scroll.y));
    }

    let mouse = frame.mouse;
    let click = frame
        .click
        .clone()
        .filter(|c| frame.time - c.offset <= CLICK_FLASH_MS);
    let click_for_canvas = click.clone();

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, VIEWPORT_W])
        .y_bounds([0.0, VIEWPORT_H])
        .paint(move |ctx| {
            if let Some(c) = &click_for_canvas {
                // Y axis grows downward in page coordinates.
                let cy = VIEWPORT_H - c.y;
                ctx.draw(&Points {
                    coords: &[
                        (c.x - 8.0, cy),
                        (c.x + 8.0, cy),
                        (c.x, cy - 8.0),
                        (c.x, cy + 8.0),
                    ],
                    color: Color::Red,
                });
            }
            if let Some(m) = &mouse {
                ctx.draw(&Points {
                    coords: &[(m.x, VIEWPORT_H - m.y)],
                    color: Color::Yellow,
                });
            }
        });
    f.render_widget(canvas, area);

    if let Some(c) = &click {
        let label = Paragraph::new(Line::from(vec![
            Span::styled("click ", Style::default().fg(Color::Red)),
            Span::raw(c.target.clone()),
        ]));
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 1,
            width: area.width.saturating_sub(4),
            height: 1,
        };
        f.render_widget(label, inner);
    }
}

fn draw_progress(f: &mut Frame, area: Rect, playback: &PlaybackFrame) {
    let state = &playback.state;
    let ratio = if state.duration > 0.0 {
        (state.current_time / state.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let status = if state.is_playing { "▶" } else { "⏸" };
    let label = format!(
        "{} {} / {} · {}x",
        status,
        format_clock(state.current_time),
        format_clock(state.duration),
        state.speed
    );

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(Line::from(vec![
        Span::styled("space", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" play/pause  "),
        Span::styled("←/→", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" seek 5s  "),
        Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" speed  "),
        Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" restart  "),
        Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]));
    f.render_widget(help, area);
}

fn format_clock(ms: f64) -> String {
    let total_seconds = (ms / 1000.0).floor() as i64;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}
