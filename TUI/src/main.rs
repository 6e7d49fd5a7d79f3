use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arboard::Clipboard;
use crossterm::{
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{info, warn};

use neocalc_tui::app::{App, Effect, SolveRequest};
use neocalc_tui::camera::{CameraDevice, CaptureOutcome, FfmpegCamera, NoCamera, PendingCapture};
use neocalc_tui::config::Config;
use neocalc_tui::error::{CameraError, ImageError, SolverError};
use neocalc_tui::image_input;
use neocalc_tui::keypad::{self, KeyAction};
use neocalc_tui::solver::{self, MathSolver};
use neocalc_tui::types::AiResponse;
use neocalc_tui::ui::draw;
use neocalc_tui::ui_state::{Focus, Tab};

const USAGE: &str = "\
neocalc - keypad, AI and photo calculator

USAGE:
    neocalc [OPTIONS]

OPTIONS:
    -o, --offline     Never call the model; SMART and VISION report an error
        --no-camera   Do not open the camera device
    -h, --help        Print this help

ENVIRONMENT:
    GEMINI_API_KEY / API_KEY   Model credential
    NEOCALC_MODEL              Model name
    NEOCALC_API_BASE           API base URL
    NEOCALC_TIMEOUT_SECS       Request timeout
    NEOCALC_CAMERA_DEVICE      V4L2 device node (default /dev/video0)
    NEOCALC_CAPTURE_TIMEOUT_SECS  Frame grab timeout
    NEOCALC_FFMPEG             ffmpeg binary used for capture
    NEOCALC_LOG                Log file path
";

/// Background work reporting back to the UI loop.
enum Completion {
    Solved(SolveRequest, Result<AiResponse, SolverError>),
    ImageLoaded(Result<String, ImageError>),
    Captured(CaptureOutcome),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line args
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{}", USAGE);
        return Ok(());
    }
    let offline_mode = args.iter().any(|a| a == "--offline" || a == "-o");

    let mut config = Config::from_env()?;
    if args.iter().any(|a| a == "--no-camera") {
        config.camera_enabled = false;
    }
    init_logging(&config);

    let solver = solver::from_config(&config.ai, offline_mode)?;
    let camera: Box<dyn CameraDevice> = if config.camera_enabled {
        Box::new(FfmpegCamera::new(config.camera_device.clone(), config.ffmpeg_program.clone()))
    } else {
        Box::new(NoCamera)
    };
    info!(offline = offline_mode, camera = config.camera_enabled, "starting neocalc");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new(&config, camera);

    // Run app
    let result = run_app(&mut terminal, &mut app, solver, config.tick_rate_ms).await;

    // Release the camera before handing the terminal back
    drop(app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

/// Send tracing output to the log file. The terminal belongs to the UI, so
/// without a writable file nothing is logged.
fn init_logging(config: &Config) {
    let Some(path) = &config.log_file else {
        return;
    };
    if let Some(dir) = path.parent() {
        if fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("neocalc=info,neocalc_tui=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    solver: Arc<dyn MathSolver>,
    tick_rate_ms: u64,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
    let mut event_stream = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_rate_ms.max(1)));

    loop {
        terminal.draw(|frame| draw(frame, app))?;

        let effect = tokio::select! {
            _ = ticker.tick() => {
                // Update animation frame and expire notices
                app.tick();
                None
            }
            Some(done) = rx.recv() => {
                handle_completion(app, done);
                None
            }
            maybe_event = event_stream.next() => match maybe_event {
                Some(Ok(event)) => handle_event(app, event),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        };

        match effect {
            Some(Effect::Quit) => return Ok(()),
            Some(Effect::Solve(request)) => spawn_solve(Arc::clone(&solver), request, tx.clone()),
            Some(Effect::Capture(pending)) => spawn_capture(pending, tx.clone()),
            Some(Effect::LoadImage(path)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let loaded = image_input::load_image_file(&path).await;
                    let _ = tx.send(Completion::ImageLoaded(loaded));
                });
            }
            None => {}
        }
    }
}

/// Run a solve off the UI task. A panicking solver still reports back, so
/// the loading flag is always cleared.
fn spawn_solve(
    solver: Arc<dyn MathSolver>,
    request: SolveRequest,
    tx: mpsc::UnboundedSender<Completion>,
) {
    tokio::spawn(async move {
        let job = request.clone();
        let handle = tokio::spawn(async move { job.run(solver.as_ref()).await });
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "solve task did not finish");
                Err(SolverError::Aborted(e.to_string()))
            }
        };
        let _ = tx.send(Completion::Solved(request, result));
    });
}

/// Grab a frame off the UI task. The outcome always comes back so the
/// controller can clear its capture state.
fn spawn_capture(pending: PendingCapture, tx: mpsc::UnboundedSender<Completion>) {
    tokio::spawn(async move {
        let outcome = match tokio::spawn(pending.run()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "capture task did not finish");
                CaptureOutcome::failed(CameraError::CaptureFailed(e.to_string()))
            }
        };
        let _ = tx.send(Completion::Captured(outcome));
    });
}

fn handle_completion(app: &mut App, done: Completion) {
    match done {
        Completion::Solved(request, result) => app.complete_solve(request, result),
        Completion::ImageLoaded(Ok(url)) => app.set_captured_image(url),
        Completion::ImageLoaded(Err(e)) => app.image_failed(e),
        Completion::Captured(outcome) => app.complete_capture(outcome),
    }
}

fn handle_event(app: &mut App, event: Event) -> Option<Effect> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
        Event::Paste(text) => {
            // Handle paste event (bracketed paste mode)
            paste_text(app, &text);
            None
        }
        _ => None,
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Option<Effect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => return Some(Effect::Quit),
        KeyCode::Esc => {
            if app.ui.tab != Tab::Standard && !app.ui.input.is_empty() {
                app.ui.input.clear();
                return None;
            }
            return Some(Effect::Quit);
        }
        KeyCode::Tab => {
            app.select_tab(app.ui.tab.next());
            return None;
        }
        KeyCode::BackTab => {
            // Shift+Tab cycles focus between panels
            app.cycle_focus();
            return None;
        }
        KeyCode::F(n @ 1..=3) => {
            app.select_tab(Tab::ALL[usize::from(n - 1)]);
            return None;
        }
        KeyCode::F(4) => {
            app.toggle_history();
            return None;
        }
        KeyCode::F(5) if app.ui.tab == Tab::Vision => {
            return app.capture_frame().map(Effect::Capture);
        }
        KeyCode::F(6) if app.ui.tab == Tab::Vision => {
            app.discard_image();
            return None;
        }
        _ => {}
    }

    match app.ui.focus {
        Focus::History => {
            match key.code {
                KeyCode::Up => app.history_up(),
                KeyCode::Down => app.history_down(),
                KeyCode::Enter => {
                    if !app.recall_selected() {
                        app.set_status("Only keypad results can be recalled");
                    }
                }
                _ => {}
            }
            None
        }
        Focus::Result => {
            match key.code {
                KeyCode::Left => app.hover_prev(),
                KeyCode::Right => app.hover_next(),
                KeyCode::Up => app.scroll_result_up(),
                KeyCode::Down => app.scroll_result_down(),
                _ => {}
            }
            None
        }
        Focus::Workspace if app.ui.tab == Tab::Standard => {
            handle_keypad_key(app, key);
            None
        }
        Focus::Workspace => handle_input_key(app, key, ctrl),
    }
}

fn handle_keypad_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.evaluate_standard();
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.clear(),
        KeyCode::Up => app.ui.keypad_cursor.up(),
        KeyCode::Down => app.ui.keypad_cursor.down(),
        KeyCode::Left => app.ui.keypad_cursor.left(),
        KeyCode::Right => app.ui.keypad_cursor.right(),
        KeyCode::Char(' ') => app.press_selected_key(),
        KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(text) = clipboard_text() {
                paste_text(app, &text);
            }
        }
        KeyCode::Char(c) => {
            if let Some(action) = keypad::action_for_char(c) {
                app.apply_key(action);
            }
        }
        _ => {}
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent, ctrl: bool) -> Option<Effect> {
    match key.code {
        KeyCode::Enter => return app.submit_input(),
        KeyCode::Backspace => {
            app.ui.input.pop();
        }
        KeyCode::Char('v') if ctrl => {
            // Ctrl+V on VISION prefers a clipboard image
            if app.ui.tab == Tab::Vision {
                if let Ok(url) = image_input::read_clipboard_image() {
                    app.set_captured_image(url);
                    return None;
                }
            }
            if let Some(text) = clipboard_text() {
                paste_text(app, &text);
            }
        }
        KeyCode::Char(_) if ctrl => {}
        KeyCode::Char(c) => app.ui.input.push(c),
        _ => {}
    }
    None
}

fn clipboard_text() -> Option<String> {
    Clipboard::new().ok()?.get_text().ok()
}

/// Pasted text goes through the keypad on STANDARD and into the input line
/// elsewhere.
fn paste_text(app: &mut App, text: &str) {
    if app.ui.tab == Tab::Standard {
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            if let Some(KeyAction::Append(c)) = keypad::action_for_char(c) {
                app.press(c);
            }
        }
        return;
    }

    // Filter newlines for single-line input
    let filtered: String = text
        .chars()
        .filter(|c| *c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    app.ui.input.push_str(&filtered);
}
