use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::action::Action;
use crate::camera::{CameraDevice, CameraSession, CaptureOutcome, PendingCapture};
use crate::command::CommandParser;
use crate::config::{Config, COMMANDS};
use crate::error::{CameraError, ImageError, NoticeKind, SolverError};
use crate::expr;
use crate::image_input;
use crate::keypad::KeyAction;
use crate::solver::{InlineImage, MathSolver, DEFAULT_IMAGE_QUERY};
use crate::types::{AiResponse, CalcKind, Calculation, IdGen};
use crate::ui_state::{Focus, Tab, UIState};

/// Placeholder shown in an empty display.
pub const PLACEHOLDER: &str = "0";

/// Query recorded for an image solve the user did not caption.
pub const IMAGE_QUERY_LABEL: &str = "Image analysed";

/// Transient error banner.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: u64,
}

/// A solve that has been accepted and is waiting on the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveRequest {
    /// Text sent to the model
    pub prompt: String,
    /// Text stored in history
    pub query: String,
    pub image: Option<InlineImage>,
}

impl SolveRequest {
    pub fn kind(&self) -> CalcKind {
        if self.image.is_some() {
            CalcKind::Vision
        } else {
            CalcKind::Ai
        }
    }

    pub async fn run(&self, solver: &dyn MathSolver) -> Result<AiResponse, SolverError> {
        solver.solve(&self.prompt, self.image.as_ref()).await
    }
}

/// Work the event loop has to run off the UI thread.
#[derive(Debug)]
pub enum Effect {
    Solve(SolveRequest),
    LoadImage(PathBuf),
    Capture(PendingCapture),
    Quit,
}

struct Timing {
    invalid_expression_ticks: u64,
    notice_ticks: u64,
    status_ticks: u64,
    frame_mod: usize,
    capture_timeout: Duration,
}

pub struct App {
    display: String,
    history: Vec<Calculation>,
    captured_image: Option<String>,
    notice: Option<Notice>,
    camera: CameraSession,
    capturing: bool,
    ids: IdGen,
    timing: Timing,
    pub ui: UIState,
    pub animation_frame: usize,
    pub animation_tick: u64,
}

impl App {
    pub fn new(config: &Config, camera: Box<dyn CameraDevice>) -> Self {
        let mut ui = UIState::new();
        ui.sidebar_width = config.sidebar_width;
        Self {
            display: PLACEHOLDER.to_string(),
            history: Vec::new(),
            captured_image: None,
            notice: None,
            camera: CameraSession::new(camera),
            capturing: false,
            ids: IdGen::default(),
            timing: Timing {
                invalid_expression_ticks: config.invalid_expression_ticks,
                notice_ticks: config.notice_timeout_ticks,
                status_ticks: config.status_timeout_ticks,
                frame_mod: config.animation_frame_mod.max(1),
                capture_timeout: Duration::from_secs(config.capture_timeout_secs.max(1)),
            },
            ui,
            animation_frame: 0,
            animation_tick: 0,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Newest first.
    pub fn history(&self) -> &[Calculation] {
        &self.history
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn captured_image(&self) -> Option<&str> {
        self.captured_image.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.ui.is_loading
    }

    pub fn camera_live(&self) -> bool {
        self.camera.is_live()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Query line shown above the display when the latest entry is a keypad one.
    pub fn last_basic_query(&self) -> Option<&str> {
        self.history.first().filter(|c| c.is_basic()).map(|c| c.query.as_str())
    }

    /// The latest entry when it came from the model.
    pub fn latest_solution(&self) -> Option<&Calculation> {
        self.history.first().filter(|c| !c.is_basic())
    }

    pub fn tick(&mut self) {
        self.animation_tick += 1;
        self.animation_frame = (self.animation_frame + 1) % self.timing.frame_mod;

        if self.notice.as_ref().is_some_and(|n| self.animation_tick >= n.expires_at) {
            self.notice = None;
        }
        if self.ui.status_message.is_some() && self.animation_tick >= self.ui.status_expires_at {
            self.ui.status_message = None;
        }
    }

    fn raise(&mut self, kind: NoticeKind, message: &str) {
        let ttl = match kind {
            NoticeKind::InvalidExpression => self.timing.invalid_expression_ticks,
            _ => self.timing.notice_ticks,
        };
        self.notice = Some(Notice {
            kind,
            message: message.to_string(),
            expires_at: self.animation_tick + ttl,
        });
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.ui.status_message = Some(message.into());
        self.ui.status_expires_at = self.animation_tick + self.timing.status_ticks;
    }

    fn record(&mut self, calc: Calculation) {
        self.history.insert(0, calc);
        self.ui.history_selection = 0;
        self.ui.hovered_point = None;
        self.ui.result_scroll = 0;
    }

    // ---- STANDARD ----------------------------------------------------

    pub fn press(&mut self, key: char) {
        if self.display == PLACEHOLDER {
            self.display.clear();
        }
        self.display.push(key);
    }

    pub fn clear(&mut self) {
        self.display = PLACEHOLDER.to_string();
    }

    pub fn backspace(&mut self) {
        self.display.pop();
        if self.display.is_empty() {
            self.display = PLACEHOLDER.to_string();
        }
    }

    /// Evaluate the display. Returns whether it succeeded.
    pub fn evaluate_standard(&mut self) -> bool {
        match expr::evaluate_display(&self.display) {
            Ok(result) => {
                let now = Utc::now();
                let calc = Calculation::basic(self.ids.next(now), &self.display, &result, now);
                self.record(calc);
                self.display = result;
                true
            }
            Err(e) => {
                warn!(display = %self.display, error = %e, "invalid expression");
                self.raise(NoticeKind::InvalidExpression, NoticeKind::InvalidExpression.message());
                false
            }
        }
    }

    pub fn apply_key(&mut self, action: KeyAction) {
        match action {
            KeyAction::Append(c) => self.press(c),
            KeyAction::Clear => self.clear(),
            KeyAction::Evaluate => {
                self.evaluate_standard();
            }
        }
    }

    pub fn press_selected_key(&mut self) {
        if let Some(action) = self.ui.keypad_cursor.action() {
            self.apply_key(action);
        }
    }

    // ---- SMART / VISION ------------------------------------------------

    /// Accept a solve if there is something to solve and nothing in flight.
    ///
    /// `query` falls back to the input line; `image` is a data URL.
    pub fn begin_solve(
        &mut self,
        query: Option<&str>,
        image: Option<&str>,
    ) -> Option<SolveRequest> {
        if self.ui.is_loading {
            return None;
        }

        let text = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .or_else(|| Some(self.ui.input.trim()).filter(|q| !q.is_empty()))
            .map(str::to_string);
        let image = match image.map(image_input::split_data_url) {
            Some(Ok(img)) => Some(img),
            Some(Err(e)) => {
                warn!(error = %e, "ignoring unreadable image");
                None
            }
            None => None,
        };

        if text.is_none() && image.is_none() {
            return None;
        }

        let request = SolveRequest {
            prompt: text.clone().unwrap_or_else(|| DEFAULT_IMAGE_QUERY.to_string()),
            query: text.unwrap_or_else(|| IMAGE_QUERY_LABEL.to_string()),
            image,
        };

        self.ui.is_loading = true;
        self.notice = None;
        info!(kind = request.kind().label(), "solve started");
        Some(request)
    }

    /// Fold a finished solve back into state. Clears the loading flag on
    /// every path.
    pub fn complete_solve(
        &mut self,
        request: SolveRequest,
        result: Result<AiResponse, SolverError>,
    ) {
        self.ui.is_loading = false;

        match result {
            Ok(response) => {
                let now = Utc::now();
                let kind = request.kind();
                let id = self.ids.next(now);
                let calc = Calculation::solved(id, kind, &request.query, response, now);
                self.record(calc);

                // Input typed or an image loaded while the solve ran is kept.
                if self.ui.input.trim() == request.query {
                    self.ui.input.clear();
                }
                let sent_image = self
                    .captured_image
                    .as_deref()
                    .and_then(|url| image_input::split_data_url(url).ok())
                    .is_some_and(|img| request.image.as_ref() == Some(&img));
                if sent_image {
                    self.captured_image = None;
                    if self.ui.tab == Tab::Vision {
                        self.start_camera();
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "solve failed");
                self.raise(NoticeKind::ProcessingFailed, NoticeKind::ProcessingFailed.message());
            }
        }
    }

    /// Begin, run and complete a solve in one go.
    pub async fn solve_with_ai(
        &mut self,
        solver: &dyn MathSolver,
        query: Option<&str>,
        image: Option<&str>,
    ) -> bool {
        let Some(request) = self.begin_solve(query, image) else {
            return false;
        };
        let result = request.run(solver).await;
        self.complete_solve(request, result);
        true
    }

    fn submit_smart(&mut self) -> Option<SolveRequest> {
        self.begin_solve(None, None)
    }

    fn submit_vision(&mut self) -> Option<SolveRequest> {
        let Some(image) = self.captured_image.clone() else {
            self.set_status("Capture or /open an image first");
            return None;
        };
        // The input line doubles as an optional caption.
        self.begin_solve(None, Some(&image))
    }

    /// Enter in the SMART/VISION input line.
    pub fn submit_input(&mut self) -> Option<Effect> {
        if self.ui.input.trim_start().starts_with('/') {
            return self.run_command();
        }
        let request = match self.ui.tab {
            Tab::Smart => self.submit_smart(),
            Tab::Vision => self.submit_vision(),
            Tab::Standard => None,
        };
        request.map(Effect::Solve)
    }

    fn run_command(&mut self) -> Option<Effect> {
        let line = std::mem::take(&mut self.ui.input);
        let action = match CommandParser::parse(&line) {
            Ok(action) => action,
            Err(msg) => {
                self.set_status(msg);
                return None;
            }
        };

        match action {
            Action::Help => {
                let names: Vec<&str> = COMMANDS.iter().map(|(cmd, _)| *cmd).collect();
                self.set_status(format!("Commands: {}", names.join(" ")));
                None
            }
            Action::OpenImage { path } => {
                self.select_tab(Tab::Vision);
                self.set_status(format!("Loading {}...", path));
                Some(Effect::LoadImage(PathBuf::from(path)))
            }
            Action::PasteImage => {
                self.select_tab(Tab::Vision);
                match image_input::read_clipboard_image() {
                    Ok(url) => self.set_captured_image(url),
                    Err(e) => self.image_failed(e),
                }
                None
            }
            Action::Capture => self.capture_frame().map(Effect::Capture),
            Action::DiscardImage => {
                self.discard_image();
                None
            }
            Action::RestartCamera => {
                self.select_tab(Tab::Vision);
                self.start_camera();
                None
            }
            Action::ToggleHistory => {
                self.toggle_history();
                None
            }
            Action::Quit => Some(Effect::Quit),
        }
    }

    // ---- Tabs and camera -------------------------------------------------

    /// Switch tabs. Entering VISION acquires the camera; leaving it releases it.
    pub fn select_tab(&mut self, tab: Tab) {
        if self.ui.tab == Tab::Vision && tab != Tab::Vision {
            self.camera.release();
        }
        self.ui.tab = tab;
        self.ui.focus = Focus::Workspace;
        if tab == Tab::Vision {
            self.start_camera();
        }
    }

    pub fn start_camera(&mut self) {
        // The capture task holds the stream until it reports back.
        if self.capturing {
            return;
        }
        if let Err(e) = self.camera.start() {
            warn!(error = %e, "camera unavailable");
            self.raise(NoticeKind::from(&e), e.user_message());
        }
    }

    /// Hand the live stream to a background capture. The result comes back
    /// through `complete_capture`.
    pub fn capture_frame(&mut self) -> Option<PendingCapture> {
        if self.capturing {
            self.set_status("Capture in progress");
            return None;
        }
        match self.camera.begin_capture(self.timing.capture_timeout) {
            Ok(pending) => {
                self.capturing = true;
                self.set_status("Capturing...");
                Some(pending)
            }
            Err(CameraError::NotStreaming) => {
                self.set_status("Camera is not running, use /camera");
                None
            }
            Err(e) => {
                warn!(error = %e, "capture failed");
                self.raise(NoticeKind::from(&e), e.user_message());
                None
            }
        }
    }

    pub fn complete_capture(&mut self, outcome: CaptureOutcome) {
        self.capturing = false;
        match self.camera.finish_capture(outcome) {
            Ok(png) => match image_input::png_data_url(&png) {
                Ok(url) => self.set_captured_image(url),
                Err(e) => self.image_failed(e),
            },
            Err(e) => {
                warn!(error = %e, "capture failed");
                self.raise(NoticeKind::from(&e), e.user_message());
                if self.ui.tab != Tab::Vision {
                    self.camera.release();
                } else if self.captured_image.is_none() {
                    self.start_camera();
                }
            }
        }
    }

    pub fn set_captured_image(&mut self, data_url: String) {
        let size = image_input::payload_bytes(&data_url);
        info!(bytes = size, "image ready");
        self.captured_image = Some(data_url);
        self.camera.release();
        self.set_status(format!("Image ready ({} KB), press Enter to solve", size.div_ceil(1024)));
    }

    pub fn image_failed(&mut self, error: ImageError) {
        warn!(error = %error, "image not loaded");
        self.set_status(format!("Image not loaded: {}", error));
    }

    pub fn discard_image(&mut self) {
        if self.captured_image.take().is_some() && self.ui.tab == Tab::Vision {
            self.start_camera();
        }
    }

    // ---- History -------------------------------------------------------

    pub fn toggle_history(&mut self) {
        self.ui.show_history = !self.ui.show_history;
        if !self.ui.show_history && self.ui.focus == Focus::History {
            self.ui.focus = Focus::Workspace;
        }
    }

    pub fn history_up(&mut self) {
        self.ui.history_selection = self.ui.history_selection.saturating_sub(1);
    }

    pub fn history_down(&mut self) {
        if self.ui.history_selection + 1 < self.history.len() {
            self.ui.history_selection += 1;
        }
    }

    /// Put a keypad result back on the display. Model answers are not recalled.
    pub fn recall(&mut self, index: usize) -> bool {
        let Some(result) = self
            .history
            .get(index)
            .filter(|c| c.is_basic())
            .map(|c| c.result.clone())
        else {
            return false;
        };
        self.display = result;
        self.select_tab(Tab::Standard);
        true
    }

    pub fn recall_selected(&mut self) -> bool {
        self.recall(self.ui.history_selection)
    }

    // ---- Focus and result panel -----------------------------------------

    pub fn cycle_focus(&mut self) {
        let has_result = self.latest_solution().is_some();
        self.ui.focus = match self.ui.focus {
            Focus::Workspace if self.ui.show_history && !self.history.is_empty() => Focus::History,
            Focus::Workspace | Focus::History if has_result => Focus::Result,
            _ => Focus::Workspace,
        };
    }

    pub fn hover_next(&mut self) {
        let len = self.latest_solution().map(|c| c.plot().len()).unwrap_or(0);
        if len == 0 {
            return;
        }
        self.ui.hovered_point = Some(match self.ui.hovered_point {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        });
    }

    pub fn hover_prev(&mut self) {
        if let Some(i) = self.ui.hovered_point {
            self.ui.hovered_point = i.checked_sub(1);
        }
    }

    pub fn scroll_result_down(&mut self) {
        self.ui.result_scroll = self.ui.result_scroll.saturating_add(1);
    }

    pub fn scroll_result_up(&mut self) {
        self.ui.result_scroll = self.ui.result_scroll.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::mock::MockCamera;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeSolver {
        reply: Mutex<Option<Result<AiResponse, SolverError>>>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl FakeSolver {
        fn ok(answer: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(AiResponse {
                    answer: answer.to_string(),
                    steps: vec!["step".into()],
                    explanation: "because".into(),
                    graphable_data: None,
                }))),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Mutex::new(Some(Err(SolverError::Api {
                    status: 500,
                    message: "boom".into(),
                }))),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MathSolver for FakeSolver {
        async fn solve(
            &self,
            query: &str,
            image: Option<&InlineImage>,
        ) -> Result<AiResponse, SolverError> {
            self.calls.lock().unwrap().push((query.to_string(), image.is_some()));
            self.reply.lock().unwrap().take().unwrap_or(Err(SolverError::MissingCredential))
        }
    }

    fn app() -> (App, MockCamera) {
        let cam = MockCamera::default();
        (App::new(&Config::default(), Box::new(cam.clone())), cam)
    }

    /// Run a capture to completion the way the event loop does.
    async fn capture(app: &mut App) {
        let pending = app.capture_frame().expect("camera should be live");
        let outcome = pending.run().await;
        app.complete_capture(outcome);
    }

    fn type_keys(app: &mut App, keys: &str) {
        for c in keys.chars() {
            app.press(c);
        }
    }

    #[test]
    fn test_press_replaces_placeholder() {
        let (mut app, _) = app();
        assert_eq!(app.display(), "0");
        app.press('7');
        assert_eq!(app.display(), "7");
        app.press('0');
        assert_eq!(app.display(), "70");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut app, _) = app();
        type_keys(&mut app, "12+");
        app.clear();
        assert_eq!(app.display(), "0");
        app.clear();
        assert_eq!(app.display(), "0");
    }

    #[test]
    fn test_backspace_falls_back_to_placeholder() {
        let (mut app, _) = app();
        type_keys(&mut app, "12");
        app.backspace();
        assert_eq!(app.display(), "1");
        app.backspace();
        assert_eq!(app.display(), "0");
    }

    #[test]
    fn test_evaluate_records_basic_calculation() {
        let (mut app, _) = app();
        type_keys(&mut app, "2+3");

        assert!(app.evaluate_standard());

        assert_eq!(app.display(), "5");
        let latest = &app.history()[0];
        assert_eq!(latest.query, "2+3");
        assert_eq!(latest.result, "5");
        assert_eq!(latest.kind, CalcKind::Basic);
        assert_eq!(app.last_basic_query(), Some("2+3"));
        assert!(app.latest_solution().is_none());
    }

    #[test]
    fn test_evaluate_failure_keeps_display() {
        let (mut app, _) = app();
        type_keys(&mut app, "2+");

        assert!(!app.evaluate_standard());

        assert_eq!(app.display(), "2+");
        assert!(app.history().is_empty());
        assert_eq!(app.notice().map(|n| n.kind), Some(NoticeKind::InvalidExpression));
    }

    #[test]
    fn test_notice_expires() {
        let (mut app, _) = app();
        type_keys(&mut app, "2+");
        app.evaluate_standard();

        let ttl = Config::default().invalid_expression_ticks;
        for _ in 0..ttl - 1 {
            app.tick();
        }
        assert!(app.notice().is_some());
        app.tick();
        assert!(app.notice().is_none());
    }

    #[test]
    fn test_history_is_newest_first() {
        let (mut app, _) = app();
        for expr in ["1+1", "2*3", "9-4"] {
            app.clear();
            type_keys(&mut app, expr);
            app.evaluate_standard();
        }

        let results: Vec<&str> = app.history().iter().map(|c| c.result.as_str()).collect();
        assert_eq!(results, vec!["5", "6", "2"]);
    }

    #[test]
    fn test_empty_smart_query_is_noop() {
        let (mut app, _) = app();
        app.select_tab(Tab::Smart);

        assert!(app.begin_solve(None, None).is_none());
        assert!(app.submit_input().is_none());
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_solve_with_ai_records_ai_calculation() {
        let (mut app, _) = app();
        let solver = FakeSolver::ok("2x");
        app.ui.input = "derivative of x^2".into();

        assert!(app.solve_with_ai(&solver, None, None).await);

        assert!(!app.is_loading());
        assert!(app.ui.input.is_empty());
        let latest = app.latest_solution().unwrap();
        assert_eq!(latest.kind, CalcKind::Ai);
        assert_eq!(latest.query, "derivative of x^2");
        assert_eq!(latest.result, "2x");
        assert_eq!(solver.calls(), vec![("derivative of x^2".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_solve_failure_sets_notice_and_clears_loading() {
        let (mut app, _) = app();
        let solver = FakeSolver::failing();

        app.solve_with_ai(&solver, Some("1/x"), None).await;

        assert!(!app.is_loading());
        assert!(app.history().is_empty());
        assert_eq!(app.notice().map(|n| n.kind), Some(NoticeKind::ProcessingFailed));
    }

    #[test]
    fn test_second_solve_refused_while_loading() {
        let (mut app, _) = app();
        let first = app.begin_solve(Some("1+1"), None);
        assert!(first.is_some());
        assert!(app.begin_solve(Some("2+2"), None).is_none());

        app.complete_solve(first.unwrap(), Err(SolverError::Aborted("test".into())));
        assert!(!app.is_loading());
        assert!(app.begin_solve(Some("2+2"), None).is_some());
    }

    #[test]
    fn test_vision_tab_starts_and_releases_camera() {
        let (mut app, cam) = app();

        app.select_tab(Tab::Smart);
        assert_eq!(cam.opens(), 0);

        app.select_tab(Tab::Vision);
        assert!(app.camera_live());
        assert_eq!(cam.opens(), 1);

        app.select_tab(Tab::Standard);
        assert!(!app.camera_live());
        assert_eq!(cam.stops(), 1);
    }

    #[test]
    fn test_camera_denied_notice() {
        let cam = MockCamera { deny: true, ..MockCamera::default() };
        let mut app = App::new(&Config::default(), Box::new(cam));

        app.select_tab(Tab::Vision);

        let notice = app.notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::CameraDenied);
        assert_eq!(notice.message, "Camera access denied");
    }

    #[tokio::test]
    async fn test_capture_stores_image_and_stops_stream_once() {
        let (mut app, cam) = app();
        app.select_tab(Tab::Vision);

        capture(&mut app).await;

        assert!(!app.is_capturing());
        assert!(app.captured_image().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(cam.stops(), 1);

        app.select_tab(Tab::Standard);
        assert_eq!(cam.stops(), 1);
    }

    #[tokio::test]
    async fn test_vision_solve_records_vision_calculation() {
        let (mut app, _) = app();
        let solver = FakeSolver::ok("12 cm²");
        app.select_tab(Tab::Vision);
        capture(&mut app).await;

        let Some(Effect::Solve(request)) = app.submit_input() else {
            panic!("expected a solve");
        };
        assert_eq!(request.prompt, DEFAULT_IMAGE_QUERY);
        let result = request.run(&solver).await;
        app.complete_solve(request, result);

        let latest = app.latest_solution().unwrap();
        assert_eq!(latest.kind, CalcKind::Vision);
        assert_eq!(latest.query, IMAGE_QUERY_LABEL);
        assert!(app.captured_image().is_none());
        assert_eq!(solver.calls(), vec![(DEFAULT_IMAGE_QUERY.to_string(), true)]);
    }

    #[test]
    fn test_vision_submit_without_image_is_noop() {
        let (mut app, _) = app();
        app.select_tab(Tab::Vision);
        app.ui.input = "what is this".into();

        assert!(app.submit_input().is_none());
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_discard_reacquires_camera_on_vision() {
        let (mut app, cam) = app();
        app.select_tab(Tab::Vision);
        capture(&mut app).await;
        assert!(!app.camera_live());

        app.discard_image();

        assert!(app.captured_image().is_none());
        assert!(app.camera_live());
        assert_eq!(cam.opens(), 2);
    }

    #[test]
    fn test_commands_from_input_line() {
        let (mut app, _) = app();
        app.select_tab(Tab::Smart);

        app.ui.input = "/open ./sum.png".into();
        assert!(matches!(
            app.submit_input(),
            Some(Effect::LoadImage(p)) if p == PathBuf::from("./sum.png")
        ));
        assert_eq!(app.ui.tab, Tab::Vision);
        assert!(app.ui.input.is_empty());

        app.ui.input = "/history".into();
        let shown = app.ui.show_history;
        app.submit_input();
        assert_eq!(app.ui.show_history, !shown);

        app.ui.input = "/quit".into();
        assert!(matches!(app.submit_input(), Some(Effect::Quit)));

        app.ui.input = "/nope".into();
        assert!(app.submit_input().is_none());
        assert!(app.ui.status_message.as_deref().unwrap().starts_with("Unknown command"));
    }

    #[test]
    fn test_capture_runs_off_the_controller() {
        let cam = MockCamera { hang: true, ..MockCamera::default() };
        let mut app = App::new(&Config::default(), Box::new(cam.clone()));
        app.select_tab(Tab::Vision);

        let pending = app.capture_frame();
        assert!(pending.is_some());
        assert!(app.is_capturing());
        assert!(!app.camera_live());

        // The controller keeps ticking and refuses a second capture.
        app.tick();
        assert!(app.capture_frame().is_none());

        // Leaving and re-entering VISION does not open a second stream.
        app.select_tab(Tab::Smart);
        app.select_tab(Tab::Vision);
        assert_eq!(cam.opens(), 1);

        // A task that died without a frame restarts the camera.
        drop(pending);
        assert_eq!(cam.stops(), 1);
        app.complete_capture(CaptureOutcome::failed(CameraError::CaptureFailed("aborted".into())));
        assert!(!app.is_capturing());
        assert!(app.camera_live());
        assert_eq!(app.notice().map(|n| n.message.as_str()), Some("Camera capture failed"));
    }

    #[tokio::test]
    async fn test_failed_capture_keeps_stream_live() {
        let cam = MockCamera { fail_grab: true, ..MockCamera::default() };
        let mut app = App::new(&Config::default(), Box::new(cam.clone()));
        app.select_tab(Tab::Vision);

        capture(&mut app).await;

        assert!(app.camera_live());
        assert!(app.captured_image().is_none());
        assert_eq!(cam.opens(), 1);
        assert_eq!(cam.stops(), 0);
    }

    #[test]
    fn test_input_typed_during_solve_is_kept() {
        let (mut app, _) = app();
        app.select_tab(Tab::Smart);
        app.ui.input = "integrate x".into();
        let request = app.begin_solve(None, None).unwrap();

        app.ui.input = "now differentiate".into();
        let reply = AiResponse { answer: "x^2/2".into(), ..AiResponse::default() };
        app.complete_solve(request, Ok(reply));

        assert_eq!(app.ui.input, "now differentiate");
        assert_eq!(app.history()[0].query, "integrate x");
    }

    #[tokio::test]
    async fn test_image_loaded_during_solve_is_kept() {
        let (mut app, cam) = app();
        app.select_tab(Tab::Vision);
        capture(&mut app).await;
        let Some(Effect::Solve(request)) = app.submit_input() else {
            panic!("expected a solve");
        };

        let other = image_input::png_data_url(b"\x89PNG\r\n\x1a\nother").unwrap();
        app.set_captured_image(other.clone());
        app.complete_solve(request, Ok(AiResponse { answer: "6".into(), ..AiResponse::default() }));

        assert_eq!(app.captured_image(), Some(other.as_str()));
        assert!(!app.camera_live());
        assert_eq!(cam.opens(), 1);
    }

    #[test]
    fn test_recall_only_basic_entries() {
        let (mut app, _) = app();
        type_keys(&mut app, "6*7");
        app.evaluate_standard();
        let request = app.begin_solve(Some("integrate x"), None).unwrap();
        let reply = AiResponse { answer: "x^2/2".into(), ..AiResponse::default() };
        app.complete_solve(request, Ok(reply));
        app.clear();

        assert!(!app.recall(0));
        assert_eq!(app.display(), "0");

        app.select_tab(Tab::Smart);
        assert!(app.recall(1));
        assert_eq!(app.display(), "42");
        assert_eq!(app.ui.tab, Tab::Standard);
    }

    #[test]
    fn test_hover_moves_within_plot() {
        use crate::types::{GraphableData, PlotPoint};

        let (mut app, _) = app();
        let request = app.begin_solve(Some("y = x"), None).unwrap();
        app.complete_solve(
            request,
            Ok(AiResponse {
                answer: "line".into(),
                graphable_data: Some(GraphableData {
                    label: "y = x".into(),
                    points: vec![PlotPoint { x: 0.0, y: 0.0 }, PlotPoint { x: 1.0, y: 1.0 }],
                }),
                ..AiResponse::default()
            }),
        );

        app.hover_next();
        app.hover_next();
        app.hover_next();
        assert_eq!(app.ui.hovered_point, Some(1));
        app.hover_prev();
        app.hover_prev();
        assert_eq!(app.ui.hovered_point, None);
    }

    mod properties {
        use super::{app, type_keys};
        use crate::error::NoticeKind;
        use proptest::prelude::*;

        fn arb_rejected() -> impl Strategy<Value = char> {
            prop::sample::select("abcxyz=!%&#,;:?_$@[]{}<>|~".chars().collect::<Vec<_>>())
        }

        proptest! {
            #[test]
            fn rejected_input_leaves_display_and_history(
                valid in "[0-9]{1,3}([-+*/][0-9]{1,3}){0,4}",
                bad in arb_rejected(),
                at in any::<prop::sample::Index>(),
            ) {
                let (mut app, _) = app();
                type_keys(&mut app, "1+1");
                prop_assert!(app.evaluate_standard());
                let history = app.history().to_vec();

                let mut typed = valid;
                typed.insert(at.index(typed.len() + 1), bad);
                app.clear();
                type_keys(&mut app, &typed);
                let display = app.display().to_string();

                prop_assert!(!app.evaluate_standard());
                prop_assert_eq!(app.display(), display.as_str());
                prop_assert_eq!(app.history(), history.as_slice());
                let notice = app.notice().expect("notice raised");
                prop_assert_eq!(notice.kind, NoticeKind::InvalidExpression);
                prop_assert_eq!(notice.message.as_str(), "Invalid expression");
            }
        }
    }
}
