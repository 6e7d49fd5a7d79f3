use crate::keypad::KeypadCursor;

/// The three calculation modes, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Standard,
    Smart,
    Vision,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Standard, Tab::Smart, Tab::Vision];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Standard => "STANDARD",
            Tab::Smart => "SMART",
            Tab::Vision => "VISION",
        }
    }

    pub fn next(&self) -> Tab {
        match self {
            Tab::Standard => Tab::Smart,
            Tab::Smart => Tab::Vision,
            Tab::Vision => Tab::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Workspace,
    History,
    Result,
}

#[derive(Default)]
pub struct UIState {
    pub tab: Tab,
    /// SMART query or VISION caption
    pub input: String,
    pub is_loading: bool,
    pub status_message: Option<String>,
    pub status_expires_at: u64,

    // Which panel is focused
    pub focus: Focus,

    pub keypad_cursor: KeypadCursor,

    // History sidebar
    pub show_history: bool,
    pub sidebar_width: u16,
    pub history_selection: usize,

    // Result panel: chart hover and step scroll
    pub hovered_point: Option<usize>,
    pub result_scroll: u16,
}

impl UIState {
    pub fn new() -> Self {
        Self { show_history: true, sidebar_width: 30, ..Self::default() }
    }
}
