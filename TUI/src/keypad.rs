/// The STANDARD tab keypad: a fixed 5×4 grid of labels.
pub const KEYPAD: [[&str; 4]; 5] = [
    ["C", "(", ")", "/"],
    ["7", "8", "9", "*"],
    ["4", "5", "6", "-"],
    ["1", "2", "3", "+"],
    ["0", ".", "=", "^"],
];

pub const ROWS: usize = KEYPAD.len();
pub const COLS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Append(char),
    Clear,
    Evaluate,
}

/// Map a button label to its callback kind.
pub fn action_for(label: &str) -> Option<KeyAction> {
    match label {
        "C" => Some(KeyAction::Clear),
        "=" => Some(KeyAction::Evaluate),
        _ => {
            let mut chars = label.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyAction::Append(c)),
                _ => None,
            }
        }
    }
}

/// Map a typed character the same way the matching button would.
pub fn action_for_char(c: char) -> Option<KeyAction> {
    match c {
        '0'..='9' | '.' | '(' | ')' | '+' | '-' | '*' | '/' | '^' => Some(KeyAction::Append(c)),
        '=' => Some(KeyAction::Evaluate),
        'c' | 'C' => Some(KeyAction::Clear),
        _ => None,
    }
}

/// Glyph shown on the button face.
pub fn display_label(label: &str) -> &str {
    match label {
        "*" => "×",
        "/" => "÷",
        other => other,
    }
}

pub fn is_operator(label: &str) -> bool {
    matches!(label, "/" | "*" | "-" | "+" | "=" | "^")
}

/// Keyboard selection over the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeypadCursor {
    pub row: usize,
    pub col: usize,
}

impl KeypadCursor {
    pub fn up(&mut self) {
        self.row = self.row.saturating_sub(1);
    }

    pub fn down(&mut self) {
        self.row = (self.row + 1).min(ROWS - 1);
    }

    pub fn left(&mut self) {
        self.col = self.col.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.col = (self.col + 1).min(COLS - 1);
    }

    pub fn label(&self) -> &'static str {
        KEYPAD[self.row][self.col]
    }

    pub fn action(&self) -> Option<KeyAction> {
        action_for(self.label())
    }
}
