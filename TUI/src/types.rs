use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tab produced a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcKind {
    Basic,
    Ai,
    Vision,
}

impl CalcKind {
    pub fn label(&self) -> &'static str {
        match self {
            CalcKind::Basic => "basic",
            CalcKind::Ai => "ai",
            CalcKind::Vision => "vision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphableData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub points: Vec<PlotPoint>,
}

/// Structured reply from the solver model.
///
/// Missing top-level fields fall back to empty values; only plot points are
/// strict about their coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphable_data: Option<GraphableData>,
}

/// One entry in the history sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub id: String,
    pub query: String,
    pub result: String,
    pub explanation: Option<String>,
    pub steps: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
    pub kind: CalcKind,
    pub graph: Option<Vec<PlotPoint>>,
}

impl Calculation {
    /// A keypad evaluation: result only.
    pub fn basic(id: String, query: &str, result: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            query: query.to_string(),
            result: result.to_string(),
            explanation: None,
            steps: None,
            timestamp,
            kind: CalcKind::Basic,
            graph: None,
        }
    }

    /// A model-backed answer. `kind` must be `Ai` or `Vision`.
    pub fn solved(
        id: String,
        kind: CalcKind,
        query: &str,
        response: AiResponse,
        timestamp: DateTime<Utc>,
    ) -> Self {
        debug_assert!(kind != CalcKind::Basic);
        Self {
            id,
            query: query.to_string(),
            result: response.answer,
            explanation: Some(response.explanation),
            steps: Some(response.steps),
            timestamp,
            kind,
            graph: response.graphable_data.map(|g| g.points),
        }
    }

    pub fn is_basic(&self) -> bool {
        self.kind == CalcKind::Basic
    }

    /// Plot points, if the answer carried any.
    pub fn plot(&self) -> &[PlotPoint] {
        self.graph.as_deref().unwrap_or(&[])
    }
}

/// Hands out time-derived ids that never repeat within a process.
#[derive(Debug, Default)]
pub struct IdGen {
    last: i64,
}

impl IdGen {
    pub fn next(&mut self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        self.last = if millis > self.last { millis } else { self.last + 1 };
        self.last.to_string()
    }
}
