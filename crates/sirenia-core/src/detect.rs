use crate::{RenderError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Diagram families the service distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Flowchart,
    Sequence,
    Class,
    State,
    Gantt,
    Unknown,
}

impl DiagramType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::Gantt => "gantt",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^-{3}\s*[\n\r](.*?)[\n\r]-{3}\s*[\n\r]+").expect("front-matter regex")
});

// Order matters: the first matching prefix wins.
static DETECTORS: LazyLock<Vec<(DiagramType, Regex)>> = LazyLock::new(|| {
    [
        (DiagramType::Flowchart, r"^(graph|flowchart)"),
        (DiagramType::Sequence, r"^sequenceDiagram"),
        (DiagramType::Class, r"^classDiagram"),
        (DiagramType::State, r"^stateDiagram"),
        (DiagramType::Gantt, r"^gantt"),
    ]
    .into_iter()
    .map(|(ty, pattern)| (ty, Regex::new(pattern).expect("detector regex")))
    .collect()
});

/// Classifies `source` by its first meaningful line.
///
/// YAML front-matter, blank lines and `%%` comment/directive lines are skipped. Fails only for
/// empty (or whitespace-only) input.
pub fn detect_type(source: &str) -> Result<DiagramType> {
    if source.trim().is_empty() {
        return Err(RenderError::parse("diagram source is empty"));
    }

    let body = FRONTMATTER_RE.replace(source, "");
    let Some(first) = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
    else {
        return Ok(DiagramType::Unknown);
    };

    Ok(DETECTORS
        .iter()
        .find(|(_, re)| re.is_match(first))
        .map(|(ty, _)| *ty)
        .unwrap_or(DiagramType::Unknown))
}
