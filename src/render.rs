use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold pattern"));

// A word together with the whitespace in front of it, so the revealed
// text keeps its line breaks.
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\S+").expect("valid word pattern"));

/// `**text**` becomes `text`, then surrounding whitespace is trimmed.
pub fn strip_markdown_bold(text: &str) -> String {
    BOLD.replace_all(text, "$1").trim().to_string()
}

/// Turn raw model output into the text shown to the user and stored in
/// the conversation.
pub fn format_response(raw: &str, structured: bool) -> String {
    let stripped = strip_markdown_bold(raw);
    if !structured {
        return stripped;
    }
    structured_answer(&stripped).unwrap_or(stripped)
}

const ANSWER_FIELDS: [&str; 3] = ["problem", "solution", "precautions"];

/// The `problem` / `solution` / `precautions` layout, or `None` when the
/// text holds no JSON object carrying at least one of those fields.
pub fn structured_answer(text: &str) -> Option<String> {
    let value = parse_answer(text.trim()).or_else(|| {
        extract_json_object(text).and_then(|candidate| parse_answer(&candidate))
    })?;

    let problem = field_text(&value, "problem");
    let solution = field_text(&value, "solution");
    let precautions = field_text(&value, "precautions");

    Some(format!(
        "Problem: {}\nSolution: {}\nPrecautions: {}",
        problem.as_deref().unwrap_or("N/A"),
        solution.as_deref().unwrap_or("N/A"),
        precautions.as_deref().unwrap_or("N/A"),
    ))
}

fn parse_answer(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) if ANSWER_FIELDS.iter().any(|key| map.contains_key(*key)) => {
            Some(Value::Object(map))
        }
        _ => None,
    }
}

fn field_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// First balanced `{...}` in the text, ignoring braces inside strings.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    /// One more word is visible; carries the text revealed so far.
    Word(String),
    /// Every word has been shown.
    Finished,
    /// The reveal was cancelled; nothing more will be shown.
    Halted,
}

/// Word-by-word playback of a finished response, advanced once per tick.
#[derive(Debug, Clone)]
pub struct Reveal {
    words: Vec<String>,
    shown: usize,
    cancel: CancellationToken,
}

impl Reveal {
    pub fn new(text: &str, cancel: CancellationToken) -> Self {
        Reveal {
            words: WORD.find_iter(text).map(|m| m.as_str().to_string()).collect(),
            shown: 0,
            cancel,
        }
    }

    pub fn step(&mut self) -> RevealStep {
        if self.cancel.is_cancelled() {
            return RevealStep::Halted;
        }
        if self.is_done() {
            return RevealStep::Finished;
        }
        self.shown += 1;
        RevealStep::Word(self.revealed())
    }

    pub fn revealed(&self) -> String {
        self.words[..self.shown].concat()
    }

    pub fn is_done(&self) -> bool {
        self.shown >= self.words.len()
    }
}
