use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Shortest raw response worth interpreting
const MIN_RESPONSE_CHARS: usize = 10;

const DEFAULT_DESCRIPTION: &str = "food analysis";
const DEFAULT_BREAKDOWN: &str = "analysis completed";

// Policy constants, not calibrated values.
const STRUCTURED_CONFIDENCE: f64 = 0.8;
const HEURISTIC_CONFIDENCE: f64 = 0.8;
const HEURISTIC_NO_MATCH_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub description: String,
    pub total_calories: f64,
    pub breakdown: String,
    pub confidence_score: f64,
}

impl AnalysisResult {
    /// Result used when the model returned nothing usable
    pub fn no_response() -> Self {
        Self {
            description: "unable to analyze".to_string(),
            total_calories: 0.0,
            breakdown: "no response".to_string(),
            confidence_score: 0.0,
        }
    }

    fn normalized(mut self) -> Self {
        if !self.total_calories.is_finite() || self.total_calories < 0.0 {
            self.total_calories = 0.0;
        }
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);
        self
    }
}

/// Reduces the model's free-form answer to an `AnalysisResult`.
///
/// Never fails: empty input gives `AnalysisResult::no_response()`, the first
/// JSON object found in the text is read key by key, and anything else goes
/// through a plain-text calorie scan with a lower confidence score.
///
/// Only balanced `{...}` candidates are tried, in order of their opening
/// brace. If the model emits several objects the first parseable one wins.
/// Each failed candidate restarts the scan at the next brace, so brace-heavy
/// text costs O(n²); model answers are capped at 500 tokens.
pub fn interpret_response(raw: &str) -> AnalysisResult {
    if raw.chars().count() < MIN_RESPONSE_CHARS {
        log::debug!("🫙 Model response too short ({} chars), using default", raw.chars().count());
        return AnalysisResult::no_response();
    }

    if let Some(object) = find_json_object(raw) {
        log::debug!("🧩 Found JSON object in model response");
        return from_json_object(&object).normalized();
    }

    log::debug!("🔎 No JSON object in model response, scanning text for calories");
    from_plain_text(raw).normalized()
}

fn from_json_object(object: &Map<String, Value>) -> AnalysisResult {
    AnalysisResult {
        description: text_field(object, "description").unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        total_calories: number_field(object, "total_calories").unwrap_or(0.0),
        breakdown: text_field(object, "breakdown").unwrap_or_else(|| DEFAULT_BREAKDOWN.to_string()),
        confidence_score: number_field(object, "confidence_score").unwrap_or(STRUCTURED_CONFIDENCE),
    }
}

fn from_plain_text(raw: &str) -> AnalysisResult {
    let calories = find_calorie_count(raw);

    let description = raw
        .split('\n')
        .next()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .unwrap_or(DEFAULT_DESCRIPTION)
        .to_string();

    let confidence_score = if calories.is_some() {
        HEURISTIC_CONFIDENCE
    } else {
        HEURISTIC_NO_MATCH_CONFIDENCE
    };

    AnalysisResult {
        description,
        total_calories: calories.unwrap_or(0.0),
        breakdown: raw.to_string(),
        confidence_score,
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn number_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match object.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value.filter(|v| v.is_finite())
}

fn calorie_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*calories?").expect("calorie pattern is valid")
    })
}

fn find_calorie_count(text: &str) -> Option<f64> {
    calorie_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// First balanced `{...}` slice of `text` that parses as a JSON object
fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;

        if let Some(end) = balanced_object_end(&text[start..]) {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&text[start..start + end]) {
                return Some(object);
            }
        }

        search_from = start + 1;
    }

    None
}

/// Byte length of the brace-balanced prefix of `text`, which must start with `{`.
/// Braces inside JSON string literals are skipped.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
