//! Pure, stateless token estimation and query-complexity classification.
//!
//! No I/O, no shared state: every function here is deterministic given its
//! input text. This is deliberate — the model router (`gateway-router`)
//! calls `classify()` and `analyze()` inline on the request path and must
//! never block on them.

mod keywords;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use keywords::{COMPLEX_KEYWORDS, MEDIUM_KEYWORDS, SIMPLE_KEYWORDS};

/// Query complexity tier, ordered from least to most expensive to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
    Advanced,
}

impl ComplexityLevel {
    fn all() -> [ComplexityLevel; 4] {
        [ComplexityLevel::Simple, ComplexityLevel::Medium, ComplexityLevel::Complex, ComplexityLevel::Advanced]
    }
}

/// Result of [`classify`]: the winning tier plus the normalized confidence
/// (the winning tier's share of the total weighted score).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub level: ComplexityLevel,
    pub confidence: f32,
}

/// Recognized user intents, detected by keyword presence in [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Trend,
    Comparison,
    Ranking,
    Forecast,
    Anomaly,
    Summary,
    DrillDown,
}

/// Structured signals extracted from a query, independent of the final
/// complexity tier. `complexity_indicators` feeds the model router's
/// `complex -> chat` vs `complex -> full` escalation rule (§4.5 rule 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intents: Vec<Intent>,
    pub time_references: Vec<String>,
    pub metrics: Vec<String>,
    pub complexity_indicators: Vec<String>,
    pub requires_calculation: bool,
}

static TIME_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(YoY|QoQ|MoM|YTD|MTD)\b").expect("valid regex"));
static QUERY_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(DAX|SQL|query|formula)\b").expect("valid regex"));
static ML_VOCAB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(machine learning|ai|deep learning|neural)\b").expect("valid regex"));
static DATE_ISH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{4}-\d{2}-\d{2}|last (week|month|quarter|year)|this (week|month|quarter|year)|yesterday|today)\b")
        .expect("valid regex")
});

const INTENT_KEYWORDS: &[(&str, Intent)] = &[
    ("trend", Intent::Trend),
    ("compare", Intent::Comparison),
    ("comparison", Intent::Comparison),
    ("rank", Intent::Ranking),
    ("top", Intent::Ranking),
    ("forecast", Intent::Forecast),
    ("predict", Intent::Forecast),
    ("anomaly", Intent::Anomaly),
    ("outlier", Intent::Anomaly),
    ("summary", Intent::Summary),
    ("summarize", Intent::Summary),
    ("overview", Intent::Summary),
    ("drill down", Intent::DrillDown),
    ("breakdown", Intent::DrillDown),
];

const METRIC_NOUNS: &[&str] =
    &["revenue", "profit", "margin", "cost", "churn", "conversion", "retention", "nps"];

const CALCULATION_VERBS: &[&str] = &["sum", "average", "calculate", "total", "ratio", "growth rate"];

/// Estimate the number of BPE tokens in `text` using the `cl100k_base`
/// encoding shared by the router's LLM backends. Falls back to the
/// documented `len(text) / 4` heuristic if the encoder cannot be loaded.
pub fn count_tokens(text: &str) -> usize {
    match tiktoken_rs::cl100k_base() {
        Ok(bpe) => bpe.encode_ordinary(text).len(),
        Err(_) => text.len() / 4,
    }
}

/// Extract intents, time references, mentioned metrics, and whether the
/// query requires arithmetic, plus the complexity-indicator list the
/// router consults for its `complex -> full` escalation rule.
pub fn analyze(text: &str) -> QueryAnalysis {
    let lower = text.to_lowercase();

    let mut intents: Vec<Intent> = Vec::new();
    let mut seen_intents = HashSet::new();
    for (keyword, intent) in INTENT_KEYWORDS {
        if lower.contains(keyword) && seen_intents.insert(*intent) {
            intents.push(*intent);
        }
    }

    let mut time_references: Vec<String> = Vec::new();
    for m in TIME_SHORTHAND.find_iter(text) {
        time_references.push(m.as_str().to_string());
    }
    for m in DATE_ISH.find_iter(text) {
        time_references.push(m.as_str().to_string());
    }

    let metrics: Vec<String> =
        METRIC_NOUNS.iter().filter(|m| lower.contains(*m)).map(|m| m.to_string()).collect();

    let requires_calculation = CALCULATION_VERBS.iter().any(|v| lower.contains(v));

    let mut complexity_indicators = Vec::new();
    let complex_keyword_hits = count_occurrences(&lower, COMPLEX_KEYWORDS);
    if complex_keyword_hits > 0 {
        complexity_indicators.push("complex_keywords".to_string());
    }
    if TIME_SHORTHAND.is_match(text) {
        complexity_indicators.push("time_comparison_shorthand".to_string());
    }
    if QUERY_LANGUAGE.is_match(text) {
        complexity_indicators.push("query_language".to_string());
    }
    if ML_VOCAB.is_match(&lower) {
        complexity_indicators.push("ml_vocabulary".to_string());
    }
    let word_count = text.split_whitespace().count();
    if word_count >= 25 {
        complexity_indicators.push("long_query".to_string());
    }

    QueryAnalysis { intents, time_references, metrics, complexity_indicators, requires_calculation }
}

fn count_occurrences(lower_text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lower_text.contains(*k)).count()
}

/// Classify `text` into a complexity tier with a normalized confidence
/// score, per §4.1's weighted four-signal algorithm. Ties are broken in
/// favor of the higher complexity level, since overestimating cost tier is
/// the safer failure mode under a cost-minimizing router.
pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase();
    let word_count = text.split_whitespace().count();
    let token_count = count_tokens(text);

    let mut scores: [f32; 4] = [0.0; 4];
    let idx = |level: ComplexityLevel| level as usize;

    let complex_matches = count_occurrences(&lower, COMPLEX_KEYWORDS);
    if complex_matches > 0 {
        scores[idx(ComplexityLevel::Complex)] += complex_matches as f32 * 0.3;
        if complex_matches > 3 {
            scores[idx(ComplexityLevel::Advanced)] += (complex_matches - 3) as f32 * 0.2;
        }
    }

    let simple_matches = count_occurrences(&lower, SIMPLE_KEYWORDS);
    if simple_matches > 0 {
        scores[idx(ComplexityLevel::Simple)] += simple_matches as f32 * 0.4;
    }

    let medium_matches = count_occurrences(&lower, MEDIUM_KEYWORDS);
    if medium_matches > 0 {
        scores[idx(ComplexityLevel::Medium)] += medium_matches as f32 * 0.35;
    }

    if word_count < 10 {
        scores[idx(ComplexityLevel::Simple)] += 0.3;
    } else if word_count < 25 {
        scores[idx(ComplexityLevel::Medium)] += 0.3;
    } else if word_count < 50 {
        scores[idx(ComplexityLevel::Complex)] += 0.3;
    } else {
        scores[idx(ComplexityLevel::Advanced)] += 0.4;
    }

    if token_count < 20 {
        scores[idx(ComplexityLevel::Simple)] += 0.2;
    } else if token_count < 50 {
        scores[idx(ComplexityLevel::Medium)] += 0.2;
    } else if token_count < 100 {
        scores[idx(ComplexityLevel::Complex)] += 0.2;
    } else {
        scores[idx(ComplexityLevel::Advanced)] += 0.3;
    }

    if TIME_SHORTHAND.is_match(text) {
        scores[idx(ComplexityLevel::Complex)] += 0.3;
    }
    if QUERY_LANGUAGE.is_match(text) {
        scores[idx(ComplexityLevel::Complex)] += 0.2;
    }
    if ML_VOCAB.is_match(&lower) {
        scores[idx(ComplexityLevel::Advanced)] += 0.4;
    }

    let total: f32 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }

    let (level, confidence) = ComplexityLevel::all()
        .into_iter()
        .rev() // iterate Advanced..Simple so equal scores favor the higher tier
        .map(|level| (level, scores[idx(level)]))
        .fold((ComplexityLevel::Simple, scores[idx(ComplexityLevel::Simple)]), |best, candidate| {
            if candidate.1 >= best.1 { candidate } else { best }
        });

    Classification { level, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_tokens_matches_fallback_when_short() {
        let n = count_tokens("hello world");
        assert!(n > 0);
    }

    #[test]
    fn classify_simple_query() {
        let c = classify("what is total revenue");
        assert_eq!(c.level, ComplexityLevel::Simple);
        assert!(c.confidence > 0.0);
    }

    #[test]
    fn classify_advanced_on_ml_vocabulary() {
        let c = classify(
            "forecast predict correlation regression optimize anomaly segment cohort attribution using machine learning and neural networks for a deep learning model",
        );
        assert_eq!(c.level, ComplexityLevel::Advanced);
    }

    #[test]
    fn classify_complex_escalates_on_time_shorthand_and_query_language() {
        let c = classify("show me the YoY DAX query breakdown for revenue forecast correlation");
        assert!(matches!(c.level, ComplexityLevel::Complex | ComplexityLevel::Advanced));
    }

    #[test]
    fn ties_favor_higher_complexity() {
        let scores = [0.25f32, 0.25, 0.25, 0.25];
        let (level, _) = ComplexityLevel::all()
            .into_iter()
            .rev()
            .map(|level| (level, scores[level as usize]))
            .fold((ComplexityLevel::Simple, scores[0]), |best, candidate| {
                if candidate.1 >= best.1 { candidate } else { best }
            });
        assert_eq!(level, ComplexityLevel::Advanced);
    }

    #[test]
    fn empty_query_classifies_as_simple() {
        let c = classify("");
        assert_eq!(c.level, ComplexityLevel::Simple);
    }

    #[test]
    fn analyze_detects_intent_and_metrics() {
        let a = analyze("compare revenue trend YoY and forecast churn");
        assert!(a.intents.contains(&Intent::Comparison));
        assert!(a.intents.contains(&Intent::Trend));
        assert!(a.intents.contains(&Intent::Forecast));
        assert!(a.metrics.contains(&"revenue".to_string()));
        assert!(a.metrics.contains(&"churn".to_string()));
        assert!(a.time_references.iter().any(|t| t.eq_ignore_ascii_case("YoY")));
    }

    #[test]
    fn analyze_requires_calculation_detection() {
        let a = analyze("calculate the average margin");
        assert!(a.requires_calculation);
        let b = analyze("show me the latest dashboard");
        assert!(!b.requires_calculation);
    }

    #[test]
    fn analyze_complexity_indicators_count_distinct_signals() {
        let a = analyze("forecast YoY SQL query for correlation and regression using machine learning");
        assert!(a.complexity_indicators.len() >= 2);
    }
}
