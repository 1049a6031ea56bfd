//! Fixed keyword vocabulary families used by [`crate::classify`].
//!
//! These lists are fixed at compile time, per §4.1: classification must be
//! deterministic and reproducible across process restarts.

pub const SIMPLE_KEYWORDS: &[&str] =
    &["what", "when", "where", "who", "show", "list", "display", "current", "latest", "total", "count"];

pub const MEDIUM_KEYWORDS: &[&str] = &[
    "compare", "trend", "analyze", "breakdown", "summary", "average", "percentage", "growth",
    "change",
];

pub const COMPLEX_KEYWORDS: &[&str] = &[
    "forecast",
    "predict",
    "correlation",
    "regression",
    "optimize",
    "anomaly",
    "segment",
    "cohort",
    "attribution",
];
