use std::time::Duration;

use gateway_analyzer::ComplexityLevel;
use serde::{Deserialize, Serialize};

/// The four LLM deployments the router picks between (§4.5), ordered
/// cheapest-and-fastest first. Concrete deployment names, endpoints, and
/// max-token limits live in `GatewayConfig`, not here — this enum only
/// carries the selection and cost-weighting semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Nano,
    Mini,
    Chat,
    Full,
}

impl Variant {
    /// Target p50 latency (§4.5).
    pub fn target_p50(&self) -> Duration {
        match self {
            Variant::Nano => Duration::from_millis(500),
            Variant::Mini => Duration::from_secs(1),
            Variant::Chat => Duration::from_millis(1500),
            Variant::Full => Duration::from_secs(3),
        }
    }

    /// Relative cost weight used for baseline/actual cost accounting
    /// (§4.5), mirroring the original service's `cost_tier` ordering
    /// (nano=low, mini/chat=medium, full=high) as a concrete ratio.
    pub fn weight(&self) -> f64 {
        match self {
            Variant::Nano => 1.0,
            Variant::Mini => 3.0,
            Variant::Chat => 3.0,
            Variant::Full => 10.0,
        }
    }

    /// One step cheaper, for the real-time downgrade rule (§4.5 rule 5).
    /// Nano has no cheaper tier and downgrades to itself.
    pub fn downgrade_one_tier(&self) -> Variant {
        match self {
            Variant::Nano => Variant::Nano,
            Variant::Mini => Variant::Nano,
            Variant::Chat => Variant::Mini,
            Variant::Full => Variant::Chat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Nano => "nano",
            Variant::Mini => "mini",
            Variant::Chat => "chat",
            Variant::Full => "full",
        }
    }
}

/// Per-request hints that can steer selection away from the default rules
/// (§4.5 rules 4-5).
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext {
    pub explicit_override: Option<Variant>,
    pub high_accuracy: bool,
    pub real_time: bool,
}

/// Applies the ordered selection rules in §4.5. `complexity_indicator_count`
/// is the length of the analyzer's `complexity_indicators` list, used for
/// the complex→full escalation.
pub fn select_variant(
    prompt_tokens: usize,
    complexity: ComplexityLevel,
    complexity_indicator_count: usize,
    ctx: SelectionContext,
) -> Variant {
    if let Some(forced) = ctx.explicit_override {
        return forced;
    }

    let base = if prompt_tokens <= 512 {
        Variant::Nano
    } else if prompt_tokens <= 1536 {
        Variant::Mini
    } else {
        match complexity {
            ComplexityLevel::Simple => Variant::Nano,
            ComplexityLevel::Medium => {
                if ctx.high_accuracy {
                    Variant::Chat
                } else {
                    Variant::Mini
                }
            }
            ComplexityLevel::Complex => {
                if complexity_indicator_count >= 2 {
                    Variant::Full
                } else {
                    Variant::Chat
                }
            }
            ComplexityLevel::Advanced => Variant::Full,
        }
    };

    if ctx.real_time {
        base.downgrade_one_tier()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_always_picks_nano() {
        let v = select_variant(100, ComplexityLevel::Advanced, 5, SelectionContext::default());
        assert_eq!(v, Variant::Nano);
    }

    #[test]
    fn mid_length_prompt_picks_mini() {
        let v = select_variant(1000, ComplexityLevel::Simple, 0, SelectionContext::default());
        assert_eq!(v, Variant::Mini);
    }

    #[test]
    fn complex_with_few_indicators_picks_chat() {
        let v = select_variant(2000, ComplexityLevel::Complex, 1, SelectionContext::default());
        assert_eq!(v, Variant::Chat);
    }

    #[test]
    fn complex_with_many_indicators_escalates_to_full() {
        let v = select_variant(2000, ComplexityLevel::Complex, 2, SelectionContext::default());
        assert_eq!(v, Variant::Full);
    }

    #[test]
    fn medium_with_high_accuracy_picks_chat() {
        let ctx = SelectionContext { high_accuracy: true, ..Default::default() };
        let v = select_variant(2000, ComplexityLevel::Medium, 0, ctx);
        assert_eq!(v, Variant::Chat);
    }

    #[test]
    fn explicit_override_wins_over_everything() {
        let ctx = SelectionContext { explicit_override: Some(Variant::Nano), ..Default::default() };
        let v = select_variant(5000, ComplexityLevel::Advanced, 10, ctx);
        assert_eq!(v, Variant::Nano);
    }

    #[test]
    fn real_time_downgrades_one_tier() {
        let ctx = SelectionContext { real_time: true, ..Default::default() };
        let v = select_variant(2000, ComplexityLevel::Advanced, 0, ctx);
        assert_eq!(v, Variant::Chat);
    }

    #[test]
    fn real_time_does_not_apply_when_override_set() {
        let ctx =
            SelectionContext { explicit_override: Some(Variant::Full), real_time: true, ..Default::default() };
        let v = select_variant(2000, ComplexityLevel::Simple, 0, ctx);
        assert_eq!(v, Variant::Full);
    }

    #[test]
    fn nano_downgrade_is_a_no_op() {
        assert_eq!(Variant::Nano.downgrade_one_tier(), Variant::Nano);
    }
}
