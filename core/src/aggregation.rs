//! Aggregate analytics over the currently visible record set.

use crate::model::{RiskTier, SchoolContext, StudentRecord};
use serde::{Deserialize, Serialize};

/// Estimated rate for a school with no registered records.
pub const BASE_DESERTION_RATE: f64 = 10.0;

/// Hard ceiling on the estimate, as a percentage.
pub const DESERTION_RATE_CEILING: f64 = 25.0;

/// Plain counts of the visible set by tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

pub fn summarize(records: &[StudentRecord]) -> RiskSummary {
    let mut summary = RiskSummary::default();
    for record in records {
        match record.risk_tier {
            RiskTier::High   => summary.high += 1,
            RiskTier::Medium => summary.medium += 1,
            RiskTier::Low    => summary.low += 1,
        }
    }
    summary
}

/// System desertion-rate estimate for a visible set and context.
///
///   empty set → base rate
///   otherwise → min(ceiling, base + high·0.5 + medium·0.2 + penalty)
///
/// rounded to two decimal places.
pub fn desertion_rate(records: &[StudentRecord], context: SchoolContext) -> f64 {
    rate_from_summary(summarize(records), records.is_empty(), context)
}

fn rate_from_summary(summary: RiskSummary, empty: bool, context: SchoolContext) -> f64 {
    if empty {
        return BASE_DESERTION_RATE;
    }
    let risk_increase = summary.high as f64 * 0.5 + summary.medium as f64 * 0.2;
    let rate = BASE_DESERTION_RATE + risk_increase + context.penalty();
    round2(rate.min(DESERTION_RATE_CEILING))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Memoized rate computation. The estimate depends only on the tier
/// counts, the empty flag and the context; when none of those changed
/// since the last call, the cached value is returned without
/// recomputing.
pub struct RateMemo {
    last: Option<(RiskSummary, bool, SchoolContext, f64)>,
}

impl Default for RateMemo {
    fn default() -> Self {
        Self::new()
    }
}

impl RateMemo {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn rate(&mut self, records: &[StudentRecord], context: SchoolContext) -> f64 {
        let summary = summarize(records);
        let empty = records.is_empty();
        if let Some((s, e, c, cached)) = self.last {
            if s == summary && e == empty && c == context {
                return cached;
            }
        }
        let rate = rate_from_summary(summary, empty, context);
        self.last = Some((summary, empty, context, rate));
        rate
    }
}
