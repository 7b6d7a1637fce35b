//! Student record model shared by every store variant and every
//! consumer of the monitoring view.

use crate::types::{BusinessId, GradeLevel, RecordId, Uid};
use serde::{Deserialize, Serialize};

/// Derived dropout-risk classification. Never caller-supplied: the
/// stored tier is recomputed from the stored metrics on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    /// Numeric severity used by monotonicity checks. Higher = worse.
    pub fn severity(self) -> u8 {
        match self {
            RiskTier::High   => 2,
            RiskTier::Medium => 1,
            RiskTier::Low    => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicStatus {
    Vulnerable,
    Stable,
}

impl Default for EconomicStatus {
    fn default() -> Self {
        EconomicStatus::Stable
    }
}

/// Socio-economic context of the school as a whole. Process-wide and
/// tunable through a leader-level action; feeds the desertion-rate
/// penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolContext {
    Low,
    Medium,
    High,
}

impl SchoolContext {
    /// Additive desertion-rate penalty for this context.
    pub fn penalty(self) -> f64 {
        match self {
            SchoolContext::High   => 3.0,
            SchoolContext::Medium => 1.0,
            SchoolContext::Low    => 0.0,
        }
    }
}

impl Default for SchoolContext {
    fn default() -> Self {
        SchoolContext::Medium
    }
}

/// A monitored student.
///
/// Invariants:
///   - `risk_tier` always matches `classify(academic_average,
///     absences_last_month)` for the stored metrics.
///   - `owner_id` is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Store-assigned id. Backends that use a native document id map it
    /// onto this field.
    pub id: RecordId,
    /// Externally assigned student identifier (enrollment number).
    pub business_id: BusinessId,
    pub name: String,
    pub grade: GradeLevel,
    /// Academic average on the 0.0–5.0 scale.
    pub academic_average: f64,
    pub absences_last_month: u32,
    pub economic_status: EconomicStatus,
    pub risk_tier: RiskTier,
    /// Uid of the teacher that registered the record.
    pub owner_id: Uid,
}

/// Caller-facing creation payload. Carries no risk tier and no owner;
/// both are assigned by the data layer at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudentForm {
    pub name: String,
    pub business_id: BusinessId,
    pub grade: GradeLevel,
    pub academic_average: f64,
    pub absences_last_month: u32,
    #[serde(default)]
    pub economic_status: Option<EconomicStatus>,
}
