use crate::operators::OperatorId;

/// Per-operator daily submission allowance.
///
/// Invariant: `0 <= remaining_units <= max_daily_units`. The store enforces
/// the floor; the daily reset restores the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaProfile {
    pub operator_id: OperatorId,
    pub max_daily_units: u32,
    pub remaining_units: u32,
    pub lifetime_total_units: u64,
    /// Scan priority the service applies to this operator's jobs, 1..=4.
    pub priority_tier: u8,
    /// Whether the operator may receive task page links for their jobs.
    pub link_disclosure_allowed: bool,
}

impl QuotaProfile {
    /// A fresh profile with the full daily allowance and no history.
    pub fn new(
        operator_id: OperatorId,
        max_daily_units: u32,
        priority_tier: u8,
        link_disclosure_allowed: bool,
    ) -> Self {
        Self {
            operator_id,
            max_daily_units,
            remaining_units: max_daily_units,
            lifetime_total_units: 0,
            priority_tier,
            link_disclosure_allowed,
        }
    }
}
