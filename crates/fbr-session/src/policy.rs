use chrono::Duration;

pub const DEFAULT_STALE_AFTER_HOURS: i64 = 12;

/// Operational rules that are product decisions rather than invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Refuse `start` while the same recipe already has an active session
    /// in the same food bank.
    pub single_active_per_recipe: bool,
    /// Active sessions older than this show up in the stale report.
    pub stale_after: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            single_active_per_recipe: true,
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
        }
    }
}
