//! Fixed defaults filled into a monitor before it is submitted.
//!
//! A field counts as unset when it is `None`. String fields whose value is
//! blank are also treated as unset, since an empty cron expression or an
//! empty description carries no information. Numeric and enumerated fields
//! keep any explicit value, including `0`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{DefaultStatus, Monitor, MonitorStatus, YesNo};

pub const DEFAULT_CRON: &str = "* * * * *";
pub const DEFAULT_DAY_DEGRADED_MINIMUM_COUNT: u32 = 1;
pub const DEFAULT_DAY_DOWN_MINIMUM_COUNT: u32 = 1;
pub const DEFAULT_STATUS: MonitorStatus = MonitorStatus::Active;
pub const DEFAULT_DEFAULT_STATUS: DefaultStatus = DefaultStatus::None;
pub const DEFAULT_INCLUDE_DEGRADED_IN_DOWNTIME: YesNo = YesNo::No;

/// `created_at` layout expected by the API, always with a zero millisecond part.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Fill unset fields using the current time for `created_at`.
pub fn apply_defaults(monitor: &mut Monitor) -> &mut Monitor {
    apply_defaults_at(monitor, Utc::now())
}

pub fn apply_defaults_at(monitor: &mut Monitor, now: DateTime<Utc>) -> &mut Monitor {
    fill_blank(&mut monitor.cron, DEFAULT_CRON);
    fill_blank(&mut monitor.description, "");
    monitor
        .day_degraded_minimum_count
        .get_or_insert(DEFAULT_DAY_DEGRADED_MINIMUM_COUNT);
    monitor
        .day_down_minimum_count
        .get_or_insert(DEFAULT_DAY_DOWN_MINIMUM_COUNT);
    monitor.status.get_or_insert(DEFAULT_STATUS);
    monitor.default_status.get_or_insert(DEFAULT_DEFAULT_STATUS);
    monitor
        .include_degraded_in_downtime
        .get_or_insert(DEFAULT_INCLUDE_DEGRADED_IN_DOWNTIME);
    // Triggers default to absent, which they already are when unset.

    if monitor.created_at.is_none() {
        monitor.created_at = Some(now.format(CREATED_AT_FORMAT).to_string());
    }

    debug!(tag = %monitor.tag, "Applied monitor defaults");
    monitor
}

fn fill_blank(field: &mut Option<String>, default: &str) {
    let unset = field.as_deref().map_or(true, |v| v.trim().is_empty());
    if unset {
        *field = Some(default.to_string());
    }
}
