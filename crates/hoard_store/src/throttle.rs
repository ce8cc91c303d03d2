//! Backoff for repeated remote misses.
//!
//! After a remote miss the lookup marker is touched. Its creation time tells
//! how long the entry has been missing, its modification time when the
//! remote store was last asked. The longer an entry has been missing, the
//! less often the remote store is asked again.

use std::path::Path;
use std::time::{Duration, SystemTime};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum time between remote lookups for an entry missing for `age`.
pub fn retry_interval(age: Duration) -> Duration {
    if age < HOUR {
        MINUTE
    } else if age < DAY {
        HOUR
    } else {
        DAY
    }
}

/// Returns true if the remote lookup should be skipped.
///
/// `first_miss` is when the entry was first found missing, `last_check`
/// when the remote store was last asked.
pub fn is_throttled(first_miss: SystemTime, last_check: SystemTime, now: SystemTime) -> bool {
    let age = now.duration_since(first_miss).unwrap_or(Duration::ZERO);
    let since_check = now.duration_since(last_check).unwrap_or(Duration::ZERO);
    since_check < retry_interval(age)
}

/// Applies [`is_throttled`] to a lookup marker file.
///
/// Filesystems without creation times fall back to the modification time.
/// An unreadable marker never throttles.
pub fn marker_throttled(marker: &Path, now: SystemTime) -> bool {
    let Ok(meta) = std::fs::metadata(marker) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    let created = meta.created().unwrap_or(modified);
    is_throttled(created, modified, now)
}
