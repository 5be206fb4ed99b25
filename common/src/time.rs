// Wall-clock timestamps for message headers

use crate::types::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch.
///
/// Message headers carry second resolution; nothing in the service needs
/// sub-second precision.
#[inline]
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
