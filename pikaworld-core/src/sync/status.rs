use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;

/// Snapshot of the mirror state. Ephemeral; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Result of the last connectivity probe.
    pub is_online: bool,
    /// When a mirror write or remote delete last succeeded.
    pub last_mirror_time: Option<DateTime<Utc>>,
    /// True while a mirror write is in flight.
    pub is_mirroring: bool,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Connection:  {}",
            if self.is_online { "online" } else { "offline" }
        )?;
        match self.last_mirror_time {
            Some(time) => writeln!(
                f,
                "Last mirror: {}",
                time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )?,
            None => writeln!(f, "Last mirror: never")?,
        }
        if self.is_mirroring {
            writeln!(f, "Mirroring:   in progress")?;
        }
        Ok(())
    }
}
