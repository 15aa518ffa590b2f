use std::fmt;
use crate::types::Micros;

/// The sync format reported by the sync separator's HD-detect line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFormat {
    /// Three-level HD sync.
    TriLevel,

    /// Two-level SD sync.
    BiLevel,
}

impl SyncFormat {
    /// Decode the raw HD-detect level: low means tri-level, high means bi-level.
    pub fn from_level(high: bool) -> Self {
        if high {
            SyncFormat::BiLevel
        } else {
            SyncFormat::TriLevel
        }
    }
}

/// The format-detect input line, sampled on demand.
pub trait FormatDetect {
    /// The raw line level, `true` for high.
    fn level(&self) -> bool;
}

/// The lock classification for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    NoLock,
    TriLevel,
    BiLevel,
}

impl From<SyncFormat> for LockState {
    fn from(format: SyncFormat) -> Self {
        match format {
            SyncFormat::TriLevel => LockState::TriLevel,
            SyncFormat::BiLevel => LockState::BiLevel,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LockState::NoLock => "NO LOCK",
            LockState::TriLevel => "TRI-LEVEL",
            LockState::BiLevel => "BI-LEVEL",
        };
        f.write_str(label)
    }
}

/// The thresholds a window must pass to be reported as locked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockThresholds {
    /// The last edge must be strictly more recent than this.
    pub no_lock_timeout_us: Micros,

    /// The measured rate must be strictly above this.
    pub min_lock_fps: f64,
}

/// Classify a window. `since_last_edge` is `None` when no edge has ever been seen.
///
/// This is stateless: a marginal signal may flip between locked and unlocked on consecutive
/// windows.
pub fn classify(
    since_last_edge: Option<Micros>,
    fps: f64,
    format: SyncFormat,
    thresholds: &LockThresholds,
) -> LockState {
    let recent = since_last_edge.is_some_and(|gap| gap < thresholds.no_lock_timeout_us);

    // A NaN rate fails the comparison and stays unlocked.
    if recent && fps > thresholds.min_lock_fps {
        format.into()
    } else {
        LockState::NoLock
    }
}
