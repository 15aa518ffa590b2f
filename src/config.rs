use clap::Parser;
use crate::types::{Micros, Millis, Period};

/// Reject edges that are too close together to be real frame edges. 59.94 Hz is a period of
/// about 16,683 µs and 60 Hz about 16,667 µs, so anything under 5 ms is bogus.
pub const DEFAULT_MIN_VALID_FRAME_PERIOD_US: Period = 5000;

/// If no edge arrives within this interval, the signal is considered lost.
pub const DEFAULT_NO_LOCK_TIMEOUT_US: Micros = 250_000;

/// The length of each measurement window.
pub const DEFAULT_WINDOW_MS: Millis = 1000;

/// The interval between display refreshes, which also sets the scroll speed.
pub const DEFAULT_REFRESH_MS: Millis = 80;

/// Longest accepted window length or refresh interval: one day.
pub const MAX_INTERVAL_MS: Millis = 86_400_000;

/// A window must measure strictly more than this many frames per second to count as locked.
pub const DEFAULT_MIN_LOCK_FPS: f64 = 1.0;

/// Global LED brightness, 0-255.
pub const DEFAULT_BRIGHTNESS: u8 = 32;

/// The tunable constants of the capture and classification core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunables {
    /// Shortest edge-to-edge period accepted as a real frame.
    pub min_valid_period_us: Period,

    /// Gap since the last edge at which lock is considered lost.
    pub no_lock_timeout_us: Micros,

    /// Length of a measurement window.
    pub window_ms: Millis,

    /// Interval between display refreshes.
    pub refresh_ms: Millis,

    /// Frame rate floor for reporting lock.
    pub min_lock_fps: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            min_valid_period_us: DEFAULT_MIN_VALID_FRAME_PERIOD_US,
            no_lock_timeout_us: DEFAULT_NO_LOCK_TIMEOUT_US,
            window_ms: DEFAULT_WINDOW_MS,
            refresh_ms: DEFAULT_REFRESH_MS,
            min_lock_fps: DEFAULT_MIN_LOCK_FPS,
        }
    }
}

/// Genlock whisker: measures a video sync signal and shows its format and frame rate on an
/// emulated 15x7 LED matrix.
#[derive(Debug, Parser)]
#[command(name = "genlock-whisker", version, about)]
pub struct Args {
    /// Shortest accepted frame period in microseconds.
    #[arg(long, default_value_t = DEFAULT_MIN_VALID_FRAME_PERIOD_US)]
    pub min_period_us: Period,

    /// Gap without edges, in microseconds, after which lock is lost.
    #[arg(long, default_value_t = DEFAULT_NO_LOCK_TIMEOUT_US)]
    pub no_lock_timeout_us: Micros,

    /// Measurement window length in milliseconds.
    #[arg(long, default_value_t = DEFAULT_WINDOW_MS, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MS))]
    pub window_ms: Millis,

    /// Display refresh interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_REFRESH_MS, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MS))]
    pub refresh_ms: Millis,

    /// Frame rate that must be exceeded to report lock.
    #[arg(long, default_value_t = DEFAULT_MIN_LOCK_FPS)]
    pub min_lock_fps: f64,

    /// LED brightness (0-255).
    #[arg(long, default_value_t = DEFAULT_BRIGHTNESS)]
    pub brightness: u8,

    /// Frame rate of the simulated sync source.
    #[arg(long, default_value_t = 59.94)]
    pub frame_rate: f64,

    /// Peak timing noise added to each simulated edge, in microseconds.
    #[arg(long, default_value_t = 2.0)]
    pub jitter_us: f64,

    /// Probability that a simulated frame is followed by a spurious short glitch pulse.
    #[arg(long, default_value_t = 0.0)]
    pub glitch_rate: f64,

    /// Start with the format-detect pin high (bi-level SD sync).
    #[arg(long)]
    pub bi_level: bool,

    /// Start with the simulated signal disconnected.
    #[arg(long)]
    pub no_signal: bool,

    /// Run without a window, only emitting diagnostic log lines.
    #[arg(long)]
    pub headless: bool,

    /// Size of each emulated LED in screen pixels.
    #[arg(long, default_value_t = 48, value_parser = clap::value_parser!(u32).range(1..=256))]
    pub scale: u32,
}

impl Args {
    /// The core tunables selected on the command line.
    pub fn tunables(&self) -> Tunables {
        Tunables {
            min_valid_period_us: self.min_period_us,
            no_lock_timeout_us: self.no_lock_timeout_us,
            window_ms: self.window_ms,
            refresh_ms: self.refresh_ms,
            min_lock_fps: self.min_lock_fps,
        }
    }
}
