use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::genlock::{Clock, EdgeCapture, FormatDetect};

/// How long before an edge the generator stops sleeping and starts spinning. Thread sleeps
/// overshoot by up to a scheduler tick, which would swamp the jitter being simulated.
const SPIN_MARGIN: Duration = Duration::from_micros(1500);

/// Width of a simulated glitch: well under any real frame period.
const GLITCH_WIDTH: Duration = Duration::from_micros(200);

/// The simulated HD-detect line of the sync separator. Low means tri-level sync.
#[derive(Debug, Clone, Default)]
pub struct FormatPin {
    high: Arc<AtomicBool>,
}

impl FormatPin {
    pub fn new(high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(high)),
        }
    }

    /// Flip the pin and return the new level.
    pub fn toggle(&self) -> bool {
        !self.high.fetch_xor(true, Ordering::Relaxed)
    }
}

impl FormatDetect for FormatPin {
    fn level(&self) -> bool {
        self.high.load(Ordering::Relaxed)
    }
}

/// The timing of the simulated sync signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Nominal frames per second.
    pub frame_rate: f64,

    /// Peak random offset applied to each edge, in microseconds.
    pub jitter_us: f64,

    /// Probability of a spurious extra pulse right after a frame edge.
    pub glitch_rate: f64,
}

impl SyncSettings {
    /// The nominal frame period, or `None` if the frame rate is not a positive number.
    pub fn period(&self) -> Option<Duration> {
        if self.frame_rate.is_nan() || self.frame_rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.frame_rate)
            .ok()
            .filter(|period| !period.is_zero())
    }

    /// A random edge offset in `[-jitter_us, jitter_us]`, in seconds.
    fn noise_secs(&self) -> f64 {
        let jitter_us = if self.jitter_us.is_finite() { self.jitter_us.abs() } else { 0.0 };
        (rand::random::<f64>() * 2.0 - 1.0) * jitter_us * 1e-6
    }

    fn glitch(&self) -> bool {
        rand::random::<f64>() < self.glitch_rate.clamp(0.0, 1.0)
    }
}

/// Sleep until `target`, spinning through the last stretch.
fn wait_until(target: Instant) {
    let now = Instant::now();
    if let Some(remaining) = target.checked_duration_since(now) {
        if remaining > SPIN_MARGIN {
            thread::sleep(remaining - SPIN_MARGIN);
        }
    }
    while Instant::now() < target {
        std::hint::spin_loop();
    }
}

/// Offset `instant` by a signed number of seconds.
fn offset_by(instant: Instant, secs: f64) -> Instant {
    let delta = Duration::from_secs_f64(secs.abs());
    if secs >= 0.0 {
        instant + delta
    } else {
        instant.checked_sub(delta).unwrap_or(instant)
    }
}

/// A background thread that produces rising sync edges and feeds them to an [`EdgeCapture`],
/// standing in for the VSYNC interrupt.
pub struct SyncGenerator {
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncGenerator {
    /// Start generating edges. The signal starts out plugged in if `connected` is set.
    pub fn spawn<C: Clock + 'static>(
        capture: EdgeCapture<C>,
        settings: SyncSettings,
        connected: bool,
    ) -> io::Result<Self> {
        let period = settings.period().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "frame rate must be a positive number")
        })?;
        let connected = Arc::new(AtomicBool::new(connected));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let connected = connected.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("sync-generator".into())
                .spawn(move || {
                    let mut nominal = Instant::now();
                    while !stop.load(Ordering::Relaxed) {
                        nominal += period;
                        wait_until(offset_by(nominal, settings.noise_secs()));

                        if !connected.load(Ordering::Relaxed) {
                            continue;
                        }
                        capture.on_edge();

                        if settings.glitch() {
                            wait_until(Instant::now() + GLITCH_WIDTH);
                            capture.on_edge();
                            log::trace!("injected glitch pulse");
                        }
                    }
                })?
        };

        log::debug!(
            "sync generator running at {:.3} Hz, jitter {} us, glitch rate {}",
            settings.frame_rate,
            settings.jitter_us,
            settings.glitch_rate,
        );

        Ok(Self {
            connected,
            stop,
            handle: Some(handle),
        })
    }

    /// Plug or unplug the simulated cable and return the new state.
    pub fn toggle_connected(&self) -> bool {
        !self.connected.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Drop for SyncGenerator {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("sync generator thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genlock::{MonotonicClock, SharedAccumulator};

    #[test]
    fn format_pin_toggles() {
        let pin = FormatPin::new(false);
        assert!(!pin.level());
        assert!(pin.toggle());
        assert!(pin.level());

        // Clones share the line.
        let shared = pin.clone();
        assert!(!shared.toggle());
        assert!(!pin.level());
    }

    #[test]
    fn period_requires_positive_rate() {
        let mut settings = SyncSettings {
            frame_rate: 50.0,
            jitter_us: 0.0,
            glitch_rate: 0.0,
        };
        assert_eq!(settings.period(), Some(Duration::from_millis(20)));

        settings.frame_rate = 0.0;
        assert_eq!(settings.period(), None);
        settings.frame_rate = f64::NAN;
        assert_eq!(settings.period(), None);
        settings.frame_rate = f64::INFINITY;
        assert_eq!(settings.period(), None);
    }

    #[test]
    fn negative_offset_moves_earlier() {
        let now = Instant::now();
        assert!(offset_by(now, -0.001) < now);
        assert!(offset_by(now, 0.001) > now);
    }

    #[test]
    fn generator_feeds_capture_until_unplugged() {
        let settings = SyncSettings {
            frame_rate: 200.0,
            jitter_us: 0.0,
            glitch_rate: 0.0,
        };
        let shared = Arc::new(SharedAccumulator::new(1000));
        let capture = EdgeCapture::new(Arc::new(MonotonicClock::new()), shared.clone());
        let generator = SyncGenerator::spawn(capture, settings, true).unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(shared.drain().count > 0);

        assert!(!generator.toggle_connected());
        // Let any edge already past the connected check land before draining.
        thread::sleep(Duration::from_millis(20));
        shared.drain();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(shared.drain().count, 0);
    }
}
