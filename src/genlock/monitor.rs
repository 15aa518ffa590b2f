use std::fmt;
use crate::config::Tunables;
use crate::genlock::{classify, Aggregator, FormatDetect, LockState, LockThresholds, SyncFormat, WindowReport};
use crate::present::{DisplayRenderer, Presenter};
use crate::types::{millis_to_micros, Micros};

/// The per-window diagnostic line.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticLine<'a> {
    pub report: &'a WindowReport,
    pub state: LockState,

    /// The raw HD-detect level sampled for this window.
    pub hd_det: bool,
}

impl fmt::Display for DiagnosticLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.report.stats;
        write!(
            f,
            "Frames:{}  FPS:{:.3}  Type:{}  HD_DET:{}  \
             Period_us_mean:{:.3}  Jitter_RMS_us:{:.3}  Jitter_pp_us:{}  Jitter_RMS_ppm:{:.1}",
            self.report.count,
            stats.fps,
            self.state,
            u8::from(self.hd_det),
            stats.mean_period_us,
            stats.rms_jitter_us,
            stats.pp_jitter_us,
            stats.jitter_ppm,
        )
    }
}

/// The foreground loop: closes a measurement window every `window_ms` and refreshes the
/// display every `refresh_ms`, each on its own cadence.
pub struct Monitor<F: FormatDetect> {
    aggregator: Aggregator,
    format_input: F,
    thresholds: LockThresholds,
    window_us: Micros,
    refresh_us: Micros,
    presenter: Presenter,

    /// Classification and rate from the most recent window, shown until the next one.
    state: LockState,
    fps: f64,
    last_report: Option<WindowReport>,

    last_window_at: Micros,
    last_refresh_at: Micros,
}

impl<F: FormatDetect> Monitor<F> {
    /// Create a monitor whose first window and refresh are counted from `start`.
    pub fn new(aggregator: Aggregator, format_input: F, tunables: &Tunables, start: Micros) -> Self {
        log::info!(target: "genlock", "Genlock Analyzer Started");

        Self {
            aggregator,
            format_input,
            thresholds: LockThresholds {
                no_lock_timeout_us: tunables.no_lock_timeout_us,
                min_lock_fps: tunables.min_lock_fps,
            },
            window_us: millis_to_micros(tunables.window_ms),
            refresh_us: millis_to_micros(tunables.refresh_ms),
            presenter: Presenter::new(),
            state: LockState::NoLock,
            fps: 0.0,
            last_report: None,
            last_window_at: start,
            last_refresh_at: start,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn last_report(&self) -> Option<&WindowReport> {
        self.last_report.as_ref()
    }

    /// Run whichever steps are due at `now` and return the time of the next deadline.
    pub fn poll(&mut self, now: Micros, renderer: &mut impl DisplayRenderer) -> Micros {
        if now.saturating_sub(self.last_window_at) >= self.window_us {
            self.close_window(now);
            self.last_window_at = now;
        }

        if now.saturating_sub(self.last_refresh_at) >= self.refresh_us {
            let frame = self.presenter.next_frame(self.state, self.fps);
            renderer.show(&frame);
            self.last_refresh_at = now;
        }

        let next_window = self.last_window_at.saturating_add(self.window_us);
        let next_refresh = self.last_refresh_at.saturating_add(self.refresh_us);
        next_window.min(next_refresh)
    }

    /// Drain the window, classify it and log the diagnostic line.
    pub fn close_window(&mut self, now: Micros) -> LockState {
        let report = self.aggregator.run_window(now);
        let hd_det = self.format_input.level();

        self.fps = report.stats.fps;
        self.state = classify(
            report.since_last_edge,
            report.stats.fps,
            SyncFormat::from_level(hd_det),
            &self.thresholds,
        );

        let line = DiagnosticLine {
            report: &report,
            state: self.state,
            hd_det,
        };
        log::info!(target: "genlock", "{line}");

        self.last_report = Some(report);
        self.state
    }
}
