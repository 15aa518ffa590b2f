/// A monotonic timestamp in microseconds. 64 bits wide, so it does not wrap during any
/// realistic uptime, unlike the 32-bit `micros()` counter found on small MCUs.
pub type Micros = u64;

/// The interval between two accepted sync edges, in microseconds. A gap longer than
/// `u32::MAX` µs (~71 minutes) saturates.
pub type Period = u32;

/// The duration of a foreground interval (window length, refresh interval), in milliseconds.
pub type Millis = u64;

/// The type for an rgb pixel on the LED matrix.
pub type Rgb = (u8, u8, u8);

/// Convert milliseconds to the microsecond timebase used by the capture clock, saturating at
/// `Micros::MAX`.
pub const fn millis_to_micros(ms: Millis) -> Micros {
    ms.saturating_mul(1000)
}
