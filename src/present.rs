use crate::genlock::LockState;
use crate::types::Rgb;

/// Horizontal distance between the starts of two characters: a 5 pixel glyph and a 1 pixel gap.
pub const CHAR_PITCH: u32 = 6;

/// The display palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayColor {
    Red,
    Green,
    Blue,
}

impl DisplayColor {
    /// The color shown for each lock state.
    pub fn for_state(state: LockState) -> Self {
        match state {
            LockState::TriLevel => DisplayColor::Blue,
            LockState::BiLevel => DisplayColor::Green,
            LockState::NoLock => DisplayColor::Red,
        }
    }

    pub fn rgb(self) -> Rgb {
        match self {
            DisplayColor::Red => (255, 0, 0),
            DisplayColor::Green => (0, 255, 0),
            DisplayColor::Blue => (0, 0, 255),
        }
    }
}

/// One frame of scrolling text, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub text: String,

    /// How far the text is scrolled left, in pixels.
    pub offset: u32,

    pub color: DisplayColor,
}

/// Something that can draw a [`DisplayFrame`].
pub trait DisplayRenderer {
    fn show(&mut self, frame: &DisplayFrame);
}

/// The text shown for a state and rate.
pub fn display_text(state: LockState, fps: f64) -> String {
    match state {
        LockState::NoLock => state.to_string(),
        _ => format!("{state} {fps:.3}"),
    }
}

/// Turns the current classification into scrolling frames.
#[derive(Debug, Default)]
pub struct Presenter {
    offset: u32,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the frame at the current scroll position, then advance the scroll. The offset
    /// wraps to zero once it passes the width of the text.
    pub fn next_frame(&mut self, state: LockState, fps: f64) -> DisplayFrame {
        let text = display_text(state, fps);
        let frame = DisplayFrame {
            offset: self.offset,
            color: DisplayColor::for_state(state),
            text,
        };

        let max_offset = frame.text.len() as u32 * CHAR_PITCH;
        self.offset += 1;
        if self.offset > max_offset {
            self.offset = 0;
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_per_state() {
        assert_eq!(display_text(LockState::NoLock, 59.94), "NO LOCK");
        assert_eq!(display_text(LockState::TriLevel, 59.94), "TRI-LEVEL 59.940");
        assert_eq!(display_text(LockState::BiLevel, 25.0), "BI-LEVEL 25.000");
    }

    #[test]
    fn colors_per_state() {
        assert_eq!(DisplayColor::for_state(LockState::TriLevel), DisplayColor::Blue);
        assert_eq!(DisplayColor::for_state(LockState::BiLevel), DisplayColor::Green);
        assert_eq!(DisplayColor::for_state(LockState::NoLock), DisplayColor::Red);
        assert_eq!(DisplayColor::Blue.rgb(), (0, 0, 255));
    }

    #[test]
    fn scroll_advances_after_each_frame() {
        let mut presenter = Presenter::new();
        assert_eq!(presenter.next_frame(LockState::NoLock, 0.0).offset, 0);
        assert_eq!(presenter.next_frame(LockState::TriLevel, 59.94).offset, 1);
        assert_eq!(presenter.next_frame(LockState::NoLock, 0.0).offset, 2);
    }

    #[test]
    fn scroll_wraps_past_text_width() {
        let mut presenter = Presenter::new();
        // "NO LOCK" is 7 characters, 42 pixels; offsets 0..=42 are shown.
        let offsets: Vec<u32> = (0..45)
            .map(|_| presenter.next_frame(LockState::NoLock, 0.0).offset)
            .collect();
        assert_eq!(offsets[42], 42);
        assert_eq!(offsets[43], 0);
        assert_eq!(offsets[44], 1);
    }

    #[test]
    fn shorter_text_wraps_a_scroll_already_past_it() {
        let mut presenter = Presenter::new();
        for _ in 0..50 {
            presenter.next_frame(LockState::TriLevel, 59.94);
        }

        // "NO LOCK" is only 42 pixels wide, so the scroll restarts right after this frame.
        assert_eq!(presenter.next_frame(LockState::NoLock, 0.0).offset, 50);
        assert_eq!(presenter.next_frame(LockState::NoLock, 0.0).offset, 0);
    }
}
