//! Capture bins.
//!
//! Views can divert part of their output into a named bin (for example a
//! script block that belongs at the bottom of the page) and an ancestor view
//! prints the bin later.
//!
//! Capturing is not reentrant: there is a single on/off toggle, so a
//! `capture_on` while already capturing is ignored and nested captures
//! interleave into the outer bin.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Separator placed between chunks of one bin.
pub const CAPTURE_SEPARATOR: &str = "\r\n";

#[derive(Debug, Default)]
struct CaptureState {
    active: Option<Active>,
    buffer: String,
    bins: HashMap<String, Vec<String>>,
}

#[derive(Debug)]
struct Active {
    position: String,
    append: bool,
}

/// Named bins of captured view output.
#[derive(Debug, Default)]
pub struct CaptureBins {
    state: Mutex<CaptureState>,
}

impl CaptureBins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts capturing into `position`.
    ///
    /// With `append` the chunk goes after earlier chunks of the bin,
    /// otherwise before them. Returns `false` when a capture is already
    /// running.
    pub fn capture_on(&self, position: &str, append: bool) -> bool {
        let mut state = self.state.lock();
        if state.active.is_some() {
            return false;
        }
        state.active = Some(Active {
            position: position.to_string(),
            append,
        });
        state.buffer.clear();
        true
    }

    /// Buffers `text` if a capture is running; returns whether it did.
    pub fn write(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        if state.active.is_none() {
            return false;
        }
        state.buffer.push_str(text);
        true
    }

    /// Stops capturing and files the buffered chunk. Returns `false` when
    /// no capture was running.
    pub fn capture_off(&self) -> bool {
        let mut state = self.state.lock();
        let Some(active) = state.active.take() else {
            return false;
        };
        let chunk = std::mem::take(&mut state.buffer);
        let bin = state.bins.entry(active.position).or_default();
        if active.append {
            bin.push(chunk);
        } else {
            bin.insert(0, chunk);
        }
        true
    }

    /// Returns the chunks of `position` joined by [`CAPTURE_SEPARATOR`].
    pub fn get_capture(&self, position: &str) -> String {
        self.state
            .lock()
            .bins
            .get(position)
            .map(|chunks| chunks.join(CAPTURE_SEPARATOR))
            .unwrap_or_default()
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Drops all bins and any running capture.
    pub fn clear(&self) {
        *self.state.lock() = CaptureState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_prepend() {
        let bins = CaptureBins::new();
        assert!(bins.capture_on("bottom", true));
        assert!(bins.write("<script>a</script>"));
        assert!(bins.capture_off());

        bins.capture_on("bottom", false);
        bins.write("<script>first</script>");
        bins.capture_off();

        bins.capture_on("bottom", true);
        bins.write("<script>b</script>");
        bins.capture_off();

        assert_eq!(
            bins.get_capture("bottom"),
            "<script>first</script>\r\n<script>a</script>\r\n<script>b</script>"
        );
        assert_eq!(bins.get_capture("top"), "");
    }

    #[test]
    fn test_not_reentrant() {
        let bins = CaptureBins::new();
        assert!(bins.capture_on("top", true));
        assert!(!bins.capture_on("bottom", true));
        bins.write("x");
        assert!(bins.capture_off());
        assert!(!bins.capture_off());
        assert!(!bins.write("y"));

        assert_eq!(bins.get_capture("top"), "x");
        assert_eq!(bins.get_capture("bottom"), "");
    }

    #[test]
    fn test_clear() {
        let bins = CaptureBins::new();
        bins.capture_on("top", true);
        bins.write("x");
        bins.clear();
        assert!(!bins.is_capturing());
        assert_eq!(bins.get_capture("top"), "");
    }
}
