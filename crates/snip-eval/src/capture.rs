//! Output capture for `console.log`.
//!
//! The evaluator writes through the [`Console`] trait. [`OutputCapture`]
//! owns one line buffer that is reused across runs; installing it hands out a
//! [`CaptureGuard`], and the buffer is emptied again whenever that guard
//! goes away, whether the run finished, threw, timed out or panicked.

use log::trace;

/// Sink for console output, one call per logical write.
pub trait Console {
    fn write_line(&mut self, line: String);
}

impl Console for Vec<String> {
    fn write_line(&mut self, line: String) {
        self.push(line);
    }
}

/// Reusable capture buffer.
#[derive(Debug, Default)]
pub struct OutputCapture {
    buffer: Vec<String>,
    installed: bool,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing. The buffer starts out empty.
    pub fn install(&mut self) -> CaptureGuard<'_> {
        self.buffer.clear();
        self.installed = true;
        trace!("output capture installed");
        CaptureGuard { capture: self }
    }

    /// No guard is active and nothing is buffered.
    pub fn is_idle(&self) -> bool {
        !self.installed && self.buffer.is_empty()
    }
}

/// An active capture. Dropping it restores the idle state.
#[derive(Debug)]
pub struct CaptureGuard<'a> {
    capture: &'a mut OutputCapture,
}

impl CaptureGuard<'_> {
    /// Lines captured so far, in write order.
    pub fn lines(&self) -> &[String] {
        &self.capture.buffer
    }

    /// Stop capturing and take the lines.
    pub fn finish(self) -> Vec<String> {
        self.capture.buffer.drain(..).collect()
    }
}

impl Console for CaptureGuard<'_> {
    fn write_line(&mut self, line: String) {
        self.capture.buffer.push(line);
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.capture.buffer.clear();
        self.capture.installed = false;
        trace!("output capture released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_returns_lines_in_order() {
        let mut capture = OutputCapture::new();
        let mut guard = capture.install();
        guard.write_line("0".into());
        guard.write_line("1".into());
        assert_eq!(guard.lines(), ["0", "1"]);
        assert_eq!(guard.finish(), vec!["0", "1"]);
        assert!(capture.is_idle());
    }

    #[test]
    fn test_drop_without_finish_clears() {
        let mut capture = OutputCapture::new();
        {
            let mut guard = capture.install();
            guard.write_line("leftover".into());
        }
        assert!(capture.is_idle());
        let guard = capture.install();
        assert!(guard.lines().is_empty());
    }

    #[test]
    fn test_drop_during_unwind_clears() {
        let mut capture = OutputCapture::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = capture.install();
            guard.write_line("before panic".into());
            panic!("evaluator bug");
        }));
        assert!(result.is_err());
        assert!(capture.is_idle());
    }
}
