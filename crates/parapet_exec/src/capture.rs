//! In-memory stream capture.
//!
//! One capture per execution: the worker writes through it, the context
//! manager takes the buffers back whatever way the run ends. Both streams
//! share a single byte ceiling; text is kept up to the overflow point so a
//! timed-out or aborted run still returns its partial output.

use parapet_script::{Console, ConsoleError};

/// Byte-capped capture buffers for stdout and stderr.
#[derive(Debug, Default)]
pub struct StreamCapture {
    stdout: String,
    stderr: String,
    written: u64,
    limit: Option<u64>,
}

impl StreamCapture {
    /// Build a capture with an optional shared byte ceiling
    #[must_use]
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Total bytes written across both streams
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Consume the capture, yielding `(stdout, stderr)`
    #[must_use]
    pub fn into_streams(self) -> (String, String) {
        (self.stdout, self.stderr)
    }

    fn push(&mut self, buffer: fn(&mut Self) -> &mut String, text: &str) -> Result<(), ConsoleError> {
        buffer(self).push_str(text);
        self.written += text.len() as u64;
        match self.limit {
            Some(limit) if self.written > limit => Err(ConsoleError { limit }),
            _ => Ok(()),
        }
    }
}

impl Console for StreamCapture {
    fn stdout(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.push(|c| &mut c.stdout, text)
    }

    fn stderr(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.push(|c| &mut c.stderr, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_kept_separate() {
        let mut capture = StreamCapture::new(None);
        capture.stdout("out\n").unwrap();
        capture.stderr("err\n").unwrap();
        let (stdout, stderr) = capture.into_streams();
        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
    }

    #[test]
    fn test_shared_ceiling() {
        let mut capture = StreamCapture::new(Some(8));
        capture.stdout("1234").unwrap();
        capture.stderr("5678").unwrap();
        let err = capture.stdout("9").unwrap_err();
        assert_eq!(err.limit, 8);
    }

    #[test]
    fn test_partial_output_kept_on_overflow() {
        let mut capture = StreamCapture::new(Some(4));
        assert!(capture.stdout("123456").is_err());
        let (stdout, _) = capture.into_streams();
        assert_eq!(stdout, "123456");
    }
}
