//! Script-visible text output sinks

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub trait StandardOutput: Send {
    fn write(&mut self, text: &str);

    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write("\n");
    }
}

/// Process stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl StandardOutput for ConsoleOutput {
    fn write(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// In-memory sink; clones share one buffer
#[derive(Debug, Default, Clone)]
pub struct BufferedOutput {
    buffer: Arc<Mutex<String>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl StandardOutput for BufferedOutput {
    fn write(&mut self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_output_is_shared() {
        let out = BufferedOutput::new();
        let mut sink = out.clone();
        sink.write("a");
        sink.write_line("b");
        assert_eq!(out.contents(), "ab\n");
        assert_eq!(out.take(), "ab\n");
        assert_eq!(out.contents(), "");
    }
}
