/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Bytes may arrive split at any position, including inside a UTF-8
/// sequence, so lines are only decoded once their terminator is seen.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Bytes before this offset are known to hold no line terminator.
    scan_from: usize,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.scan_from..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let line_end = self.scan_from + offset;
            self.scan_from = 0;
            let mut line = self.buffer.drain(..=line_end).collect::<Vec<_>>();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.scan_from = self.buffer.len();

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment lines start with a colon.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
