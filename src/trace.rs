//! Communication trace: one formatted line per frame sent, frame received, or comment.

use std::fmt;
use std::sync::Arc;

use log::{debug, info};

/// Receiver for trace lines, e.g. a log view in a front end.
///
/// Called from whatever thread runs the operation.
pub trait LogSink: Send + Sync {
    fn log_line(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log_line(&self, line: &str) {
        self(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTag {
    Send,
    Recv,
    Comment,
}

impl fmt::Display for TraceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceTag::Send => "send",
            TraceTag::Recv => "recv",
            TraceTag::Comment => "cmt",
        })
    }
}

/// `MM/DD HH:MM:SS.mmm  [tag]  payload`
pub fn format_line(tag: TraceTag, payload: &str) -> String {
    format!(
        "{}  [{}]  {}",
        chrono::Local::now().format("%m/%d %H:%M:%S%.3f"),
        tag,
        payload
    )
}

/// Fans trace lines out to the `log` facade and an optional sink.
#[derive(Clone, Default)]
pub(crate) struct Tracer {
    sink: Option<Arc<dyn LogSink>>,
}

impl Tracer {
    pub(crate) fn new(sink: Option<Arc<dyn LogSink>>) -> Self {
        Self { sink }
    }

    pub(crate) fn set_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sink = Some(sink);
    }

    pub(crate) fn line(&self, tag: TraceTag, payload: &str) {
        match tag {
            TraceTag::Comment => info!("{}", payload),
            _ => debug!("[{}] {}", tag, payload),
        }
        if let Some(sink) = &self.sink {
            sink.log_line(&format_line(tag, payload));
        }
    }

    pub(crate) fn send(&self, bytes: &[u8]) {
        self.line(TraceTag::Send, &crate::types::to_hex_string(bytes));
    }

    pub(crate) fn recv(&self, bytes: &[u8]) {
        self.line(TraceTag::Recv, &crate::types::to_hex_string(bytes));
    }

    pub(crate) fn comment(&self, text: &str) {
        self.line(TraceTag::Comment, text);
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
