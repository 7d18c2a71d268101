// Diagnostic sink for per-hunk reporting.
//
// Both the encoder and decoder emit one human-readable line per hunk plus
// a small number of summary/warning lines. The sink is injected by the
// caller: the CLI forwards lines to its logger, tests collect them in a
// Vec. Sinks never fail and must not touch the buffers being processed.

/// Receives diagnostic lines from the codec.
///
/// Invoked synchronously, in offset order, during the codec's single pass.
pub trait DiagnosticSink {
    /// Accept one diagnostic line.
    fn emit(&mut self, message: &str);
}

/// Any `FnMut(&str)` closure is a sink.
impl<F: FnMut(&str)> DiagnosticSink for F {
    fn emit(&mut self, message: &str) {
        self(message);
    }
}

/// Default sink: forwards diagnostics to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&mut self, message: &str) {
        log::debug!("{message}");
    }
}
