// Copyright Catenary Transit Initiatives
// Progress reporting seam for resolution runs

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Warning,
    Error,
}

/// Injected observer the pipeline calls with structured progress events.
/// The core never talks to a concrete sink directly; hosts decide where the
/// messages go.
pub trait ProgressObserver: Send + Sync {
    fn emit(&self, level: ProgressLevel, message: &str);

    fn info(&self, message: &str) {
        self.emit(ProgressLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(ProgressLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.emit(ProgressLevel::Error, message);
    }
}

/// Default observer: forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn emit(&self, level: ProgressLevel, message: &str) {
        match level {
            ProgressLevel::Info => tracing::info!("{message}"),
            ProgressLevel::Warning => tracing::warn!("{message}"),
            ProgressLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Swallows everything. Handy in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn emit(&self, _level: ProgressLevel, _message: &str) {}
}
