//! Error-reporting callback used by the lifecycles.
//!
//! A failed network call, a rejected response or a local precondition
//! failure is handed to an [`ErrorReporter`] exactly once before the
//! lifecycle aborts.

use std::sync::Mutex;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Logs every report at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, message: &str) {
        tracing::error!(error = %message, "Horde request failed");
    }
}

/// Keeps reports in memory, for front ends that display them later.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, message: &str) {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reporter_collects_in_order() {
        let reporter = MemoryReporter::new();
        reporter.report("first");
        reporter.report("second");
        assert_eq!(reporter.messages(), vec!["first", "second"]);
        assert_eq!(reporter.take().len(), 2);
        assert!(reporter.messages().is_empty());
    }
}
