//! Last-error record and alert reporting
//!
//! A session owns exactly one `ErrorRecord`. Every failing operation
//! overwrites it; nothing ever deletes it. Callers read it through
//! `Session::last_error` after a call returns a failure indicator.
//!
//! Surfacing is pluggable: an `AlertSink` receives the record whenever
//! auto-alert is enabled, or when the caller explicitly re-raises. The
//! default sink reports through `tracing::error!`.

/// Structured capture of the last failure raised by the embedded runtime.
#[derive(Debug, Default, Clone)]
pub struct ErrorRecord {
    /// Exception category, e.g. the exception type's rendering
    pub category: String,
    /// Exception payload description
    pub message: String,
    /// What the bridge was doing when the failure occurred
    pub context: String,
    /// Formatted stack trace, possibly empty
    pub traceback: String,
}

impl ErrorRecord {
    /// The human-readable alert text.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("runtime exception occurred while: ");
        out.push_str(&self.context);
        out.push('\n');
        if !self.traceback.is_empty() {
            out.push_str(&self.traceback);
            if !self.traceback.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str(&self.category);
        if !self.message.is_empty() {
            out.push_str(": ");
            out.push_str(&self.message);
        }
        out
    }
}

/// Reporting collaborator that surfaces error records to the outside.
pub trait AlertSink {
    fn alert(&self, record: &ErrorRecord);
}

/// Default sink: structured error logging.
#[derive(Debug, Default)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn alert(&self, record: &ErrorRecord) {
        tracing::error!(
            context = %record.context,
            category = %record.category,
            "{}",
            record.summary()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_contains_all_fields() {
        let record = ErrorRecord {
            category: "ValueError".to_string(),
            message: "bad input".to_string(),
            context: "Calling function f in module m".to_string(),
            traceback: "  at m.f\n".to_string(),
        };
        let s = record.summary();
        assert!(s.contains("Calling function f in module m"));
        assert!(s.contains("  at m.f"));
        assert!(s.contains("ValueError: bad input"));
    }

    #[test]
    fn test_summary_without_traceback_or_message() {
        let record = ErrorRecord {
            category: "ImportError".to_string(),
            context: "Importing missing".to_string(),
            ..Default::default()
        };
        let s = record.summary();
        assert!(s.ends_with("ImportError"));
    }
}
