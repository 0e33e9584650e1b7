#![forbid(unsafe_code)]

//! Default error reporting through `tracing`.

use rxt_core::{ErrorClass, ErrorHandler, RenderError};

/// Logs every reported error; configuration problems at `warn`, missing
/// templates at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle_error(&self, err: &RenderError) {
        match err.class() {
            ErrorClass::Configuration => {
                tracing::warn!(kind = "configuration", error = %err, "render configuration error");
            }
            ErrorClass::TemplateNotFound => {
                tracing::error!(kind = "template-not-found", error = %err, "render template missing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxt_core::TemplateName;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(err: &RenderError) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            TracingErrorHandler.handle_error(err);
        });
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn configuration_errors_warn() {
        let out = logged(&RenderError::UnknownStrategy {
            requested: "warp".into(),
            fallback: "normal".into(),
        });
        assert!(out.contains("WARN"));
        assert!(out.contains("configuration"));
        assert!(out.contains("warp"));
    }

    #[test]
    fn missing_templates_error() {
        let out = logged(&RenderError::TemplateNotFound {
            name: TemplateName::Error,
        });
        assert!(out.contains("ERROR"));
        assert!(out.contains("template-not-found"));
    }
}
