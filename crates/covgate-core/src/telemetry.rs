//! Tracing initialisation for the covgate binary.
//!
//! Logs go to stderr so report locations and listings printed on stdout stay
//! machine readable. Without `RUST_LOG`, only covgate's own crates log at the
//! requested level; suite child processes and dependencies stay at `warn`.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crates whose events follow the `--verbose` level.
const COVGATE_TARGETS: &[&str] = &["covgate", "covgate_core", "covgate_ci"];

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json`, every log line is a
/// JSON object carrying the enclosing `covgate.task` span. Only the first call
/// in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output_layer(json, std::io::stderr))
        .try_init()
        .ok();
}

/// `warn` globally, `level` for covgate's own targets.
fn default_filter(level: Level) -> EnvFilter {
    let directives = COVGATE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level.as_str().to_lowercase()))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(format!("warn,{}", directives))
}

fn output_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer()
            .with_writer(writer)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_ansi(false)
            .boxed()
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged.
#[cfg(test)]
pub(crate) fn capture_logs(json: bool, f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber =
        tracing_subscriber::registry().with(output_layer(json, move || writer.clone()));
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::TaskSpan;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }

    #[test]
    fn test_default_filter_scopes_level_to_covgate_targets() {
        let filter = default_filter(Level::DEBUG).to_string();
        assert!(filter.split(',').any(|d| d == "warn"));
        assert!(filter.contains("covgate_core=debug"));
        assert!(filter.contains("covgate_ci=debug"));
    }

    #[test]
    fn test_json_lines_carry_task_span() {
        let out = capture_logs(true, || {
            let _span = TaskSpan::enter("mergedReport");
            tracing::info!(classes = 3, "Report written");
        });
        let line: serde_json::Value =
            serde_json::from_str(out.lines().next().expect("one line")).expect("json");
        assert_eq!(line["span"]["task"], "mergedReport");
        assert_eq!(line["fields"]["classes"], 3);
    }
}
