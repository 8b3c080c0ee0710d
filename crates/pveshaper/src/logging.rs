//! Log setup: `<RFC 3339 UTC> [LEVEL] message fields` on stderr.
//!
//! Events on [`SUCCESS_TARGET`] are tagged `[SUCCESS]` instead of their
//! level so successful guest updates stand out in the journal.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use pveshaper_core::SUCCESS_TARGET;

/// Event formatter producing tagged single-line records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaggedFormat;

fn tag(meta: &Metadata<'_>) -> &'static str {
    if meta.target() == SUCCESS_TARGET {
        "SUCCESS"
    } else {
        meta.level().as_str()
    }
}

impl<S, N> FormatEvent<S, N> for TaggedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        write!(writer, "{now} [{}] ", tag(event.metadata()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `-v` flags.
pub fn init_tracing(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity))),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(TaggedFormat)
        .init();
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

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

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(emit: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .event_format(TaggedFormat)
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn success_target_is_tagged() {
        let out = capture(|| {
            tracing::info!(target: SUCCESS_TARGET, vmid = 101, interface = "net0", "bandwidth updated");
        });
        assert!(out.contains(" [SUCCESS] bandwidth updated vmid=101 interface=\"net0\""), "{out}");
    }

    #[test]
    fn levels_are_tagged_with_rfc3339_timestamp() {
        let out = capture(|| {
            tracing::info!("schedule compiled");
            tracing::error!(vmid = 200, "bandwidth update failed");
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{out}");
        assert!(lines[0].contains(" [INFO] schedule compiled"), "{out}");
        assert!(lines[1].contains(" [ERROR] bandwidth update failed vmid=200"), "{out}");

        let stamp = lines[0].split(' ').next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(filter_for(0), "info");
        assert_eq!(filter_for(1), "debug");
        assert_eq!(filter_for(5), "trace");
    }
}
