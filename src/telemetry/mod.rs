use std::io;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, writing formatted lines to the browser console.
///
/// `directive` is an `EnvFilter` string such as `info` or `quire_app::editor=debug`; an
/// invalid directive falls back to `info`. Calling this twice is a no-op.
pub(crate) fn init(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ConsoleMakeWriter)
        .without_time()
        .with_ansi(false)
        .with_target(true)
        .try_init();
    if installed.is_ok() {
        tracing::debug!(directive, "console logging ready");
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ConsoleMethod {
    Error,
    Warn,
    Info,
    Debug,
}

impl ConsoleMethod {
    fn for_level(level: Option<Level>) -> Self {
        match level {
            Some(Level::ERROR) => ConsoleMethod::Error,
            Some(Level::WARN) => ConsoleMethod::Warn,
            Some(Level::DEBUG) | Some(Level::TRACE) => ConsoleMethod::Debug,
            _ => ConsoleMethod::Info,
        }
    }
}

struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(ConsoleMethod::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(ConsoleMethod::for_level(Some(*meta.level())))
    }
}

/// Buffers one formatted event and hands it to `console.*` when dropped.
struct ConsoleWriter {
    method: ConsoleMethod,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(method: ConsoleMethod) -> Self {
        Self {
            method,
            buf: Vec::new(),
        }
    }

    fn line(&self) -> String {
        String::from_utf8_lossy(&self.buf).trim_end().to_string()
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = wasm_bindgen::JsValue::from_str(&self.line());
        match self.method {
            ConsoleMethod::Error => web_sys::console::error_1(&line),
            ConsoleMethod::Warn => web_sys::console::warn_1(&line),
            ConsoleMethod::Info => web_sys::console::info_1(&line),
            ConsoleMethod::Debug => web_sys::console::debug_1(&line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_levels_map_to_console_methods() {
        assert_eq!(ConsoleMethod::for_level(Some(Level::ERROR)), ConsoleMethod::Error);
        assert_eq!(ConsoleMethod::for_level(Some(Level::WARN)), ConsoleMethod::Warn);
        assert_eq!(ConsoleMethod::for_level(Some(Level::INFO)), ConsoleMethod::Info);
        assert_eq!(ConsoleMethod::for_level(Some(Level::TRACE)), ConsoleMethod::Debug);
        assert_eq!(ConsoleMethod::for_level(None), ConsoleMethod::Info);
    }

    #[test]
    fn test_writer_buffers_one_line() {
        let mut w = ConsoleWriter::new(ConsoleMethod::Info);
        w.write_all(b" INFO quire_app: saved\n").expect("buffered");
        assert_eq!(w.line(), " INFO quire_app: saved");
        // An empty buffer skips the console call on drop.
        w.buf.clear();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_init_is_idempotent() {
        init("debug");
        init("not a [valid directive");
        tracing::info!("logged through the console writer");
    }
}
