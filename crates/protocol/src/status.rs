/// Progress sink for the host UI. Purely observational: nothing in the
/// pipeline branches on it.
pub trait StatusSink: Send + Sync {
    fn post_status(&self, message: &str, is_error: bool);
}

/// Forwards status lines to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn post_status(&self, message: &str, is_error: bool) {
        if is_error {
            log::warn!("{message}");
        } else {
            log::info!("{message}");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn post_status(&self, _message: &str, _is_error: bool) {}
}
