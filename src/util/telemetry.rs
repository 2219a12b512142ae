//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing. Callers may install their own subscriber instead; this
/// helper installs an env-filtered fmt subscriber only if none is set, so it
/// is safe to call from every test.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
