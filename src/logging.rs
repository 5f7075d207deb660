//! Diagnostic output toggle

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

static FILTER_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

const VERBOSE_DIRECTIVE: &str = "proxy_fetcher=debug";
const QUIET_DIRECTIVE: &str = "warn";

fn build_filter(diagnostics_enabled: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if diagnostics_enabled {
            VERBOSE_DIRECTIVE
        } else {
            QUIET_DIRECTIVE
        })
    })
}

/// Turn verbose diagnostics on or off.
///
/// The first call installs the global subscriber; later calls only swap its
/// filter. `RUST_LOG`, when set, takes precedence over the flag. If another
/// subscriber was installed first, this does nothing.
pub fn configure(diagnostics_enabled: bool) {
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(e) = handle.reload(build_filter(diagnostics_enabled)) {
            eprintln!("Warning: Failed to reload log filter: {}", e);
        }
        return;
    }

    let (filter, handle) = reload::Layer::new(build_filter(diagnostics_enabled));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();

    if installed.is_ok() {
        let _ = FILTER_HANDLE.set(handle);
    }
}
