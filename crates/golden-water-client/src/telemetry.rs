use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "golden_water_client=info,query_cache=info,media_blob=info";

/// Install a JSON log subscriber for the client crates.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once
/// keeps the first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}
