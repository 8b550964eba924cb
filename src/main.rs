/*
 * Phosphers
 *
 * Opens the viewer on a new run. An optional first argument names a TOML settings
 * file; missing keys take their defaults. Logging is controlled with RUST_LOG,
 * e.g. `RUST_LOG=phosphers=debug`.
 */

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phosphers=info")))
        .init();

    phosphers::viewer::run();
}
