//! Logging setup for the `bulk-jira` binary.
//!
//! Logs go to stderr so dry-run output on stdout stays machine readable.
//! `RUST_LOG` overrides the defaults below.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "bulk_jira=info,bulk_jira_core=info,reqwest=warn";
const VERBOSE_FILTER: &str = "bulk_jira=debug,bulk_jira_core=debug,reqwest=warn";

pub fn init_logging(verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let default_filter = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
