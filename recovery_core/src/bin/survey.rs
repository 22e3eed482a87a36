//! Standalone crawl-and-rank tool: probes the known Electrum fleet plus
//! whatever peers it discovers along the way, and prints a refreshed
//! server list in the format `indexer::provider::PUBLIC_SERVERS` expects.
//!
//! Not part of the interactive recovery flow; run on its own, periodically,
//! to keep the embedded server list current.

use recovery_core::indexer::provider::PUBLIC_SERVERS;
use recovery_core::survey::{render_source, Survey, SurveyConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SurveyConfig::with_defaults(PUBLIC_SERVERS.iter().map(|s| s.to_string()).collect());

    let survey = Survey::new(config);
    let results = survey.run();

    println!("{}", render_source(&results));
}
