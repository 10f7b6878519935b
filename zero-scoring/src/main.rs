//! Zero Scoring - parse a raw LLM response into a bounded score.
//!
//! Reads the response from the file given as the first argument, or from
//! stdin, and prints the resulting `AnalysisResult` as JSON. No network access.

use std::io::Read;

use anyhow::{Context, Result};
use zero_common::config::Config;
use zero_common::logging::init_from_config;
use zero_scoring::ResponseParser;

fn main() -> Result<()> {
    let config = Config::load_and_validate()?;
    init_from_config(&config.observability);

    tracing::debug!("Zero Scoring v{}", env!("CARGO_PKG_VERSION"));

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read response from {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read response from stdin")?;
            buf
        }
    };

    let parser = ResponseParser::new(config.scoring);
    let result = parser.parse(&raw);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
