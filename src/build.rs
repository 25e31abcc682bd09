use anyhow::Context as _;

use crate::cli::{BuildArgs, GenerateArgs};
use crate::formats::RunSummary;

pub async fn run(args: BuildArgs) -> anyhow::Result<RunSummary> {
    tracing::info!(
        terms = %args.terms.display(),
        out = %args.out.display(),
        style = %args.style,
        "build: generate"
    );
    let queries_path = crate::queries::run(GenerateArgs {
        terms: args.terms.clone(),
        out: args.out.clone(),
        style: args.style,
    })
    .context("generate")?;

    tracing::info!(platforms = ?args.options.platforms, "build: scrape");
    let queries = crate::scrape::load_queries(&queries_path)?;
    crate::scrape::run_queries(&queries, &args.out, &args.options)
        .await
        .context("scrape")
}
