use std::fmt;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::GenerateArgs;
use crate::error::GenerateError;
use crate::formats::Query;
use crate::result_store::ResultStore;
use crate::terms::TermTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum QueryStyle {
    #[default]
    Simple,
    Natural,
    Video,
}

impl QueryStyle {
    /// Unknown names fall back to `simple` with a warning.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Self::Simple,
            "natural" => Self::Natural,
            "video" => Self::Video,
            other => {
                tracing::warn!(style = other, "unknown query style; using 'simple'");
                Self::Simple
            }
        }
    }

    pub fn format(self, emotion: &str, subject: &str, setting: &str) -> String {
        match self {
            Self::Simple => format!("{emotion} {subject} {setting}"),
            Self::Natural => format!("{subject} expressing {emotion} in {setting}"),
            Self::Video => format!("{emotion} {subject} {setting} video"),
        }
    }
}

impl fmt::Display for QueryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Natural => "natural",
            Self::Video => "video",
        })
    }
}

/// Cartesian product `emotions x subjects x settings` in table order, with
/// dense ids from 0.
pub fn generate(table: &TermTable, style: QueryStyle) -> Vec<Query> {
    let mut queries = Vec::with_capacity(table.combinations());
    for emotion in table.emotions.iter() {
        for subject in table.subjects.iter() {
            for setting in table.settings.iter() {
                queries.push(Query {
                    id: queries.len(),
                    query: style.format(emotion, subject, setting),
                    emotion: emotion.to_owned(),
                    subject: subject.to_owned(),
                    setting: setting.to_owned(),
                    scraped: false,
                });
            }
        }
    }
    queries
}

pub fn generate_from_path(
    path: &std::path::Path,
    style: QueryStyle,
) -> Result<Vec<Query>, GenerateError> {
    let table = crate::terms::load(path)?;
    let total = table.combinations();
    if total == 0 {
        return Err(GenerateError::load(
            path,
            format!(
                "no valid combinations ({} emotions, {} subjects, {} settings)",
                table.emotions.len(),
                table.subjects.len(),
                table.settings.len()
            ),
        ));
    }

    tracing::info!(total, %style, "generating queries");
    let queries = generate(&table, style);
    for query in queries.iter().take(5) {
        tracing::info!(id = query.id, query = %query.query, "sample query");
    }
    Ok(queries)
}

pub fn run(args: GenerateArgs) -> anyhow::Result<PathBuf> {
    let started_at = std::time::Instant::now();
    let queries = generate_from_path(&args.terms, args.style).context("generate queries")?;

    let store = ResultStore::new(&args.out);
    let path = store
        .save_queries(&queries)
        .context("write queries artifact")?;

    tracing::info!(
        queries = queries.len(),
        path = %path.display(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "query generation complete"
    );
    Ok(path)
}
