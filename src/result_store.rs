use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::PersistError;
use crate::formats::{Query, RunSummary, ScrapeResult};

pub const QUERIES_FILE: &str = "queries.json";
pub const FINAL_RESULTS_FILE: &str = "final_results.json";
pub const VIDEOS_CSV_FILE: &str = "videos.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

pub fn checkpoint_file_name(processed: usize) -> String {
    format!("results_batch_{processed}.json")
}

const CSV_HEADER: [&str; 9] = [
    "query",
    "platform",
    "url",
    "title",
    "duration",
    "view_count",
    "description",
    "uploader",
    "upload_date",
];

/// Artifacts of one run, all under a single output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    out_dir: PathBuf,
}

impl ResultStore {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    pub fn save_queries(&self, queries: &[Query]) -> Result<PathBuf, PersistError> {
        let path = self.path(QUERIES_FILE);
        write_json_atomic(&path, &queries)?;
        log_written(&path);
        Ok(path)
    }

    pub fn save_results(&self, results: &[ScrapeResult], name: &str) -> Result<PathBuf, PersistError> {
        let path = self.path(name);
        tracing::info!(path = %path.display(), items = results.len(), "saving results");
        write_json_atomic(&path, &results)?;
        log_written(&path);

        let total_videos = results.iter().map(ScrapeResult::total_videos).sum::<usize>();
        let errors = results.iter().filter(|r| r.is_error()).count();
        tracing::info!(
            items = results.len(),
            total_videos,
            errors,
            "summary in file"
        );
        Ok(path)
    }

    pub fn save_summary(&self, summary: &RunSummary) -> Result<PathBuf, PersistError> {
        let path = self.path(RUN_SUMMARY_FILE);
        write_json_atomic(&path, summary)?;
        Ok(path)
    }

    /// One row per video across all successful results.
    pub fn save_videos_csv(&self, results: &[ScrapeResult]) -> Result<PathBuf, PersistError> {
        let path = self.path(VIDEOS_CSV_FILE);
        let csv_err = |source| PersistError::Csv {
            path: path.clone(),
            source,
        };

        let mut rows = 0_usize;
        write_atomic(&path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(CSV_HEADER).map_err(csv_err)?;
            for video in results.iter().flat_map(ScrapeResult::videos) {
                let duration = video.duration.map(|d| d.to_string()).unwrap_or_default();
                let view_count = video.view_count.map(|v| v.to_string()).unwrap_or_default();
                writer
                    .write_record([
                        video.query.as_str(),
                        video.platform.as_str(),
                        video.url.as_str(),
                        video.title.as_str(),
                        duration.as_str(),
                        view_count.as_str(),
                        video.description.as_deref().unwrap_or_default(),
                        video.uploader.as_deref().unwrap_or_default(),
                        video.upload_date.as_deref().unwrap_or_default(),
                    ])
                    .map_err(csv_err)?;
                rows += 1;
            }
            writer.flush().map_err(|source| PersistError::Io {
                path: path.clone(),
                source,
            })?;
            Ok(())
        })?;

        tracing::info!(path = %path.display(), rows, "videos csv written");
        Ok(path)
    }
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    write_atomic(path, |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Writes through a temp file in the destination directory and renames it
/// over `path`. The temp file is removed when `write` fails.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), PersistError>
where
    F: FnOnce(&mut std::fs::File) -> Result<(), PersistError>,
{
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

fn log_written(path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => tracing::info!(
            path = %path.display(),
            kb = %format!("{:.2}", meta.len() as f64 / 1024.0),
            "saved"
        ),
        Err(err) => tracing::debug!(path = %path.display(), ?err, "stat written file"),
    }
}

#[cfg(test)]
mod tests {
    use serde::ser::Error as _;

    use super::*;
    use crate::formats::{Platform, VideoRecord};

    fn query(id: usize) -> Query {
        Query {
            id,
            query: format!("q{id}"),
            emotion: "happy".to_owned(),
            subject: "dog".to_owned(),
            setting: "park".to_owned(),
            scraped: false,
        }
    }

    fn video(title: &str) -> VideoRecord {
        VideoRecord {
            platform: Platform::Youtube,
            query: "q0".to_owned(),
            url: "https://www.youtube.com/watch?v=abc".to_owned(),
            title: title.to_owned(),
            duration: Some(12.0),
            uploader: None,
            description: Some("a, \"quoted\" text".to_owned()),
            view_count: Some(3),
            upload_date: None,
        }
    }

    /// Emits part of an array, then fails.
    struct FailsHalfway;

    impl Serialize for FailsHalfway {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeSeq as _;
            let mut seq = serializer.serialize_seq(None)?;
            seq.serialize_element("partial")?;
            Err(S::Error::custom("simulated crash"))
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn save_creates_missing_directories() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ResultStore::new(temp.path().join("a").join("b"));
        let results = vec![ScrapeResult::success(&query(0), vec![video("t")])];
        let path = store.save_results(&results, FINAL_RESULTS_FILE)?;

        let parsed: Vec<ScrapeResult> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed, results);
        Ok(())
    }

    #[test]
    fn failed_write_keeps_previous_content() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("out.json");
        write_json_atomic(&path, &vec![1, 2, 3])?;

        let err = write_json_atomic(&path, &FailsHalfway).unwrap_err();
        assert!(matches!(err, PersistError::Json { .. }));

        let content: Vec<u32> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(content, [1, 2, 3]);
        assert_eq!(dir_entries(temp.path()), ["out.json"]);
        Ok(())
    }

    #[test]
    fn failed_first_write_leaves_no_destination() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("out.json");
        assert!(write_json_atomic(&path, &FailsHalfway).is_err());
        assert!(!path.exists());
        assert!(dir_entries(temp.path()).is_empty());
        Ok(())
    }

    #[test]
    fn videos_csv_has_header_and_one_row_per_video() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ResultStore::new(temp.path());
        let results = vec![
            ScrapeResult::success(&query(0), vec![video("one"), video("two")]),
            ScrapeResult::failure(&query(1), "boom".to_owned()),
        ];
        let path = store.save_videos_csv(&results)?;

        let mut reader = csv::Reader::from_path(path)?;
        assert_eq!(reader.headers()?.iter().collect::<Vec<_>>(), CSV_HEADER);
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][3], "one");
        assert_eq!(&rows[0][6], "a, \"quoted\" text");
        Ok(())
    }

    #[test]
    fn checkpoint_names_use_processed_count() {
        assert_eq!(checkpoint_file_name(200), "results_batch_200.json");
    }
}
