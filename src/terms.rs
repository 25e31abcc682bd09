use std::collections::HashSet;
use std::path::Path;

use crate::error::GenerateError;

pub const EMOTION_COLUMN: &str = "Emotion";
pub const SUBJECT_COLUMN: &str = "Subject";
pub const SETTING_COLUMN: &str = "Setting";

/// Deduplicated terms in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTermSet {
    terms: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedTermSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the value is blank or already present.
    pub fn insert(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_owned());
        self.terms.push(value.to_owned());
        true
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.terms
    }
}

impl<'a> FromIterator<&'a str> for OrderedTermSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermTable {
    pub emotions: OrderedTermSet,
    pub subjects: OrderedTermSet,
    pub settings: OrderedTermSet,
    pub rows: usize,
}

impl TermTable {
    pub fn combinations(&self) -> usize {
        self.emotions.len() * self.subjects.len() * self.settings.len()
    }
}

pub fn load(path: &Path) -> Result<TermTable, GenerateError> {
    let file = std::fs::File::open(path)
        .map_err(|err| GenerateError::load(path, format!("open: {err}")))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    tracing::debug!(path = %path.display(), bytes = size, "reading term table");

    let table = read(file).map_err(|err| match err {
        ReadError::Schema(missing) => GenerateError::Schema { missing },
        ReadError::Load(reason) => GenerateError::load(path, reason),
    })?;

    tracing::info!(
        path = %path.display(),
        rows = table.rows,
        emotions = table.emotions.len(),
        subjects = table.subjects.len(),
        settings = table.settings.len(),
        "term table loaded"
    );
    tracing::debug!(emotions = ?preview(&table.emotions), "emotions");
    tracing::debug!(subjects = ?preview(&table.subjects), "subjects");
    tracing::debug!(settings = ?preview(&table.settings), "settings");

    Ok(table)
}

enum ReadError {
    Schema(Vec<String>),
    Load(String),
}

fn read<R: std::io::Read>(reader: R) -> Result<TermTable, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| ReadError::Load(format!("parse header: {err}")))?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::Load("file is empty".to_owned()));
    }

    let column = |name: &str| headers.iter().position(|h| h == name);
    let columns = [EMOTION_COLUMN, SUBJECT_COLUMN, SETTING_COLUMN].map(|name| (name, column(name)));
    let missing = columns
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| (*name).to_owned())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ReadError::Schema(missing));
    }
    let [emotion_idx, subject_idx, setting_idx] = columns.map(|(_, idx)| idx.unwrap_or_default());

    let mut table = TermTable::default();
    for record in reader.records() {
        let record = record.map_err(|err| ReadError::Load(format!("parse row: {err}")))?;
        table.rows += 1;
        if let Some(value) = record.get(emotion_idx) {
            table.emotions.insert(value);
        }
        if let Some(value) = record.get(subject_idx) {
            table.subjects.insert(value);
        }
        if let Some(value) = record.get(setting_idx) {
            table.settings.insert(value);
        }
    }

    if table.rows == 0 {
        return Err(ReadError::Load("table has no rows".to_owned()));
    }

    Ok(table)
}

fn preview(set: &OrderedTermSet) -> Vec<&str> {
    set.iter().take(5).collect()
}
