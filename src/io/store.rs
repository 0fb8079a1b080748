use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    CorrectnessFeedback, ImprovementFeedback, LanguageFeedback, MetadataFeedback, NewVersion,
    VersionRecord,
};

/// Separator between elements of list-valued columns
pub const LIST_SEPARATOR: &str = "; ";

/// Column order of the version table
pub const HEADER: [&str; 17] = [
    "question_id",
    "version_number",
    "timestamp",
    "created_by",
    "original_text",
    "improved_text",
    "correctness_feedback_is_correct",
    "correctness_feedback_errors",
    "correctness_feedback_explanation",
    "language_feedback_issues_found",
    "language_feedback_feedback",
    "language_feedback_explanation",
    "improvement_justification",
    "metadata_topic",
    "metadata_subtopic",
    "metadata_blooms_level",
    "metadata_difficulty",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Version table I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Version table CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Version table lock poisoned")]
    LockPoisoned,

    #[error("Version number overflow for question {question_id}")]
    VersionOverflow { question_id: String },
}

/// Append-only CSV table of question versions.
///
/// Writes from one process are serialized by an internal lock; separate
/// processes sharing a file are not coordinated.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl VersionStore {
    /// Open the table, creating it with a header row if it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let is_empty = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if !is_empty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&self.path)?;
        writer.write_record(HEADER)?;
        writer.flush().map_err(|source| self.io_error(source))?;
        info!("Initialized version table: {:?}", self.path);
        Ok(())
    }

    /// Append one row
    pub fn append(&self, record: &VersionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.write_row(record)
    }

    /// Assign the next version number and append, atomically within this process
    pub fn append_next(&self, version: NewVersion) -> Result<VersionRecord, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let version_number = self.next_version_number(&version.question_id)?;
        let record = version.into_record(version_number);
        self.write_row(&record)?;
        Ok(record)
    }

    fn write_row(&self, record: &VersionRecord) -> Result<(), StoreError> {
        // The table may have been removed since open
        self.initialize()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.serialize(VersionRow::from(record))?;
        writer.flush().map_err(|source| self.io_error(source))?;

        info!(
            "Appended version {} for question {} to {:?}",
            record.version_number, record.question_id, self.path
        );
        Ok(())
    }

    /// All versions of a question, in file order
    pub fn list(&self, question_id: &str) -> Result<Vec<VersionRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let mut versions = Vec::new();
        for (index, row) in reader.deserialize::<VersionRow>().enumerate() {
            match row {
                Ok(row) if row.question_id == question_id => versions.push(row.into_record()),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable row {} in {:?}: {}", index + 1, self.path, e),
            }
        }

        debug!("Found {} version(s) for question {}", versions.len(), question_id);
        Ok(versions)
    }

    /// 1 for an unknown question, otherwise highest stored version + 1
    pub fn next_version_number(&self, question_id: &str) -> Result<u32, StoreError> {
        let versions = self.list(question_id)?;
        match versions.iter().map(|v| v.version_number).max() {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| StoreError::VersionOverflow {
                    question_id: question_id.to_string(),
                }),
        }
    }

    /// The whole table as stored
    pub fn read_raw(&self) -> Result<String, StoreError> {
        std::fs::read_to_string(&self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Flat on-disk shape of a version; field order matches [`HEADER`]
#[derive(Debug, Serialize, Deserialize)]
struct VersionRow {
    question_id: String,
    version_number: u32,
    timestamp: String,
    created_by: String,
    original_text: String,
    improved_text: String,
    #[serde(deserialize_with = "lenient_bool")]
    correctness_feedback_is_correct: Option<bool>,
    correctness_feedback_errors: String,
    correctness_feedback_explanation: String,
    #[serde(deserialize_with = "lenient_bool")]
    language_feedback_issues_found: Option<bool>,
    language_feedback_feedback: String,
    language_feedback_explanation: String,
    improvement_justification: String,
    metadata_topic: String,
    metadata_subtopic: String,
    metadata_blooms_level: String,
    metadata_difficulty: String,
}

impl From<&VersionRecord> for VersionRow {
    fn from(record: &VersionRecord) -> Self {
        let correctness = record.correctness.clone().unwrap_or_default();
        let language = record.language.clone().unwrap_or_default();
        let improvement = record.improvement.clone().unwrap_or_default();
        let metadata = record.metadata.clone().unwrap_or_default();

        Self {
            question_id: record.question_id.clone(),
            version_number: record.version_number,
            timestamp: record.timestamp.clone(),
            created_by: record.created_by.clone(),
            original_text: record.original_text.clone(),
            improved_text: record.improved_text.clone(),
            correctness_feedback_is_correct: correctness.is_correct,
            correctness_feedback_errors: join_list(&correctness.errors),
            correctness_feedback_explanation: correctness.explanation,
            language_feedback_issues_found: language.issues_found,
            language_feedback_feedback: join_list(&language.feedback),
            language_feedback_explanation: language.explanation,
            improvement_justification: improvement.justification,
            metadata_topic: metadata.topic,
            metadata_subtopic: metadata.subtopic,
            metadata_blooms_level: metadata.blooms_level,
            metadata_difficulty: metadata.difficulty,
        }
    }
}

impl VersionRow {
    /// A feedback group is present when any of its columns is non-empty
    fn into_record(self) -> VersionRecord {
        let correctness = (self.correctness_feedback_is_correct.is_some()
            || !self.correctness_feedback_errors.is_empty()
            || !self.correctness_feedback_explanation.is_empty())
        .then(|| CorrectnessFeedback {
            is_correct: self.correctness_feedback_is_correct,
            errors: split_list(&self.correctness_feedback_errors),
            explanation: self.correctness_feedback_explanation,
        });

        let language = (self.language_feedback_issues_found.is_some()
            || !self.language_feedback_feedback.is_empty()
            || !self.language_feedback_explanation.is_empty())
        .then(|| LanguageFeedback {
            issues_found: self.language_feedback_issues_found,
            feedback: split_list(&self.language_feedback_feedback),
            explanation: self.language_feedback_explanation,
        });

        let improvement = (!self.improvement_justification.is_empty()
            || !self.improved_text.is_empty())
        .then(|| ImprovementFeedback {
            improved_question: self.improved_text.clone(),
            justification: self.improvement_justification,
        });

        let has_metadata = [
            &self.metadata_topic,
            &self.metadata_subtopic,
            &self.metadata_blooms_level,
            &self.metadata_difficulty,
        ]
        .iter()
        .any(|field| !field.is_empty());
        let metadata = has_metadata.then(|| MetadataFeedback {
            topic: self.metadata_topic,
            subtopic: self.metadata_subtopic,
            blooms_level: self.metadata_blooms_level,
            difficulty: self.metadata_difficulty,
        });

        VersionRecord {
            question_id: self.question_id,
            version_number: self.version_number,
            timestamp: self.timestamp,
            created_by: self.created_by,
            original_text: self.original_text,
            improved_text: self.improved_text,
            correctness,
            language,
            improvement,
            metadata,
        }
    }
}

/// `true`/`false` in any case; empty or unrecognised cells read as absent
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell = String::deserialize(deserializer)?;
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") {
        Ok(Some(true))
    } else if cell.eq_ignore_ascii_case("false") {
        Ok(Some(false))
    } else {
        if !cell.is_empty() {
            warn!("Ignoring unrecognised boolean cell {:?}", cell);
        }
        Ok(None)
    }
}

/// Join list elements with [`LIST_SEPARATOR`], escaping `\` and `;` inside elements
pub fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.replace('\\', "\\\\").replace(';', "\\;"))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Inverse of [`join_list`]. Unescaped rows written by older tools split the same way
/// as long as they contain no backslashes.
pub fn split_list(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = cell.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            ';' if chars.peek() == Some(&' ') => {
                chars.next();
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    items
}
