// Dataset index - immutable snapshot of sampleable clips
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::LoadError;

/// Column holding the clip path, used as the entry id
pub const PATH_COLUMN: &str = "path";
/// Column holding the reference transcription
pub const SENTENCE_COLUMN: &str = "sentence";

/// One sampleable clip and its reference transcription
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    pub transcription: String,
}

impl DatasetEntry {
    pub fn new(id: impl Into<String>, transcription: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcription: transcription.into(),
        }
    }
}

/// Read-only set of dataset entries, built once and shared by `Arc`.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    entries: Arc<[DatasetEntry]>,
}

impl Default for DatasetIndex {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl DatasetIndex {
    /// An index with no entries; sampling from it yields nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from already-parsed entries, keeping the first of any duplicate id
    pub fn from_entries(entries: Vec<DatasetEntry>) -> Self {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut unique = Vec::with_capacity(entries.len());
        for entry in entries {
            if seen.insert(entry.id.clone()) {
                unique.push(entry);
            } else {
                log::debug!("Skipping duplicate dataset id: {}", entry.id);
            }
        }

        Self {
            entries: unique.into(),
        }
    }

    /// Parse tab-separated text with a header row.
    ///
    /// Errors only describe why the result is unusable; callers are expected
    /// to fall back to [`DatasetIndex::empty`].
    pub fn parse_tsv(text: &str) -> Result<Self, LoadError> {
        let mut lines = text.trim().lines();

        let header = lines.next().ok_or(LoadError::NoDataRows)?;
        let columns: Vec<&str> = header.split('\t').map(str::trim).collect();

        let path_index = columns.iter().position(|c| *c == PATH_COLUMN);
        let sentence_index = columns.iter().position(|c| *c == SENTENCE_COLUMN);
        let (Some(path_index), Some(sentence_index)) = (path_index, sentence_index) else {
            return Err(LoadError::MissingColumns {
                found: columns.iter().map(|c| c.to_string()).collect(),
            });
        };

        let mut rows = 0usize;
        let mut entries = Vec::new();
        for line in lines {
            rows += 1;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() <= path_index.max(sentence_index) {
                continue;
            }

            let path = fields[path_index].trim();
            let sentence = fields[sentence_index].trim();
            if !path.is_empty() && !sentence.is_empty() {
                entries.push(DatasetEntry::new(path, sentence));
            }
        }

        if rows == 0 {
            return Err(LoadError::NoDataRows);
        }
        if entries.is_empty() {
            return Err(LoadError::NoValidRows { rows });
        }

        Ok(Self::from_entries(entries))
    }

    /// Soft variant of [`DatasetIndex::parse_tsv`]: any failure yields an empty
    /// index, with the reason handed back for the caller to report
    pub fn load(text: &str) -> (Self, Option<LoadError>) {
        match Self::parse_tsv(text) {
            Ok(index) => {
                log::info!("Dataset loaded into memory. Found {} valid entries.", index.len());
                (index, None)
            }
            Err(e) => {
                log::warn!("Failed to parse dataset, continuing with an empty index: {}", e);
                (Self::empty(), Some(e))
            }
        }
    }

    /// Shared view of every entry
    pub fn snapshot(&self) -> Arc<[DatasetEntry]> {
        Arc::clone(&self.entries)
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DatasetEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "client_id\tpath\tsentence\tup_votes\n\
        c1\tcommon_voice_th_1.mp3\tสวัสดี\t2\n\
        c2\tcommon_voice_th_2.mp3\t  hello world  \t0\n\
        c3\t\tmissing path\t1\n\
        c4\tcommon_voice_th_4.mp3\t   \t1\n\
        c5\tshort\n";

    #[test]
    fn test_parse_keeps_only_complete_rows() {
        let index = DatasetIndex::parse_tsv(SAMPLE_TSV).unwrap();
        assert_eq!(
            index.entries(),
            &[
                DatasetEntry::new("common_voice_th_1.mp3", "สวัสดี"),
                DatasetEntry::new("common_voice_th_2.mp3", "hello world"),
            ]
        );
    }

    #[test]
    fn test_header_columns_can_be_in_any_order() {
        let index = DatasetIndex::parse_tsv("sentence\tpath\nhi there\ta.mp3\n").unwrap();
        assert_eq!(index.entries(), &[DatasetEntry::new("a.mp3", "hi there")]);
    }

    #[test]
    fn test_missing_columns_fail_softly() {
        let text = "client_id\tfile\tsentence\nc1\ta.mp3\thello\n";
        assert!(matches!(
            DatasetIndex::parse_tsv(text),
            Err(LoadError::MissingColumns { .. })
        ));
        let (index, error) = DatasetIndex::load(text);
        assert!(index.is_empty());
        assert!(matches!(error, Some(LoadError::MissingColumns { .. })));
    }

    #[test]
    fn test_header_only_or_blank_input() {
        assert!(matches!(DatasetIndex::parse_tsv("path\tsentence\n"), Err(LoadError::NoDataRows)));
        assert!(matches!(DatasetIndex::parse_tsv(""), Err(LoadError::NoDataRows)));
        assert!(DatasetIndex::load("   \n").0.is_empty());
    }

    #[test]
    fn test_no_valid_rows() {
        let result = DatasetIndex::parse_tsv("path\tsentence\n\t\nx.mp3\t \n");
        assert!(matches!(result, Err(LoadError::NoValidRows { rows: 2 })));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let index = DatasetIndex::parse_tsv("path\tsentence\na\tfirst\na\tsecond\nb\tthird\n").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0).unwrap().transcription, "first");
    }

    #[test]
    fn test_snapshot_is_shared() {
        let index = DatasetIndex::from_entries(vec![DatasetEntry::new("a", "hello")]);
        let clone = index.clone();
        assert!(Arc::ptr_eq(&index.snapshot(), &clone.snapshot()));
    }

    #[test]
    fn test_windows_line_endings() {
        let index = DatasetIndex::parse_tsv("path\tsentence\r\na.mp3\thello\r\n").unwrap();
        assert_eq!(index.entries(), &[DatasetEntry::new("a.mp3", "hello")]);
    }
}
