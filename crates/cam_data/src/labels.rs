//! Class label tables mapping a class index to a code and a readable name.
//!
//! Three on-disk formats are understood:
//!
//! - JSON index map: `{"0": ["n01440764", "tench"], "1": [...]}`
//! - Synset text, one class per line: `n01440764 tench, Tinca tinca`
//! - Plain text, one readable label per line
//!
//! # Example
//!
//! ```rust,ignore
//! use cam_data::labels::{LabelSource, LabelTable};
//!
//! let table = LabelTable::load(&LabelSource::imagenet(), None)?;
//! assert_eq!(table.name(0), "tench");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::fetch::{cached_download, is_url};
use crate::{DataError, Result};

/// Remote ImageNet class index (JSON index map format).
pub const IMAGENET_CLASS_INDEX_URL: &str =
    "https://s3.amazonaws.com/deep-learning-models/image-models/imagenet_class_index.json";

/// Cache sub-directory for downloaded label files.
const LABELS_SUBDIR: &str = "labels";

/// Largest class index accepted from a JSON index map.
pub const MAX_CLASS_INDEX: usize = 1 << 20;

/// Where a label table comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSource {
    /// Remote label file, downloaded once into the cache.
    Url(String),
    /// Local label file.
    Path(PathBuf),
}

impl LabelSource {
    /// The public ImageNet class index.
    #[must_use]
    pub fn imagenet() -> Self {
        Self::Url(IMAGENET_CLASS_INDEX_URL.to_string())
    }
}

impl Default for LabelSource {
    fn default() -> Self {
        Self::imagenet()
    }
}

impl FromStr for LabelSource {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DataError::InvalidInput("empty label source".to_string()));
        }
        if is_url(s) {
            Ok(Self::Url(s.to_string()))
        } else {
            Ok(Self::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One entry of a label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    /// Machine-readable code, e.g. a WordNet id such as `n01440764`.
    pub code: String,
    /// Human-readable label, e.g. `tench`.
    pub name: String,
}

impl ClassLabel {
    /// Create a new label.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    fn fallback(index: usize) -> Self {
        Self::new(index.to_string(), format!("class_{}", index))
    }
}

/// Lookup table from class index to [`ClassLabel`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    labels: Vec<ClassLabel>,
}

impl LabelTable {
    /// Create a table from labels ordered by class index.
    #[must_use]
    pub fn new(labels: Vec<ClassLabel>) -> Self {
        Self { labels }
    }

    /// A table with only fallback names, `class_0 .. class_{n-1}`.
    #[must_use]
    pub fn anonymous(n_classes: usize) -> Self {
        Self::new((0..n_classes).map(ClassLabel::fallback).collect())
    }

    /// Load a table from a URL (cached) or a local file.
    pub fn load(source: &LabelSource, cache_dir: Option<PathBuf>) -> Result<Self> {
        let path = match source {
            LabelSource::Url(url) => cached_download(url, LABELS_SUBDIR, cache_dir)?,
            LabelSource::Path(path) => path.clone(),
        };
        let table = Self::from_file(&path)?;
        info!("Loaded {} class labels from {}", table.len(), source);
        Ok(table)
    }

    /// Read a label file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse label file content, detecting the format.
    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Self::from_json_str(trimmed)
        } else {
            Self::from_text(content)
        }
    }

    /// Parse a JSON index map (`{"0": ["code", "name"]}`) or a JSON array of names.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))?;

        match value {
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, entry) in map {
                    let index: usize = key.parse().map_err(|_| {
                        DataError::Parse(format!("class index '{}' is not a number", key))
                    })?;
                    if index > MAX_CLASS_INDEX {
                        return Err(DataError::Parse(format!(
                            "class index {} exceeds the limit of {}",
                            index, MAX_CLASS_INDEX
                        )));
                    }
                    entries.push((index, parse_json_entry(index, &entry)?));
                }
                Self::from_indexed(entries)
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, entry)| parse_json_entry(index, entry))
                .collect::<Result<Vec<_>>>()
                .map(Self::new),
            other => Err(DataError::Parse(format!(
                "expected a JSON object or array of labels, got {}",
                other
            ))),
        }
    }

    /// Parse a synset file (`n01440764 tench, Tinca tinca`) or one label per line.
    pub fn from_text(content: &str) -> Result<Self> {
        let labels: Vec<ClassLabel> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| match line.split_once(char::is_whitespace) {
                Some((code, name)) if is_synset_id(code) => ClassLabel::new(code, name.trim()),
                _ => ClassLabel::new(index.to_string(), line),
            })
            .collect();

        if labels.is_empty() {
            return Err(DataError::Parse("label file contains no labels".to_string()));
        }
        Ok(Self::new(labels))
    }

    fn from_indexed(mut entries: Vec<(usize, ClassLabel)>) -> Result<Self> {
        entries.sort_by_key(|(index, _)| *index);
        let len = match entries.last() {
            Some((index, _)) => index
                .checked_add(1)
                .ok_or_else(|| DataError::Parse(format!("class index {} is too large", index)))?,
            None => 0,
        };

        let mut labels: Vec<ClassLabel> = (0..len).map(ClassLabel::fallback).collect();
        let mut filled = 0;
        for (index, label) in entries {
            labels[index] = label;
            filled += 1;
        }
        if filled < len {
            warn!("Label table has {} gaps, using fallback names", len - filled);
        }
        Ok(Self { labels })
    }

    /// Number of labelled classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get the label of a class.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.labels.get(index)
    }

    /// Human-readable name of a class, `class_<index>` when unknown.
    #[must_use]
    pub fn name(&self, index: usize) -> String {
        self.get(index)
            .map_or_else(|| format!("class_{}", index), |l| l.name.clone())
    }

    /// Machine-readable code of a class, the index itself when unknown.
    #[must_use]
    pub fn code(&self, index: usize) -> String {
        self.get(index)
            .map_or_else(|| index.to_string(), |l| l.code.clone())
    }

    /// Case-insensitive substring search over names and codes.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<(usize, &ClassLabel)> {
        let query = query.to_lowercase();
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| {
                label.name.to_lowercase().contains(&query)
                    || label.code.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Iterate over `(index, label)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ClassLabel)> {
        self.labels.iter().enumerate()
    }
}

fn parse_json_entry(index: usize, entry: &Value) -> Result<ClassLabel> {
    match entry {
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(code), Value::String(name)] => Ok(ClassLabel::new(code, name)),
            [Value::String(name)] => Ok(ClassLabel::new(index.to_string(), name)),
            _ => Err(DataError::Parse(format!(
                "class {}: expected [code, name], got {}",
                index, entry
            ))),
        },
        Value::String(name) => Ok(ClassLabel::new(index.to_string(), name)),
        other => Err(DataError::Parse(format!(
            "class {}: expected a label, got {}",
            index, other
        ))),
    }
}

/// WordNet synset ids look like `n01440764`.
fn is_synset_id(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('n') && token.len() == 9 && chars.all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_index_map() {
        let json = r#"{"1": ["n01443537", "goldfish"], "0": ["n01440764", "tench"]}"#;
        let table = LabelTable::parse(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(0), "tench");
        assert_eq!(table.code(1), "n01443537");
    }

    #[test]
    fn test_parse_json_with_gaps() {
        let json = r#"{"0": ["n01440764", "tench"], "2": ["n01484850", "great_white_shark"]}"#;
        let table = LabelTable::parse(json).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.name(1), "class_1");
        assert_eq!(table.name(2), "great_white_shark");
    }

    #[test]
    fn test_parse_json_array() {
        let table = LabelTable::parse(r#"["cat", "dog"]"#).unwrap();
        assert_eq!(table.name(1), "dog");
        assert_eq!(table.code(1), "1");
    }

    #[test]
    fn test_parse_json_rejects_bad_entries() {
        assert!(LabelTable::parse(r#"{"zero": ["n0", "tench"]}"#).is_err());
        assert!(LabelTable::parse(r#"{"0": [1, 2, 3]}"#).is_err());
        assert!(LabelTable::from_json_str("42").is_err());
    }

    #[test]
    fn test_parse_json_rejects_huge_index() {
        let json = r#"{"18446744073709551615": ["n01440764", "tench"]}"#;
        assert!(matches!(LabelTable::parse(json), Err(DataError::Parse(_))));

        let json = r#"{"100000000000": ["n01440764", "tench"]}"#;
        assert!(matches!(LabelTable::parse(json), Err(DataError::Parse(_))));

        let json = format!(r#"{{"{}": "last"}}"#, MAX_CLASS_INDEX + 1);
        assert!(matches!(LabelTable::parse(&json), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_parse_synset_text() {
        let text = "n01440764 tench, Tinca tinca\nn01443537 goldfish, Carassius auratus\n";
        let table = LabelTable::parse(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.code(0), "n01440764");
        assert_eq!(table.name(0), "tench, Tinca tinca");
    }

    #[test]
    fn test_parse_plain_text() {
        let table = LabelTable::parse("tabby cat\n\nEgyptian cat\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(0), "tabby cat");
        assert_eq!(table.code(1), "1");
        assert!(LabelTable::parse("\n\n").is_err());
    }

    #[test]
    fn test_fallback_names() {
        let table = LabelTable::anonymous(3);
        assert_eq!(table.name(2), "class_2");
        assert_eq!(table.name(10), "class_10");
        assert_eq!(table.code(10), "10");
    }

    #[test]
    fn test_search() {
        let table = LabelTable::parse("n02123045 tabby\nn02124075 Egyptian_cat\nn02085620 Chihuahua\n")
            .unwrap();
        let hits = table.search("CAT");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
        assert_eq!(table.search("n0208").len(), 1);
    }

    #[test]
    fn test_label_source_parse() {
        assert_eq!(
            "https://example.com/l.json".parse::<LabelSource>().unwrap(),
            LabelSource::Url("https://example.com/l.json".to_string())
        );
        assert_eq!(
            "imagenet_classes.txt".parse::<LabelSource>().unwrap(),
            LabelSource::Path(PathBuf::from("imagenet_classes.txt"))
        );
        assert_eq!(LabelSource::default(), LabelSource::imagenet());
    }

    #[test]
    fn test_load_local_file() {
        let path = std::env::temp_dir().join(format!("cam-rs-labels-{}.txt", std::process::id()));
        std::fs::write(&path, "cat\ndog\n").unwrap();

        let table = LabelTable::load(&LabelSource::Path(path.clone()), None).unwrap();
        assert_eq!(table.name(0), "cat");

        std::fs::remove_file(&path).unwrap();
    }
}
