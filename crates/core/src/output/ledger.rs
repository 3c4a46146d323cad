//! The scenario ledger.
//!
//! A semicolon-delimited text file with one header line and one row per
//! accepted scenario:
//!
//! ```text
//! merge commit;ours commit;theirs commit;base commit;#conflict files;conflict counts;conflict file paths
//! 3f2a...;91cc...;07be...;5d10...;2;1,3;src/A.java,src/B.java
//! ```
//!
//! Rows are appended and flushed one at a time and never rewritten, so a
//! crashed run leaves a valid prefix behind. The list columns are
//! comma-joined and index-aligned.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::LedgerError;

pub const HEADER: &str = "merge commit;ours commit;theirs commit;base commit;#conflict files;conflict counts;conflict file paths";

const DELIMITER: char = ';';
const LIST_DELIMITER: char = ',';

/// One accepted scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub merge: String,
    pub ours: String,
    pub theirs: String,
    /// Empty for scenarios without a merge base.
    pub base: Option<String>,
    /// Per-file conflict-block counts, index-aligned with `paths`.
    pub conflict_counts: Vec<u32>,
    pub paths: Vec<String>,
}

impl LedgerRow {
    pub fn file_count(&self) -> usize {
        self.paths.len()
    }

    /// Render the row as one ledger line (no trailing newline).
    pub fn to_line(&self) -> String {
        let counts: Vec<String> = self.conflict_counts.iter().map(u32::to_string).collect();
        [
            self.merge.clone(),
            self.ours.clone(),
            self.theirs.clone(),
            self.base.clone().unwrap_or_default(),
            self.file_count().to_string(),
            counts.join(","),
            self.paths.join(","),
        ]
        .join(";")
    }

    /// Parse one data line. `line_no` is 1-based and only used in errors.
    ///
    /// Only the four commit columns are required. Ledgers that lack the
    /// conflict-counts column (six columns) are accepted; their counts come
    /// back empty.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, LedgerError> {
        let cols: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();
        if cols.len() < 4 {
            return Err(LedgerError::MalformedRow {
                line: line_no,
                detail: format!("expected at least 4 columns, found {}", cols.len()),
            });
        }
        if cols[..3].iter().any(|c| c.is_empty()) {
            return Err(LedgerError::MalformedRow {
                line: line_no,
                detail: "merge, ours and theirs commits are required".into(),
            });
        }

        let (counts_col, paths_col) = match cols.len() {
            4 | 5 => ("", ""),
            6 => ("", cols[5]),
            _ => (cols[5], cols[6]),
        };
        let conflict_counts = split_list(counts_col)
            .map(|c| {
                c.parse::<u32>().map_err(|_| LedgerError::MalformedRow {
                    line: line_no,
                    detail: format!("invalid conflict count '{}'", c),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            merge: cols[0].to_string(),
            ours: cols[1].to_string(),
            theirs: cols[2].to_string(),
            base: (!cols[3].is_empty()).then(|| cols[3].to_string()),
            conflict_counts,
            paths: split_list(paths_col).map(str::to_string).collect(),
        })
    }
}

fn split_list(col: &str) -> impl Iterator<Item = &str> {
    col.split(LIST_DELIMITER).map(str::trim).filter(|s| !s.is_empty())
}

fn looks_like_commit_id(s: &str) -> bool {
    (4..=64).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Read every data row of the ledger at `path`.
///
/// A first line whose first column is not a commit id is treated as the
/// header. Blank lines are ignored.
pub fn read_ledger(path: &Path) -> Result<Vec<LedgerRow>, LedgerError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut rows = Vec::new();
    let mut first = true;
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if first {
            first = false;
            let lead = line.split(DELIMITER).next().unwrap_or("").trim();
            if !looks_like_commit_id(lead) {
                debug!(header = line, "skipping ledger header");
                continue;
            }
        }
        rows.push(LedgerRow::parse(line, idx + 1)?);
    }
    Ok(rows)
}

/// Drop rows whose merge commit already appeared earlier. First occurrence wins.
pub fn dedup_by_merge(rows: Vec<LedgerRow>) -> Vec<LedgerRow> {
    let mut seen = HashSet::new();
    let total = rows.len();
    let unique: Vec<LedgerRow> = rows.into_iter().filter(|r| seen.insert(r.merge.clone())).collect();
    if unique.len() < total {
        debug!(dropped = total - unique.len(), "dropped duplicate ledger rows");
    }
    unique
}

/// Append-only ledger writer.
pub struct LedgerWriter {
    path: PathBuf,
    file: File,
}

impl LedgerWriter {
    /// Open the ledger at `path`.
    ///
    /// With `fresh` (or when the file does not exist yet) the file is
    /// truncated and the header written; otherwise rows are appended to the
    /// existing file.
    pub fn open(path: impl Into<PathBuf>, fresh: bool) -> Result<Self, LedgerError> {
        let path = path.into();
        let io_err = |source| LedgerError::Io { path: path.display().to_string(), source };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = if fresh || !path.exists() {
            let mut file = File::create(&path).map_err(io_err)?;
            writeln!(file, "{}", HEADER).map_err(io_err)?;
            file
        } else {
            warn!(path = %path.display(), "appending to existing ledger");
            OpenOptions::new().append(true).open(&path).map_err(io_err)?
        };
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &LedgerRow) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io { path: self.path.display().to_string(), source };
        writeln!(self.file, "{}", row.to_line()).map_err(io_err)?;
        self.file.flush().map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(merge: &str) -> LedgerRow {
        LedgerRow {
            merge: merge.into(),
            ours: "bbbb".into(),
            theirs: "cccc".into(),
            base: Some("dddd".into()),
            conflict_counts: vec![1, 3],
            paths: vec!["src/A.java".into(), "src/B.java".into()],
        }
    }

    #[test]
    fn test_row_line_format() {
        assert_eq!(row("aaaa").to_line(), "aaaa;bbbb;cccc;dddd;2;1,3;src/A.java,src/B.java");
        let no_base = LedgerRow { base: None, ..row("aaaa") };
        assert_eq!(no_base.to_line(), "aaaa;bbbb;cccc;;2;1,3;src/A.java,src/B.java");
    }

    #[test]
    fn test_parse_round_trip_and_short_formats() {
        let parsed = LedgerRow::parse("aaaa;bbbb;cccc;dddd;2;1,3;src/A.java,src/B.java", 2).unwrap();
        assert_eq!(parsed, row("aaaa"));

        // Six-column ledgers have no counts column.
        let six = LedgerRow::parse("aaaa; bbbb; cccc; ; 1; x.java", 2).unwrap();
        assert_eq!(six.base, None);
        assert!(six.conflict_counts.is_empty());
        assert_eq!(six.paths, vec!["x.java".to_string()]);

        let four = LedgerRow::parse("aaaa;bbbb;cccc;dddd", 2).unwrap();
        assert!(four.paths.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_rows() {
        assert!(matches!(
            LedgerRow::parse("aaaa;bbbb", 7),
            Err(LedgerError::MalformedRow { line: 7, .. })
        ));
        assert!(LedgerRow::parse(";bbbb;cccc;dddd", 1).is_err());
        assert!(LedgerRow::parse("aaaa;bbbb;cccc;dddd;1;x;f.java", 1).is_err());
    }

    #[test]
    fn test_writer_then_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/statistics.csv");

        let mut writer = LedgerWriter::open(&path, true).unwrap();
        writer.append(&row("aaaa")).unwrap();
        writer.append(&row("eeee")).unwrap();
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));
        assert_eq!(text.lines().count(), 3);

        let rows = read_ledger(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].merge, "eeee");

        // Reopening without `fresh` appends and keeps a single header.
        let mut writer = LedgerWriter::open(&path, false).unwrap();
        writer.append(&row("ffff")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches(HEADER).count(), 1);
        assert_eq!(read_ledger(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_reader_accepts_headerless_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external.csv");
        std::fs::write(&path, "\naaaa;bbbb;cccc;dddd;1;1;a.c\n").unwrap();
        assert_eq!(read_ledger(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let mut dup = row("aaaa");
        dup.ours = "9999".into();
        let rows = dedup_by_merge(vec![row("aaaa"), row("eeee"), dup]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ours, "bbbb");
        assert_eq!(rows[1].merge, "eeee");
    }
}
