use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use fxhash::FxHashMap;
use lazy_static::lazy_static;

use crate::config::defs::RESULTS_TABLE_NAME;

/// Canonical column order of the results table. The empty-record
/// constructor and the header writer both derive from this list, so rows
/// and header always align.
pub const RESULT_COLUMNS: &[&str] = &[
    "Read set name",
    "Read set type",
    "Real or fake reads",
    "Fake Illumina read quality",
    "Fake long read quality",
    "Read files",
    "Reference name",
    "Reference total length",
    "# reference sequences",
    "Reference sequence lengths",
    "Reference sequence depths",
    "Reference sequence circularity",
    "Reference GC (%)",
    "Assembler",
    "Assembler setting/output",
    "Assembler version",
    "Assembly command(s)",
    "Assembly kmer size",
    "Assembly result",
    "Assembly time (seconds)",
    "Assembly FASTA",
    "Assembly graph",
    "# contigs (>= 0 bp)",
    "# contigs (>= 1000 bp)",
    "# contigs (>= 5000 bp)",
    "# contigs (>= 10000 bp)",
    "# contigs (>= 25000 bp)",
    "# contigs (>= 50000 bp)",
    "Total length (>= 0 bp)",
    "Total length (>= 1000 bp)",
    "Total length (>= 5000 bp)",
    "Total length (>= 10000 bp)",
    "Total length (>= 25000 bp)",
    "Total length (>= 50000 bp)",
    "# contigs",
    "Largest contig",
    "Total length",
    "GC (%)",
    "N50",
    "NG50",
    "N75",
    "NG75",
    "L50",
    "LG50",
    "L75",
    "LG75",
    "# misassemblies",
    "# misassembled contigs",
    "Misassembled contigs length",
    "# local misassemblies",
    "Total misassemblies",
    "# unaligned mis. contigs",
    "# unaligned contigs",
    "Unaligned length",
    "Genome fraction (%)",
    "Duplication ratio",
    "# N's per 100 kbp",
    "# mismatches per 100 kbp",
    "# indels per 100 kbp",
    "Largest alignment",
    "Total aligned length",
    "NA50",
    "NGA50",
    "NA75",
    "NGA75",
    "LA50",
    "LGA50",
    "LA75",
    "LGA75",
    "Dead ends",
    "Percent dead ends",
    "Complete",
    "Structurally perfect",
    "Completely perfect",
];

lazy_static! {
    static ref COLUMN_INDEX: FxHashMap<&'static str, usize> = RESULT_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i))
        .collect();
}

/// One evaluated read set's metrics, as an ordered mapping over the
/// canonical columns. Unset values serialize as empty strings.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    values: Vec<String>,
}

impl ResultRecord {
    pub fn new() -> Self {
        ResultRecord {
            values: vec![String::new(); RESULT_COLUMNS.len()],
        }
    }

    /// Stores a value under a recognized column; unrecognized names are
    /// ignored, so external report metrics merge without schema drift.
    pub fn set<V: Into<String>>(&mut self, column: &str, value: V) {
        if let Some(&i) = COLUMN_INDEX.get(column) {
            self.values[i] = value.into();
        }
    }

    pub fn get(&self, column: &str) -> &str {
        match COLUMN_INDEX.get(column) {
            Some(&i) => &self.values[i],
            None => "",
        }
    }

    pub fn header() -> String {
        RESULT_COLUMNS.join("\t")
    }

    pub fn to_row(&self) -> String {
        self.values.join("\t")
    }
}

impl Default for ResultRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// The persistent results table. Appends only; existing rows are never
/// rewritten or reordered.
pub struct ResultsTable {
    path: PathBuf,
}

impl ResultsTable {
    /// Creates the table with its header row if it does not exist yet.
    pub fn create(out_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
        let path = out_dir.join(RESULTS_TABLE_NAME);
        if !path.is_file() {
            let mut file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            writeln!(file, "{}", ResultRecord::header())?;
        }
        Ok(ResultsTable { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row under an exclusive advisory lock, so concurrent
    /// harness processes targeting the same table never interleave
    /// partial rows. The lock covers only the append and flush.
    pub fn append(&self, record: &ResultRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;
        let result = writeln!(file, "{}", record.to_row()).and_then(|_| file.flush());
        FileExt::unlock(&file)
            .with_context(|| format!("Failed to unlock {}", self.path.display()))?;
        result.with_context(|| format!("Failed to append to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_matches_header_width() {
        let record = ResultRecord::new();
        let row = record.to_row();
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields.len(), RESULT_COLUMNS.len());
        assert!(fields.iter().all(|f| f.is_empty()));
        assert_eq!(
            ResultRecord::header().split('\t').count(),
            RESULT_COLUMNS.len()
        );
    }

    #[test]
    fn test_set_and_get_by_column() {
        let mut record = ResultRecord::new();
        record.set("Read set name", "sample__good_short");
        record.set("N50", "123456");
        assert_eq!(record.get("Read set name"), "sample__good_short");
        assert_eq!(record.get("N50"), "123456");
        assert_eq!(record.get("NGA50"), "");

        // Unrecognized metric names from external reports are dropped.
        record.set("Some unknown QUAST metric", "1");
        assert_eq!(record.get("Some unknown QUAST metric"), "");
    }

    #[test]
    fn test_row_field_positions_follow_schema() {
        let mut record = ResultRecord::new();
        record.set("Read set name", "s");
        record.set("Completely perfect", "yes");
        let row = record.to_row();
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields[0], "s");
        assert_eq!(fields[RESULT_COLUMNS.len() - 1], "yes");
    }

    #[test]
    fn test_table_create_and_append() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let table = ResultsTable::create(dir.path())?;

        let mut record = ResultRecord::new();
        record.set("Read set name", "sample");
        record.set("Assembly result", "success");
        table.append(&record)?;

        // Creating again must not clobber the existing table.
        let table = ResultsTable::create(dir.path())?;
        let mut second = ResultRecord::new();
        second.set("Read set name", "other");
        table.append(&second)?;

        let contents = std::fs::read_to_string(table.path())?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ResultRecord::header());
        assert!(lines[1].starts_with("sample\t"));
        assert!(lines[2].starts_with("other\t"));
        Ok(())
    }
}
