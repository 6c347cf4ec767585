use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fxhash::FxHashMap;

use crate::config::defs::{LONG_READ_SUFFIX, QUALITY_TIERS, READ_1_SUFFIX, READ_2_SUFFIX};

/// Derived state of a read set: which read files it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetType {
    Incomplete,
    ShortOnly,
    Hybrid,
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetType::Incomplete => "incomplete",
            SetType::ShortOnly => "short-only",
            SetType::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

/// A named group of sequencing read files representing one sample to
/// assemble. Mutated only by `add_read` during grouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSet {
    pub set_name: String,
    pub short_reads_1: Option<PathBuf>,
    pub short_reads_2: Option<PathBuf>,
    pub long_reads: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub fake: bool,
}

impl ReadSet {
    pub fn new(set_name: &str, fake: bool) -> Self {
        ReadSet {
            set_name: set_name.to_string(),
            fake,
            ..Default::default()
        }
    }

    /// Files a read into the slot its suffix names. Unrecognized names are
    /// left alone; the grouping functions reject them before this point.
    pub fn add_read(&mut self, path: &Path) {
        let name = file_name(path);
        if name.ends_with(READ_1_SUFFIX) {
            self.short_reads_1 = Some(path.to_path_buf());
        } else if name.ends_with(READ_2_SUFFIX) {
            self.short_reads_2 = Some(path.to_path_buf());
        } else if name.ends_with(LONG_READ_SUFFIX) {
            self.long_reads = Some(path.to_path_buf());
        }
    }

    pub fn set_type(&self) -> SetType {
        if self.short_reads_1.is_none() || self.short_reads_2.is_none() {
            SetType::Incomplete
        } else if self.long_reads.is_none() {
            SetType::ShortOnly
        } else {
            SetType::Hybrid
        }
    }

    pub fn read_list_str(&self) -> String {
        [&self.short_reads_1, &self.short_reads_2, &self.long_reads]
            .iter()
            .filter_map(|p| p.as_deref())
            .map(file_name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Looks for a reference FASTA whose stem appears in the set name.
    /// Only synthetic read sets get one; for real reads the truth is not
    /// exactly known.
    pub fn find_reference(&mut self, ref_dir: &Path) -> Result<()> {
        if !self.fake {
            return Ok(());
        }
        for path in sorted_files(ref_dir)? {
            let name = file_name(&path);
            if !(name.ends_with(".fasta") || name.ends_with(".fasta.gz")) {
                continue;
            }
            let stem = name.split(".fasta").next().unwrap_or_default();
            if !stem.is_empty() && self.set_name.contains(stem) {
                self.reference = Some(path);
                break;
            }
        }
        Ok(())
    }

    pub fn reference_name(&self) -> String {
        match &self.reference {
            Some(reference) => file_name(reference),
            None => "None".to_string(),
        }
    }

    pub fn real_or_fake(&self) -> &'static str {
        if self.fake { "fake" } else { "real" }
    }

    /// Quality tier token embedded in a synthetic short read filename,
    /// e.g. "good" from sample_good_illumina_1.fastq.gz.
    pub fn fake_illumina_quality(&self) -> String {
        if !self.fake {
            return String::new();
        }
        match &self.short_reads_1 {
            Some(path) => tier_before_marker(&file_name(path), "_illumina"),
            None => String::new(),
        }
    }

    pub fn fake_long_quality(&self) -> String {
        if !self.fake {
            return String::new();
        }
        match &self.long_reads {
            Some(path) => tier_before_marker(&file_name(path), "_long"),
            None => String::new(),
        }
    }
}

impl fmt::Display for ReadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}, reference: {}",
            self.set_name,
            self.set_type(),
            self.read_list_str(),
            self.reference_name()
        )
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The last underscore-delimited token before `marker`, e.g.
/// "sample_good_illumina_1.fastq.gz" with marker "_illumina" -> "good".
fn tier_before_marker(name: &str, marker: &str) -> String {
    match name.split(marker).next() {
        Some(prefix) => prefix.rsplit('_').next().unwrap_or_default().to_string(),
        None => String::new(),
    }
}

/// Regular files of a directory, sorted by name so grouping does not
/// depend on directory enumeration order.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn fastq_gz_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_files(dir)?
        .into_iter()
        .filter(|p| file_name(p).ends_with(".fastq.gz"))
        .collect())
}

/// Groups real read files by base name into read sets.
///
/// Fatal on filenames matching no recognized suffix, and on any group
/// missing one of its paired short read files.
pub fn group_real_reads(read_dir: &Path) -> Result<Vec<ReadSet>> {
    let mut read_sets: Vec<ReadSet> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for path in fastq_gz_files(read_dir)? {
        let set_name = set_name_from_real_read(&file_name(&path))?;
        let i = *index.entry(set_name.clone()).or_insert_with(|| {
            read_sets.push(ReadSet::new(&set_name, false));
            read_sets.len() - 1
        });
        read_sets[i].add_read(&path);
    }

    for read_set in &read_sets {
        if read_set.set_type() == SetType::Incomplete {
            bail!("Read set {} is incomplete", read_set.set_name);
        }
    }
    Ok(read_sets)
}

fn set_name_from_real_read(filename: &str) -> Result<String> {
    for suffix in [READ_1_SUFFIX, READ_2_SUFFIX, LONG_READ_SUFFIX] {
        if let Some(base) = filename.strip_suffix(suffix) {
            return Ok(base.to_string());
        }
    }
    bail!(
        "Bad filename: {} (read files must end with \"{}\", \"{}\" or \"{}\")",
        filename,
        READ_1_SUFFIX,
        READ_2_SUFFIX,
        LONG_READ_SUFFIX
    );
}

/// Groups synthetic read files by base name, then expands every group
/// into the cross product of available short x long quality tiers.
pub fn group_fake_reads(read_dir: &Path) -> Result<Vec<ReadSet>> {
    let mut groups: Vec<FakeReadGroup> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for path in fastq_gz_files(read_dir)? {
        let set_name = set_name_from_fake_read(&file_name(&path))?;
        let i = *index.entry(set_name.clone()).or_insert_with(|| {
            groups.push(FakeReadGroup::new(&set_name));
            groups.len() - 1
        });
        groups[i].add_read(&path);
    }

    let mut read_sets = Vec::new();
    for group in &groups {
        read_sets.extend(group.expand());
    }
    Ok(read_sets)
}

fn set_name_from_fake_read(filename: &str) -> Result<String> {
    let mut base = filename;
    for tier in QUALITY_TIERS {
        let marker = format!("_{}_", tier);
        base = base.split(marker.as_str()).next().unwrap_or(base);
    }
    if base == filename {
        bail!("Bad filename: {}", filename);
    }
    Ok(base.to_string())
}

/// One grouped base name of synthetic reads, holding each quality tier's
/// files until expansion.
#[derive(Debug, Default)]
struct FakeReadGroup {
    set_name: String,
    short_1: FxHashMap<&'static str, PathBuf>,
    short_2: FxHashMap<&'static str, PathBuf>,
    long: FxHashMap<&'static str, PathBuf>,
}

impl FakeReadGroup {
    fn new(set_name: &str) -> Self {
        FakeReadGroup {
            set_name: set_name.to_string(),
            ..Default::default()
        }
    }

    fn add_read(&mut self, path: &Path) {
        let name = file_name(path);
        for &tier in QUALITY_TIERS {
            if name.ends_with(&format!("_{}_illumina_1.fastq.gz", tier)) {
                self.short_1.insert(tier, path.to_path_buf());
            } else if name.ends_with(&format!("_{}_illumina_2.fastq.gz", tier)) {
                self.short_2.insert(tier, path.to_path_buf());
            } else if name.ends_with(&format!("_{}_long.fastq.gz", tier)) {
                self.long.insert(tier, path.to_path_buf());
            }
        }
    }

    /// Builds one independent ReadSet per available short-quality x
    /// long-quality combination, short-only sets before hybrid sets.
    fn expand(&self) -> Vec<ReadSet> {
        let mut short_only = Vec::new();
        let mut hybrid = Vec::new();

        for &short_qual in QUALITY_TIERS {
            let mut short_read_set =
                ReadSet::new(&format!("{}__{}_short", self.set_name, short_qual), true);
            if let Some(path) = self.short_1.get(short_qual) {
                short_read_set.add_read(path);
            }
            if let Some(path) = self.short_2.get(short_qual) {
                short_read_set.add_read(path);
            }
            if short_read_set.set_type() == SetType::ShortOnly {
                short_only.push(short_read_set.clone());
            }
            for &long_qual in QUALITY_TIERS {
                let mut hybrid_read_set = short_read_set.clone();
                hybrid_read_set.set_name.push_str(&format!("__{}_long", long_qual));
                if let Some(path) = self.long.get(long_qual) {
                    hybrid_read_set.add_read(path);
                }
                if hybrid_read_set.set_type() == SetType::Hybrid {
                    hybrid.push(hybrid_read_set);
                }
            }
        }

        short_only.extend(hybrid);
        short_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_group_real_reads() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_a_1.fastq.gz");
        touch(dir.path(), "sample_a_2.fastq.gz");
        touch(dir.path(), "sample_b_1.fastq.gz");
        touch(dir.path(), "sample_b_2.fastq.gz");
        touch(dir.path(), "sample_b_long.fastq.gz");

        let read_sets = group_real_reads(dir.path())?;
        assert_eq!(read_sets.len(), 2);
        assert_eq!(read_sets[0].set_name, "sample_a");
        assert_eq!(read_sets[0].set_type(), SetType::ShortOnly);
        assert_eq!(read_sets[1].set_name, "sample_b");
        assert_eq!(read_sets[1].set_type(), SetType::Hybrid);
        assert!(!read_sets[0].fake);

        // Idempotent: grouping the same directory twice yields the same sets.
        let again = group_real_reads(dir.path())?;
        assert_eq!(read_sets, again);
        Ok(())
    }

    #[test]
    fn test_unrecognized_filename_is_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_a_1.fastq.gz");
        touch(dir.path(), "sample_a_2.fastq.gz");
        touch(dir.path(), "sample_a_reads.fastq.gz");

        assert!(group_real_reads(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_incomplete_pair_is_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_a_1.fastq.gz");

        let err = group_real_reads(dir.path()).unwrap_err();
        assert!(err.to_string().contains("incomplete"));
        Ok(())
    }

    #[test]
    fn test_non_fastq_files_are_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_a_1.fastq.gz");
        touch(dir.path(), "sample_a_2.fastq.gz");
        touch(dir.path(), "notes.txt");

        let read_sets = group_real_reads(dir.path())?;
        assert_eq!(read_sets.len(), 1);
        Ok(())
    }

    #[test]
    fn test_fake_cross_product_and_ordering() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for tier in ["good", "medium"] {
            touch(dir.path(), &format!("sample_{}_illumina_1.fastq.gz", tier));
            touch(dir.path(), &format!("sample_{}_illumina_2.fastq.gz", tier));
        }
        touch(dir.path(), "sample_good_long.fastq.gz");
        touch(dir.path(), "sample_bad_long.fastq.gz");

        let read_sets = group_fake_reads(dir.path())?;
        // 2 short-only sets plus 2x2 hybrid combinations.
        assert_eq!(read_sets.len(), 6);
        assert!(read_sets.iter().take(2).all(|r| r.set_type() == SetType::ShortOnly));
        assert!(read_sets.iter().skip(2).all(|r| r.set_type() == SetType::Hybrid));

        let names: Vec<&str> = read_sets.iter().map(|r| r.set_name.as_str()).collect();
        assert!(names.contains(&"sample__medium_short"));
        assert!(names.contains(&"sample__good_short__bad_long"));
        assert!(names.contains(&"sample__medium_short__good_long"));
        assert!(read_sets.iter().all(|r| r.fake));
        Ok(())
    }

    #[test]
    fn test_fake_expansion_records_are_independent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_good_illumina_1.fastq.gz");
        touch(dir.path(), "sample_good_illumina_2.fastq.gz");
        touch(dir.path(), "sample_good_long.fastq.gz");
        touch(dir.path(), "sample_bad_long.fastq.gz");

        let mut read_sets = group_fake_reads(dir.path())?;
        assert_eq!(read_sets.len(), 3);
        // Mutating one expanded set must not leak into its siblings.
        read_sets[1].long_reads = None;
        assert!(read_sets[2].long_reads.is_some());
        Ok(())
    }

    #[test]
    fn test_fake_quality_accessors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_good_illumina_1.fastq.gz");
        touch(dir.path(), "sample_good_illumina_2.fastq.gz");
        touch(dir.path(), "sample_bad_long.fastq.gz");

        let read_sets = group_fake_reads(dir.path())?;
        let hybrid = read_sets
            .iter()
            .find(|r| r.set_type() == SetType::Hybrid)
            .unwrap();
        assert_eq!(hybrid.fake_illumina_quality(), "good");
        assert_eq!(hybrid.fake_long_quality(), "bad");
        Ok(())
    }

    #[test]
    fn test_bad_fake_filename_is_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "sample_1.fastq.gz");
        assert!(group_fake_reads(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_find_reference_matches_stem() -> Result<()> {
        let ref_dir = tempfile::tempdir()?;
        touch(ref_dir.path(), "sample.fasta");
        touch(ref_dir.path(), "other.fasta.gz");

        let mut read_set = ReadSet::new("sample__good_short", true);
        read_set.find_reference(ref_dir.path())?;
        assert_eq!(read_set.reference_name(), "sample.fasta");

        // Real read sets never get a reference.
        let mut real_set = ReadSet::new("sample", false);
        real_set.find_reference(ref_dir.path())?;
        assert!(real_set.reference.is_none());
        Ok(())
    }
}
