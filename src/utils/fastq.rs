use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use seq_io::fastq::{Reader as FastqReader, Record};

use crate::utils::file::open_reader;

/// One FASTQ read held in memory.
#[derive(Debug, Clone)]
pub struct FastqRead {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// Loads all records of a FASTQ file (optionally gzip-compressed).
pub fn load_fastq(path: &Path) -> Result<Vec<FastqRead>> {
    let reader = open_reader(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut fastq = FastqReader::new(reader);

    let mut reads = Vec::new();
    while let Some(result) = fastq.next() {
        let record = result
            .map_err(|e| anyhow!("Invalid FASTQ record in {}: {}", path.display(), e))?;
        reads.push(FastqRead {
            id: String::from_utf8_lossy(record.head()).into_owned(),
            seq: record.seq().to_vec(),
            qual: record.qual().to_vec(),
        });
    }
    Ok(reads)
}

/// Returns the first read of a FASTQ file, or empty sequence/quality strings
/// when the file holds no records.
pub fn load_first_fastq_read(path: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
    let reader = open_reader(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut fastq = FastqReader::new(reader);

    match fastq.next() {
        Some(result) => {
            let record = result
                .map_err(|e| anyhow!("Invalid FASTQ record in {}: {}", path.display(), e))?;
            Ok((record.seq().to_vec(), record.qual().to_vec()))
        }
        None => Ok((Vec::new(), Vec::new())),
    }
}

pub fn write_fastq_record<W: Write>(
    writer: &mut W,
    id: &str,
    desc: Option<&str>,
    seq: &[u8],
    qual: &[u8],
) -> io::Result<()> {
    // Write header
    writer.write_all(b"@")?;
    writer.write_all(id.as_bytes())?;
    if let Some(desc) = desc {
        writer.write_all(b" ")?;
        writer.write_all(desc.as_bytes())?;
    }
    writer.write_all(b"\n")?;

    // Write sequence
    writer.write_all(seq)?;
    writer.write_all(b"\n")?;

    // Write separator
    writer.write_all(b"+")?;
    writer.write_all(b"\n")?;

    // Write quality scores
    writer.write_all(qual)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fastq() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, "@read_1\nACGT\n+\nIIII\n@read_2\nTTTT\n+\nJJJJ\n")?;

        let reads = load_fastq(&path)?;
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].id, "read_1");
        assert_eq!(reads[1].seq, b"TTTT");
        assert_eq!(reads[1].qual, b"JJJJ");
        Ok(())
    }

    #[test]
    fn test_first_read_of_empty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.fastq");
        std::fs::write(&path, "")?;

        let (seq, qual) = load_first_fastq_read(&path)?;
        assert!(seq.is_empty());
        assert!(qual.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_then_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.fastq");
        {
            let mut writer = std::fs::File::create(&path)?;
            write_fastq_record(&mut writer, "long_read_1", None, b"ACGTACGT", b"IIIIIIII")?;
        }

        let reads = load_fastq(&path)?;
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].id, "long_read_1");
        assert_eq!(reads[0].seq, b"ACGTACGT");
        Ok(())
    }
}
