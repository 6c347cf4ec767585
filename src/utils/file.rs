use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

pub const GZIP_EXT: &str = "gz";

/// Resolves a possibly-relative path against a base directory.
pub fn absolute(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() { path } else { base.join(path) }
}

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    let n = file.read(&mut buffer)?;
    Ok(n == 2 && buffer == [0x1F, 0x8B]) // Gzip magic bytes
}

/// Enum to hold either an uncompressed or gzipped file reader
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(GzDecoder<BufReader<File>>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

/// Opens a file for reading, transparently decompressing gzip input.
/// Compression is detected from the file's magic bytes, not its name.
pub fn open_reader(path: &Path) -> io::Result<FileReader> {
    let is_gz = is_gzipped(path)?;
    let file = BufReader::new(File::open(path)?);
    if is_gz {
        Ok(FileReader::Gzipped(GzDecoder::new(file)))
    } else {
        Ok(FileReader::Uncompressed(file))
    }
}

/// Enum to hold either an uncompressed or gzipped file writer
pub enum FileWriter {
    Uncompressed(BufWriter<File>),
    Gzipped(GzEncoder<BufWriter<File>>),
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileWriter::Uncompressed(w) => w.write(buf),
            FileWriter::Gzipped(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileWriter::Uncompressed(w) => w.flush(),
            FileWriter::Gzipped(w) => w.flush(),
        }
    }
}

impl FileWriter {
    /// Finishes the stream. Required for gzip output to get a valid trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            FileWriter::Uncompressed(mut w) => w.flush(),
            FileWriter::Gzipped(w) => {
                let mut inner = w.finish()?;
                inner.flush()
            }
        }
    }
}

/// Creates a file writer, gzip-compressing when the path ends in `.gz`.
pub fn create_writer(path: &Path) -> io::Result<FileWriter> {
    let file = BufWriter::new(File::create(path)?);
    let is_gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case(GZIP_EXT))
        .unwrap_or(false);
    if is_gz {
        Ok(FileWriter::Gzipped(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(FileWriter::Uncompressed(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_gzipped() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "hello")?;
        assert!(!is_gzipped(&plain)?);

        let gz = dir.path().join("data.gz");
        let mut writer = create_writer(&gz)?;
        writer.write_all(b"hello")?;
        writer.finish()?;
        assert!(is_gzipped(&gz)?);
        Ok(())
    }

    #[test]
    fn test_gzip_round_trip() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.fastq.gz");
        let mut writer = create_writer(&path)?;
        writer.write_all(b"@read\nACGT\n+\nIIII\n")?;
        writer.finish()?;

        let mut contents = String::new();
        open_reader(&path)?.read_to_string(&mut contents)?;
        assert_eq!(contents, "@read\nACGT\n+\nIIII\n");
        Ok(())
    }

    #[test]
    fn test_is_gzipped_short_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tiny");
        std::fs::write(&path, "x")?;
        assert!(!is_gzipped(&path)?);
        Ok(())
    }
}
