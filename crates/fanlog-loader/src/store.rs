//! JSON-lines record store.
//!
//! Every dataset id (worker index) owns exactly one file,
//! `payments-<id>.jsonl`, so concurrent writers never share a file handle.
//! Record ids are `<dataset id>_<sequence>`.

use crate::payments::PaymentRecord;
use anyhow::Context;
use clap::ValueEnum;
use std::{
    collections::HashMap,
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// How hard each write is pushed towards stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Buffered writes, flushed when the writer is finished.
    #[default]
    Local,
    /// Every record is flushed to the OS before the next one.
    Majority,
    /// Every record is flushed and synced to disk before the next one.
    Linearizable,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Majority => "majority",
            Self::Linearizable => "linearizable",
        })
    }
}

pub fn dataset_path(dir: &Path, dataset_id: usize) -> PathBuf {
    dir.join(format!("payments-{dataset_id}.jsonl"))
}

/// Appends records to one dataset file.
pub struct RecordWriter {
    path: PathBuf,
    out: BufWriter<File>,
    mode: Mode,
}

impl RecordWriter {
    /// Creates (or truncates) the dataset file for `dataset_id` under `dir`.
    pub fn create(dir: &Path, dataset_id: usize, mode: Mode) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        let path = dataset_path(dir, dataset_id);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        Ok(Self {
            path,
            out: BufWriter::new(file),
            mode,
        })
    }

    pub fn insert(&mut self, record: &PaymentRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, record)
            .with_context(|| format!("failed to encode record {}", record.id))?;
        self.out.write_all(b"\n")?;

        match self.mode {
            Mode::Local => {}
            Mode::Majority => self.out.flush()?,
            Mode::Linearizable => {
                self.out.flush()?;
                self.out.get_ref().sync_data()?;
            }
        }
        Ok(())
    }

    /// Flushes anything still buffered.
    pub fn finish(mut self) -> anyhow::Result<()> {
        self.out
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }
}

/// In-memory lookup table over every dataset file in a directory.
#[derive(Debug, Default)]
pub struct RecordIndex {
    records: HashMap<String, PaymentRecord>,
}

impl RecordIndex {
    /// Loads the dataset files for ids `0..dataset_count`. Missing files are
    /// treated as empty datasets.
    pub fn load(dir: &Path, dataset_count: usize) -> anyhow::Result<Self> {
        let mut records = HashMap::new();

        for dataset_id in 0..dataset_count {
            let path = dataset_path(dir, dataset_id);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to open {}", path.display()));
                }
            };

            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line.with_context(|| format!("failed to read {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: PaymentRecord = serde_json::from_str(&line).with_context(|| {
                    format!("malformed record at {}:{}", path.display(), line_no + 1)
                })?;
                records.insert(record.id.clone(), record);
            }
        }

        Ok(Self { records })
    }

    pub fn find_one(&self, id: &str) -> Option<&PaymentRecord> {
        self.records.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dataset(dir: &Path, dataset_id: usize, count: u64, mode: Mode) {
        let mut rng = rand::rng();
        let mut writer = RecordWriter::create(dir, dataset_id, mode).unwrap();
        for seq in 0..count {
            writer
                .insert(&PaymentRecord::random(dataset_id, seq, &mut rng))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn every_mode_round_trips_through_the_index() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), 0, 5, Mode::Local);
        write_dataset(dir.path(), 1, 5, Mode::Majority);
        write_dataset(dir.path(), 2, 5, Mode::Linearizable);

        let index = RecordIndex::load(dir.path(), 3).unwrap();
        assert_eq!(index.records.len(), 15);
        for dataset_id in 0..3 {
            for seq in 0..5 {
                let id = format!("{dataset_id}_{seq}");
                assert_eq!(index.find_one(&id).unwrap().id, id);
            }
        }
        assert!(index.find_one("3_0").is_none());
    }

    #[test]
    fn recreating_a_dataset_truncates_it() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), 0, 10, Mode::Local);
        write_dataset(dir.path(), 0, 2, Mode::Local);

        let index = RecordIndex::load(dir.path(), 1).unwrap();
        assert_eq!(index.records.len(), 2);
    }

    #[test]
    fn mode_displays_as_its_flag_value() {
        for mode in [Mode::Local, Mode::Majority, Mode::Linearizable] {
            assert_eq!(Mode::from_str(&mode.to_string(), false), Ok(mode));
        }
        assert_eq!(Mode::Linearizable.to_string(), "linearizable");
    }

    #[test]
    fn missing_datasets_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = RecordIndex::load(&dir.path().join("nothing-here"), 4).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn malformed_lines_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dataset_path(dir.path(), 0), "{not json}\n").unwrap();

        let err = RecordIndex::load(dir.path(), 1).unwrap_err();
        assert!(format!("{err:#}").contains("malformed record"));
    }
}
