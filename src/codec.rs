//! CBOR encoding of datasets, and incremental loading of dataset sequences.
//!
//! A dataset file holds one or more CBOR encoded datasets written back to back. The
//! [`DatasetSequence`] reader decodes them one at a time from a growing buffer, so the input
//! can arrive in chunks of any size (pipes, network streams) without a value ever being
//! lost or decoded twice. Only a value cut short by the end of the buffered input waits for
//! more bytes; malformed input fails as soon as it is seen.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::config::{DEFAULT_READ_SIZE, STDOUT_TARGET};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::estimator::HllError;
use crate::settings::HllSettings;

/// Name returned by [`write_dataset_file`] when writing to the output stream.
pub const STDOUT_NAME: &str = "STDOUT";

/// Encode one dataset
pub fn to_vec(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(dataset, &mut bytes)?;
    Ok(bytes)
}

/// Decode exactly one dataset occupying all of `bytes`. The derived client counts are
/// recomputed from the estimators.
pub fn from_slice(bytes: &[u8]) -> Result<Dataset> {
    let mut head = bytes;
    let mut dataset: Dataset = ciborium::from_reader(&mut head).map_err(|e| Error::CborDecode {
        name: "buffer".to_string(),
        reason: e.to_string(),
    })?;
    if !head.is_empty() {
        return Err(Error::TrailingBytes {
            name: "buffer".to_string(),
            remaining: head.len(),
        });
    }
    dataset.finalize();
    Ok(dataset)
}

/// Append one encoded dataset to `writer`
pub fn write_dataset<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    ciborium::into_writer(dataset, writer)?;
    Ok(())
}

/// Write `dataset` to the file `target`, or to `stdout` when `target` is `-`.
/// Returns the name written to: the path, or `STDOUT`.
pub fn write_dataset_file<W: Write>(dataset: &Dataset, target: &str, stdout: W) -> Result<String> {
    if target == STDOUT_TARGET {
        write_dataset(dataset, stdout)?;
        return Ok(STDOUT_NAME.to_string());
    }

    let path = Path::new(target);
    let file = File::create(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    write_dataset(dataset, &mut writer)?;
    writer.flush().map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        action = "write",
        component = "codec",
        path = target,
        domains = dataset.domains.len(),
        "Dataset written"
    );
    Ok(target.to_string())
}

/// Loads sequences of datasets and folds them into one result, truncating after every merge
/// so that only the result is ever held in memory.
#[derive(Debug)]
pub struct DatasetSequence {
    settings: HllSettings,
    top_count: usize,
    forced_date: Option<NaiveDate>,
    read_size: usize,
    count: usize,
    result: Dataset,
}

impl DatasetSequence {
    /// Creates a reader for datasets collected with `settings`, keeping the `top_count`
    /// domains with the highest magnitude.
    pub fn new(settings: HllSettings, top_count: usize) -> Self {
        Self {
            settings,
            top_count,
            forced_date: None,
            read_size: DEFAULT_READ_SIZE,
            count: 0,
            result: Dataset::new(settings, None),
        }
    }

    /// Override the date of every loaded dataset with `date`.
    pub fn with_forced_date(mut self, date: NaiveDate) -> Self {
        self.forced_date = Some(date);
        self.result.set_date(date);
        self
    }

    /// Size of each read request, at least one byte.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    /// Number of datasets loaded so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Aggregated result. An empty dataset until something was loaded.
    pub fn result(&self) -> &Dataset {
        &self.result
    }

    pub fn into_result(self) -> Dataset {
        self.result
    }

    /// Load every dataset in the file at `path`.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_reader(file, &path.display().to_string())
    }

    /// Load every dataset from `reader`. Datasets are named `<name>#<n>`, counting from 1.
    pub fn load_reader<R: Read>(&mut self, mut reader: R, name: &str) -> Result<()> {
        let start = Instant::now();
        let loaded_before = self.count;
        info!(action = "start", component = "sequence", source = name, "Loading datasets");

        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; self.read_size];
        let mut seq_num = 1;

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::Read {
                        name: name.to_string(),
                        source,
                    })
                }
            };
            let eof = n == 0;
            buffer.extend_from_slice(&chunk[..n]);

            // decode as many complete values as the buffer holds
            let mut consumed = 0;
            while consumed < buffer.len() {
                let mut head = &buffer[consumed..];
                match ciborium::from_reader::<Dataset, _>(&mut head) {
                    Ok(mut dataset) => {
                        consumed = buffer.len() - head.len();
                        dataset.finalize();
                        dataset.set_source(format!("{name}#{seq_num}"));
                        seq_num += 1;
                        self.add_dataset(dataset)?;
                    }
                    // ran out of bytes mid value, wait for more input
                    Err(ciborium::de::Error::Io(_)) if !eof => break,
                    Err(e) => {
                        return Err(Error::CborDecode {
                            name: name.to_string(),
                            reason: e.to_string(),
                        })
                    }
                }
            }
            buffer.drain(..consumed);

            if eof {
                break;
            }
        }

        if !buffer.is_empty() {
            return Err(Error::TrailingBytes {
                name: name.to_string(),
                remaining: buffer.len(),
            });
        }

        info!(
            action = "complete",
            component = "sequence",
            source = name,
            datasets = self.count - loaded_before,
            domains = self.result.domains.len(),
            duration_ms = start.elapsed().as_millis(),
            "Datasets loaded"
        );
        Ok(())
    }

    fn add_dataset(&mut self, mut dataset: Dataset) -> Result<()> {
        if let Some(forced) = self.forced_date {
            if dataset.date != forced {
                warn!(
                    action = "override_date",
                    component = "sequence",
                    dataset = dataset.name(),
                    date = %dataset.date,
                    forced = %forced,
                    "Overriding dataset date with forced date"
                );
                dataset.set_date(forced);
            }
        }

        if self.count == 0 {
            // later datasets are checked by the strict unions in `aggregate`
            if dataset.settings() != self.settings {
                return Err(Error::Union {
                    context: "global".to_string(),
                    source: HllError::IncompatibleSettings {
                        expected: self.settings,
                        found: dataset.settings(),
                    },
                });
            }
            self.result = dataset;
        } else {
            let mut merged = aggregate(&[&self.result, &dataset])?;
            merged.truncate(self.top_count);
            self.result = merged;
        }
        self.count += 1;

        debug!(
            action = "add",
            component = "sequence",
            count = self.count,
            domains = self.result.domains.len(),
            "Dataset added to sequence result"
        );
        Ok(())
    }
}
