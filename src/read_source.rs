use std::borrow::Cow;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Errors returned by ReadSource implementations.
#[derive(thiserror::Error, Debug)]
pub enum ReadSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid range")]
    InvalidRange,
}

/// Trait that abstracts read retrieval for the assembler.
/// Implementations should be `Send + Sync` so they can be shared across threads.
pub trait ReadSource: Send + Sync {
    fn num_reads(&self) -> Result<usize, ReadSourceError>;
    fn get_name(&self, id: usize) -> Result<Option<String>, ReadSourceError>;
    fn get_len(&self, id: usize) -> Result<usize, ReadSourceError>;
    fn get_seq(&self, id: usize) -> Result<Cow<'_, str>, ReadSourceError>;

    /// Length of the longest read, or `None` when the source is empty.
    fn max_len(&self) -> Result<Option<usize>, ReadSourceError> {
        let mut longest = None;
        for id in 0..self.num_reads()? {
            let len = self.get_len(id)?;
            longest = Some(longest.map_or(len, |l: usize| l.max(len)));
        }
        Ok(longest)
    }
}

/// A simple in-memory adapter over Vec<String>.
pub struct InMemoryReadSource {
    reads: Arc<Vec<String>>,
    names: Option<Arc<Vec<String>>>,
}

impl InMemoryReadSource {
    pub fn new(reads: Vec<String>, names: Option<Vec<String>>) -> Self {
        InMemoryReadSource {
            reads: Arc::new(reads),
            names: names.map(Arc::new),
        }
    }

    pub fn reads(&self) -> &[String] {
        &self.reads
    }
}

impl ReadSource for InMemoryReadSource {
    fn num_reads(&self) -> Result<usize, ReadSourceError> {
        Ok(self.reads.len())
    }

    fn get_name(&self, id: usize) -> Result<Option<String>, ReadSourceError> {
        if let Some(names) = &self.names {
            Ok(names.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    fn get_len(&self, id: usize) -> Result<usize, ReadSourceError> {
        self.reads
            .get(id)
            .map(|s| s.len())
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }

    fn get_seq(&self, id: usize) -> Result<Cow<'_, str>, ReadSourceError> {
        self.reads
            .get(id)
            .map(|s| Cow::Borrowed(s.as_str()))
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }
}

/// Small helper to construct an in-memory adapter from Vec<String> easily.
impl From<Vec<String>> for InMemoryReadSource {
    fn from(v: Vec<String>) -> Self {
        InMemoryReadSource::new(v, None)
    }
}

// Slices of owned strings are the most common way callers hand reads over,
// so they get a ReadSource impl without an adapter.
impl ReadSource for [String] {
    fn num_reads(&self) -> Result<usize, ReadSourceError> {
        Ok(self.len())
    }

    fn get_name(&self, _id: usize) -> Result<Option<String>, ReadSourceError> {
        Ok(None)
    }

    fn get_len(&self, id: usize) -> Result<usize, ReadSourceError> {
        self.get(id)
            .map(|s| s.len())
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }

    fn get_seq(&self, id: usize) -> Result<Cow<'_, str>, ReadSourceError> {
        self.get(id)
            .map(|s| Cow::Borrowed(s.as_str()))
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }
}

impl ReadSource for [&str] {
    fn num_reads(&self) -> Result<usize, ReadSourceError> {
        Ok(self.len())
    }

    fn get_name(&self, _id: usize) -> Result<Option<String>, ReadSourceError> {
        Ok(None)
    }

    fn get_len(&self, id: usize) -> Result<usize, ReadSourceError> {
        self.get(id)
            .map(|s| s.len())
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }

    fn get_seq(&self, id: usize) -> Result<Cow<'_, str>, ReadSourceError> {
        self.get(id)
            .map(|s| Cow::Borrowed(*s))
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }
}

/// Reads sampled uniformly from a reference genome with a caller-supplied seed.
///
/// The number of reads is `max(1, round(coverage * genome_len / read_len))`.
/// Every read has length `read_len` and starts at a uniformly random offset.
/// When the genome is not longer than `read_len`, every read is the whole
/// genome. Reads are sampled once at construction, so repeated lookups are
/// stable and two sources built with the same seed are identical.
pub struct SimulatedReadSource {
    genome_name: String,
    reads: Vec<String>,
    starts: Vec<usize>,
}

impl SimulatedReadSource {
    pub fn new(genome: &str, read_len: usize, coverage: f64, seed: u64) -> Self {
        Self::with_name("read", genome, read_len, coverage, seed)
    }

    pub fn with_name(
        genome_name: &str,
        genome: &str,
        read_len: usize,
        coverage: f64,
        seed: u64,
    ) -> Self {
        let read_len = read_len.max(1);
        let target = ((coverage * genome.len() as f64 / read_len as f64).round() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut reads = Vec::with_capacity(target);
        let mut starts = Vec::with_capacity(target);
        if genome.len() <= read_len {
            for _ in 0..target {
                reads.push(genome.to_string());
                starts.push(0);
            }
        } else {
            let max_start = genome.len() - read_len;
            for _ in 0..target {
                let start = rng.gen_range(0..=max_start);
                reads.push(genome[start..start + read_len].to_string());
                starts.push(start);
            }
        }
        log::debug!(
            "Simulated {} reads of length {} from {} bp genome (seed {})",
            reads.len(),
            read_len,
            genome.len(),
            seed
        );

        SimulatedReadSource {
            genome_name: genome_name.to_string(),
            reads,
            starts,
        }
    }

    /// Start offset of each sampled read on the reference.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn into_reads(self) -> Vec<String> {
        self.reads
    }
}

impl ReadSource for SimulatedReadSource {
    fn num_reads(&self) -> Result<usize, ReadSourceError> {
        Ok(self.reads.len())
    }

    fn get_name(&self, id: usize) -> Result<Option<String>, ReadSourceError> {
        if id < self.reads.len() {
            Ok(Some(format!("{}_r{}", self.genome_name, id + 1)))
        } else {
            Err(ReadSourceError::NotFound(format!("id {}", id)))
        }
    }

    fn get_len(&self, id: usize) -> Result<usize, ReadSourceError> {
        self.reads
            .get(id)
            .map(|s| s.len())
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }

    fn get_seq(&self, id: usize) -> Result<Cow<'_, str>, ReadSourceError> {
        self.reads
            .get(id)
            .map(|s| Cow::Borrowed(s.as_str()))
            .ok_or(ReadSourceError::NotFound(format!("id {}", id)))
    }
}
