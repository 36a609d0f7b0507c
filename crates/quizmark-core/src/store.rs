//! Gradebook persistence: results, subject progress and ranks.
//!
//! A commit inserts the result, upserts progress and rewrites the rank as a
//! single unit. Stores apply the commit to a copy of the state and only swap
//! it in once it is durable, so a failed write leaves everything untouched.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::progress::{Progress, Rank};
use crate::results::TestResult;

/// What a successful commit changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub result: TestResult,
    /// `None` when the result has no subject.
    pub progress: Option<Progress>,
    pub rank: Rank,
}

/// The whole gradebook state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gradebook {
    #[serde(default)]
    results: Vec<TestResult>,
    /// learner → subject → progress
    #[serde(default)]
    progress: BTreeMap<String, BTreeMap<String, Progress>>,
    #[serde(default)]
    ranks: BTreeMap<String, Rank>,
}

impl Gradebook {
    /// Record a result, fold it into subject progress and recompute the rank.
    pub fn apply(&mut self, result: TestResult) -> CommitOutcome {
        let progress = result.subject_id.as_ref().map(|subject| {
            let entry = self
                .progress
                .entry(result.learner_id.clone())
                .or_default()
                .entry(subject.clone())
                .or_insert_with(|| Progress::new(&result.learner_id, subject, result.completed_at));
            entry.record(result.score, result.completed_at);
            entry.clone()
        });

        self.results.push(result.clone());
        let rank = self.recompute_rank(&result.learner_id);

        CommitOutcome {
            result,
            progress,
            rank,
        }
    }

    /// Rewrite a learner's rank from their full history.
    pub fn recompute_rank(&mut self, learner_id: &str) -> Rank {
        let rank = Rank::from_results(self.results_for(learner_id));
        self.ranks.insert(learner_id.to_string(), rank);
        rank
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn results_for<'a>(&'a self, learner_id: &'a str) -> impl Iterator<Item = &'a TestResult> {
        self.results.iter().filter(move |r| r.learner_id == learner_id)
    }

    pub fn progress_for(&self, learner_id: &str) -> Vec<Progress> {
        self.progress
            .get(learner_id)
            .map(|subjects| subjects.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rank_of(&self, learner_id: &str) -> Option<Rank> {
        self.ranks.get(learner_id).copied()
    }

    /// Drop everything recorded for a learner. Returns the number of results
    /// removed.
    pub fn remove_learner(&mut self, learner_id: &str) -> usize {
        let before = self.results.len();
        self.results.retain(|r| r.learner_id != learner_id);
        self.progress.remove(learner_id);
        self.ranks.remove(learner_id);
        before - self.results.len()
    }
}

/// Storage for the gradebook.
#[async_trait]
pub trait GradebookStore: Send + Sync {
    /// Atomically record a result with its progress and rank updates.
    async fn commit(&self, result: TestResult) -> Result<CommitOutcome, StoreError>;

    /// Recompute and store a learner's rank from their history.
    async fn recompute_rank(&self, learner_id: &str) -> Result<Rank, StoreError>;

    async fn results_for(&self, learner_id: &str) -> Result<Vec<TestResult>, StoreError>;

    async fn progress_for(&self, learner_id: &str) -> Result<Vec<Progress>, StoreError>;

    async fn rank_of(&self, learner_id: &str) -> Result<Option<Rank>, StoreError>;

    async fn all_results(&self) -> Result<Vec<TestResult>, StoreError>;

    /// Administrative purge of a learner's results, progress and rank.
    async fn remove_learner(&self, learner_id: &str) -> Result<usize, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local gradebook.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Gradebook>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Gradebook) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl GradebookStore for MemoryStore {
    async fn commit(&self, result: TestResult) -> Result<CommitOutcome, StoreError> {
        Ok(self.with(|book| book.apply(result)))
    }

    async fn recompute_rank(&self, learner_id: &str) -> Result<Rank, StoreError> {
        Ok(self.with(|book| book.recompute_rank(learner_id)))
    }

    async fn results_for(&self, learner_id: &str) -> Result<Vec<TestResult>, StoreError> {
        Ok(self.with(|book| book.results_for(learner_id).cloned().collect()))
    }

    async fn progress_for(&self, learner_id: &str) -> Result<Vec<Progress>, StoreError> {
        Ok(self.with(|book| book.progress_for(learner_id)))
    }

    async fn rank_of(&self, learner_id: &str) -> Result<Option<Rank>, StoreError> {
        Ok(self.with(|book| book.rank_of(learner_id)))
    }

    async fn all_results(&self) -> Result<Vec<TestResult>, StoreError> {
        Ok(self.with(|book| book.results().to_vec()))
    }

    async fn remove_learner(&self, learner_id: &str) -> Result<usize, StoreError> {
        Ok(self.with(|book| book.remove_learner(learner_id)))
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Gradebook kept in a single JSON file, replaced atomically on every write.
pub struct JsonFileStore {
    path: PathBuf,
    state: tokio::sync::Mutex<Gradebook>,
}

impl JsonFileStore {
    /// Open the file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let book = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Gradebook::default()
        };
        tracing::debug!("opened gradebook at {}", path.display());
        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(book),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the state, persist the copy, then swap it in.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Gradebook) -> T) -> Result<T, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next);
        persist(&self.path, &next)?;
        *state = next;
        Ok(out)
    }
}

fn persist(path: &Path, book: &Gradebook) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(book)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl GradebookStore for JsonFileStore {
    async fn commit(&self, result: TestResult) -> Result<CommitOutcome, StoreError> {
        self.mutate(|book| book.apply(result)).await
    }

    async fn recompute_rank(&self, learner_id: &str) -> Result<Rank, StoreError> {
        self.mutate(|book| book.recompute_rank(learner_id)).await
    }

    async fn results_for(&self, learner_id: &str) -> Result<Vec<TestResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.results_for(learner_id).cloned().collect())
    }

    async fn progress_for(&self, learner_id: &str) -> Result<Vec<Progress>, StoreError> {
        Ok(self.state.lock().await.progress_for(learner_id))
    }

    async fn rank_of(&self, learner_id: &str) -> Result<Option<Rank>, StoreError> {
        Ok(self.state.lock().await.rank_of(learner_id))
    }

    async fn all_results(&self) -> Result<Vec<TestResult>, StoreError> {
        Ok(self.state.lock().await.results().to_vec())
    }

    async fn remove_learner(&self, learner_id: &str) -> Result<usize, StoreError> {
        self.mutate(|book| book.remove_learner(learner_id)).await
    }
}
