//! Per-document pipeline runs and the in-memory arena that owns them
//!
//! A run's state is never stored: it is derived from which outputs exist.
//! Committing a stage drops every later output, so the outputs present
//! always form a prefix of the pipeline.

use crate::error::PipelineError;
use crate::types::{Stage1Output, Stage2Output};
use creditseer_domain::{Chunk, Document, DocumentId, PipelineStage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::debug;

/// The file a run started from
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Original file name
    pub filename: String,
    /// Raw bytes as uploaded
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Create a source file
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Everything the pipeline knows about one document
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    /// Document identifier
    pub id: DocumentId,
    /// Uploaded source
    pub source: SourceFile,
    /// Extracted document, once text extraction ran
    pub document: Option<Document>,
    /// Typed chunks, once chunking ran
    pub chunks: Option<Vec<Chunk>>,
    /// Stage 1 output
    pub stage1: Option<Stage1Output>,
    /// Stage 2 output
    pub stage2: Option<Stage2Output>,
}

impl PipelineRun {
    /// A freshly uploaded run
    pub fn new(id: DocumentId, source: SourceFile) -> Self {
        Self {
            id,
            source,
            document: None,
            chunks: None,
            stage1: None,
            stage2: None,
        }
    }

    /// The furthest stage whose output exists
    pub fn stage(&self) -> PipelineStage {
        if self.stage2.is_some() {
            PipelineStage::Stage2Complete
        } else if self.stage1.is_some() {
            PipelineStage::Stage1Complete
        } else if self.chunks.is_some() {
            PipelineStage::Chunked
        } else if self.document.is_some() {
            PipelineStage::TextExtracted
        } else {
            PipelineStage::Uploaded
        }
    }

    /// Whether `stage` has been reached
    pub fn has(&self, stage: PipelineStage) -> bool {
        stage <= self.stage()
    }

    /// Every stage reached, in order
    pub fn completed(&self) -> Vec<PipelineStage> {
        let current = self.stage();
        PipelineStage::ALL
            .into_iter()
            .filter(|s| *s <= current)
            .collect()
    }

    /// Fail unless the prerequisite of `requested` has been reached
    pub fn require(&self, requested: PipelineStage) -> Result<(), PipelineError> {
        match requested.prerequisite() {
            Some(prerequisite) if !self.has(prerequisite) => Err(PipelineError::Sequence {
                requested,
                current: self.stage(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn commit_document(&mut self, document: Document) {
        self.document = Some(document);
        self.chunks = None;
        self.stage1 = None;
        self.stage2 = None;
    }

    pub(crate) fn commit_chunks(&mut self, chunks: Vec<Chunk>) {
        self.chunks = Some(chunks);
        self.stage1 = None;
        self.stage2 = None;
    }

    pub(crate) fn commit_stage1(&mut self, output: Stage1Output) {
        self.stage1 = Some(output);
        self.stage2 = None;
    }

    pub(crate) fn commit_stage2(&mut self, output: Stage2Output) {
        self.stage2 = Some(output);
    }
}

struct RunSlot {
    busy: AtomicBool,
    run: Mutex<PipelineRun>,
}

impl RunSlot {
    fn new(run: PipelineRun) -> Self {
        Self {
            busy: AtomicBool::new(false),
            run: Mutex::new(run),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PipelineRun>, PipelineError> {
        self.run.lock().map_err(|_| PipelineError::Poisoned)
    }
}

/// Exclusive right to run a stage on one document
///
/// Released on drop, so completion, error and cancellation all free the
/// document.
pub struct BusyGuard {
    id: DocumentId,
    slot: Arc<RunSlot>,
}

impl BusyGuard {
    /// Document the guard holds
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Read from the run under its lock
    pub fn read<R>(&self, f: impl FnOnce(&PipelineRun) -> R) -> Result<R, PipelineError> {
        Ok(f(&*self.slot.lock()?))
    }

    /// Apply a finished stage result to the run
    pub(crate) fn commit(&self, f: impl FnOnce(&mut PipelineRun)) -> Result<PipelineStage, PipelineError> {
        let mut run = self.slot.lock()?;
        f(&mut *run);
        Ok(run.stage())
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
        debug!("Released document {}", self.id);
    }
}

/// In-memory arena of pipeline runs, indexed by document id
///
/// Shared via `Arc`; runs of different documents never block each other.
#[derive(Default)]
pub struct PipelineState {
    runs: RwLock<HashMap<DocumentId, Arc<RunSlot>>>,
}

impl PipelineState {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: DocumentId) -> Result<Arc<RunSlot>, PipelineError> {
        let runs = self.runs.read().map_err(|_| PipelineError::Poisoned)?;
        runs.get(&id).cloned().ok_or(PipelineError::UnknownDocument(id))
    }

    /// Store `run`, replacing any run with the same id
    ///
    /// # Errors
    ///
    /// `Busy` when a stage is in flight for the run being replaced.
    pub fn insert(&self, run: PipelineRun) -> Result<(), PipelineError> {
        let id = run.id;
        let mut runs = self.runs.write().map_err(|_| PipelineError::Poisoned)?;
        if runs.get(&id).is_some_and(|slot| slot.busy.load(Ordering::Acquire)) {
            return Err(PipelineError::Busy(id));
        }
        runs.insert(id, Arc::new(RunSlot::new(run)));
        Ok(())
    }

    /// Claim the document for one stage
    ///
    /// # Errors
    ///
    /// `UnknownDocument` when no run exists, `Busy` when a stage is in flight.
    pub fn begin(&self, id: DocumentId) -> Result<BusyGuard, PipelineError> {
        // Claim under the read lock so `insert` and `remove` cannot swap the slot first
        let runs = self.runs.read().map_err(|_| PipelineError::Poisoned)?;
        let slot = runs.get(&id).cloned().ok_or(PipelineError::UnknownDocument(id))?;
        if slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::Busy(id));
        }
        drop(runs);
        debug!("Claimed document {}", id);
        Ok(BusyGuard { id, slot })
    }

    /// A copy of the run
    pub fn snapshot(&self, id: DocumentId) -> Result<PipelineRun, PipelineError> {
        let slot = self.slot(id)?;
        let run = slot.lock()?;
        Ok(run.clone())
    }

    /// Current state of the run
    pub fn state(&self, id: DocumentId) -> Result<PipelineStage, PipelineError> {
        let slot = self.slot(id)?;
        let run = slot.lock()?;
        Ok(run.stage())
    }

    /// Whether a stage is in flight for the document
    pub fn is_busy(&self, id: DocumentId) -> Result<bool, PipelineError> {
        Ok(self.slot(id)?.busy.load(Ordering::Acquire))
    }

    /// Drop the run and return its last state
    ///
    /// # Errors
    ///
    /// `Busy` when a stage is in flight.
    pub fn remove(&self, id: DocumentId) -> Result<PipelineRun, PipelineError> {
        let mut runs = self.runs.write().map_err(|_| PipelineError::Poisoned)?;
        let slot = runs.get(&id).ok_or(PipelineError::UnknownDocument(id))?;
        if slot.busy.load(Ordering::Acquire) {
            return Err(PipelineError::Busy(id));
        }
        let run = slot.lock()?.clone();
        runs.remove(&id);
        Ok(run)
    }

    /// Ids of every run, oldest first
    pub fn document_ids(&self) -> Result<Vec<DocumentId>, PipelineError> {
        let runs = self.runs.read().map_err(|_| PipelineError::Poisoned)?;
        let mut ids: Vec<DocumentId> = runs.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.read().map(|runs| runs.len()).unwrap_or(0)
    }

    /// Whether the arena holds no run
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditseer_domain::ExtractionMethod;

    fn run() -> PipelineRun {
        PipelineRun::new(DocumentId::new(), SourceFile::new("agreement.txt", b"ARTICLE I".to_vec()))
    }

    fn document(id: DocumentId) -> Document {
        Document {
            id,
            filename: "agreement.txt".into(),
            text: "ARTICLE I".into(),
            method: ExtractionMethod::PlainText,
            page_count: 0,
            table_count: 0,
        }
    }

    #[test]
    fn test_state_is_derived_from_outputs() {
        let mut run = run();
        assert_eq!(run.stage(), PipelineStage::Uploaded);
        assert_eq!(run.completed(), vec![PipelineStage::Uploaded]);

        run.commit_document(document(run.id));
        run.commit_chunks(Vec::new());
        run.commit_stage1(Stage1Output::default());
        run.commit_stage2(Stage2Output::default());
        assert_eq!(run.stage(), PipelineStage::Stage2Complete);
        assert_eq!(run.completed().len(), 5);
    }

    #[test]
    fn test_commit_clears_downstream() {
        let mut run = run();
        run.commit_document(document(run.id));
        run.commit_chunks(Vec::new());
        run.commit_stage1(Stage1Output::default());
        run.commit_stage2(Stage2Output::default());

        run.commit_stage1(Stage1Output::default());
        assert!(run.stage2.is_none());
        assert_eq!(run.stage(), PipelineStage::Stage1Complete);

        run.commit_document(document(run.id));
        assert!(run.chunks.is_none() && run.stage1.is_none());
        assert_eq!(run.stage(), PipelineStage::TextExtracted);
    }

    #[test]
    fn test_require_checks_prerequisite() {
        let run = run();
        assert!(run.require(PipelineStage::TextExtracted).is_ok());
        assert_eq!(
            run.require(PipelineStage::Stage2Complete),
            Err(PipelineError::Sequence {
                requested: PipelineStage::Stage2Complete,
                current: PipelineStage::Uploaded,
            })
        );
    }

    #[test]
    fn test_guard_is_exclusive_and_released_on_drop() {
        let state = PipelineState::new();
        let run = run();
        let id = run.id;
        state.insert(run).unwrap();

        let guard = state.begin(id).unwrap();
        assert_eq!(state.begin(id).err(), Some(PipelineError::Busy(id)));
        assert!(state.is_busy(id).unwrap());
        assert!(matches!(state.remove(id), Err(PipelineError::Busy(_))));
        drop(guard);

        assert!(!state.is_busy(id).unwrap());
        assert!(state.begin(id).is_ok());
    }

    #[test]
    fn test_claimed_run_is_never_replaced_under_the_guard() {
        let state = PipelineState::new();
        let run = run();
        let id = run.id;
        state.insert(run).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..2000 {
                    let fresh = PipelineRun::new(id, SourceFile::new("replacement.txt", b"ARTICLE I".to_vec()));
                    let _ = state.insert(fresh);
                }
            });
            for _ in 0..2000 {
                let Ok(guard) = state.begin(id) else {
                    continue;
                };
                guard.commit(|run| run.commit_document(document(id))).unwrap();
                assert!(state.snapshot(id).unwrap().document.is_some());
            }
        });
    }

    #[test]
    fn test_replace_waits_for_release() {
        let state = PipelineState::new();
        let run = run();
        let id = run.id;
        state.insert(run).unwrap();

        let guard = state.begin(id).unwrap();
        let replacement = PipelineRun::new(id, SourceFile::new("v2.txt", b"ARTICLE I".to_vec()));
        assert_eq!(state.insert(replacement.clone()).err(), Some(PipelineError::Busy(id)));
        guard.commit(|run| run.commit_document(document(id))).unwrap();
        assert_eq!(state.state(id).unwrap(), PipelineStage::TextExtracted);
        drop(guard);

        state.insert(replacement).unwrap();
        assert_eq!(state.snapshot(id).unwrap().source.filename, "v2.txt");
        assert_eq!(state.state(id).unwrap(), PipelineStage::Uploaded);
    }

    #[test]
    fn test_unknown_document() {
        let state = PipelineState::new();
        let id = DocumentId::new();
        assert_eq!(state.state(id), Err(PipelineError::UnknownDocument(id)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_document_ids_sorted_and_remove() {
        let state = PipelineState::new();
        let (a, b) = (DocumentId::from_value(1), DocumentId::from_value(2));
        let source = || SourceFile::new("agreement.txt", &b"ARTICLE I"[..]);
        state.insert(PipelineRun::new(b, source())).unwrap();
        state.insert(PipelineRun::new(a, source())).unwrap();

        assert_eq!(state.document_ids().unwrap(), vec![a, b]);
        assert_eq!(state.remove(a).unwrap().id, a);
        assert_eq!(state.document_ids().unwrap(), vec![b]);
    }
}
