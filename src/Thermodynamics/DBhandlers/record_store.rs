//! # Read-only access to the reference dataset
//!
//! [`CompoundRecordStore`] is the single seam between the search pipeline and the
//! data. The pipeline only asks for rows matching a [`FormulaPattern`]; ranking,
//! filtering and range selection happen above this layer.
//!
//! Backends:
//! - [`InMemoryStore`] - formula indexed rows, the base of every other backend
//! - [`JsonFileStore`] - loads a JSON dataset lazily on the first query
//! - [`RetryingStore`] - bounded retries with exponential backoff around a fallible backend
//! - [`CachedStore`] - LRU cache of query results
//!
//! [`StoreBackend`] dispatches between the stock configurations; any other type
//! implementing the trait can be handed to the resolver directly.
use crate::Thermodynamics::DBhandlers::compound_record::CompoundRecord;
use crate::Thermodynamics::DBhandlers::formula_variants::base_formula;
use crate::Thermodynamics::thermo_errors::StoreError;
use crate::Utils::load_from_file::load_compound_records;
use enum_dispatch::enum_dispatch;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// what a query asks the store for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormulaPattern {
    /// formula equal to the pattern
    Exact(String),
    /// formula equal to the pattern followed by a bracketed qualifier, `H2O(g)` for `H2O`
    Prefix(String),
    /// formula whose trailing qualifiers stripped equal the pattern
    Base(String),
}

impl FormulaPattern {
    pub fn as_str(&self) -> &str {
        match self {
            FormulaPattern::Exact(f) | FormulaPattern::Prefix(f) | FormulaPattern::Base(f) => f,
        }
    }
}

#[enum_dispatch]
pub trait CompoundRecordStore {
    /// rows matching the pattern, in dataset order
    fn fetch(&self, pattern: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError>;
    fn backend_name(&self) -> &'static str;
}

#[enum_dispatch(CompoundRecordStore)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    JsonFile(JsonFileStore),
    Cached(CachedStore<RetryingStore<JsonFileStore>>),
}

impl StoreBackend {
    /// the production configuration: lazily loaded file, retried, cached
    pub fn from_dataset_file(
        path: impl AsRef<Path>,
        retry_attempts: usize,
        retry_backoff: Duration,
        cache_capacity: usize,
    ) -> Self {
        let file = JsonFileStore::new(path);
        let retrying = RetryingStore::new(file, retry_attempts, retry_backoff);
        StoreBackend::Cached(CachedStore::new(retrying, cache_capacity))
    }
}

////////////////////////////////////////////////////////////////////////////////
//                              IN MEMORY
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Vec<Arc<CompoundRecord>>,
    by_formula: BTreeMap<String, Vec<usize>>,
    by_base: HashMap<String, Vec<usize>>,
}

impl InMemoryStore {
    /// indexes the rows; a repeated row id keeps the first row
    pub fn new(records: Vec<CompoundRecord>) -> Self {
        let mut store = InMemoryStore::default();
        let mut seen_ids = HashSet::new();
        for record in records {
            if !seen_ids.insert(record.id) {
                warn!("duplicate record id {} ({}) skipped", record.id, record.formula);
                continue;
            }
            let i = store.records.len();
            store
                .by_formula
                .entry(record.formula.clone())
                .or_default()
                .push(i);
            store
                .by_base
                .entry(base_formula(&record.formula).to_string())
                .or_default()
                .push(i);
            store.records.push(Arc::new(record));
        }
        debug!(
            "indexed {} records under {} formulas",
            store.records.len(),
            store.by_formula.len()
        );
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect(&self, indices: &[usize]) -> Vec<Arc<CompoundRecord>> {
        indices.iter().map(|&i| Arc::clone(&self.records[i])).collect()
    }
}

impl CompoundRecordStore for InMemoryStore {
    fn fetch(&self, pattern: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError> {
        let found = match pattern {
            FormulaPattern::Exact(formula) => self
                .by_formula
                .get(formula)
                .map(|ids| self.collect(ids))
                .unwrap_or_default(),
            FormulaPattern::Prefix(formula) => {
                let start = format!("{}(", formula);
                let mut ids: Vec<usize> = self
                    .by_formula
                    .range(start.clone()..)
                    .take_while(|(key, _)| key.starts_with(&start))
                    .flat_map(|(_, ids)| ids.iter().copied())
                    .collect();
                ids.sort_unstable();
                self.collect(&ids)
            }
            FormulaPattern::Base(base) => self
                .by_base
                .get(base)
                .map(|ids| self.collect(ids))
                .unwrap_or_default(),
        };
        Ok(found)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

////////////////////////////////////////////////////////////////////////////////
//                              JSON FILE
////////////////////////////////////////////////////////////////////////////////

/// dataset file loaded on the first query and kept for the life of the store
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    loaded: Mutex<Option<Arc<InMemoryStore>>>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            loaded: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn store(&self) -> Result<Arc<InMemoryStore>, StoreError> {
        // a panic in another query cannot leave a half-built index behind
        let mut guard = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = guard.as_ref() {
            return Ok(Arc::clone(store));
        }
        let records = load_compound_records(&self.path)?;
        let store = Arc::new(InMemoryStore::new(records));
        info!(
            "dataset '{}' loaded: {} records",
            self.path.display(),
            store.len()
        );
        *guard = Some(Arc::clone(&store));
        Ok(store)
    }
}

impl CompoundRecordStore for JsonFileStore {
    fn fetch(&self, pattern: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError> {
        self.store()?.fetch(pattern)
    }

    fn backend_name(&self) -> &'static str {
        "json-file"
    }
}

////////////////////////////////////////////////////////////////////////////////
//                              RETRIES
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    attempts: usize,
    backoff: Duration,
}

impl<S: CompoundRecordStore> RetryingStore<S> {
    pub fn new(inner: S, attempts: usize, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl<S: CompoundRecordStore> CompoundRecordStore for RetryingStore<S> {
    fn fetch(&self, pattern: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError> {
        let mut delay = self.backoff;
        for attempt in 1..=self.attempts {
            match self.inner.fetch(pattern) {
                Ok(rows) => return Ok(rows),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt == self.attempts => {
                    return Err(StoreError::Unavailable {
                        attempts: self.attempts,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "{} backend failed (attempt {}/{}): {}; retrying in {:?}",
                        self.inner.backend_name(),
                        attempt,
                        self.attempts,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
        Err(StoreError::Unavailable {
            attempts: self.attempts,
            reason: "no attempt made".to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

////////////////////////////////////////////////////////////////////////////////
//                              LRU CACHE
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<FormulaPattern, (u64, Vec<Arc<CompoundRecord>>)>,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// query results cached by pattern; the dataset is static so nothing is invalidated
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<S: CompoundRecordStore> CachedStore<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        (state.hits, state.misses)
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: CompoundRecordStore> CompoundRecordStore for CachedStore<S> {
    fn fetch(&self, pattern: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError> {
        if self.capacity == 0 {
            return self.inner.fetch(pattern);
        }
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.tick += 1;
            let tick = state.tick;
            if let Some(entry) = state.entries.get_mut(pattern) {
                entry.0 = tick;
                let rows = entry.1.clone();
                state.hits += 1;
                return Ok(rows);
            }
            state.misses += 1;
        }
        // the backend is queried without holding the lock
        let rows = self.inner.fetch(pattern)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tick += 1;
        let tick = state.tick;
        state.entries.insert(pattern.clone(), (tick, rows.clone()));
        if state.entries.len() > self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, (t, _))| *t)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                state.entries.remove(&key);
            }
        }
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermodynamics::DBhandlers::compound_record::Phase;
    use crate::Thermodynamics::DBhandlers::compound_record::tests::record;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    fn store() -> InMemoryStore {
        InMemoryStore::new(vec![
            record(1, "H2O", Phase::Liquid, Some(273.15), Some(373.15)),
            record(2, "H2O(g)", Phase::Gas, Some(373.15), Some(2000.0)),
            record(3, "H2O2", Phase::Liquid, Some(273.15), Some(400.0)),
            record(4, "Fe2O3(hematite)", Phase::Solid, Some(298.15), Some(950.0)),
            record(5, "Fe2O3", Phase::Solid, Some(298.15), Some(1000.0)),
            record(5, "Zn", Phase::Solid, Some(298.15), Some(692.7)),
        ])
    }

    fn ids(rows: &[Arc<CompoundRecord>]) -> Vec<u64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_in_memory_patterns() {
        let store = store();
        assert_eq!(store.len(), 5);
        let exact = store.fetch(&FormulaPattern::Exact("H2O".into())).unwrap();
        assert_eq!(ids(&exact), vec![1]);
        // H2O2 must not leak into the prefix scan of H2O
        let prefix = store.fetch(&FormulaPattern::Prefix("H2O".into())).unwrap();
        assert_eq!(ids(&prefix), vec![2]);
        let base = store.fetch(&FormulaPattern::Base("Fe2O3".into())).unwrap();
        assert_eq!(ids(&base), vec![4, 5]);
        assert!(store.fetch(&FormulaPattern::Exact("Zn".into())).unwrap().is_empty());
    }

    struct FlakyStore {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CompoundRecordStore for FlakyStore {
        fn fetch(&self, _: &FormulaPattern) -> Result<Vec<Arc<CompoundRecord>>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Io {
                    path: "db".into(),
                    source: std::io::Error::other("busy"),
                });
            }
            Ok(vec![Arc::new(record(9, "S", Phase::Solid, None, None))])
        }
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn flaky(failures: usize) -> FlakyStore {
        FlakyStore {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_retry_recovers_and_gives_up() {
        let pattern = FormulaPattern::Exact("S".into());
        let store = RetryingStore::new(flaky(2), 3, Duration::from_millis(1));
        assert_eq!(store.fetch(&pattern).unwrap().len(), 1);
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 3);

        let store = RetryingStore::new(flaky(5), 3, Duration::from_millis(1));
        match store.fetch(&pattern) {
            Err(StoreError::Unavailable { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Unavailable, got {:?}", other),
        }
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cache_hits_and_eviction() {
        let cached = CachedStore::new(store(), 2);
        let a = FormulaPattern::Exact("H2O".into());
        let b = FormulaPattern::Prefix("H2O".into());
        let c = FormulaPattern::Base("Fe2O3".into());
        cached.fetch(&a).unwrap();
        cached.fetch(&a).unwrap();
        cached.fetch(&b).unwrap();
        // touching a makes b the least recently used entry
        cached.fetch(&a).unwrap();
        cached.fetch(&c).unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.stats(), (2, 3));
        cached.fetch(&b).unwrap();
        assert_eq!(cached.stats(), (2, 4));
    }

    #[test]
    fn test_json_file_store_lazy_load() {
        let mut file = NamedTempFile::new().unwrap();
        let rows = vec![
            record(1, "Zn", Phase::Solid, Some(298.15), Some(692.73)),
            record(2, "Zn(l)", Phase::Liquid, Some(692.73), Some(1180.0)),
        ];
        write!(file, "{}", serde_json::to_string(&rows).unwrap()).unwrap();
        let backend = StoreBackend::from_dataset_file(file.path(), 2, Duration::from_millis(1), 8);
        let found = backend.fetch(&FormulaPattern::Prefix("Zn".into())).unwrap();
        assert_eq!(ids(&found), vec![2]);
        assert_eq!(backend.backend_name(), "json-file");
    }

    #[test]
    fn test_missing_dataset_is_unavailable() {
        let backend =
            StoreBackend::from_dataset_file("/nonexistent/compounds.json", 2, Duration::ZERO, 8);
        let err = backend
            .fetch(&FormulaPattern::Exact("Zn".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { attempts: 2, .. }));
    }
}
