use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::classifier::learned::{LearnedEntry, LearnedStore};
use crate::classifier::model::{ModelArtifacts, ModelProvider, cosine_similarity};
use crate::classifier::{ClassifierResult, FieldClassifier, SIMILARITY};
use crate::field::{CandidateField, DetectionMethod, FieldType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityThresholds {
    /// Acceptance for learned vectors; high, favors precision
    pub learned: f32,
    /// Acceptance for the trained model's best class
    pub model: f32,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            learned: 0.85,
            model: 0.6,
        }
    }
}

struct LearnedVector {
    vector: Vec<f32>,
    field_type: FieldType,
}

/// N-gram similarity over learned corrections first, then the trained model.
///
/// The model is loaded once through a `OnceCell`: concurrent callers share
/// the in-flight load, and a failed load is remembered as `None` so the
/// strategy abstains for the rest of the session. Learned vectors are
/// rebuilt wholesale after `invalidate_learned`.
pub struct SimilarityClassifier {
    provider: Arc<dyn ModelProvider>,
    store: Option<Arc<dyn LearnedStore>>,
    thresholds: SimilarityThresholds,
    model: OnceCell<Option<Arc<ModelArtifacts>>>,
    learned: RwLock<Arc<Vec<LearnedVector>>>,
    learned_stale: AtomicBool,
    reload_lock: Mutex<()>,
}

impl SimilarityClassifier {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            store: None,
            thresholds: SimilarityThresholds::default(),
            model: OnceCell::new(),
            learned: RwLock::new(Arc::new(Vec::new())),
            learned_stale: AtomicBool::new(true),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn with_learned_store(mut self, store: Arc<dyn LearnedStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_thresholds(mut self, thresholds: SimilarityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Some(_)))
    }

    /// Load the model (once) and refresh learned vectors if they are stale.
    /// Returns `false` when the model is unavailable.
    pub async fn ensure_loaded(&self) -> bool {
        let model = self
            .model
            .get_or_init(|| async {
                match self.provider.load().await {
                    Ok(artifacts) => match artifacts.validate() {
                        Ok(()) => {
                            debug!(
                                dimension = artifacts.dimension(),
                                labels = artifacts.labels.len(),
                                "similarity model loaded"
                            );
                            Some(Arc::new(artifacts))
                        }
                        Err(e) => {
                            warn!(error = %e, "similarity model rejected; strategy disabled");
                            None
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "similarity model failed to load; strategy disabled");
                        None
                    }
                }
            })
            .await
            .clone();

        let Some(model) = model else {
            return false;
        };

        if self.learned_stale.load(Ordering::Acquire) {
            self.reload_learned(&model).await;
        }
        true
    }

    /// Mark learned vectors stale; the next async detection reloads them.
    pub fn invalidate_learned(&self) {
        self.learned_stale.store(true, Ordering::Release);
    }

    /// Persist a user (or oracle) correction and reload the learned cache.
    pub async fn record_correction(&self, signals: &str, field_type: FieldType) {
        let Some(store) = &self.store else {
            return;
        };
        let entry = LearnedEntry {
            signals: signals.to_lowercase(),
            field_type,
        };
        if let Err(e) = store.add_learned_entry(entry).await {
            warn!(error = %e, "failed to store learned entry");
            return;
        }
        self.invalidate_learned();
        self.ensure_loaded().await;
    }

    async fn reload_learned(&self, model: &ModelArtifacts) {
        let _guard = self.reload_lock.lock().await;
        // Cleared before reading so an invalidation during the read stays visible.
        if !self.learned_stale.swap(false, Ordering::AcqRel) {
            return;
        }

        let entries = match &self.store {
            Some(store) => match store.learned_entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "learned entries unavailable");
                    self.learned_stale.store(true, Ordering::Release);
                    return;
                }
            },
            None => Vec::new(),
        };

        let vectors: Vec<LearnedVector> = entries
            .iter()
            .map(|entry| LearnedVector {
                vector: model.vectorize(&entry.signals),
                field_type: entry.field_type,
            })
            .filter(|lv| lv.vector.iter().any(|v| *v != 0.0))
            .collect();

        debug!(count = vectors.len(), "learned vectors reloaded");
        *self.learned.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(vectors);
    }

    /// Classify a signal string with whatever is loaded right now.
    pub fn classify_signals(&self, signals: &str) -> Option<ClassifierResult> {
        if signals.trim().is_empty() {
            return None;
        }
        let model = self.model.get()?.as_ref()?;
        let vector = model.vectorize(signals);
        if vector.iter().all(|v| *v == 0.0) {
            return None;
        }

        let learned = self
            .learned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let best_learned = learned
            .iter()
            .map(|lv| (cosine_similarity(&vector, &lv.vector), lv.field_type))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((score, field_type)) = best_learned {
            if score >= self.thresholds.learned {
                return Some(ClassifierResult::new(field_type, score, DetectionMethod::Learned));
            }
        }

        let scores = model.predict(&vector);
        let (best_idx, best_score) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        if best_score < self.thresholds.model {
            return None;
        }

        let field_type = model.labels.get(best_idx)?.parse::<FieldType>().ok()?;
        Some(ClassifierResult::new(field_type, best_score, DetectionMethod::Similarity))
    }
}

#[async_trait]
impl FieldClassifier for SimilarityClassifier {
    fn name(&self) -> &'static str {
        SIMILARITY
    }

    fn detect(&self, field: &CandidateField) -> Option<ClassifierResult> {
        self.classify_signals(&field.signals)
    }

    async fn detect_async(&self, field: &CandidateField) -> Option<ClassifierResult> {
        if !self.ensure_loaded().await {
            return None;
        }
        self.classify_signals(&field.signals)
    }
}
