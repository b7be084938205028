use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use form_sense::classifier::OracleClient;
use form_sense::classifier::learned::{LearnedEntry, LearnedStore, MemoryLearnedStore};
use form_sense::classifier::model::{Activation, DenseLayer, ModelArtifacts, ModelProvider};
use form_sense::error::FormError;
use form_sense::field::CandidateField;

// ============================================================================
// Oracle
// ============================================================================

pub struct MockOracle {
    pub available: bool,
    pub answer: Option<String>,
    pub delay: Duration,
    pub availability_checks: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

impl MockOracle {
    pub fn answering(answer: &str) -> Self {
        MockOracle {
            available: true,
            answer: Some(answer.to_string()),
            delay: Duration::ZERO,
            availability_checks: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        MockOracle {
            available: false,
            ..Self::answering("email")
        }
    }

    pub fn failing() -> Self {
        MockOracle {
            answer: None,
            ..Self::answering("email")
        }
    }

    pub fn slow(answer: &str, delay: Duration) -> Self {
        MockOracle {
            delay,
            ..Self::answering(answer)
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleClient for MockOracle {
    async fn is_available(&self) -> bool {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        self.available
    }

    async fn generate(&self, _field: &CandidateField) -> Result<String, FormError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer
            .clone()
            .ok_or_else(|| FormError::Oracle("mock has no answer".into()))
    }
}

// ============================================================================
// Similarity model
// ============================================================================

/// Two-class trigram model: "cpf" grams vote cpf, "email" grams vote email.
pub fn test_model() -> ModelArtifacts {
    let grams = [" cp", "cpf", "pf ", " em", "ema", "mai", "ail", "il "];
    let vocabulary: HashMap<String, usize> = grams
        .iter()
        .enumerate()
        .map(|(i, g)| (g.to_string(), i))
        .collect();

    ModelArtifacts {
        vocabulary,
        labels: vec!["cpf".into(), "email".into()],
        ngram_sizes: vec![3],
        layers: vec![DenseLayer {
            weights: vec![
                vec![5.0, 5.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 5.0, 5.0],
            ],
            bias: vec![0.0, 0.0],
            activation: Activation::Linear,
        }],
    }
}

/// Serves `test_model` slowly and counts loads.
pub struct CountingProvider {
    pub loads: AtomicUsize,
    pub delay: Duration,
}

impl CountingProvider {
    pub fn new(delay: Duration) -> Self {
        CountingProvider {
            loads: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for CountingProvider {
    async fn load(&self) -> Result<ModelArtifacts, FormError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(test_model())
    }
}

pub struct FailingProvider;

#[async_trait]
impl ModelProvider for FailingProvider {
    async fn load(&self) -> Result<ModelArtifacts, FormError> {
        Err(FormError::io(
            "model file missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        ))
    }
}

// ============================================================================
// Learned store
// ============================================================================

/// Reads its entries, then takes `delay` before handing them back.
pub struct SlowStore {
    pub inner: MemoryLearnedStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        SlowStore {
            inner: MemoryLearnedStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl LearnedStore for SlowStore {
    async fn learned_entries(&self) -> Result<Vec<LearnedEntry>, FormError> {
        let entries = self.inner.learned_entries().await?;
        tokio::time::sleep(self.delay).await;
        Ok(entries)
    }

    async fn add_learned_entry(&self, entry: LearnedEntry) -> Result<(), FormError> {
        self.inner.add_learned_entry(entry).await
    }
}
