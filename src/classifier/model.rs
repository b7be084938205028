use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FormError;

// ============================================================================
// Trained similarity model artifacts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Softmax,
}

/// Fully connected layer; `weights[out][in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

/// Vocabulary, labels and weights of the trained field classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    /// Character n-gram -> histogram index
    pub vocabulary: HashMap<String, usize>,
    /// Output index -> field type name
    pub labels: Vec<String>,
    #[serde(default = "default_ngram_sizes")]
    pub ngram_sizes: Vec<usize>,
    pub layers: Vec<DenseLayer>,
}

fn default_ngram_sizes() -> Vec<usize> {
    vec![3]
}

impl ModelArtifacts {
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Check that vocabulary, layers and labels line up.
    pub fn validate(&self) -> Result<(), FormError> {
        let dim = self.dimension();
        if dim == 0 {
            return Err(FormError::ModelShape("empty vocabulary".into()));
        }
        if let Some((gram, idx)) = self.vocabulary.iter().find(|(_, idx)| **idx >= dim) {
            return Err(FormError::ModelShape(format!(
                "vocabulary entry '{}' has index {} >= {}",
                gram, idx, dim
            )));
        }
        if self.layers.is_empty() {
            return Err(FormError::ModelShape("no layers".into()));
        }

        let mut input = dim;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.bias.len() {
                return Err(FormError::ModelShape(format!(
                    "layer {}: {} weight rows but {} biases",
                    i,
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != input) {
                return Err(FormError::ModelShape(format!(
                    "layer {}: row of width {} where {} was expected",
                    i,
                    row.len(),
                    input
                )));
            }
            input = layer.weights.len();
        }

        if input != self.labels.len() {
            return Err(FormError::ModelShape(format!(
                "model emits {} scores for {} labels",
                input,
                self.labels.len()
            )));
        }
        Ok(())
    }

    /// L2-normalized n-gram histogram of `text` over the vocabulary.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut histogram = vec![0.0f32; self.dimension()];
        for n in &self.ngram_sizes {
            for gram in char_ngrams(text, *n) {
                if let Some(idx) = self.vocabulary.get(&gram) {
                    if let Some(slot) = histogram.get_mut(*idx) {
                        *slot += 1.0;
                    }
                }
            }
        }

        let norm = histogram.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            histogram.iter_mut().for_each(|v| *v /= norm);
        }
        histogram
    }

    /// Class probabilities for one input vector.
    pub fn predict(&self, input: &[f32]) -> Vec<f32> {
        let mut activations = input.to_vec();
        for layer in &self.layers {
            let mut out: Vec<f32> = layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, bias)| row.iter().zip(&activations).map(|(w, x)| w * x).sum::<f32>() + bias)
                .collect();
            match layer.activation {
                Activation::Linear => {}
                Activation::Relu => out.iter_mut().for_each(|v| *v = v.max(0.0)),
                Activation::Softmax => out = softmax(&out),
            }
            activations = out;
        }

        if self.layers.last().map(|l| l.activation) == Some(Activation::Softmax) {
            activations
        } else {
            softmax(&activations)
        }
    }
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// Character n-grams of ` text ` (one space of padding on each side).
pub fn char_ngrams(text: &str, n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let padded: Vec<char> = format!(" {} ", text.trim().to_lowercase()).chars().collect();
    if padded.len() < n {
        return Vec::new();
    }
    padded.windows(n).map(|w| w.iter().collect()).collect()
}

/// Cosine similarity; zero when either vector is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

// ============================================================================
// Providers
// ============================================================================

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn load(&self) -> Result<ModelArtifacts, FormError>;
}

/// Reads artifacts from a JSON file.
pub struct JsonModelProvider {
    path: PathBuf,
}

impl JsonModelProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelProvider for JsonModelProvider {
    async fn load(&self) -> Result<ModelArtifacts, FormError> {
        let context = format!("model file {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FormError::io(context.clone(), e))?;
        serde_json::from_str(&content).map_err(|e| FormError::json(context, e))
    }
}

/// Serves artifacts already in memory.
pub struct StaticModelProvider {
    artifacts: ModelArtifacts,
}

impl StaticModelProvider {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl ModelProvider for StaticModelProvider {
    async fn load(&self) -> Result<ModelArtifacts, FormError> {
        Ok(self.artifacts.clone())
    }
}
