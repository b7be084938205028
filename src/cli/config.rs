use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::{AdapterRegistry, AdapterTimings};
use crate::classifier::learned::MemoryLearnedStore;
use crate::classifier::model::JsonModelProvider;
use crate::classifier::similarity::SimilarityThresholds;
use crate::classifier::{
    ClassifierSetting, OllamaOracle, OracleClassifier, OracleClient, SimilarityClassifier,
    StrategyKit, default_classifier_settings,
};
use crate::dom::Page;
use crate::error::FormError;
use crate::fill::FormFiller;
use crate::screen::FieldDetector;
use crate::watcher::{MutationWatcher, WatcherCallback, WatcherConfig};

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-sense",
    version,
    about = "Form field detection and filling for web page snapshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Ollama API endpoint (enables the oracle strategy)
    #[arg(long, global = true)]
    pub ollama_endpoint: Option<String>,

    /// Ollama model name
    #[arg(long, global = true)]
    pub ollama_model: Option<String>,

    /// Path to config file (default: form-sense.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect and classify the fields of a page snapshot
    Detect {
        /// Page snapshot JSON (`{"url": ..., "root": {...}}` or a bare node tree)
        #[arg(long)]
        page: String,

        /// Run the full async chain (similarity model load, oracle)
        #[arg(long)]
        async_mode: bool,

        /// Output format: table or json
        #[arg(long, default_value = "table")]
        format: String,

        /// Append one JSONL detection trace per field to this file
        #[arg(long)]
        trace: Option<String>,
    },

    /// Detect, then fill every field with sample values
    Fill {
        /// Page snapshot JSON
        #[arg(long)]
        page: String,

        /// Write the filled page snapshot here (default: print the fill report)
        #[arg(short, long)]
        output: Option<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `form-sense.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Strategy order and enablement; the fallback is always appended
    #[serde(default = "default_classifier_settings")]
    pub classifiers: Vec<ClassifierSetting>,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub watcher: WatcherSection,
    #[serde(default)]
    pub adapters: AdapterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classifiers: default_classifier_settings(),
            similarity: SimilarityConfig::default(),
            oracle: OracleConfig::default(),
            watcher: WatcherSection::default(),
            adapters: AdapterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// JSON model artifacts; without it the similarity strategy is not built
    pub model_path: Option<String>,

    #[serde(default = "default_learned_threshold")]
    pub learned_threshold: f32,

    #[serde(default = "default_model_threshold")]
    pub model_threshold: f32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            learned_threshold: default_learned_threshold(),
            model_threshold: default_model_threshold(),
        }
    }
}

impl SimilarityConfig {
    pub fn thresholds(&self) -> SimilarityThresholds {
        SimilarityThresholds {
            learned: self.learned_threshold,
            model: self.model_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub model: Option<String>,

    #[serde(default = "default_oracle_timeout")]
    pub timeout_ms: u64,

    /// Let the oracle re-type a field before its value is generated
    #[serde(default)]
    pub force_first: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            model: None,
            timeout_ms: default_oracle_timeout(),
            force_first: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatcherSection {
    #[serde(flatten)]
    pub watch: WatcherConfig,

    #[serde(default)]
    pub auto_refill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_overlay_timeout")]
    pub overlay_timeout_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            overlay_timeout_ms: default_overlay_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl AdapterConfig {
    pub fn timings(&self) -> AdapterTimings {
        AdapterTimings {
            overlay_timeout: Duration::from_millis(self.overlay_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

// Serde default helpers
fn default_learned_threshold() -> f32 { 0.85 }
fn default_model_threshold() -> f32 { 0.6 }
fn default_oracle_timeout() -> u64 { 8000 }
fn default_overlay_timeout() -> u64 { 1500 }
fn default_poll_interval() -> u64 { 50 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("form-sense.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content, config_path).unwrap_or_else(|e| {
            warn!(error = %e, "using default config");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

pub fn parse_config(content: &str, source: &str) -> Result<AppConfig, FormError> {
    serde_yaml::from_str(content).map_err(|e| FormError::Yaml {
        context: source.to_string(),
        source: e,
    })
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Oracle endpoint and model after CLI > config > default precedence, or
/// `None` when the oracle is off.
pub fn resolve_oracle(
    config: &AppConfig,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Option<Arc<OllamaOracle>> {
    if !config.oracle.enabled && ollama_endpoint.is_none() {
        return None;
    }
    let defaults = OllamaOracle::default();
    let endpoint = ollama_endpoint
        .or(config.oracle.endpoint.as_deref())
        .unwrap_or(&defaults.endpoint);
    let model = ollama_model
        .or(config.oracle.model.as_deref())
        .unwrap_or(&defaults.model);
    Some(Arc::new(OllamaOracle::new(endpoint, model)))
}

/// Strategy instances for the configured collaborators.
pub fn build_strategy_kit(config: &AppConfig, oracle: Option<Arc<dyn OracleClient>>) -> StrategyKit {
    let mut kit = StrategyKit::default();

    let similarity = config.similarity.model_path.as_deref().map(|path| {
        Arc::new(
            SimilarityClassifier::new(Arc::new(JsonModelProvider::new(path)))
                .with_learned_store(Arc::new(MemoryLearnedStore::new()))
                .with_thresholds(config.similarity.thresholds()),
        )
    });
    if let Some(similarity) = &similarity {
        kit = kit.with_similarity(Arc::clone(similarity));
    }

    if let Some(client) = oracle {
        let mut classifier = OracleClassifier::new(client)
            .with_timeout(Duration::from_millis(config.oracle.timeout_ms));
        if let Some(similarity) = similarity {
            classifier = classifier.with_learning(similarity);
        }
        kit = kit.with_oracle(Arc::new(classifier));
    }

    kit
}

pub fn build_detector(config: &AppConfig, oracle: Option<Arc<dyn OracleClient>>) -> FieldDetector {
    FieldDetector::new(
        build_strategy_kit(config, oracle),
        &config.classifiers,
        AdapterRegistry::with_defaults(config.adapters.timings()),
    )
}

/// A watcher wired from the `watcher:` section, ready to start.
pub struct WatcherSetup {
    pub watcher: MutationWatcher,
    pub config: WatcherConfig,
    pub auto_refill: bool,
}

impl WatcherSetup {
    /// Warm the detector up, then start watching with the configured settings.
    pub async fn start(&self, detector: &FieldDetector, callback: WatcherCallback) {
        detector.prepare().await;
        self.watcher
            .start(callback, self.auto_refill, self.config.clone());
    }
}

pub fn build_watcher(
    config: &AppConfig,
    page: Arc<Page>,
    detector: Arc<FieldDetector>,
    oracle: Option<Arc<dyn OracleClient>>,
) -> WatcherSetup {
    let mut filler = FormFiller::new(Arc::clone(&detector));
    if let Some(client) = oracle {
        filler = filler.with_oracle(client, config.oracle.force_first);
    }
    WatcherSetup {
        watcher: MutationWatcher::new(page, detector).with_filler(Arc::new(filler)),
        config: config.watcher.watch.clone(),
        auto_refill: config.watcher.auto_refill,
    }
}
