use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::dom::{MutationKind, MutationRecord, NodeId, Page, Selector};
use crate::field::CandidateField;
use crate::fill::FormFiller;
use crate::screen::FieldDetector;
use crate::screen::collector::CUSTOM_WIDGET_CONTAINERS;

pub mod signature;

pub use signature::FieldSignature;

static FORM_RELEVANT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&format!("input, select, textarea, {}", CUSTOM_WIDGET_CONTAINERS))
        .expect("static selector")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(rename = "debounce_ms", with = "millis", default = "default_debounce")]
    pub debounce: Duration,
    /// Nodes of our own UI; mutations inside them are ignored.
    #[serde(default = "default_ignore_selector")]
    pub ignore_selector: String,
}

fn default_debounce() -> Duration {
    Duration::from_millis(600)
}

fn default_ignore_selector() -> String {
    "[data-form-sense-ui]".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            ignore_selector: default_ignore_selector(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// What a watcher subscriber learns after a debounced change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatcherNotice {
    /// Change in the number of distinct `(selector, type)` entries
    pub delta: i64,
    pub total: usize,
}

pub type WatcherCallback = Arc<dyn Fn(WatcherNotice) + Send + Sync>;

/// Keeps detection live while the page mutates.
///
/// idle -> `start` -> watching -> `stop` -> idle. The watching state is a
/// single tokio task that owns the mutation receiver and the debounce timer,
/// so aborting it tears both down at once.
pub struct MutationWatcher {
    page: Arc<Page>,
    detector: Arc<FieldDetector>,
    filler: Option<Arc<FormFiller>>,
    task: Mutex<Option<JoinHandle<()>>>,
    filling: Arc<AtomicBool>,
}

impl MutationWatcher {
    pub fn new(page: Arc<Page>, detector: Arc<FieldDetector>) -> Self {
        Self {
            page,
            detector,
            filler: None,
            task: Mutex::new(None),
            filling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Filler used for auto-refill.
    pub fn with_filler(mut self, filler: Arc<FormFiller>) -> Self {
        self.filler = Some(filler);
        self
    }

    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// While set, mutations are ignored (the page is being filled by us).
    pub fn set_filling_in_progress(&self, filling: bool) {
        self.filling.store(filling, Ordering::SeqCst);
    }

    pub fn is_filling_in_progress(&self) -> bool {
        self.filling.load(Ordering::SeqCst)
    }

    /// Start watching. A no-op when already watching. Must be called from
    /// within a tokio runtime.
    ///
    /// The baseline and every recompute are sync passes, so await
    /// [`FieldDetector::prepare`] first when the detector carries a
    /// similarity model.
    pub fn start(&self, callback: WatcherCallback, auto_refill: bool, config: WatcherConfig) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("watcher already active");
            return;
        }

        let ignore = match Selector::parse(&config.ignore_selector) {
            Ok(sel) => Some(sel),
            Err(e) => {
                warn!(error = %e, "ignore selector rejected; watching everything");
                None
            }
        };

        // Subscribe before computing the baseline so nothing slips between.
        let receiver = self.page.subscribe_mutations();
        let baseline = FieldSignature::from_fields(&self.detector.detect_all_sync(&self.page));

        let watch = WatchLoop {
            page: Arc::clone(&self.page),
            detector: Arc::clone(&self.detector),
            filler: if auto_refill { self.filler.clone() } else { None },
            filling: Arc::clone(&self.filling),
            ignore,
            debounce: config.debounce,
            callback,
        };
        if auto_refill && watch.filler.is_none() {
            warn!("auto-refill requested without a filler; notifications only");
        }

        info!(
            fields = baseline.len(),
            debounce_ms = config.debounce.as_millis() as u64,
            auto_refill,
            "watcher started"
        );
        *task = Some(tokio::spawn(watch.run(receiver, baseline)));
    }

    /// Stop watching: the observer and any pending debounce go away
    /// immediately. Safe to call when idle.
    pub fn stop(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("watcher stopped");
        }
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sets the filling flag for its lifetime, however the fill ends.
struct FillingGuard<'a>(&'a AtomicBool);

impl<'a> FillingGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FillingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct WatchLoop {
    page: Arc<Page>,
    detector: Arc<FieldDetector>,
    filler: Option<Arc<FormFiller>>,
    filling: Arc<AtomicBool>,
    ignore: Option<Selector>,
    debounce: Duration,
    callback: WatcherCallback,
}

enum Wake {
    Relevant,
    Ignored,
    Closed,
}

impl WatchLoop {
    async fn run(self, mut receiver: Receiver<MutationRecord>, baseline: FieldSignature) {
        let mut signature = baseline;

        loop {
            // Idle until something relevant happens.
            match self.next(&mut receiver).await {
                Wake::Relevant => {}
                Wake::Ignored => continue,
                Wake::Closed => return,
            }

            // Debounce: every further relevant mutation pushes the deadline.
            let timer = sleep(self.debounce);
            tokio::pin!(timer);
            loop {
                tokio::select! {
                    _ = &mut timer => break,
                    wake = self.next(&mut receiver) => match wake {
                        Wake::Relevant => timer.as_mut().reset(Instant::now() + self.debounce),
                        Wake::Ignored => {}
                        Wake::Closed => return,
                    },
                }
            }

            let fields = self.detector.detect_all_sync(&self.page);
            let next = FieldSignature::from_fields(&fields);
            if next.fingerprint() == signature.fingerprint() {
                debug!("mutations settled without field changes");
                continue;
            }

            let delta = next.delta(&signature);
            let added: Vec<CandidateField> = fields
                .into_iter()
                .filter(|f| !signature.contains(&f.selector, f.field_type))
                .collect();
            signature = next;

            info!(delta, total = signature.len(), "fields changed");
            (self.callback)(WatcherNotice {
                delta,
                total: signature.len(),
            });

            if delta > 0 {
                if let Some(filler) = &self.filler {
                    self.refill(filler, &added, &mut receiver).await;
                }
            }
        }
    }

    async fn refill(
        &self,
        filler: &FormFiller,
        added: &[CandidateField],
        receiver: &mut Receiver<MutationRecord>,
    ) {
        let _guard = FillingGuard::engage(&self.filling);
        let report = filler.fill_fields(&self.page, added).await;
        debug!(filled = report.filled_count(), "auto-refill done");

        // Our own writes are not page changes.
        loop {
            match receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn next(&self, receiver: &mut Receiver<MutationRecord>) -> Wake {
        match receiver.recv().await {
            Ok(record) => {
                if self.filling.load(Ordering::SeqCst) || !self.is_relevant(&record) {
                    Wake::Ignored
                } else {
                    Wake::Relevant
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "watcher lagged behind mutations");
                Wake::Relevant
            }
            Err(RecvError::Closed) => Wake::Closed,
        }
    }

    fn is_relevant(&self, record: &MutationRecord) -> bool {
        if self.in_own_ui(record.target) {
            return false;
        }
        match &record.kind {
            MutationKind::ChildList { added, removed } => {
                let changed: Vec<NodeId> = added.iter().chain(removed).copied().collect();
                changed.is_empty() || !changed.iter().all(|n| self.in_own_ui(*n))
            }
            MutationKind::Attributes { .. } => {
                self.page.matches(record.target, &FORM_RELEVANT)
                    || self.page.query_one_within(record.target, &FORM_RELEVANT).is_some()
            }
            MutationKind::CharacterData => true,
        }
    }

    fn in_own_ui(&self, node: NodeId) -> bool {
        self.ignore
            .as_ref()
            .is_some_and(|sel| self.page.is_within(node, sel))
    }
}
