use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::{Device, DeviceAction};
use crate::document::LocatorDocument;
use crate::resolver::error::ResolveError;
use crate::resolver::model_locator::LocatorModel;
use crate::skeleton::classify;
use crate::trace::{StatementRef, TraceComment, TraceLogger, TraceRecord};
use crate::tree::{NodeId, UiTree, build};

// ============================================================================
// Limits
// ============================================================================

/// Bounds that keep every run finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Scrolls per container while searching.
    #[serde(default = "default_max_scroll_num")]
    pub max_scroll_num: usize,

    /// Primitive calls per run.
    #[serde(default = "default_max_action_count")]
    pub max_action_count: usize,

    /// Dependency paths tried per element.
    #[serde(default = "default_max_dependence_width")]
    pub max_dependence_width: usize,

    /// Steps executed per dependency path.
    #[serde(default = "default_max_dependence_depth")]
    pub max_dependence_depth: usize,

    /// Pause after every device action.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Fingerprint intersections must exceed this size to classify a screen.
    #[serde(default = "default_min_match_size")]
    pub min_match_size: usize,

    #[serde(default = "default_true")]
    pub enable_dependency: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_scroll_num: default_max_scroll_num(),
            max_action_count: default_max_action_count(),
            max_dependence_width: default_max_dependence_width(),
            max_dependence_depth: default_max_dependence_depth(),
            settle_ms: default_settle_ms(),
            min_match_size: default_min_match_size(),
            enable_dependency: true,
        }
    }
}

fn default_max_scroll_num() -> usize { 4 }
fn default_max_action_count() -> usize { 50 }
fn default_max_dependence_width() -> usize { 3 }
fn default_max_dependence_depth() -> usize { 5 }
fn default_settle_ms() -> u64 { 2000 }
fn default_min_match_size() -> usize { crate::skeleton::classifier::DEFAULT_MIN_MATCH_SIZE }
fn default_true() -> bool { true }

// ============================================================================
// Status
// ============================================================================

/// Per-run counters, reset when a context is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub action_count: usize,
    /// Fingerprint digest of the latest snapshot.
    pub last_fingerprint: Option<String>,
}

// ============================================================================
// Context
// ============================================================================

/// Everything a resolution or a primitive needs: the document, the device,
/// the latest tree, the counters and the replay log.
pub struct ResolutionContext<'a> {
    document: &'a LocatorDocument,
    device: &'a mut dyn Device,
    pub limits: Limits,
    pub status: ExecutionStatus,
    tree: UiTree,
    screen: Option<String>,
    screenshot: Option<String>,
    screen_height: u32,
    statement: Option<StatementRef>,
    trace: TraceLogger,
    model: Option<Box<dyn LocatorModel>>,
    step: u64,
}

impl<'a> ResolutionContext<'a> {
    /// Takes the first snapshot of the run.
    pub fn new(
        document: &'a LocatorDocument,
        device: &'a mut dyn Device,
        limits: Limits,
        trace: TraceLogger,
    ) -> Result<Self, ResolveError> {
        let snapshot = device.snapshot()?;
        let tree = build(&snapshot.views)?;
        let mut ctx = Self {
            document,
            device,
            limits,
            status: ExecutionStatus::default(),
            tree,
            screen: None,
            screenshot: snapshot.screenshot.clone(),
            screen_height: snapshot.screen_height(),
            statement: None,
            trace,
            model: None,
            step: 0,
        };
        ctx.classify_current();
        Ok(ctx)
    }

    pub fn with_model(mut self, model: Box<dyn LocatorModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn document(&self) -> &'a LocatorDocument {
        self.document
    }

    pub fn tree(&self) -> &UiTree {
        &self.tree
    }

    pub fn model(&self) -> Option<&dyn LocatorModel> {
        self.model.as_deref()
    }

    /// Classified screen of the latest snapshot, the main screen when nothing matches.
    pub fn current_screen(&self) -> Option<&str> {
        self.screen.as_deref()
    }

    pub fn screen_height(&self) -> u32 {
        self.screen_height
    }

    pub fn statement(&self) -> Option<&StatementRef> {
        self.statement.as_ref()
    }

    pub fn set_statement(&mut self, statement: Option<StatementRef>) {
        self.statement = statement;
    }

    pub fn trace(&self) -> &TraceLogger {
        &self.trace
    }

    pub fn into_trace(self) -> TraceLogger {
        self.trace
    }

    /// Counts one primitive call; false once the ceiling is reached.
    pub fn try_count_action(&mut self) -> bool {
        if self.status.action_count >= self.limits.max_action_count {
            return false;
        }
        self.status.action_count += 1;
        true
    }

    fn classify_current(&mut self) {
        let fingerprint = self.tree.fingerprint();
        self.status.last_fingerprint = Some(fingerprint.digest());
        self.screen = crate::skeleton::classify_fingerprint(
            &fingerprint,
            self.document.fingerprints(),
            self.limits.min_match_size,
        )
        .or_else(|| self.document.main_screen().map(String::from));
    }

    /// Re-reads the device and rebuilds the tree.
    pub fn refresh(&mut self) -> Result<(), ResolveError> {
        let snapshot = self.device.snapshot()?;
        self.tree = build(&snapshot.views)?;
        self.screenshot = snapshot.screenshot.clone();
        self.screen_height = snapshot.screen_height();
        self.classify_current();
        debug!(screen = ?self.screen, nodes = self.tree.len(), "refreshed snapshot");
        Ok(())
    }

    /// Logs, performs and settles one device action, then refreshes.
    pub fn act(
        &mut self,
        action: DeviceAction,
        node: Option<NodeId>,
        element: Option<&str>,
        locator: Option<&str>,
        comment: TraceComment,
    ) -> Result<(), ResolveError> {
        debug!(%action, ?node, ?element, ?comment, "device action");
        let record = self
            .record(comment)
            .with_node(node)
            .with_action(&action)
            .with_input(action.input())
            .with_element(element, locator);
        self.trace.log(record);

        self.device.perform(&action)?;
        self.device
            .settle(Duration::from_millis(self.limits.settle_ms));
        self.refresh()
    }

    /// Record of the current screen and statement with the next step number.
    pub fn record(&mut self, comment: TraceComment) -> TraceRecord {
        self.step += 1;
        TraceRecord::now(self.step, comment, self.tree.markup())
            .with_screen_name(self.screen.as_deref())
            .with_statement(self.statement.as_ref())
            .with_screenshot(self.screenshot.as_deref())
    }

    pub fn log(&mut self, record: TraceRecord) {
        self.trace.log(record);
    }
}

/// Classifies a tree against a document, falling back to the main screen.
pub fn screen_of_tree(document: &LocatorDocument, tree: &UiTree, min_size: usize) -> Option<String> {
    classify(tree, document.fingerprints(), min_size)
        .or_else(|| document.main_screen().map(String::from))
}
