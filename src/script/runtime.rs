use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::device::{Device, DeviceAction};
use crate::document::{LocatorDocument, ScrollDirection};
use crate::locator::{evaluate_all, node_locator};
use crate::resolver::{
    Limits, LocatorModel, Resolution, ResolutionContext, ResolveError, Target, direct,
    expected_here, resolve, scroll_until,
};
use crate::script::compiler::CompiledScript;
use crate::script::error::RunError;
use crate::script::interpreter::Interpreter;
use crate::script::report::{ErrorReport, ExecutionResult};
use crate::script::value::{ElementHandle, Value};
use crate::trace::{TraceComment, TraceLogger};
use crate::tree::diff::{diff, signatures};
use crate::tree::{NodeId, UiNode, UiTree};

/// Share of the screen height below which the soft keyboard may cover a field.
const KEYBOARD_ZONE: f64 = 0.9;

/// Argument of `match()`: a text or an attribute map.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchQuery {
    Text(String),
    Attributes(Vec<(String, Value)>),
}

impl MatchQuery {
    pub fn from_value(value: &Value) -> Result<Self, RunError> {
        match value {
            Value::Str(s) => Ok(MatchQuery::Text(s.clone())),
            Value::Dict(entries) => Ok(MatchQuery::Attributes(entries.clone())),
            other => Err(RunError::script(format!(
                "match() takes a str or a dict, not {}",
                other.type_name()
            ))),
        }
    }

    fn matches(&self, tree: &UiTree, node: &UiNode) -> bool {
        match self {
            MatchQuery::Text(value) => {
                let wanted = value.trim().to_lowercase();
                !wanted.is_empty()
                    && (content_matches(node, &wanted)
                        || eq_lower(node.resource_id.as_deref(), &wanted)
                        || eq_lower(Some(&node.class_name), &wanted))
            }
            MatchQuery::Attributes(entries) => {
                let content_hit = entries.iter().any(|(key, value)| {
                    matches!(key.as_str(), "text" | "alt" | "content")
                        && matches!(value, Value::Str(s) if content_matches(node, &s.trim().to_lowercase()))
                });
                if content_hit {
                    return true;
                }
                let Some(attrs) = tree
                    .attributes(node.id)
                    .and_then(|a| serde_json::to_value(a).ok())
                else {
                    return false;
                };
                !entries.is_empty()
                    && entries
                        .iter()
                        .all(|(key, value)| attrs.get(key) == Some(&value.to_json()))
            }
        }
    }
}

impl std::fmt::Display for MatchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchQuery::Text(text) => write!(f, "'{}'", text),
            MatchQuery::Attributes(entries) => write!(f, "{}", Value::Dict(entries.clone())),
        }
    }
}

fn eq_lower(value: Option<&str>, wanted: &str) -> bool {
    value.is_some_and(|v| v.trim().to_lowercase() == wanted)
}

fn content_matches(node: &UiNode, wanted: &str) -> bool {
    eq_lower(node.content_description.as_deref(), wanted) || eq_lower(node.text.as_deref(), wanted)
}

/// First node inside `container` (exclusive) selected by a candidate, with the candidate index.
fn scoped_query(tree: &UiTree, container: NodeId, candidates: &[String]) -> Option<(NodeId, usize)> {
    let scope = tree.subtree(container)?;
    candidates.iter().enumerate().find_map(|(index, candidate)| {
        evaluate_all(tree, candidate)
            .into_iter()
            .find(|&n| n != container && scope.contains(n))
            .or_else(|| {
                evaluate_all(&scope, candidate)
                    .into_iter()
                    .find(|&n| n != container)
            })
            .map(|n| (n, index))
    })
}

// ============================================================================
// Primitives
// ============================================================================

/// Action primitives over a resolution context. Each primitive is charged
/// against the action ceiling before it touches the device.
pub struct Runtime<'a> {
    ctx: ResolutionContext<'a>,
}

struct Located {
    node: NodeId,
    element: String,
    locator: Option<String>,
}

impl<'a> Runtime<'a> {
    pub fn new(ctx: ResolutionContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ResolutionContext<'a> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ResolutionContext<'a> {
        &mut self.ctx
    }

    pub fn into_context(self) -> ResolutionContext<'a> {
        self.ctx
    }

    /// Handle for a document element; unknown names are an `ApiName` error.
    pub fn element(&self, name: &str) -> Result<ElementHandle, RunError> {
        Target::from_document(self.ctx.document(), name)
            .map(ElementHandle::new)
            .ok_or_else(|| RunError::ApiName {
                name: name.to_string(),
            })
    }

    fn charge(&mut self) -> Result<(), RunError> {
        if self.ctx.try_count_action() {
            return Ok(());
        }
        let limit = self.ctx.limits.max_action_count;
        warn!(limit, "action ceiling reached");
        Err(RunError::ActionLimitExceeded { limit })
    }

    fn locate(&mut self, handle: &ElementHandle) -> Result<Resolution, RunError> {
        Ok(resolve(&mut self.ctx, &handle.target)?)
    }

    /// Locates `handle`, or `inner` inside it when given.
    fn locate_target(
        &mut self,
        handle: &ElementHandle,
        inner: Option<&ElementHandle>,
    ) -> Result<Located, RunError> {
        let Some(inner) = inner else {
            let found = self.locate(handle)?;
            return Ok(Located {
                node: found.node,
                element: handle.name.clone(),
                locator: found.locator,
            });
        };

        let candidates = inner.target.candidates.clone();
        let hit = self.search_container(handle, |tree, container| {
            scoped_query(tree, container, &candidates)
        })?;

        match hit {
            Some((node, index)) => Ok(Located {
                node,
                element: inner.name.clone(),
                locator: candidates.get(index).cloned(),
            }),
            None if expected_here(&self.ctx, &inner.target) => Err(ResolveError::XPath {
                element: inner.name.clone(),
                locators: candidates,
            }
            .into()),
            None => Err(ResolveError::NotFound {
                element: inner.name.clone(),
                container: Some(handle.name.clone()),
            }
            .into()),
        }
    }

    /// Runs `probe` on the container's subtree, scrolling the container (or
    /// its scrollable ancestor) while the probe comes back empty.
    fn search_container<T>(
        &mut self,
        container: &ElementHandle,
        probe: impl Fn(&UiTree, NodeId) -> Option<T>,
    ) -> Result<Option<T>, RunError> {
        let found = self.locate(container)?;
        if let Some(hit) = probe(self.ctx.tree(), found.node) {
            return Ok(Some(hit));
        }

        let tree = self.ctx.tree();
        let scroller = match tree.node(found.node) {
            Some(node) if node.scrollable => Some(found.node),
            _ => tree.scrollable_ancestor(found.node),
        };
        let Some((scroller, bounds)) =
            scroller.and_then(|id| tree.node(id).map(|n| (id, n.bounds)))
        else {
            return Ok(None);
        };

        let target = container.target.clone();
        let hit = scroll_until(
            &mut self.ctx,
            scroller,
            bounds,
            ScrollDirection::Down,
            Some(&container.name),
            |ctx| {
                let again = direct(ctx, &target)?;
                probe(ctx.tree(), again.node)
            },
        )?;
        Ok(hit)
    }

    fn derive(&self, label: String, node: NodeId) -> ElementHandle {
        let tag = self
            .ctx
            .tree()
            .node(node)
            .map(|n| n.tag.clone())
            .unwrap_or_else(|| "*".to_string());
        ElementHandle::new(Target::derived(
            label,
            node_locator(&tag, node),
            self.ctx.current_screen().map(String::from),
        ))
    }

    fn act_on(
        &mut self,
        action: DeviceAction,
        located: &Located,
        comment: TraceComment,
    ) -> Result<(), RunError> {
        self.ctx.act(
            action,
            Some(located.node),
            Some(&located.element),
            located.locator.as_deref(),
            comment,
        )?;
        Ok(())
    }

    fn center(&self, node: NodeId) -> (i32, i32) {
        self.ctx
            .tree()
            .node(node)
            .map(|n| n.bounds.center())
            .unwrap_or_default()
    }

    pub fn tap(&mut self, handle: &ElementHandle, inner: Option<&ElementHandle>) -> Result<(), RunError> {
        self.charge()?;
        let located = self.locate_target(handle, inner)?;
        let (x, y) = self.center(located.node);
        self.act_on(DeviceAction::Tap { x, y }, &located, TraceComment::Action)
    }

    pub fn long_tap(
        &mut self,
        handle: &ElementHandle,
        inner: Option<&ElementHandle>,
    ) -> Result<(), RunError> {
        self.charge()?;
        let located = self.locate_target(handle, inner)?;
        let (x, y) = self.center(located.node);
        self.act_on(DeviceAction::LongTap { x, y }, &located, TraceComment::Action)
    }

    /// Types into a field. A field in the bottom tenth of the screen gets one
    /// downward scroll on its own bounds first so the keyboard does not cover it.
    pub fn set_text(
        &mut self,
        handle: &ElementHandle,
        text: &str,
        inner: Option<&ElementHandle>,
    ) -> Result<(), RunError> {
        self.charge()?;
        let mut located = self.locate_target(handle, inner)?;

        if self.in_keyboard_zone(located.node) {
            let bounds = self
                .ctx
                .tree()
                .node(located.node)
                .map(|n| n.bounds)
                .unwrap_or_default();
            info!(element = %located.element, "field sits under the keyboard, scrolling first");
            self.ctx.act(
                DeviceAction::Scroll {
                    bounds: bounds.to_corners(),
                    direction: ScrollDirection::Down,
                },
                Some(located.node),
                Some(&located.element),
                located.locator.as_deref(),
                TraceComment::Navigate,
            )?;
            located = self.locate_target(handle, inner)?;
        }

        let (x, y) = self.center(located.node);
        self.act_on(
            DeviceAction::InputText {
                x,
                y,
                text: text.to_string(),
            },
            &located,
            TraceComment::Action,
        )
    }

    fn in_keyboard_zone(&self, node: NodeId) -> bool {
        let height = self.ctx.screen_height();
        height > 0 && f64::from(self.center(node).1) >= KEYBOARD_ZONE * f64::from(height)
    }

    /// Scrolls an element. True when nothing on screen changed, which means
    /// the end of the content was reached.
    pub fn scroll(&mut self, handle: &ElementHandle, direction: ScrollDirection) -> Result<bool, RunError> {
        self.charge()?;
        let located = self.locate_target(handle, None)?;
        let bounds = self
            .ctx
            .tree()
            .node(located.node)
            .map(|n| n.bounds)
            .unwrap_or_default();

        let before = signatures(self.ctx.tree());
        self.act_on(
            DeviceAction::Scroll {
                bounds: bounds.to_corners(),
                direction,
            },
            &located,
            TraceComment::Action,
        )?;
        let after = signatures(self.ctx.tree());
        Ok(diff(&before, &after).is_unchanged())
    }

    fn log_lookup(&mut self, action: &str, located: &Located) {
        let record = self
            .ctx
            .record(TraceComment::Action)
            .with_node(Some(located.node))
            .with_action(action)
            .with_element(Some(&located.element), located.locator.as_deref());
        self.ctx.log(record);
    }

    /// Logs a handle derived from a container by indexing or matching.
    fn log_derived(&mut self, action: &str, node: NodeId, handle: &ElementHandle) {
        let located = Located {
            node,
            element: handle.name.clone(),
            locator: handle.target.candidates.first().cloned(),
        };
        self.log_lookup(action, &located);
    }

    pub fn get_text(
        &mut self,
        handle: &ElementHandle,
        inner: Option<&ElementHandle>,
    ) -> Result<String, RunError> {
        self.charge()?;
        let located = self.locate_target(handle, inner)?;
        self.log_lookup("get_text", &located);
        let text = self.ctx.tree().text_of(located.node).unwrap_or_default();
        Ok(text.replace("--", " "))
    }

    pub fn get_attributes(
        &mut self,
        handle: &ElementHandle,
        inner: Option<&ElementHandle>,
    ) -> Result<Value, RunError> {
        self.charge()?;
        let located = self.locate_target(handle, inner)?;
        self.log_lookup("get_attributes", &located);

        let attributes = self
            .ctx
            .tree()
            .attributes(located.node)
            .ok_or_else(|| RunError::script("located node vanished from the tree"))?;
        let json = serde_json::to_value(attributes)
            .map_err(|e| RunError::script(format!("cannot read attributes: {}", e)))?;

        Ok(match Value::from_json(json) {
            Value::Dict(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::Str(s) => (k, Value::Str(s.replace("--", " "))),
                        other => (k, other),
                    })
                    .collect(),
            ),
            other => other,
        })
    }

    pub fn back(&mut self) -> Result<(), RunError> {
        self.charge()?;
        self.ctx
            .act(DeviceAction::Back, None, None, None, TraceComment::Action)?;
        Ok(())
    }

    pub fn enter(&mut self) -> Result<(), RunError> {
        self.charge()?;
        self.ctx
            .act(DeviceAction::Enter, None, None, None, TraceComment::Action)?;
        Ok(())
    }

    /// `container[n]`: the n-th direct child, negative indexes count from the end.
    pub fn index(&mut self, container: &ElementHandle, n: i64) -> Result<ElementHandle, RunError> {
        self.charge()?;
        let found = self.locate(container)?;
        let children = self.ctx.tree().children(found.node).to_vec();

        let position = if n < 0 { children.len() as i64 + n } else { n };
        let child = usize::try_from(position)
            .ok()
            .and_then(|p| children.get(p).copied())
            .ok_or_else(|| ResolveError::Action {
                container: container.name.clone(),
                action: "index".to_string(),
                argument: n.to_string(),
            })?;

        let handle = self.derive(format!("{}[{}]", container.name, n), child);
        self.log_derived("index", child, &handle);
        Ok(handle)
    }

    /// `container.match(q)`: first descendant matching a text or attribute
    /// map, scrolling the container when needed. Never searches outside it.
    pub fn match_element(
        &mut self,
        container: &ElementHandle,
        query: &MatchQuery,
    ) -> Result<ElementHandle, RunError> {
        self.charge()?;
        let hit = self.search_container(container, |tree, c| {
            let scope = tree.subtree(c)?;
            scope
                .iter()
                .skip(1)
                .find(|node| query.matches(tree, node))
                .map(|node| node.id)
        })?;

        let node = hit.ok_or_else(|| ResolveError::Action {
            container: container.name.clone(),
            action: "match".to_string(),
            argument: query.to_string(),
        })?;
        let handle = self.derive(format!("{}.match({})", container.name, query), node);
        self.log_derived("match", node, &handle);
        Ok(handle)
    }

    /// Direct children of a container, for iteration.
    pub fn children(&mut self, container: &ElementHandle) -> Result<Vec<ElementHandle>, RunError> {
        self.charge()?;
        let found = self.locate(container)?;
        let children = self.ctx.tree().children(found.node).to_vec();
        let located = Located {
            node: found.node,
            element: container.name.clone(),
            locator: found.locator,
        };
        self.log_lookup("iterate", &located);
        Ok(children
            .into_iter()
            .enumerate()
            .map(|(i, child)| self.derive(format!("{}[{}]", container.name, i), child))
            .collect())
    }

    pub fn len(&mut self, container: &ElementHandle) -> Result<usize, RunError> {
        self.charge()?;
        let found = self.locate(container)?;
        let count = self.ctx.tree().children(found.node).len();
        let located = Located {
            node: found.node,
            element: container.name.clone(),
            locator: found.locator,
        };
        self.log_lookup("len", &located);
        Ok(count)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Settings for one run.
#[derive(Default)]
pub struct RuntimeOptions {
    pub limits: Limits,
    /// Replay log file; records are always kept in memory as well.
    pub trace_path: Option<PathBuf>,
    pub model: Option<Box<dyn LocatorModel>>,
}

/// Runs a compiled script to completion or to its first error.
///
/// A `crashed` record precedes the error and a `done` record always closes
/// the replay log.
pub fn execute(
    script: &CompiledScript,
    document: &LocatorDocument,
    device: &mut dyn Device,
    options: RuntimeOptions,
) -> ExecutionResult {
    let started = Instant::now();
    let trace = match &options.trace_path {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::in_memory(),
    };

    let ctx = match ResolutionContext::new(document, device, options.limits, trace) {
        Ok(ctx) => ctx,
        Err(e) => {
            let error = RunError::from(e);
            warn!(error = %error, "could not take the first snapshot");
            return ExecutionResult {
                completed: false,
                action_count: 0,
                elapsed_ms: started.elapsed().as_millis() as u64,
                error: Some(ErrorReport::new(&error, script, None, String::new(), None)),
                failure: Some(error),
                trace_records: Vec::new(),
            };
        }
    };
    let ctx = match options.model {
        Some(model) => ctx.with_model(model),
        None => ctx,
    };

    let mut runtime = Runtime::new(ctx);
    let outcome = Interpreter::new(&mut runtime, script).run();
    let mut ctx = runtime.into_context();

    let report = match &outcome {
        Ok(()) => {
            info!(actions = ctx.status.action_count, "script completed");
            None
        }
        Err(error) => {
            warn!(kind = error.kind(), error = %error, "script failed");
            let crashed = ctx
                .record(TraceComment::Crashed)
                .with_element(error.element(), None);
            ctx.log(crashed);
            Some(ErrorReport::new(
                error,
                script,
                ctx.statement(),
                ctx.tree().markup(),
                ctx.current_screen(),
            ))
        }
    };

    ctx.set_statement(None);
    let done = ctx.record(TraceComment::Done);
    ctx.log(done);

    let action_count = ctx.status.action_count;
    ExecutionResult {
        completed: outcome.is_ok(),
        action_count,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error: report,
        failure: outcome.err(),
        trace_records: ctx.into_trace().into_records(),
    }
}
