use tracing::{debug, info, instrument, warn};

use crate::device::DeviceAction;
use crate::document::{ActionType, DependencyPath, LocatorDocument, ScrollDirection, Step};
use crate::locator::first_match;
use crate::resolver::context::ResolutionContext;
use crate::resolver::error::ResolveError;
use crate::trace::TraceComment;
use crate::tree::diff::SeenSignatures;
use crate::tree::{Bounds, NodeId};

/// What the resolver searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// Screen the element belongs to. `None` means no expectation, which is
    /// treated as "expected here".
    pub screen: Option<String>,
    pub candidates: Vec<String>,
    pub paths: Vec<DependencyPath>,
    pub description: Option<String>,
}

impl Target {
    /// Named element from the document, with candidates shared by other
    /// elements of the same screen filtered out.
    pub fn from_document(document: &LocatorDocument, name: &str) -> Option<Self> {
        let entry = document.element(name)?;
        Some(Self {
            name: entry.name.clone(),
            screen: Some(entry.screen.clone()),
            candidates: document.unique_locators(name),
            paths: entry.paths.clone(),
            description: entry.description.clone(),
        })
    }

    /// Node picked out at runtime, located by a single candidate.
    pub fn derived(name: impl Into<String>, locator: String, screen: Option<String>) -> Self {
        Self {
            name: name.into(),
            screen,
            candidates: vec![locator],
            paths: Vec::new(),
            description: None,
        }
    }
}

/// A located node and the candidate that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    /// `None` when the node came from the locator model.
    pub locator: Option<String>,
}

/// Finds `target` in the live tree: direct match, then scroll-search when the
/// element belongs on the current screen, then dependency navigation when it
/// does not.
#[instrument(skip_all, fields(element = %target.name))]
pub fn resolve(ctx: &mut ResolutionContext, target: &Target) -> Result<Resolution, ResolveError> {
    if let Some(found) = direct(ctx, target) {
        debug!(node = found.node, "direct match");
        return Ok(found);
    }

    if expected_here(ctx, target) {
        if let Some(found) = scroll_search(ctx, target)? {
            return Ok(found);
        }
        return Err(ResolveError::XPath {
            element: target.name.clone(),
            locators: target.candidates.clone(),
        });
    }

    if ctx.limits.enable_dependency {
        if let Some(found) = navigate(ctx, target)? {
            return Ok(found);
        }
    }

    Err(ResolveError::NotFound {
        element: target.name.clone(),
        container: None,
    })
}

/// Direct match plus scroll-search, never navigation.
pub fn locate_here(
    ctx: &mut ResolutionContext,
    target: &Target,
) -> Result<Option<Resolution>, ResolveError> {
    if let Some(found) = direct(ctx, target) {
        return Ok(Some(found));
    }
    if expected_here(ctx, target) {
        return scroll_search(ctx, target);
    }
    Ok(None)
}

pub fn expected_here(ctx: &ResolutionContext, target: &Target) -> bool {
    match &target.screen {
        None => true,
        Some(screen) => ctx.current_screen() == Some(screen.as_str()),
    }
}

/// Candidates against the current tree; the locator model only when there are none.
pub fn direct(ctx: &ResolutionContext, target: &Target) -> Option<Resolution> {
    if let Some(m) = first_match(ctx.tree(), &target.candidates) {
        return Some(Resolution {
            node: m.node,
            locator: target.candidates.get(m.candidate).cloned(),
        });
    }

    if !target.candidates.is_empty() {
        return None;
    }
    let model = ctx.model()?;
    let node = model.locate(
        &target.name,
        target.description.as_deref(),
        &ctx.tree().markup(),
    )?;
    if !ctx.tree().contains(node) {
        warn!(element = %target.name, node, "model picked a node that is not on screen");
        return None;
    }
    Some(Resolution {
        node,
        locator: None,
    })
}

/// Scrolls every scrollable container of the current screen, probing after each scroll.
fn scroll_search(
    ctx: &mut ResolutionContext,
    target: &Target,
) -> Result<Option<Resolution>, ResolveError> {
    let containers: Vec<(NodeId, Bounds)> = ctx
        .tree()
        .scrollable_ids()
        .into_iter()
        .filter_map(|id| ctx.tree().node(id).map(|n| (id, n.bounds)))
        .collect();

    for (container, bounds) in containers {
        let found = scroll_until(
            ctx,
            container,
            bounds,
            ScrollDirection::Down,
            Some(&target.name),
            |ctx| direct(ctx, target),
        )?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Scrolls one container up to `max_scroll_num` times, returning the first
/// probe hit. Stops early when a scroll shows no node signature not seen before.
pub fn scroll_until<R>(
    ctx: &mut ResolutionContext,
    container: NodeId,
    bounds: Bounds,
    direction: ScrollDirection,
    element: Option<&str>,
    mut probe: impl FnMut(&ResolutionContext) -> Option<R>,
) -> Result<Option<R>, ResolveError> {
    let mut seen = SeenSignatures::new(ctx.tree());

    for attempt in 0..ctx.limits.max_scroll_num {
        ctx.act(
            DeviceAction::Scroll {
                bounds: bounds.to_corners(),
                direction,
            },
            Some(container),
            element,
            None,
            TraceComment::Navigate,
        )?;

        if let Some(hit) = probe(ctx) {
            debug!(container, attempt, "found after scrolling");
            return Ok(Some(hit));
        }

        if seen.absorb(ctx.tree()) == 0 {
            debug!(container, attempt, "scroll saturated");
            break;
        }
    }
    Ok(None)
}

/// Follows dependency paths until the target shows up.
fn navigate(
    ctx: &mut ResolutionContext,
    target: &Target,
) -> Result<Option<Resolution>, ResolveError> {
    let width = ctx.limits.max_dependence_width;
    let depth = ctx.limits.max_dependence_depth;

    for (index, path) in target.paths.iter().take(width).enumerate() {
        let current = ctx.current_screen().map(String::from);
        let start = path
            .steps
            .iter()
            .position(|s| s.screen.is_some() && s.screen == current)
            .unwrap_or(0);

        let mut completed = true;
        for step in path.steps.iter().skip(start).take(depth) {
            if !perform_step(ctx, step)? {
                completed = false;
                break;
            }
        }
        if !completed {
            info!(element = %target.name, path = index, "dependency path abandoned");
            continue;
        }

        if let Some(found) = locate_here(ctx, target)? {
            info!(element = %target.name, path = index, "reached through dependency path");
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Runs one dependency step. `false` when its element cannot be found here.
fn perform_step(ctx: &mut ResolutionContext, step: &Step) -> Result<bool, ResolveError> {
    if step.action.is_global() {
        let action = device_action(step.action, Bounds::default(), None);
        ctx.act(action, None, None, None, TraceComment::Navigate)?;
        return Ok(true);
    }

    let Some(name) = step.element.as_deref() else {
        return Ok(false);
    };
    let Some(step_target) = Target::from_document(ctx.document(), name) else {
        warn!(element = name, "dependency step names an unknown element");
        return Ok(false);
    };
    let Some(found) = locate_here(ctx, &step_target)? else {
        debug!(element = name, "dependency step element not on screen");
        return Ok(false);
    };
    let Some(bounds) = ctx.tree().node(found.node).map(|n| n.bounds) else {
        return Ok(false);
    };

    let action = device_action(step.action, bounds, step.text.as_deref());
    ctx.act(
        action,
        Some(found.node),
        Some(name),
        found.locator.as_deref(),
        TraceComment::Navigate,
    )?;
    Ok(true)
}

/// Device action performing `action` on a node with `bounds`.
pub fn device_action(action: ActionType, bounds: Bounds, text: Option<&str>) -> DeviceAction {
    let (x, y) = bounds.center();
    match action {
        ActionType::Tap => DeviceAction::Tap { x, y },
        ActionType::LongTap => DeviceAction::LongTap { x, y },
        ActionType::SetText => DeviceAction::InputText {
            x,
            y,
            text: text.unwrap_or_default().to_string(),
        },
        ActionType::Scroll(direction) => DeviceAction::Scroll {
            bounds: bounds.to_corners(),
            direction,
        },
        ActionType::Back => DeviceAction::Back,
        ActionType::Enter => DeviceAction::Enter,
    }
}
