//! Event taxonomy emitted by [`crate::facade::EngineFacade`]. A plain
//! `Vec<EngineEvent>` drain plus an optional boxed-closure subscriber list
//! stands in for a full event-writer/world dispatch (this crate is
//! headless and has no app/world to hook into), matching
//! `EngineFacade::on`'s `(event, handler)` contract.

use crate::graph::ExternalId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Start,
    Move,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverPhase {
    Enter,
    Leave,
}

/// One emitted occurrence; `tick` is a monotonic tick count rather than a
/// wall-clock stamp, since this crate has no clock dependency.
#[derive(Clone, Debug)]
pub struct EngineEvent {
    pub kind: EngineEventKind,
    pub tick: u64,
}

#[derive(Clone, Debug)]
pub enum EngineEventKind {
    GraphLoad { node_count: usize, edge_count: usize },
    GraphMutate { nodes_added: usize, nodes_removed: usize, edges_added: usize, edges_removed: usize },
    NodeAdd { id: ExternalId },
    NodeRemove { id: ExternalId },
    NodePin { id: ExternalId },
    NodeUnpin { id: ExternalId },
    NodeDrag { id: ExternalId, phase: DragPhase, x: f32, y: f32 },
    NodeHover { id: ExternalId, phase: HoverPhase },
    EdgeAdd { id: ExternalId },
    EdgeRemove { id: ExternalId },
    EdgeHover { id: ExternalId, phase: HoverPhase },
    SelectionChange { node_count: usize, edge_count: usize },
    ViewportChange,
}

impl EngineEventKind {
    /// The dotted event-name string
    /// (`graph:load`, `node:drag{start,move,end}`, ...), used as the key
    /// for [`EventBus::on`] subscriptions.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEventKind::GraphLoad { .. } => "graph:load",
            EngineEventKind::GraphMutate { .. } => "graph:mutate",
            EngineEventKind::NodeAdd { .. } => "node:add",
            EngineEventKind::NodeRemove { .. } => "node:remove",
            EngineEventKind::NodePin { .. } => "node:pin",
            EngineEventKind::NodeUnpin { .. } => "node:unpin",
            EngineEventKind::NodeDrag { phase: DragPhase::Start, .. } => "node:drag:start",
            EngineEventKind::NodeDrag { phase: DragPhase::Move, .. } => "node:drag:move",
            EngineEventKind::NodeDrag { phase: DragPhase::End, .. } => "node:drag:end",
            EngineEventKind::NodeHover { phase: HoverPhase::Enter, .. } => "node:hover:enter",
            EngineEventKind::NodeHover { phase: HoverPhase::Leave, .. } => "node:hover:leave",
            EngineEventKind::EdgeAdd { .. } => "edge:add",
            EngineEventKind::EdgeRemove { .. } => "edge:remove",
            EngineEventKind::EdgeHover { phase: HoverPhase::Enter, .. } => "edge:hover:enter",
            EngineEventKind::EdgeHover { phase: HoverPhase::Leave, .. } => "edge:hover:leave",
            EngineEventKind::SelectionChange { .. } => "selection:change",
            EngineEventKind::ViewportChange => "viewport:change",
        }
    }
}

type Handler = Box<dyn FnMut(&EngineEvent) + Send>;

/// Owns every live subscriber plus this tick's not-yet-dispatched event
/// log. `EngineFacade::on(event, handler)` registers into this; every
/// event-emitting mutation call pushes here and dispatches immediately
/// (no queued async delivery — the host loop is single-threaded).
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(&'static str, Handler)>,
    log: Vec<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event name. Multiple handlers for the
    /// same name are all invoked, in registration order.
    pub fn on(&mut self, event: &'static str, handler: impl FnMut(&EngineEvent) + Send + 'static) {
        self.handlers.push((event, Box::new(handler)));
    }

    /// Dispatch `event` to every matching subscriber and append it to the
    /// retained log (callers that prefer polling over callbacks can drain
    /// via [`EventBus::drain`]).
    pub fn emit(&mut self, kind: EngineEventKind, tick: u64) {
        let event = EngineEvent { kind, tick };
        let name = event.kind.name();
        for (registered, handler) in self.handlers.iter_mut() {
            if *registered == name {
                handler(&event);
            }
        }
        self.log.push(event);
    }

    /// Drain and return every event emitted since the last drain.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscriber_only_fires_for_its_event_name() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let mut bus = EventBus::new();
        bus.on("node:add", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(EngineEventKind::NodeAdd { id: ExternalId::Num(1) }, 0);
        bus.emit(EngineEventKind::NodeRemove { id: ExternalId::Num(1) }, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_returns_every_event_since_last_drain() {
        let mut bus = EventBus::new();
        bus.emit(EngineEventKind::ViewportChange, 0);
        bus.emit(EngineEventKind::ViewportChange, 1);
        assert_eq!(bus.drain().len(), 2);
        assert_eq!(bus.drain().len(), 0);
    }
}
