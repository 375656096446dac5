//! Gameplay events and the synchronous event bus.
//!
//! The bus is a single-thread handle (`Clone` shares the same bus). Handlers
//! run synchronously inside [`EventBus::publish`] in subscription order. An
//! event published from inside a handler is queued and delivered after the
//! event currently being dispatched has reached every subscriber, so delivery
//! is always FIFO and handlers never nest.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use garrison_ecs::entity::EntityId;
use serde::Serialize;

use crate::ambient::AmbientState;
use crate::ownership::OwnerId;
use crate::troops::UnitType;

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// Closed set of events the simulation publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    UnitSpawned {
        entity: EntityId,
        owner: OwnerId,
        unit_type: UnitType,
    },
    BarrackCaptured {
        entity: EntityId,
        previous_owner: OwnerId,
        new_owner: OwnerId,
    },
    AmbientStateChanged {
        new_state: AmbientState,
        previous_state: AmbientState,
    },
}

impl GameEvent {
    /// Stable snake_case name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::UnitSpawned { .. } => "unit_spawned",
            GameEvent::BarrackCaptured { .. } => "barrack_captured",
            GameEvent::AmbientStateChanged { .. } => "ambient_state_changed",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Rc<RefCell<dyn FnMut(&GameEvent)>>;

#[derive(Default)]
struct BusInner {
    subscribers: RefCell<Vec<(SubscriptionId, Handler)>>,
    pending: RefCell<VecDeque<GameEvent>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
    published: Cell<u64>,
}

/// Shared publish/subscribe bus for [`GameEvent`]s.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("published", &self.inner.published.get())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`. It receives every event published after this call.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let handler: Handler = Rc::new(RefCell::new(handler));
        self.inner.subscribers.borrow_mut().push((id, handler));
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Total number of events ever published on this bus.
    pub fn publish_count(&self) -> u64 {
        self.inner.published.get()
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// When called from inside a handler the event is queued and delivered
    /// once the outer dispatch loop reaches it.
    pub fn publish(&self, event: GameEvent) {
        self.inner.published.set(self.inner.published.get() + 1);
        tracing::trace!(kind = event.kind(), "publish");
        self.inner.pending.borrow_mut().push_back(event);

        if self.inner.dispatching.get() {
            return;
        }
        self.inner.dispatching.set(true);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            let targets: Vec<(SubscriptionId, Handler)> =
                self.inner.subscribers.borrow().clone();
            for (id, handler) in targets {
                let still_subscribed = self
                    .inner
                    .subscribers
                    .borrow()
                    .iter()
                    .any(|(sid, _)| *sid == id);
                if still_subscribed {
                    (&mut *handler.borrow_mut())(&event);
                }
            }
        }
        self.inner.dispatching.set(false);
    }

    /// Subscribe a recorder that keeps a copy of every event.
    pub fn recorder(&self) -> EventRecorder {
        let log: Rc<RefCell<Vec<GameEvent>>> = Rc::default();
        let sink = Rc::clone(&log);
        let subscription = self.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        EventRecorder { log, subscription }
    }
}

// ---------------------------------------------------------------------------
// EventRecorder
// ---------------------------------------------------------------------------

/// Collects published events for later inspection.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    log: Rc<RefCell<Vec<GameEvent>>>,
    subscription: SubscriptionId,
}

impl EventRecorder {
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<GameEvent> {
        self.log.borrow().clone()
    }

    /// Take and clear everything recorded so far.
    pub fn drain(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
