//! Fetch lifecycle events and the subscriber list that dispatches them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::health::HealthMap;
use super::payload::RawGraphPayload;
use super::query::GraphQuery;
use crate::error::FetchError;

/// A successful fetch: the raw graph plus the health resolved for its nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
	/// Query the snapshot answers.
	pub query: GraphQuery,
	/// Raw graph as returned by the backend.
	pub payload: RawGraphPayload,
	/// Node health, possibly empty when health lookup is off or failed.
	pub health: HealthMap,
}

/// Event names subscribers register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// A request has been issued.
	FetchStart,
	/// The backend returned a non-empty graph.
	FetchSuccess,
	/// The request failed.
	FetchError,
	/// The backend returned zero nodes.
	EmptyGraph,
}

/// Event delivered to subscribers.
#[derive(Clone, Debug)]
pub enum GraphEvent {
	/// A request has been issued.
	FetchStart,
	/// The backend returned a non-empty graph.
	FetchSuccess(Rc<GraphSnapshot>),
	/// The request failed.
	FetchError(FetchError),
	/// The backend returned zero nodes.
	EmptyGraph,
}

impl GraphEvent {
	/// The name this event is dispatched under.
	pub fn kind(&self) -> EventKind {
		match self {
			GraphEvent::FetchStart => EventKind::FetchStart,
			GraphEvent::FetchSuccess(_) => EventKind::FetchSuccess,
			GraphEvent::FetchError(_) => EventKind::FetchError,
			GraphEvent::EmptyGraph => EventKind::EmptyGraph,
		}
	}
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&GraphEvent)>;

struct Subscriber {
	id: SubscriptionId,
	kind: EventKind,
	live: Rc<Cell<bool>>,
	handler: Handler,
}

/// Ordered subscriber list.
///
/// Dispatch works on a snapshot taken when the event is emitted, so handlers
/// may subscribe or unsubscribe from inside a handler: a handler removed
/// mid-dispatch is not called afterwards, one added mid-dispatch first sees
/// the next event.
#[derive(Default)]
pub struct EventBus {
	subscribers: RefCell<Vec<Subscriber>>,
	next_id: Cell<u64>,
}

impl EventBus {
	/// Empty bus.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `handler` for `kind`. Handlers run in registration order.
	pub fn on(&self, kind: EventKind, handler: impl Fn(&GraphEvent) + 'static) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.subscribers.borrow_mut().push(Subscriber {
			id,
			kind,
			live: Rc::new(Cell::new(true)),
			handler: Rc::new(handler),
		});
		id
	}

	/// Remove a subscription. Returns false if it was already gone.
	pub fn off(&self, id: SubscriptionId) -> bool {
		let mut subscribers = self.subscribers.borrow_mut();
		let Some(pos) = subscribers.iter().position(|s| s.id == id) else {
			return false;
		};
		subscribers.remove(pos).live.set(false);
		true
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.subscribers.borrow().len()
	}

	/// Deliver `event` to every live handler registered for its kind.
	pub fn emit(&self, event: &GraphEvent) {
		let kind = event.kind();
		let targets: Vec<(Rc<Cell<bool>>, Handler)> = self
			.subscribers
			.borrow()
			.iter()
			.filter(|s| s.kind == kind)
			.map(|s| (s.live.clone(), s.handler.clone()))
			.collect();

		for (live, handler) in targets {
			if live.get() {
				handler(event);
			}
		}
	}
}
