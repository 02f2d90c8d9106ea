//! Change notification between the engine and the UI.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::Notice;
use crate::model::{Graph, GraphId, GraphStatus, NodeId};

/// Progress of a build as seen by the client.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildPhase {
	/// Job running normally.
	Running {
		/// 0 to 100.
		progress: f64,
		/// Step name reported by the job, if any.
		step: Option<String>,
	},
	/// Job waiting on the backend, usually rate limiting. Polling continues.
	Paused {
		/// 0 to 100.
		progress: f64,
		/// Job status or step that reported the pause.
		reason: String,
	},
	/// Terminal.
	Finished(GraphStatus),
}

/// Everything observers can react to.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkspaceEvent {
	/// The graph list changed.
	CatalogChanged,
	/// A graph was selected.
	GraphSelected(GraphId),
	/// No graph is selected any more.
	GraphDeselected,
	/// New node/link data for the selected graph.
	DataLoaded {
		/// Graph the data belongs to.
		graph_id: GraphId,
		/// Links dropped during sanitization.
		dropped_links: usize,
	},
	/// Rendered data was cleared.
	DataCleared,
	/// A build status poll or trigger updated a record.
	BuildUpdated {
		/// Latest record.
		graph: Graph,
		/// Client-side interpretation.
		phase: BuildPhase,
	},
	/// The focused node changed.
	FocusChanged(Option<NodeId>),
	/// The suggestion list changed.
	SuggestionsChanged,
	/// Suggestions were saved as cross-graph links.
	ConnectionsSaved {
		/// Source graph.
		graph_id: GraphId,
		/// Number of links persisted.
		count: usize,
	},
	/// Something the user should read.
	Notice(Notice),
	/// Clear the sticky notice for a graph.
	NoticeCleared,
}

type Listener<E> = Rc<dyn Fn(&E)>;

/// Single-threaded observer list.
pub struct EventBus<E> {
	listeners: RefCell<Vec<(u64, Listener<E>)>>,
	next_id: Cell<u64>,
}

impl<E: 'static> EventBus<E> {
	/// Create an empty bus.
	pub fn new() -> Rc<Self> {
		Rc::new(Self {
			listeners: RefCell::new(Vec::new()),
			next_id: Cell::new(0),
		})
	}

	/// Register a listener. It stays registered until the subscription drops.
	pub fn subscribe(self: &Rc<Self>, listener: impl Fn(&E) + 'static) -> Subscription {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.listeners.borrow_mut().push((id, Rc::new(listener)));

		let bus: Weak<Self> = Rc::downgrade(self);
		Subscription {
			unsubscribe: Some(Box::new(move || {
				if let Some(bus) = bus.upgrade() {
					bus.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
				}
			})),
		}
	}

	/// Deliver an event to every listener registered at call time.
	pub fn emit(&self, event: &E) {
		let snapshot: Vec<Listener<E>> = self
			.listeners
			.borrow()
			.iter()
			.map(|(_, l)| l.clone())
			.collect();
		for listener in snapshot {
			listener(event);
		}
	}

	/// Number of live listeners.
	pub fn len(&self) -> usize {
		self.listeners.borrow().len()
	}

	/// No live listeners.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
	/// Keep the listener for the lifetime of the bus.
	pub fn detach(mut self) {
		self.unsubscribe = None;
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(unsubscribe) = self.unsubscribe.take() {
			unsubscribe();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drop_unsubscribes() {
		let bus = EventBus::<u32>::new();
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sub = {
			let seen = seen.clone();
			bus.subscribe(move |e| seen.borrow_mut().push(*e))
		};
		bus.emit(&1);
		drop(sub);
		bus.emit(&2);
		assert_eq!(*seen.borrow(), vec![1]);
		assert!(bus.is_empty());
	}

	#[test]
	fn listener_may_subscribe_while_dispatching() {
		let bus = EventBus::<u32>::new();
		let inner_bus = bus.clone();
		bus.subscribe(move |_| {
			inner_bus.subscribe(|_| {}).detach();
		})
		.detach();
		bus.emit(&1);
		assert_eq!(bus.len(), 2);
	}
}
