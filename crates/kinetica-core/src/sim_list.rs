//! Simulation object registry with typed observer events.
//!
//! A [`SimList`] tracks which objects currently exist in a simulation and
//! broadcasts [`SimEvent`]s to registered listeners synchronously, in
//! registration order. Display layers subscribe here to mirror the set of
//! simulated objects without polling.

use std::fmt;

/// Identity of an object registered with a [`SimList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimObjectInfo {
    /// Stable numeric id assigned by the simulation.
    pub id: usize,
    /// Human-readable name.
    pub name: String,
}

/// Events broadcast by a [`SimList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// An object was added to the simulation.
    ObjectAdded(SimObjectInfo),
    /// An object was removed from the simulation.
    ObjectRemoved(SimObjectInfo),
    /// A named configuration parameter changed value.
    ParameterChanged {
        /// Name of the parameter that changed.
        name: &'static str,
    },
}

impl SimEvent {
    /// Stable string name of the event, part of the observer protocol.
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::ObjectAdded(_) => "OBJECT_ADDED",
            SimEvent::ObjectRemoved(_) => "OBJECT_REMOVED",
            SimEvent::ParameterChanged { .. } => "PARAMETER_CHANGED",
        }
    }
}

/// Receiver for [`SimEvent`]s; invoked synchronously on the simulation thread.
pub trait SimListener {
    /// Called for every broadcast event.
    fn on_sim_event(&mut self, event: &SimEvent);
}

/// Registry of simulation objects plus its listeners.
#[derive(Default)]
pub struct SimList {
    objects: Vec<SimObjectInfo>,
    listeners: Vec<Box<dyn SimListener>>,
}

impl SimList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether an object with `id` is registered.
    pub fn contains(&self, id: usize) -> bool {
        self.objects.iter().any(|o| o.id == id)
    }

    /// Registered objects in insertion order.
    pub fn objects(&self) -> &[SimObjectInfo] {
        &self.objects
    }

    /// Registers a listener; events are delivered in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn SimListener>) {
        self.listeners.push(listener);
    }

    /// Adds an object and broadcasts [`SimEvent::ObjectAdded`].
    pub fn add(&mut self, id: usize, name: impl Into<String>) {
        let info = SimObjectInfo {
            id,
            name: name.into(),
        };
        self.objects.push(info.clone());
        self.broadcast(&SimEvent::ObjectAdded(info));
    }

    /// Removes an object if present and broadcasts [`SimEvent::ObjectRemoved`].
    pub fn remove(&mut self, id: usize) {
        if let Some(pos) = self.objects.iter().position(|o| o.id == id) {
            let info = self.objects.remove(pos);
            self.broadcast(&SimEvent::ObjectRemoved(info));
        }
    }

    /// Broadcasts a parameter change to all listeners.
    pub fn parameter_changed(&mut self, name: &'static str) {
        self.broadcast(&SimEvent::ParameterChanged { name });
    }

    fn broadcast(&mut self, event: &SimEvent) {
        for listener in &mut self.listeners {
            listener.on_sim_event(event);
        }
    }
}

impl fmt::Debug for SimList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimList")
            .field("objects", &self.objects)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl SimListener for Recorder {
        fn on_sim_event(&mut self, event: &SimEvent) {
            self.log.borrow_mut().push(event.name().to_string());
        }
    }

    #[test]
    fn test_add_remove_broadcast() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = SimList::new();
        list.add_listener(Box::new(Recorder { log: log.clone() }));

        list.add(0, "block");
        assert!(list.contains(0));
        list.remove(0);
        assert!(!list.contains(0));

        assert_eq!(log.borrow().as_slice(), ["OBJECT_ADDED", "OBJECT_REMOVED"]);
    }

    #[test]
    fn test_remove_unknown_is_silent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = SimList::new();
        list.add_listener(Box::new(Recorder { log: log.clone() }));
        list.remove(42);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_parameter_changed_event_name() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut list = SimList::new();
        list.add_listener(Box::new(Recorder { log: log.clone() }));
        list.parameter_changed("GRAVITY");
        assert_eq!(log.borrow().as_slice(), ["PARAMETER_CHANGED"]);
    }
}
