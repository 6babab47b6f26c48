use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde_json::Value;

use super::{Model, Options};
use crate::error::ModelError;

const CHANGE: &str = "change";

/// Event channel a listener subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `"change"`: fired once per dispatch after the per-attribute events.
    Change,
    /// `"change:<attr>"`: fired for one changed attribute.
    Attribute(String),
}

impl Topic {
    pub fn attribute(key: impl Into<String>) -> Self {
        Topic::Attribute(key.into())
    }
}

impl FromStr for Topic {
    type Err = ModelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.strip_prefix(CHANGE) {
            Some("") => Ok(Topic::Change),
            Some(rest) => match rest.strip_prefix(':') {
                Some(key) if !key.is_empty() => Ok(Topic::attribute(key)),
                _ => Err(ModelError::UnknownEvent(name.to_string())),
            },
            None => Err(ModelError::UnknownEvent(name.to_string())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Change => f.write_str(CHANGE),
            Topic::Attribute(key) => write!(f, "{CHANGE}:{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub topic: Topic,
    /// Current value of the attribute for `change:<attr>`; `None` when the
    /// attribute was unset and always `None` for `change`.
    pub value: Option<Value>,
    /// Options of the call that started the dispatch.
    pub options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub type Handler = Box<dyn FnMut(&mut Model, &ChangeEvent) + Send>;

pub(crate) struct Listener {
    topic: Topic,
    handler: Handler,
}

/// Listeners taken out of the registry for the length of one dispatch, so
/// handlers can be handed `&mut Model`.
pub(crate) struct Detached(BTreeMap<ListenerId, Listener>);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    attached: BTreeMap<ListenerId, Listener>,
    in_flight: BTreeSet<ListenerId>,
    removed: BTreeSet<ListenerId>,
}

impl Listeners {
    pub(crate) fn add(&mut self, topic: Topic, handler: Handler) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ListenerId(self.next_id);
        self.attached.insert(id, Listener { topic, handler });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        if self.attached.remove(&id).is_some() {
            return true;
        }
        // Detached for a dispatch: drop it when the dispatch hands it back.
        self.in_flight.contains(&id) && self.removed.insert(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.attached.len() + self.in_flight.len() - self.removed.len()
    }

    pub(crate) fn detach(&mut self) -> Detached {
        let taken = std::mem::take(&mut self.attached);
        self.in_flight = taken.keys().copied().collect();
        Detached(taken)
    }

    pub(crate) fn reattach(&mut self, detached: Detached) {
        let Detached(mut listeners) = detached;
        for id in std::mem::take(&mut self.removed) {
            listeners.remove(&id);
        }
        listeners.append(&mut self.attached);
        self.attached = listeners;
        self.in_flight.clear();
    }

    fn is_live(&self, id: ListenerId) -> bool {
        !self.removed.contains(&id)
    }
}

impl Model {
    /// Subscribes `handler` to an event by name: `"change"` or
    /// `"change:<attr>"`.
    pub fn on<F>(&mut self, event: &str, handler: F) -> Result<ListenerId, ModelError>
    where
        F: FnMut(&mut Model, &ChangeEvent) + Send + 'static,
    {
        let topic = event.parse::<Topic>().inspect_err(|_| {
            debug!("{}: rejected listener for unknown event {event:?}", self.cid());
        })?;
        Ok(self.listen(topic, Box::new(handler)))
    }

    pub fn on_change<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&mut Model, &ChangeEvent) + Send + 'static,
    {
        self.listen(Topic::Change, Box::new(handler))
    }

    pub fn on_attribute<F>(&mut self, key: impl Into<String>, handler: F) -> ListenerId
    where
        F: FnMut(&mut Model, &ChangeEvent) + Send + 'static,
    {
        self.listen(Topic::attribute(key), Box::new(handler))
    }

    pub fn listen(&mut self, topic: Topic, handler: Handler) -> ListenerId {
        self.listeners.add(topic, handler)
    }

    /// Removes a listener. Safe to call from inside a handler, including for
    /// the handler currently running.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn emit(&mut self, detached: &mut Detached, event: &ChangeEvent) {
        trace!("{}: emit {}", self.cid(), event.topic);
        for (id, listener) in detached.0.iter_mut() {
            if listener.topic == event.topic && self.listeners.is_live(*id) {
                (listener.handler)(self, event);
            }
        }
    }
}
