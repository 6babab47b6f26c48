//! Observable attribute model.
//!
//! # Rounds
//!
//! A *round* is one top-level `set`/`unset`/`clear` together with every
//! mutation its listeners issue while it dispatches. Starting a round copies
//! the attributes into the previous-attributes snapshot and clears the
//! `changed` record; mutations issued from inside a listener join the round
//! already in flight instead of starting a new one.
//!
//! Every top-level mutation starts a fresh round, silent or not. Silent
//! mutations update the bookkeeping but hold back their notifications; held
//! notifications outlive their round and are delivered by the next dispatch,
//! either an explicit [`Model::change`] or the next non-silent mutation.
//!
//! A dispatch emits `change:<attr>` for each queued attribute in the order
//! it was queued, then a single `change`, then any `change:<attr>` queued by
//! `change` listeners. An attribute is announced at most once per dispatch.

mod events;
mod options;
mod types;

pub use events::{ChangeEvent, Handler, ListenerId, Topic};
pub use options::Options;
pub use types::{attributes_from, Attributes, ChangeSet, Delta};

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use log::{debug, trace};
use registrar_util::{is_present, slot_equal};
use serde_json::Value;

use crate::error::{ModelError, ValidationError};
use crate::extend::{ModelClass, ValidateFn};
use events::{Detached, Listeners};

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

fn next_cid() -> String {
    format!("c{}", NEXT_CID.fetch_add(1, Ordering::Relaxed))
}

pub struct Model {
    class: ModelClass,
    cid: String,
    attributes: Attributes,
    previous: Attributes,
    changed: ChangeSet,
    /// Attributes queued for `change:<attr>` in the next dispatch.
    pending: IndexSet<String>,
    /// Attributes changed silently in the current round.
    quiet: IndexSet<String>,
    /// Silent changes from earlier rounds, waiting for a dispatch.
    parked: IndexSet<String>,
    changing: bool,
    fields: Attributes,
    validator: Option<ValidateFn>,
    validation_error: Option<ValidationError>,
    listeners: Listeners,
}

impl Model {
    /// Creates a base-class model from a JSON object of attributes.
    pub fn new(attrs: Value) -> Self {
        ModelClass::base().create(attrs, Options::new())
    }

    /// Base construction logic shared by every class.
    ///
    /// Parses `raw` when `options.parse` is set, lays the class defaults
    /// under the result, snapshots it as the previous attributes and runs
    /// the class `initialize` hook. Constructor overrides forward here.
    pub fn construct(class: &ModelClass, raw: Value, options: Options) -> Self {
        let initial = if options.parse {
            class.parse(raw, &options)
        } else {
            attributes_from(raw)
        };
        let mut attributes = class.defaults().clone();
        attributes.extend(initial);

        let mut model = Self {
            class: class.clone(),
            cid: next_cid(),
            previous: attributes.clone(),
            attributes,
            changed: ChangeSet::new(),
            pending: IndexSet::new(),
            quiet: IndexSet::new(),
            parked: IndexSet::new(),
            changing: false,
            fields: Attributes::new(),
            validator: None,
            validation_error: None,
            listeners: Listeners::default(),
        };
        trace!("{}: constructed as {}", model.cid, class.name());

        let attrs = model.attributes.clone();
        class.initialize(&mut model, &attrs, &options);
        model
    }

    pub fn class(&self) -> &ModelClass {
        &self.class
    }

    pub fn is_instance_of(&self, class: &ModelClass) -> bool {
        self.class.is_a(class)
    }

    /// Process-unique client id, assigned at construction.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Value of the class's id attribute, if set to something other than
    /// `null`.
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(self.class.id_attribute())
            .filter(|v| !v.is_null())
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// `true` when `key` holds a value other than `null`.
    pub fn has(&self, key: &str) -> bool {
        is_present(self.attributes.get(key))
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes.clone())
    }

    /// With `None`, whether the latest round changed anything; with a key,
    /// whether that attribute is in the latest round's changes.
    pub fn has_changed(&self, key: Option<&str>) -> bool {
        match key {
            None => !self.changed.is_empty(),
            Some(key) => self.changed.contains_key(key),
        }
    }

    /// With `None`, the latest round's changes. With a mapping, the entries
    /// of that mapping that differ from the current attributes. `None` when
    /// there is nothing to report.
    pub fn changed_attributes(&self, diff: Option<&Attributes>) -> Option<ChangeSet> {
        let changes = match diff {
            None => self.changed.clone(),
            Some(diff) => diff
                .iter()
                .filter(|(key, value)| !slot_equal(self.attributes.get(key.as_str()), Some(*value)))
                .map(|(key, value)| (key.clone(), Some(value.clone())))
                .collect(),
        };
        (!changes.is_empty()).then_some(changes)
    }

    pub fn previous(&self, key: &str) -> Option<&Value> {
        self.previous.get(key)
    }

    pub fn previous_attributes(&self) -> &Attributes {
        &self.previous
    }

    /// Rejection from the most recent validation, cleared by the next one
    /// that passes.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    /// Instance field, falling back to the class's prototype fields.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).or_else(|| self.class.field(key))
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Overrides the class `validate` hook for this instance only. `None`
    /// falls back to the class hook again.
    pub fn set_validator(&mut self, validator: Option<ValidateFn>) {
        self.validator = validator;
    }

    /// Applies `delta` as one all-or-nothing step.
    ///
    /// Accepts an attribute mapping, a JSON object, a `(key, value)` pair or
    /// an explicit [`Delta`]. On validation rejection nothing is written and
    /// no event fires.
    pub fn set(&mut self, delta: impl Into<Delta>, options: Options) -> Result<(), ModelError> {
        self.apply(delta.into(), options)
    }

    /// Removes `key`. Always reported as a change, even when `key` was
    /// already absent.
    pub fn unset(&mut self, key: impl Into<String>, options: Options) -> Result<(), ModelError> {
        self.apply(Delta::new().remove(key), options)
    }

    /// Unsets every present attribute in a single step.
    pub fn clear(&mut self, options: Options) -> Result<(), ModelError> {
        let keys: Vec<String> = self.attributes.keys().cloned().collect();
        self.apply(Delta::remove_all(keys), options)
    }

    /// Delivers pending notifications now, including those held back by silent
    /// mutations. Does nothing while a dispatch is already running.
    pub fn change(&mut self) {
        self.dispatch(Options::new());
    }

    fn apply(&mut self, delta: Delta, options: Options) -> Result<(), ModelError> {
        self.check(&delta, &options)?;
        if delta.is_empty() {
            // Nothing to record, but held notifications still go out.
            if !options.silent {
                self.dispatch(options);
            }
            return Ok(());
        }

        if !self.changing {
            trace!("{}: round start", self.cid);
            self.previous = self.attributes.clone();
            self.changed.clear();
            let quiet = std::mem::take(&mut self.quiet);
            self.parked.extend(quiet);
        }
        for (key, value) in delta.into_entries() {
            self.record(key, value, options.silent);
        }
        if !options.silent {
            self.dispatch(options);
        }
        Ok(())
    }

    fn check(&mut self, delta: &Delta, options: &Options) -> Result<(), ValidationError> {
        let Some(validate) = self.validator.clone().or_else(|| self.class.validator()) else {
            return Ok(());
        };
        let proposed = delta.applied_to(&self.attributes);
        match validate(&proposed, options) {
            Ok(()) => {
                self.validation_error = None;
                Ok(())
            }
            Err(err) => {
                debug!("{}: mutation rejected: {err}", self.cid);
                self.validation_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn record(&mut self, key: String, value: Option<Value>, silent: bool) {
        let unset = value.is_none();
        let announce = unset || !slot_equal(self.attributes.get(&key), value.as_ref());
        let changed = unset || !slot_equal(self.previous.get(&key), value.as_ref());

        match &value {
            Some(v) => {
                self.attributes.insert(key.clone(), v.clone());
            }
            None => {
                self.attributes.remove(&key);
            }
        }

        if !changed {
            self.changed.shift_remove(&key);
            self.pending.shift_remove(&key);
            self.quiet.shift_remove(&key);
            return;
        }
        if announce {
            if !silent {
                self.pending.insert(key.clone());
            } else if !self.pending.contains(&key) {
                self.quiet.insert(key.clone());
            }
        }
        self.changed.insert(key, value);
    }

    fn dispatch(&mut self, options: Options) {
        if self.changing {
            return;
        }
        // Held notifications go first, in the order they were made.
        let mut queue = std::mem::take(&mut self.parked);
        queue.extend(std::mem::take(&mut self.quiet));
        queue.extend(std::mem::take(&mut self.pending));
        self.pending = queue;
        if self.pending.is_empty() {
            return;
        }

        self.changing = true;
        let mut detached = self.listeners.detach();
        let mut announced = HashSet::new();

        self.announce_pending(&mut detached, &mut announced, &options);
        let event = ChangeEvent {
            topic: Topic::Change,
            value: None,
            options: options.clone(),
        };
        self.emit(&mut detached, &event);
        self.announce_pending(&mut detached, &mut announced, &options);

        self.quiet.retain(|key| !announced.contains(key));

        self.listeners.reattach(detached);
        self.changing = false;
        trace!("{}: dispatch done, {} changed", self.cid, self.changed.len());
    }

    fn announce_pending(
        &mut self,
        detached: &mut Detached,
        announced: &mut HashSet<String>,
        options: &Options,
    ) {
        while let Some(key) = self.pending.shift_remove_index(0) {
            if !announced.insert(key.clone()) {
                continue;
            }
            let event = ChangeEvent {
                value: self.attributes.get(&key).cloned(),
                topic: Topic::Attribute(key),
                options: options.clone(),
            };
            self.emit(detached, &event);
        }
    }
}

impl Clone for Model {
    /// A fresh instance of the same class built from a copy of the current
    /// attributes. Listeners, instance fields and change state stay behind.
    fn clone(&self) -> Self {
        self.class.create(Value::Object(self.attributes.clone()), Options::new())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.class.name())
            .field("cid", &self.cid)
            .field("attributes", &self.attributes)
            .field("changed", &self.changed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
