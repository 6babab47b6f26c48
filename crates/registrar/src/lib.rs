//! registrar - observable attribute models.
//!
//! A [`Model`] is a mutable key/value record over JSON values. It tracks
//! which attributes changed in the most recent mutation round, keeps a
//! snapshot of the attributes as they were before that round, and notifies
//! registered listeners with `change:<attr>` and `change` events.
//!
//! Specialised model types are derived with [`ModelClass::extend`], which
//! layers `initialize`/`parse`/`validate` hooks, defaults and type-level
//! statics over a parent class. Every derived class can be extended again.
//!
//! ```
//! use registrar::{Model, Options};
//! use serde_json::json;
//!
//! let mut model = Model::new(json!({"name": "Tim", "age": 10}));
//! model.set(json!({"name": "Rob"}), Options::new().with_silent()).unwrap();
//! assert!(model.has_changed(Some("name")));
//! assert_eq!(model.previous("name"), Some(&json!("Tim")));
//! ```

pub mod error;
pub mod extend;
pub mod model;

pub use error::{ModelError, ValidationError};
pub use extend::{ConstructorFn, InitializeFn, ModelClass, Overrides, ParseFn, ValidateFn};
pub use model::{
    attributes_from, Attributes, ChangeEvent, ChangeSet, Delta, Handler, ListenerId, Model,
    Options, Topic,
};
