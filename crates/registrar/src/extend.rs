//! Model classes and class extension.
//!
//! A [`ModelClass`] is the type descriptor every [`Model`] instance points
//! at. It resolves the lifecycle hooks, defaults, id attribute, prototype
//! fields and type-level statics for its instances.
//!
//! [`ModelClass::extend`] derives a child class from any class:
//!
//! - hooks and settings missing from the [`Overrides`] are inherited from the
//!   parent's resolved prototype, the supplied ones win;
//! - the parent's statics are copied into the child, then the static
//!   overrides are applied on top;
//! - without a constructor override, the child constructs exactly like its
//!   parent, with the child as the instance's class;
//! - the child keeps a back-reference to its parent ([`ModelClass::parent`])
//!   so an override can run the parent's version of a hook;
//! - the child can itself be extended.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::debug;
use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{attributes_from, Attributes, Model, Options};

const BASE_NAME: &str = "Model";
const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Construction logic of a class: builds an instance of the given class from
/// raw attributes and options.
pub type ConstructorFn = Arc<dyn Fn(&ModelClass, Value, Options) -> Model + Send + Sync>;
/// Runs once per instance, after its attributes are in place.
pub type InitializeFn = Arc<dyn Fn(&mut Model, &Attributes, &Options) + Send + Sync>;
/// Turns raw input into the attribute mapping to store.
pub type ParseFn = Arc<dyn Fn(Value, &Options) -> Attributes + Send + Sync>;
/// Inspects the attributes a mutation would produce; `Err` rejects it.
pub type ValidateFn =
    Arc<dyn Fn(&Attributes, &Options) -> Result<(), ValidationError> + Send + Sync>;

/// Instance-level overrides for [`ModelClass::extend`].
#[derive(Clone, Default)]
pub struct Overrides {
    name: Option<String>,
    constructor: Option<ConstructorFn>,
    initialize: Option<InitializeFn>,
    parse: Option<ParseFn>,
    validate: Option<ValidateFn>,
    defaults: Option<Attributes>,
    id_attribute: Option<String>,
    fields: Attributes,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&ModelClass, Value, Options) -> Model + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    pub fn initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Model, &Attributes, &Options) + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(f));
        self
    }

    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &Options) -> Attributes + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Attributes, &Options) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Attribute defaults, laid under the initial attributes of every
    /// instance. Replaces the parent's defaults rather than merging.
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(attributes_from(defaults));
        self
    }

    pub fn id_attribute(mut self, key: impl Into<String>) -> Self {
        self.id_attribute = Some(key.into());
        self
    }

    /// A prototype field, readable from every instance via
    /// [`Model::field`]. Merged over the parent's fields.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("name", &self.name)
            .field("constructor", &self.constructor.is_some())
            .field("initialize", &self.initialize.is_some())
            .field("parse", &self.parse.is_some())
            .field("validate", &self.validate.is_some())
            .field("defaults", &self.defaults)
            .field("id_attribute", &self.id_attribute)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Resolved instance-level behaviour of a class.
#[derive(Clone)]
struct Prototype {
    constructor: Option<ConstructorFn>,
    initialize: Option<InitializeFn>,
    parse: Option<ParseFn>,
    validate: Option<ValidateFn>,
    defaults: Attributes,
    id_attribute: String,
    fields: Attributes,
}

struct ClassInner {
    name: String,
    parent: Option<ModelClass>,
    proto: Prototype,
    statics: Attributes,
}

/// Shared handle to a model class. Cloning is cheap; equality is identity.
#[derive(Clone)]
pub struct ModelClass(Arc<ClassInner>);

impl ModelClass {
    /// The root class every other class descends from.
    pub fn base() -> Self {
        static BASE: OnceLock<ModelClass> = OnceLock::new();
        BASE.get_or_init(|| {
            ModelClass(Arc::new(ClassInner {
                name: BASE_NAME.to_string(),
                parent: None,
                proto: Prototype {
                    constructor: None,
                    initialize: None,
                    parse: None,
                    validate: None,
                    defaults: Attributes::new(),
                    id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
                    fields: Attributes::new(),
                },
                statics: Attributes::new(),
            }))
        })
        .clone()
    }

    /// Derives a child class. `statics` are type-level members applied over
    /// a copy of this class's statics.
    pub fn extend(&self, overrides: Overrides, statics: Value) -> ModelClass {
        let Overrides {
            name,
            constructor,
            initialize,
            parse,
            validate,
            defaults,
            id_attribute,
            fields,
        } = overrides;
        let inherited = &self.0.proto;

        let mut proto_fields = inherited.fields.clone();
        proto_fields.extend(fields);
        let proto = Prototype {
            constructor: constructor.or_else(|| inherited.constructor.clone()),
            initialize: initialize.or_else(|| inherited.initialize.clone()),
            parse: parse.or_else(|| inherited.parse.clone()),
            validate: validate.or_else(|| inherited.validate.clone()),
            defaults: defaults.unwrap_or_else(|| inherited.defaults.clone()),
            id_attribute: id_attribute.unwrap_or_else(|| inherited.id_attribute.clone()),
            fields: proto_fields,
        };

        let mut class_statics = self.0.statics.clone();
        class_statics.extend(attributes_from(statics));

        let name = name.unwrap_or_else(|| self.0.name.clone());
        debug!("extending model class {name} from {}", self.0.name);
        ModelClass(Arc::new(ClassInner {
            name,
            parent: Some(self.clone()),
            proto,
            statics: class_statics,
        }))
    }

    /// Builds an instance with this class's construction logic.
    pub fn create(&self, attrs: Value, options: Options) -> Model {
        match &self.0.proto.constructor {
            Some(constructor) => constructor(self, attrs, options),
            None => Model::construct(self, attrs, options),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The class this one was extended from; `None` for the base class.
    pub fn parent(&self) -> Option<&ModelClass> {
        self.0.parent.as_ref()
    }

    /// `true` when `other` is this class or one of its ancestors.
    pub fn is_a(&self, other: &ModelClass) -> bool {
        let mut class = Some(self);
        while let Some(current) = class {
            if current == other {
                return true;
            }
            class = current.parent();
        }
        false
    }

    pub fn statics(&self) -> &Attributes {
        &self.0.statics
    }

    pub fn static_value(&self, key: &str) -> Option<&Value> {
        self.0.statics.get(key)
    }

    pub fn id_attribute(&self) -> &str {
        &self.0.proto.id_attribute
    }

    pub fn defaults(&self) -> &Attributes {
        &self.0.proto.defaults
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.proto.fields.get(key)
    }

    /// Runs this class's `parse` hook; identity over JSON objects when no
    /// class in the chain overrides it.
    pub fn parse(&self, raw: Value, options: &Options) -> Attributes {
        match &self.0.proto.parse {
            Some(parse) => parse(raw, options),
            None => attributes_from(raw),
        }
    }

    /// Runs this class's `validate` hook; accepts everything when no class
    /// in the chain overrides it.
    pub fn validate(&self, attrs: &Attributes, options: &Options) -> Result<(), ValidationError> {
        match &self.0.proto.validate {
            Some(validate) => validate(attrs, options),
            None => Ok(()),
        }
    }

    pub fn initialize(&self, model: &mut Model, attrs: &Attributes, options: &Options) {
        if let Some(initialize) = &self.0.proto.initialize {
            initialize(model, attrs, options);
        }
    }

    pub(crate) fn validator(&self) -> Option<ValidateFn> {
        self.0.proto.validate.clone()
    }
}

impl PartialEq for ModelClass {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ModelClass {}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.0.name)
            .field("parent", &self.parent().map(ModelClass::name))
            .field("id_attribute", &self.0.proto.id_attribute)
            .field("statics", &self.0.statics)
            .finish()
    }
}
