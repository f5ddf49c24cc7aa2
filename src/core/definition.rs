//! State table types.
//!
//! A [`StateTable`] is an ordered mapping from state name to
//! [`StateDefinition`]. Tables can be written in code or loaded from JSON, in
//! which case callback and data specs are strings naming entries of the
//! target's [`Bindings`](crate::effects::Bindings).

use crate::effects::{callback, DataProvider, FsmResult, StateMachine, TransitionHook, TransitionInfo};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// State data, always handed out as a fresh copy.
pub type DataMap = serde_json::Map<String, Value>;

/// An `enter` or `exit` callback spec.
pub enum CallbackSpec<T> {
    /// Name of a callback registered on the target; dropped if unresolved.
    Named(String),
    Hook(TransitionHook<T>),
}

impl<T> Clone for CallbackSpec<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Named(name) => Self::Named(name.clone()),
            Self::Hook(hook) => Self::Hook(Arc::clone(hook)),
        }
    }
}

impl<T> fmt::Debug for CallbackSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Hook(_) => f.write_str("Hook(..)"),
        }
    }
}

impl<T> From<&str> for CallbackSpec<T> {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl<T> From<String> for CallbackSpec<T> {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl<'de, T> Deserialize<'de> for CallbackSpec<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Named)
    }
}

/// Where the data of a state comes from.
pub enum DataSpec<T> {
    Static(DataMap),
    Provider(DataProvider<T>),
    /// Name of a data provider registered on the target.
    Method(String),
}

impl<T> Clone for DataSpec<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(map) => Self::Static(map.clone()),
            Self::Provider(provider) => Self::Provider(Arc::clone(provider)),
            Self::Method(name) => Self::Method(name.clone()),
        }
    }
}

impl<T> fmt::Debug for DataSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(map) => f.debug_tuple("Static").field(map).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

impl<'de, T> Deserialize<'de> for DataSpec<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::Static(map)),
            Value::String(name) => Ok(Self::Method(name)),
            other => Err(de::Error::custom(format!(
                "state data must be an object or a provider name, found {other}"
            ))),
        }
    }
}

/// Definition of a single state.
#[derive(Deserialize)]
#[serde(bound = "")]
pub struct StateDefinition<T> {
    /// The first state in table order with this flag is the initial state.
    #[serde(default)]
    pub initial: bool,

    /// Method whose successful invocation implies a transition into this state.
    #[serde(default)]
    pub trigger: Option<String>,

    /// Methods allowed in this state. `None` or empty allows every gated method.
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// States reachable from this one. `None` allows any other state.
    #[serde(default)]
    pub transitions: Option<Vec<String>>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub enter: Vec<CallbackSpec<T>>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub exit: Vec<CallbackSpec<T>>,

    #[serde(default)]
    pub data: Option<DataSpec<T>>,
}

impl<T: Send + Sync + 'static> StateDefinition<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn trigger(mut self, method: impl Into<String>) -> Self {
        self.trigger = Some(method.into());
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn transitions<I, S>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transitions = Some(transitions.into_iter().map(Into::into).collect());
        self
    }

    /// Append an enter callback spec.
    pub fn enter(mut self, spec: impl Into<CallbackSpec<T>>) -> Self {
        self.enter.push(spec.into());
        self
    }

    /// Append an enter callback.
    pub fn enter_fn<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.enter(CallbackSpec::Hook(callback(hook)))
    }

    /// Append an exit callback spec.
    pub fn exit(mut self, spec: impl Into<CallbackSpec<T>>) -> Self {
        self.exit.push(spec.into());
        self
    }

    /// Append an exit callback.
    pub fn exit_fn<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(TransitionInfo<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FsmResult<()>> + Send + 'static,
    {
        self.exit(CallbackSpec::Hook(callback(hook)))
    }

    pub fn data(mut self, data: DataMap) -> Self {
        self.data = Some(DataSpec::Static(data));
        self
    }

    pub fn data_fn<F>(mut self, provider: F) -> Self
    where
        F: Fn(&StateMachine<T>, &str) -> DataMap + Send + Sync + 'static,
    {
        self.data = Some(DataSpec::Provider(Arc::new(provider)));
        self
    }

    /// Resolve data through a provider registered on the target.
    pub fn data_method(mut self, name: impl Into<String>) -> Self {
        self.data = Some(DataSpec::Method(name.into()));
        self
    }
}

impl<T> Default for StateDefinition<T> {
    fn default() -> Self {
        Self {
            initial: false,
            trigger: None,
            methods: None,
            transitions: None,
            enter: Vec::new(),
            exit: Vec::new(),
            data: None,
        }
    }
}

impl<T> Clone for StateDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial,
            trigger: self.trigger.clone(),
            methods: self.methods.clone(),
            transitions: self.transitions.clone(),
            enter: self.enter.clone(),
            exit: self.exit.clone(),
            data: self.data.clone(),
        }
    }
}

impl<T> fmt::Debug for StateDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDefinition")
            .field("initial", &self.initial)
            .field("trigger", &self.trigger)
            .field("methods", &self.methods)
            .field("transitions", &self.transitions)
            .field("enter", &self.enter)
            .field("exit", &self.exit)
            .field("data", &self.data)
            .finish()
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<CallbackSpec<T>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![CallbackSpec::Named(name)],
        OneOrMany::Many(names) => names.into_iter().map(CallbackSpec::Named).collect(),
    })
}

/// Ordered mapping of state names to definitions.
pub struct StateTable<T> {
    entries: Vec<(String, StateDefinition<T>)>,
}

impl<T> StateTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a state. Redefining a name keeps its original position.
    pub fn state(mut self, name: impl Into<String>, definition: StateDefinition<T>) -> Self {
        self.insert(name, definition);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: StateDefinition<T>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = definition,
            None => self.entries.push((name, definition)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StateDefinition<T>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, definition)| definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// State names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateDefinition<T>)> {
        self.entries
            .iter()
            .map(|(name, definition)| (name.as_str(), definition))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<T> Default for StateTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for StateTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> fmt::Debug for StateTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, definition)| (name, definition)))
            .finish()
    }
}

impl<'de, T> Deserialize<'de> for StateTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for TableVisitor<T> {
            type Value = StateTable<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of state names to state definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = StateTable::new();
                while let Some((name, definition)) =
                    access.next_entry::<String, StateDefinition<T>>()?
                {
                    if table.contains(&name) {
                        return Err(de::Error::custom(format!("duplicate state `{name}`")));
                    }
                    table.entries.push((name, definition));
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}
