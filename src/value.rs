//! Values flowing through the live-binding ledger.

use indexmap::IndexMap;
use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::entry::Entry;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Namespace(Namespace),
    /// Any other host value (functions, class instances, plain objects).
    /// Compared by identity.
    Object(Rc<dyn Any>),
}

impl Value {
    /// Wrap a host value as a new object.
    pub fn object<T: Any>(value: T) -> Self {
        Value::Object(Rc::new(value))
    }

    /// `Object.is` semantics: NaN equals itself, `+0` and `-0` differ,
    /// namespaces and objects compare by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Value::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub fn as_object<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, seen: &mut HashSet<*const NamespaceData>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Namespace(ns) => ns.to_json_inner(seen),
            Value::Object(_) => serde_json::Value::String("[Object]".to_string()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Namespace(ns) => fmt::Debug::fmt(ns, f),
            Value::Object(_) => f.write_str("[Object]"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<dyn Any>> for Value {
    fn from(object: Rc<dyn Any>) -> Self {
        Value::Object(object)
    }
}

impl From<Namespace> for Value {
    fn from(ns: Namespace) -> Self {
        Value::Namespace(ns)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAMESPACE OBJECTS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) struct NamespaceData {
    bindings: RefCell<IndexMap<String, Value>>,
    es_module: Cell<bool>,
    /// Ledger record for this object. Lives and dies with the namespace.
    pub(crate) entry: OnceCell<Rc<Entry>>,
}

/// The mutable container that exposes a module's exports to importers.
///
/// Cloning shares the same object; identity is what the ledger keys on.
#[derive(Clone)]
pub struct Namespace(pub(crate) Rc<NamespaceData>);

impl Namespace {
    pub fn new() -> Self {
        Namespace(Rc::new(NamespaceData {
            bindings: RefCell::new(IndexMap::new()),
            es_module: Cell::new(false),
            entry: OnceCell::new(),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.0.bindings.borrow_mut().insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow_mut().shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.bindings.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.bindings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.bindings.borrow().is_empty()
    }

    /// True once the object follows module export semantics rather than
    /// being a plain exported value.
    pub fn is_es_module(&self) -> bool {
        self.0.es_module.get()
    }

    pub fn mark_es_module(&self) {
        self.0.es_module.set(true);
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, seen: &mut HashSet<*const NamespaceData>) -> serde_json::Value {
        let ptr = Rc::as_ptr(&self.0);
        if !seen.insert(ptr) {
            return serde_json::Value::String("[Circular]".to_string());
        }
        let snapshot: Vec<(String, Value)> = self
            .0
            .bindings
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut map = serde_json::Map::new();
        for (name, value) in snapshot {
            map.insert(name, value.to_json_inner(seen));
        }
        seen.remove(&ptr);
        serde_json::Value::Object(map)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("es_module", &self.is_es_module())
            .field("names", &self.names())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCAL BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// A module-local variable slot. `None` models a binding still in its
/// temporal dead zone.
#[derive(Clone, Default)]
pub struct Binding(Rc<RefCell<Option<Value>>>);

impl Binding {
    pub fn uninit() -> Self {
        Binding::default()
    }

    pub fn with(value: impl Into<Value>) -> Self {
        Binding(Rc::new(RefCell::new(Some(value.into()))))
    }

    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = Some(value.into());
    }

    pub fn is_initialized(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => write!(f, "Binding({value:?})"),
            None => f.write_str("Binding(<uninitialized>)"),
        }
    }
}
