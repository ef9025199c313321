//! Live-binding ledger.
//!
//! One `Entry` exists per namespace object, attached to the object itself, so
//! every module record sharing that object (re-export bridges) shares the same
//! getters, setters and load state. An entry is created lazily and dropped with
//! its namespace.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::RuntimeError;
use crate::runtime::{Module, ModuleRecord};
use crate::value::{Binding, Namespace, NamespaceData, Value};

/// Setter name that receives every exported name.
pub const WILDCARD: &str = "*";

/// Provider of an exported binding's current value.
///
/// A provider yields `None` while its binding is uninitialized; such a name is
/// skipped for that propagation round. Errors propagate to whoever triggered
/// the round.
#[derive(Clone)]
pub struct Getter(Rc<dyn Fn() -> Result<Option<Value>, RuntimeError>>);

impl Getter {
    pub fn new<F>(provider: F) -> Self
    where
        F: Fn() -> Result<Value, RuntimeError> + 'static,
    {
        Getter(Rc::new(move || provider().map(Some)))
    }

    /// A provider that always returns `value`.
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        Getter(Rc::new(move || Ok(Some(value.clone()))))
    }

    /// A provider reading the current content of a local binding.
    pub fn binding(binding: &Binding) -> Self {
        let binding = binding.clone();
        Getter(Rc::new(move || Ok(binding.get())))
    }

    fn read(&self) -> Result<Option<Value>, RuntimeError> {
        (self.0)()
    }

    fn ptr_eq(&self, other: &Getter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter")
    }
}

/// Consumer callback invoked with `(value, exported name)`.
#[derive(Clone)]
pub struct Setter(Rc<dyn Fn(&Value, &str)>);

impl Setter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value, &str) + 'static,
    {
        Setter(Rc::new(callback))
    }

    /// A callback that writes every value it receives into `binding`.
    pub fn assign(binding: &Binding) -> Self {
        let binding = binding.clone();
        Setter::new(move |value, _| binding.set(value.clone()))
    }

    /// A callback that copies each received name into `target`.
    pub fn copy_into(target: &Namespace) -> Self {
        let target = target.clone();
        Setter::new(move |value, name| target.set(name, value.clone()))
    }

    fn call(&self, value: &Value, name: &str) {
        (self.0)(value, name)
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Setter")
    }
}

pub type Getters = IndexMap<String, Getter>;
pub type Setters = IndexMap<String, Setter>;

#[derive(Clone)]
struct GetterSlot {
    getter: Getter,
    constant: bool,
    cached: Option<Value>,
}

struct SetterBatch {
    /// Replace-key, already scoped by the consumer's id.
    key: Option<String>,
    consumer: Weak<ModuleRecord>,
    setters: Setters,
    namespaces: Vec<Namespace>,
    active: Cell<bool>,
    /// Last value delivered per `(setter name, exported name)`.
    seen: RefCell<HashMap<(String, String), Value>>,
    /// Names this batch wrote into its namespaces.
    written: RefCell<HashSet<String>>,
}

impl SetterBatch {
    fn deliver(&self, name: &str, value: &Value) {
        let specific = self.setters.get(name);
        let wildcard = if name == WILDCARD {
            None
        } else {
            self.setters.get(WILDCARD)
        };
        if specific.is_none() && wildcard.is_none() {
            return;
        }

        if !self.namespaces.is_empty() {
            for ns in &self.namespaces {
                ns.set(name, value.clone());
            }
            self.written.borrow_mut().insert(name.to_string());
        }

        for (slot, setter) in [(name, specific), (WILDCARD, wildcard)] {
            let Some(setter) = setter else {
                continue;
            };
            // A callback may have replaced this very batch.
            if !self.active.get() {
                return;
            }
            if self.mark_seen(slot, name, value) {
                setter.call(value, name);
            }
        }
    }

    fn mark_seen(&self, slot: &str, name: &str, value: &Value) -> bool {
        let mut seen = self.seen.borrow_mut();
        let key = (slot.to_string(), name.to_string());
        match seen.get(&key) {
            Some(previous) if previous.same_value(value) => false,
            _ => {
                seen.insert(key, value.clone());
                true
            }
        }
    }

    fn revert(&self) {
        self.active.set(false);
        for name in self.written.borrow().iter() {
            for ns in &self.namespaces {
                ns.remove(name);
            }
        }
    }
}

pub struct Entry {
    namespace: Weak<NamespaceData>,
    owner: RefCell<Option<Weak<ModuleRecord>>>,
    loaded: Cell<bool>,
    getters: RefCell<IndexMap<String, GetterSlot>>,
    setters: RefCell<Vec<Rc<SetterBatch>>>,
}

impl Entry {
    pub fn get(namespace: &Namespace) -> Option<Rc<Entry>> {
        namespace.0.entry.get().cloned()
    }

    /// Return the entry for `namespace`, creating it on first use. `owner`
    /// is recorded only if the entry has none yet.
    pub fn get_or_create(namespace: &Namespace, owner: Option<&Module>) -> Rc<Entry> {
        let entry = namespace
            .0
            .entry
            .get_or_init(|| {
                tracing::trace!(owner = owner.map(Module::id), "creating ledger entry");
                Rc::new(Entry {
                    namespace: Rc::downgrade(&namespace.0),
                    owner: RefCell::new(None),
                    loaded: Cell::new(false),
                    getters: RefCell::new(IndexMap::new()),
                    setters: RefCell::new(Vec::new()),
                })
            })
            .clone();

        if let Some(owner) = owner {
            let mut slot = entry.owner.borrow_mut();
            if slot.as_ref().and_then(Weak::upgrade).is_none() {
                *slot = Some(owner.downgrade());
            }
        }
        entry
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.namespace.upgrade().map(Namespace)
    }

    pub fn owner(&self) -> Option<Module> {
        self.owner
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Module::from_record)
    }

    pub fn is_owned_by(&self, module: &Module) -> bool {
        self.owner
            .borrow()
            .as_ref()
            .is_some_and(|owner| std::ptr::eq(owner.as_ptr(), module.record_ptr()))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Mark the namespace fully evaluated. Callers check ownership first.
    pub fn on_loaded(&self) {
        self.loaded.set(true);
    }

    /// Merge providers into the getter table. A replaced provider loses its
    /// cached value.
    pub fn add_getters(&self, getters: Getters, constant: bool) {
        let mut table = self.getters.borrow_mut();
        for (name, getter) in getters {
            table.insert(
                name,
                GetterSlot {
                    getter,
                    constant,
                    cached: None,
                },
            );
        }
    }

    /// Register a setter batch for `consumer`. A batch registered earlier by
    /// the same consumer under the same `key` is removed first, together with
    /// every name it wrote into its namespaces.
    pub fn add_setters(
        &self,
        consumer: &Module,
        setters: Setters,
        key: Option<&str>,
        namespaces: Vec<Namespace>,
    ) {
        let key = key.map(|key| format!("{}:{}", consumer.id(), key));
        let mut batches = self.setters.borrow_mut();

        if let Some(key) = &key {
            batches.retain(|batch| {
                if batch.key.as_deref() == Some(key.as_str()) {
                    tracing::trace!(key = key.as_str(), "replacing setters registered under key");
                    batch.revert();
                    false
                } else {
                    true
                }
            });
        }

        batches.push(Rc::new(SetterBatch {
            key,
            consumer: consumer.downgrade(),
            setters,
            namespaces,
            active: Cell::new(true),
            seen: RefCell::new(HashMap::new()),
            written: RefCell::new(HashSet::new()),
        }));
    }

    pub fn setter_batch_count(&self) -> usize {
        self.setters.borrow().len()
    }

    /// Records that currently hold setters on this entry, in registration order.
    pub fn consumers(&self) -> Vec<Module> {
        self.setters
            .borrow()
            .iter()
            .filter_map(|batch| batch.consumer.upgrade())
            .map(Module::from_record)
            .collect()
    }

    /// Current value of every available exported name.
    ///
    /// Non-constant providers run every time; constant ones run until they
    /// first yield a value, which is then cached. A namespace that never
    /// opted into module semantics is observed as a single `default` binding.
    pub fn run_getters(&self) -> Result<Vec<(String, Value)>, RuntimeError> {
        let Some(namespace) = self.namespace() else {
            return Ok(Vec::new());
        };

        let slots: Vec<(String, GetterSlot)> = self
            .getters
            .borrow()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect();

        if slots.is_empty() && !namespace.is_es_module() {
            return Ok(vec![("default".to_string(), Value::Namespace(namespace))]);
        }

        let mut values = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            let value = match slot.cached {
                Some(cached) if slot.constant => cached,
                _ => match slot.getter.read()? {
                    Some(value) => value,
                    None => continue,
                },
            };
            if slot.constant {
                self.cache(&name, &slot.getter, &value);
            }
            namespace.set(&name, value.clone());
            values.push((name, value));
        }
        Ok(values)
    }

    fn cache(&self, name: &str, getter: &Getter, value: &Value) {
        let mut table = self.getters.borrow_mut();
        if let Some(slot) = table.get_mut(name) {
            if slot.getter.ptr_eq(getter) && slot.cached.is_none() {
                slot.cached = Some(value.clone());
            }
        }
    }

    /// Refresh every binding, then hand each changed value to every matching
    /// setter. Provider errors abort the round before any setter runs.
    pub fn run_setters(&self) -> Result<(), RuntimeError> {
        let values = self.run_getters()?;
        let batches: Vec<Rc<SetterBatch>> = self.setters.borrow().clone();

        for batch in batches {
            for (name, value) in &values {
                if !batch.active.get() {
                    break;
                }
                batch.deliver(name, value);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("owner", &self.owner().map(|m| m.id().to_string()))
            .field("loaded", &self.loaded.get())
            .field("getters", &self.getters.borrow().keys().collect::<Vec<_>>())
            .field("setter_batches", &self.setters.borrow().len())
            .finish()
    }
}
