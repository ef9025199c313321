//! Per-module runtime façade.
//!
//! Compiled code calls these operations through the injected module alias:
//! `export`, `exportDefault`, `import`, `importSync`, `run`, `runSetters` and
//! `watch`. Everything here is single-threaded and re-entrant; a setter may
//! trigger further propagation while an outer round is still in progress.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::entry::{Entry, Getter, Getters, Setter, Setters, WILDCARD};
use crate::error::RuntimeError;
use crate::value::{Namespace, Value};

/// Host services the runtime relies on: resolving a specifier relative to the
/// requesting module, and synchronously loading and evaluating a module.
///
/// `require` returns the loaded module's exports namespace. A module that is
/// already loading (a cycle) returns its current, partially filled namespace.
pub trait ModuleHost {
    fn resolve_path(&self, specifier: &str, from: &Module) -> Result<String, RuntimeError>;
    fn require(&self, resolved: &str, from: &Module) -> Result<Namespace, RuntimeError>;
}

pub(crate) struct ModuleRecord {
    id: String,
    exports: RefCell<Namespace>,
    loaded: Cell<bool>,
    host: OnceCell<Rc<dyn ModuleHost>>,
}

/// A host module record. Cloning shares the record.
#[derive(Clone)]
pub struct Module(Rc<ModuleRecord>);

/// Install the façade on `module`. Returns `false` if it was already enabled,
/// in which case the existing host is kept.
pub fn enable(module: &Module, host: Rc<dyn ModuleHost>) -> bool {
    if module.0.host.set(host).is_err() {
        return false;
    }
    tracing::debug!(module = module.id(), "live bindings enabled");
    true
}

impl Module {
    pub fn new(id: impl Into<String>) -> Self {
        Module(Rc::new(ModuleRecord {
            id: id.into(),
            exports: RefCell::new(Namespace::new()),
            loaded: Cell::new(false),
            host: OnceCell::new(),
        }))
    }

    pub(crate) fn from_record(record: Rc<ModuleRecord>) -> Self {
        Module(record)
    }

    pub(crate) fn downgrade(&self) -> Weak<ModuleRecord> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn record_ptr(&self) -> *const ModuleRecord {
        Rc::as_ptr(&self.0)
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn exports(&self) -> Namespace {
        self.0.exports.borrow().clone()
    }

    /// Point this record at another namespace object, as a re-exporting
    /// bridge module does with the module it forwards.
    pub fn set_exports(&self, exports: Namespace) {
        *self.0.exports.borrow_mut() = exports;
    }

    pub fn is_loaded(&self) -> bool {
        self.0.loaded.get()
    }

    /// Host-side load flag, set once evaluation of the module body finished.
    pub fn set_loaded(&self, loaded: bool) {
        self.0.loaded.set(loaded);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.host.get().is_some()
    }

    pub fn ptr_eq(&self, other: &Module) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn host(&self) -> Result<Rc<dyn ModuleHost>, RuntimeError> {
        self.0
            .host
            .get()
            .cloned()
            .ok_or_else(|| RuntimeError::NotEnabled(self.id().to_string()))
    }

    /// Flag the exports as module-shaped and make sure their entry exists,
    /// owned by this record unless another record got there first.
    fn claim_exports(&self) -> Rc<Entry> {
        let exports = self.exports();
        exports.mark_es_module();
        Entry::get_or_create(&exports, Some(self))
    }

    fn require(&self, specifier: &str) -> Result<Namespace, RuntimeError> {
        let host = self.host()?;
        let resolved = host.resolve_path(specifier, self)?;
        tracing::trace!(module = self.id(), specifier, resolved = resolved.as_str(), "require");
        host.require(&resolved, self)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register providers for exported names. If the module already finished
    /// loading, importers are refreshed immediately.
    pub fn export(&self, getters: Getters, constant: bool) -> Result<(), RuntimeError> {
        let entry = self.claim_exports();
        entry.add_getters(getters, constant);
        if self.is_loaded() {
            entry.run_setters()?;
        }
        Ok(())
    }

    pub fn export_default(&self, value: impl Into<Value>) -> Result<(), RuntimeError> {
        let mut getters = Getters::new();
        getters.insert("default".to_string(), Getter::value(value));
        self.export(getters, true)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IMPORTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Subscribe to `exported`. `None` registers nothing.
    pub fn watch(
        &self,
        exported: &Namespace,
        setters: Option<Setters>,
        key: Option<&str>,
        namespaces: Vec<Namespace>,
    ) {
        self.claim_exports();
        if let Some(setters) = setters {
            Entry::get_or_create(exported, None).add_setters(self, setters, key, namespaces);
        }
    }

    /// Load `specifier` now, subscribe `setters` to it, and deliver its
    /// current values before returning.
    pub fn import_sync(
        &self,
        specifier: &str,
        setters: Option<Setters>,
        key: Option<&str>,
        namespaces: Vec<Namespace>,
    ) -> Result<(), RuntimeError> {
        let exported = self.require(specifier)?;
        self.watch(&exported, setters, key, namespaces);
        if let Some(entry) = Entry::get(&exported) {
            entry.run_setters()?;
        }
        Ok(())
    }

    /// Dynamic import. The returned future never completes on its first poll,
    /// so loading is always deferred past the current synchronous turn.
    pub fn import(&self, specifier: impl Into<String>) -> DynamicImport {
        DynamicImport {
            module: self.clone(),
            specifier: specifier.into(),
            deferred: false,
        }
    }

    fn import_namespace(&self, specifier: &str) -> Result<Namespace, RuntimeError> {
        let exported = self.require(specifier)?;
        let namespace = Namespace::new();
        namespace.mark_es_module();

        let mut setters = Setters::new();
        setters.insert(WILDCARD.to_string(), Setter::copy_into(&namespace));
        self.watch(&exported, Some(setters), None, vec![namespace.clone()]);

        if let Some(entry) = Entry::get(&exported) {
            entry.run_setters()?;
        }
        Ok(namespace)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Evaluate a module body. On success the record is marked loaded and
    /// importers are refreshed; an error leaves it unloaded.
    pub fn run<F>(&self, body: F) -> Result<(), RuntimeError>
    where
        F: FnOnce() -> Result<(), RuntimeError>,
    {
        self.claim_exports();
        body()?;
        self.set_loaded(true);
        self.run_setters(())
    }

    /// Propagate this module's current values to its importers and hand
    /// `value` back unchanged.
    ///
    /// Only the record that owns the exports namespace may mark it loaded, so
    /// a bridge sharing the namespace cannot flip the owner's state early.
    pub fn run_setters<T>(&self, value: T) -> Result<T, RuntimeError> {
        let exports = self.exports();
        if let Some(entry) = Entry::get(&exports) {
            entry.run_setters()?;
        }
        if self.is_loaded() {
            let entry = Entry::get_or_create(&exports, Some(self));
            if entry.is_owned_by(self) {
                entry.on_loaded();
            }
        }
        Ok(value)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.0.id)
            .field("loaded", &self.0.loaded.get())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Future returned by [`Module::import`].
#[must_use = "futures do nothing unless polled"]
pub struct DynamicImport {
    module: Module,
    specifier: String,
    deferred: bool,
}

impl Future for DynamicImport {
    type Output = Result<Namespace, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.deferred {
            self.deferred = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        Poll::Ready(self.module.import_namespace(&self.specifier))
    }
}

impl fmt::Debug for DynamicImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicImport")
            .field("module", &self.module.id())
            .field("specifier", &self.specifier)
            .finish()
    }
}
