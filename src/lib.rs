//! # Live Bindings
//!
//! Static, live-binding module semantics on top of a host whose own module
//! loader is synchronous and copies values.
//!
//! ## Compiler
//!
//! [`compile`] rewrites `import`/`export` declarations into calls on an
//! injected module reference (`module` unless that name is taken):
//!
//! - `import { a } from "./a"` becomes a hoisted `module.importSync("./a", { a(v) { a = v } }, key)`.
//! - `export let count = 0` keeps its declaration and registers a getter
//!   through a hoisted `module.export({ count: () => count })`.
//! - Every write to an exported local is wrapped as `module.runSetters(count++)`.
//! - `import(x)` becomes `module.import(x)`.
//!
//! Everything else in the source is left byte-for-byte intact, and every
//! untouched statement stays on its original line.
//!
//! ## Runtime
//!
//! [`Module`] is the façade the generated calls target. Exported values live
//! in a [`Namespace`]; each namespace carries one [`Entry`] ledger recording
//! who exports what and who is listening, so that a reassignment in one module
//! reaches every importer, including across import cycles.

mod assignment;
mod compiler;
mod edit;
mod entry;
mod error;
mod import_export;
mod options;
mod runtime;
mod scope;
mod value;

#[cfg(test)]
mod compiler_tests;

#[cfg(feature = "napi")]
pub use compiler::compile_native;
pub use compiler::{compile, compile_batch, has_module_syntax, make_unique_id};
pub use edit::EditBuffer;
pub use entry::{Entry, Getter, Getters, Setter, Setters, WILDCARD};
pub use error::{CompileError, RuntimeError};
pub use options::{CompileOptions, CompileOutput, SourceKind};
pub use runtime::{enable, DynamicImport, Module, ModuleHost};
pub use value::{Binding, Namespace, Value};
