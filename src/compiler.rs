//! Compiler entry points.
//!
//! `compile` rewrites module syntax into calls against the runtime façade and
//! leaves every other byte of the input alone.

use lazy_static::lazy_static;
#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use rayon::prelude::*;
use regex::Regex;
use std::borrow::Cow;

use crate::assignment::AssignmentVisitor;
use crate::error::CompileError;
use crate::import_export::ImportExportVisitor;
use crate::options::{CompileOptions, CompileOutput, SourceKind};

lazy_static! {
    /// `import`/`export` keywords not preceded by a `.`, so already-compiled
    /// `module.import(...)`/`module.export(...)` calls never match.
    static ref MODULE_SYNTAX_RE: Regex = Regex::new(r"(?:^|[^.])\b(?:im|ex)port\b").unwrap();
    static ref SHEBANG_RE: Regex = Regex::new(r"^#!.*").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"[0-9A-Za-z_$]+").unwrap();
}

/// Cheap textual check for module syntax. May report false positives for
/// keywords inside strings or comments; never reports false negatives.
pub fn has_module_syntax(code: &str) -> bool {
    MODULE_SYNTAX_RE.is_match(code)
}

/// Return `id`, or `id` followed by one more than the largest numeric suffix
/// already used with that prefix anywhere in `code`.
///
/// Suffixes are compared and incremented as digit strings, so arbitrarily
/// long suffixes never overflow.
pub fn make_unique_id(id: &str, code: &str) -> String {
    let highest = WORD_RE
        .find_iter(code)
        .filter_map(|word| word.as_str().strip_prefix(id))
        .filter(|suffix| suffix.bytes().all(|b| b.is_ascii_digit()))
        .map(|suffix| {
            let digits = suffix.trim_start_matches('0');
            if digits.is_empty() {
                "0"
            } else {
                digits
            }
        })
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    match highest {
        Some(n) => format!("{}{}", id, increment_digits(n)),
        None => id.to_string(),
    }
}

/// Add one to a non-empty string of ASCII digits.
fn increment_digits(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for byte in out.iter_mut().rev() {
        if *byte == b'9' {
            *byte = b'0';
        } else {
            *byte += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    out.insert(0, b'1');
    String::from_utf8_lossy(&out).into_owned()
}

fn strip_shebang(code: &str) -> Cow<'_, str> {
    if code.starts_with('#') {
        SHEBANG_RE.replace(code, "")
    } else {
        Cow::Borrowed(code)
    }
}

pub fn compile(code: &str, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    options.validate()?;
    let code = strip_shebang(code);
    let code: &str = &code;

    let wants_module = match options.source_type {
        SourceKind::Script => false,
        SourceKind::Module => true,
        SourceKind::Unambiguous => has_module_syntax(code),
    };

    let script = || CompileOutput {
        code: code.to_string(),
        source_type: SourceKind::Script,
    };

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, options.parser_source_type(wants_module)).parse();
    if !ret.errors.is_empty() || ret.panicked {
        if wants_module && options.source_type == SourceKind::Unambiguous {
            let fallback = Allocator::default();
            let script_ret = Parser::new(&fallback, code, options.parser_source_type(false)).parse();
            if script_ret.errors.is_empty() && !script_ret.panicked {
                tracing::trace!("module parse failed but script parse succeeded");
                return Ok(script());
            }
        }
        let messages = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(CompileError::Parse(messages));
    }

    if !wants_module {
        tracing::trace!("no module syntax, leaving source unchanged");
        return Ok(script());
    }

    let alias = make_unique_id(&options.module_alias, code);
    let mut visitor = ImportExportVisitor::new(code, alias.as_str());
    visitor.visit_program(&ret.program);

    if visitor.made_changes {
        {
            let ImportExportVisitor {
                exported_local_names,
                buffer,
                ..
            } = &mut visitor;
            let mut assignments = AssignmentVisitor::new(exported_local_names, &alias, buffer);
            assignments.visit_program(&ret.program);
        }
        visitor.finalize_hoisting();
    }

    let source_type = if visitor.made_changes || options.source_type != SourceKind::Unambiguous {
        SourceKind::Module
    } else {
        SourceKind::Script
    };

    tracing::debug!(
        alias = alias.as_str(),
        edits = visitor.buffer.len(),
        exported = visitor.exported_local_names.len(),
        "compiled module"
    );

    Ok(CompileOutput {
        code: visitor.buffer.to_string(),
        source_type,
    })
}

/// Compile independent sources in parallel. Results keep input order.
pub fn compile_batch(
    sources: &[String],
    options: &CompileOptions,
) -> Vec<Result<CompileOutput, CompileError>> {
    sources
        .par_iter()
        .map(|code| compile(code, options))
        .collect()
}

#[cfg(feature = "napi")]
#[napi(js_name = "compileNative")]
pub fn compile_native(
    code: String,
    options: Option<serde_json::Value>,
) -> napi::Result<serde_json::Value> {
    let options = CompileOptions::from_json(options.unwrap_or(serde_json::Value::Null))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let output = compile(&code, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
