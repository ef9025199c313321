//! Compiler options and output contract.

use oxc_span::SourceType;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::import_export::is_identifier;

/// Module goal of a source text.
///
/// `Unambiguous` is only meaningful as input: the compiler decides between
/// `Script` and `Module` by looking at the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Script,
    Module,
    #[default]
    Unambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub source_type: SourceKind,
    /// Preferred identifier for the injected module reference. The compiler
    /// appends a numeric suffix when the source already uses this name.
    pub module_alias: String,
    pub jsx: bool,
    pub typescript: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            source_type: SourceKind::Unambiguous,
            module_alias: "module".to_string(),
            jsx: false,
            typescript: false,
        }
    }
}

impl CompileOptions {
    /// Resolve options from a loosely-typed JSON object; missing keys take defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CompileError> {
        if value.is_null() {
            return Ok(CompileOptions::default());
        }
        let options: CompileOptions = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    /// The alias is spliced into generated code verbatim, so it must be an
    /// identifier.
    pub fn validate(&self) -> Result<(), CompileError> {
        if !is_identifier(&self.module_alias) {
            return Err(CompileError::InvalidAlias(self.module_alias.clone()));
        }
        Ok(())
    }

    pub fn with_source_type(mut self, source_type: SourceKind) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_module_alias(mut self, alias: impl Into<String>) -> Self {
        self.module_alias = alias.into();
        self
    }

    pub(crate) fn parser_source_type(&self, module: bool) -> SourceType {
        SourceType::default()
            .with_module(module)
            .with_jsx(self.jsx)
            .with_typescript(self.typescript)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub code: String,
    /// Either `Script` or `Module`; never `Unambiguous`.
    pub source_type: SourceKind,
}
