//! Import/export rewrite pass.
//!
//! Removes every module declaration from the source text and records what it
//! registered. Once the whole program has been visited, `finalize_hoisting`
//! emits the corresponding runtime calls as a single line at the top of the
//! module (after any directive prologue), so static imports run before every
//! other statement and untouched code keeps its line numbers.

use lazy_static::lazy_static;
use oxc_ast::ast::{
    Declaration, ExportAllDeclaration, ExportDefaultDeclaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, ImportDeclaration, ImportDeclarationSpecifier, ImportExpression,
    ModuleExportName, Program, Statement, TSModuleDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::compiler::make_unique_id;
use crate::edit::EditBuffer;
use crate::scope::declaration_names;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][0-9A-Za-z_$]*$").unwrap();
}

fn module_export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Render `name` as an object-literal key, quoting it when it is not a plain identifier.
fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        string_literal(name)
    }
}

fn string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// First of `base`, `base_`, `base__`, ... that is not in `taken`.
fn fresh_name(base: &str, taken: &[&str]) -> String {
    let mut name = base.to_string();
    while taken.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

#[derive(Debug, Clone)]
enum HoistedKind {
    /// `import ... from "source"`. `specifiers` pairs imported names with
    /// locals; `namespaces` holds `* as ns` locals.
    Bindings {
        specifiers: Vec<(String, String)>,
        namespaces: Vec<String>,
    },
    /// `export { local as exported } from "source"`.
    ReExport(Vec<(String, String)>),
    /// `export * from "source"`.
    ReExportAll,
    /// `export * as exported from "source"`.
    ReExportNamespace(String),
}

#[derive(Debug, Clone)]
struct HoistedImport {
    position: u32,
    source: String,
    kind: HoistedKind,
}

pub struct ImportExportVisitor<'s> {
    alias: String,
    pub buffer: EditBuffer<'s>,
    pub made_changes: bool,
    /// Every local binding that is exported, directly or through `export { local }`.
    pub exported_local_names: HashSet<String>,
    /// Top-level `const` bindings; their exports are registered as constant.
    constant_locals: HashSet<String>,
    exports: Vec<(String, String)>,
    hoisted: Vec<HoistedImport>,
    hoist_at: u32,
    needs_separator: bool,
    finalized: bool,
    /// Depth of `namespace` bodies being visited. Their `export`s are
    /// namespace members, not module exports.
    namespace_depth: u32,
}

impl<'s> ImportExportVisitor<'s> {
    pub fn new(source: &'s str, alias: impl Into<String>) -> Self {
        ImportExportVisitor {
            alias: alias.into(),
            buffer: EditBuffer::new(source),
            made_changes: false,
            exported_local_names: HashSet::new(),
            constant_locals: HashSet::new(),
            exports: Vec::new(),
            hoisted: Vec::new(),
            hoist_at: 0,
            needs_separator: false,
            finalized: false,
            namespace_depth: 0,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    fn add_export(&mut self, exported: String, local: String) {
        self.exported_local_names.insert(local.clone());
        self.exports.push((exported, local));
    }

    /// Local name given to an anonymous default function or class.
    fn default_local(&self) -> String {
        make_unique_id(&format!("{}Default", self.alias), self.buffer.source())
    }

    /// Text that names an anonymous declaration when inserted at `pos`.
    fn name_insertion(&self, pos: u32, name: &str) -> String {
        let before = self.buffer.source()[..pos as usize].chars().next_back();
        if before.is_some_and(char::is_whitespace) {
            name.to_string()
        } else {
            format!(" {}", name)
        }
    }

    fn hoist(&mut self, position: u32, source: String, kind: HoistedKind) {
        self.hoisted.push(HoistedImport {
            position,
            source,
            kind,
        });
    }

    fn scan_constant_locals(&mut self, program: &Program) {
        for stmt in &program.body {
            let decl = match stmt {
                Statement::VariableDeclaration(decl) => decl,
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(Declaration::VariableDeclaration(decl)) => decl,
                    _ => continue,
                },
                _ => continue,
            };
            if decl.kind != VariableDeclarationKind::Var && decl.kind != VariableDeclarationKind::Let {
                for declarator in &decl.declarations {
                    let mut names = Vec::new();
                    crate::scope::collect_binding_pattern(&declarator.id, &mut names);
                    self.constant_locals.extend(names);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HOISTING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Emit every registration recorded during the pass. Runs once, after the
    /// whole program was visited and the assignment pass has seen the final
    /// set of exported locals.
    pub fn finalize_hoisting(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let code = self.hoisted_code();
        if code.is_empty() {
            return;
        }
        let code = if self.needs_separator {
            format!(";{}", code)
        } else {
            code
        };
        tracing::trace!(
            exports = self.exports.len(),
            imports = self.hoisted.len(),
            "hoisting module registrations"
        );
        self.buffer.prepend(self.hoist_at, code);
    }

    fn hoisted_code(&self) -> String {
        let alias = self.alias.as_str();
        let mut out = String::new();

        let (constant, live): (Vec<_>, Vec<_>) = self
            .exports
            .iter()
            .partition(|(_, local)| self.constant_locals.contains(local));
        if !live.is_empty() {
            let _ = write!(out, "{}.export({{{}}});", alias, getter_list(&live));
        }
        if !constant.is_empty() {
            let _ = write!(out, "{}.export({{{}}},true);", alias, getter_list(&constant));
        }

        let mut import_locals = Vec::new();
        let mut namespace_locals = Vec::new();
        for item in &self.hoisted {
            if let HoistedKind::Bindings {
                specifiers,
                namespaces,
            } = &item.kind
            {
                for (_, local) in specifiers {
                    if !import_locals.contains(local) {
                        import_locals.push(local.clone());
                    }
                }
                namespace_locals.extend(namespaces.iter().cloned());
            }
        }
        if !import_locals.is_empty() {
            let _ = write!(out, "let {};", import_locals.join(","));
        }
        for ns in &namespace_locals {
            let _ = write!(out, "const {}=Object.create(null);", ns);
        }

        let mut ordered: Vec<&HoistedImport> = self.hoisted.iter().collect();
        ordered.sort_by_key(|item| item.position);
        for item in ordered {
            out.push_str(&self.import_call(item));
        }
        out
    }

    fn import_call(&self, item: &HoistedImport) -> String {
        let alias = self.alias.as_str();
        let source = string_literal(&item.source);
        let position = item.position;

        match &item.kind {
            HoistedKind::Bindings {
                specifiers,
                namespaces,
            } => {
                if specifiers.is_empty() && namespaces.is_empty() {
                    return format!("{}.importSync({});", alias, source);
                }

                let mut taken: Vec<&str> = specifiers.iter().map(|(_, l)| l.as_str()).collect();
                taken.extend(namespaces.iter().map(String::as_str));
                taken.push(alias);
                let value = fresh_name("v", &taken);
                let name = fresh_name("n", &taken);

                let mut setters = Vec::new();
                for (imported, locals) in group_by_first(specifiers) {
                    let body: Vec<String> = locals
                        .iter()
                        .map(|local| {
                            if self.exported_local_names.contains(*local) {
                                format!("{}.runSetters({}={})", alias, local, value)
                            } else {
                                format!("{}={}", local, value)
                            }
                        })
                        .collect();
                    setters.push(format!(
                        "{}({}){{{}}}",
                        property_key(imported),
                        value,
                        body.join(";")
                    ));
                }
                if !namespaces.is_empty() {
                    let body: Vec<String> = namespaces
                        .iter()
                        .map(|ns| format!("{}[{}]={}", ns, name, value))
                        .collect();
                    setters.push(format!("\"*\"({},{}){{{}}}", value, name, body.join(";")));
                }

                let mut call = format!(
                    "{}.importSync({},{{{}}},{}",
                    alias,
                    source,
                    setters.join(","),
                    position
                );
                if !namespaces.is_empty() {
                    let _ = write!(call, ",[{}]", namespaces.join(","));
                }
                call.push_str(");");
                call
            }
            HoistedKind::ReExport(specifiers) => {
                let value = fresh_name("v", &[alias]);
                let setters: Vec<String> = group_by_first(specifiers)
                    .into_iter()
                    .map(|(local, exported)| {
                        let getters: Vec<String> = exported
                            .iter()
                            .map(|name| format!("{}:()=>{}", property_key(name), value))
                            .collect();
                        format!(
                            "{}({}){{{}.export({{{}}},true)}}",
                            property_key(local),
                            value,
                            alias,
                            getters.join(",")
                        )
                    })
                    .collect();
                format!(
                    "{}.importSync({},{{{}}},{});",
                    alias,
                    source,
                    setters.join(","),
                    position
                )
            }
            HoistedKind::ReExportAll => {
                let value = fresh_name("v", &[alias]);
                let name = fresh_name("n", &[alias]);
                format!(
                    "{a}.importSync({s},{{\"*\"({v},{n}){{{n}!==\"default\"&&{a}.export({{[{n}]:()=>{v}}},true)}}}},{p});",
                    a = alias,
                    s = source,
                    v = value,
                    n = name,
                    p = position
                )
            }
            HoistedKind::ReExportNamespace(exported) => {
                let object = fresh_name("o", &[alias]);
                let value = fresh_name("v", &[alias, object.as_str()]);
                let name = fresh_name("n", &[alias, object.as_str()]);
                format!(
                    "({o}=>{{{a}.export({{{k}:()=>{o}}},true);{a}.importSync({s},{{\"*\"({v},{n}){{{o}[{n}]={v}}}}},{p},[{o}])}})(Object.create(null));",
                    o = object,
                    a = alias,
                    k = property_key(exported),
                    s = source,
                    v = value,
                    n = name,
                    p = position
                )
            }
        }
    }
}

fn getter_list(exports: &[&(String, String)]) -> String {
    exports
        .iter()
        .map(|(exported, local)| format!("{}:()=>{}", property_key(exported), local))
        .collect::<Vec<_>>()
        .join(",")
}

/// Group pairs by their first element, keeping first-seen order.
fn group_by_first(pairs: &[(String, String)]) -> Vec<(&str, Vec<&str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (key, value) in pairs {
        match groups.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some((_, values)) => values.push(value.as_str()),
            None => groups.push((key.as_str(), vec![value.as_str()])),
        }
    }
    groups
}

impl<'a, 's> Visit<'a> for ImportExportVisitor<'s> {
    fn visit_program(&mut self, program: &Program<'a>) {
        if let Some(last) = program.directives.last() {
            self.hoist_at = last.span.end;
            let text = &self.buffer.source()[last.span.start as usize..last.span.end as usize];
            self.needs_separator = !text.trim_end().ends_with(';');
        }
        self.scan_constant_locals(program);
        walk::walk_program(self, program);
    }

    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.buffer.remove(decl.span.start, decl.span.end);
        self.made_changes = true;
        if decl.import_kind.is_type() {
            return;
        }

        let mut specifiers = Vec::new();
        let mut namespaces = Vec::new();
        let mut type_only = false;
        if let Some(list) = &decl.specifiers {
            for specifier in list {
                match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                        if spec.import_kind.is_type() {
                            type_only = true;
                            continue;
                        }
                        specifiers.push((module_export_name(&spec.imported), spec.local.name.to_string()));
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                        specifiers.push(("default".to_string(), spec.local.name.to_string()));
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                        namespaces.push(spec.local.name.to_string());
                    }
                }
            }
        }
        // `import { type A } from "m"` only ever imported types.
        if type_only && specifiers.is_empty() && namespaces.is_empty() {
            return;
        }

        self.hoist(
            decl.span.start,
            decl.source.value.to_string(),
            HoistedKind::Bindings {
                specifiers,
                namespaces,
            },
        );
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if self.namespace_depth > 0 {
            walk::walk_export_named_declaration(self, decl);
            return;
        }
        self.made_changes = true;

        if let Some(declaration) = &decl.declaration {
            self.buffer.remove(decl.span.start, declaration.span().start);
            if !decl.export_kind.is_type() {
                for name in declaration_names(declaration) {
                    self.add_export(name.clone(), name);
                }
            }
            walk::walk_export_named_declaration(self, decl);
            return;
        }

        self.buffer.remove(decl.span.start, decl.span.end);
        if decl.export_kind.is_type() {
            return;
        }

        let pairs: Vec<(String, String)> = decl
            .specifiers
            .iter()
            .filter(|spec| !spec.export_kind.is_type())
            .map(|spec| (module_export_name(&spec.local), module_export_name(&spec.exported)))
            .collect();

        match &decl.source {
            Some(source) => {
                if !pairs.is_empty() {
                    self.hoist(
                        decl.span.start,
                        source.value.to_string(),
                        HoistedKind::ReExport(pairs),
                    );
                }
            }
            None => {
                for (local, exported) in pairs {
                    self.add_export(exported, local);
                }
            }
        }
    }

    fn visit_export_default_declaration(&mut self, decl: &ExportDefaultDeclaration<'a>) {
        self.made_changes = true;

        match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                self.buffer.remove(decl.span.start, func.span.start);
                let name = match &func.id {
                    Some(id) => id.name.to_string(),
                    None => {
                        let name = self.default_local();
                        let at = func
                            .type_parameters
                            .as_ref()
                            .map_or(func.params.span.start, |params| params.span.start);
                        let text = self.name_insertion(at, &name);
                        self.buffer.insert(at, text);
                        name
                    }
                };
                self.add_export("default".to_string(), name);
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                self.buffer.remove(decl.span.start, class.span.start);
                let name = match &class.id {
                    Some(id) => id.name.to_string(),
                    None => {
                        let name = self.default_local();
                        let from = class
                            .decorators
                            .last()
                            .map_or(class.span.start, |dec| dec.span.end);
                        let keyword = self.buffer.source()[from as usize..]
                            .find("class")
                            .map_or(from, |offset| from + offset as u32 + "class".len() as u32);
                        self.buffer.insert(keyword, format!(" {}", name));
                        name
                    }
                };
                self.add_export("default".to_string(), name);
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(interface) => {
                self.buffer.remove(decl.span.start, interface.span.start);
            }
            expression => {
                let span = expression.span();
                self.buffer.overwrite(
                    decl.span.start,
                    span.start,
                    format!("{}.exportDefault(", self.alias),
                );
                self.buffer.insert(span.end, ")");
            }
        }

        walk::walk_export_default_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.buffer.remove(decl.span.start, decl.span.end);
        self.made_changes = true;
        if decl.export_kind.is_type() {
            return;
        }

        let kind = match &decl.exported {
            Some(exported) => HoistedKind::ReExportNamespace(module_export_name(exported)),
            None => HoistedKind::ReExportAll,
        };
        self.hoist(decl.span.start, decl.source.value.to_string(), kind);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        self.buffer.overwrite(
            expr.span.start,
            expr.span.start + "import".len() as u32,
            format!("{}.import", self.alias),
        );
        self.made_changes = true;
        walk::walk_import_expression(self, expr);
    }

    // Ambient bodies describe other modules; nothing in them runs here.
    fn visit_ts_module_declaration(&mut self, decl: &TSModuleDeclaration<'a>) {
        if decl.declare {
            return;
        }
        self.namespace_depth += 1;
        walk::walk_ts_module_declaration(self, decl);
        self.namespace_depth -= 1;
    }
}
