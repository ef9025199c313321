//! Binding-name collection used by both visitors.
//!
//! The rewrite pass needs the names a declaration introduces; the assignment
//! pass needs the names each nested scope introduces so that writes to a
//! shadowing local are left alone.

use oxc_ast::ast::{
    ArrowFunctionExpression, BindingIdentifier, BindingPattern, Class, Declaration, Expression,
    FormalParameters, Function, IdentifierReference, Statement, TSModuleDeclaration,
    TSModuleDeclarationBody, TSModuleDeclarationName, VariableDeclaration,
    VariableDeclarationKind,
};
use oxc_ast_visit::Visit;
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

/// Collect every identifier bound by `pattern`, including destructured and defaulted ones.
pub fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            collect_binding_pattern(&assign.left, names);
        }
    }
}

pub fn variable_declaration_names(decl: &VariableDeclaration) -> Vec<String> {
    let mut names = Vec::new();
    for declarator in &decl.declarations {
        collect_binding_pattern(&declarator.id, &mut names);
    }
    names
}

/// Names a declaration introduces at runtime. Ambient (`declare`) and
/// type-only declarations introduce none.
pub fn declaration_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(decl) if !decl.declare => variable_declaration_names(decl),
        Declaration::FunctionDeclaration(func) if !func.declare => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) if !class.declare => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::TSEnumDeclaration(decl) if !decl.declare => vec![decl.id.name.to_string()],
        Declaration::TSModuleDeclaration(decl) if !decl.declare && namespace_is_instantiated(decl) => {
            match &decl.id {
                TSModuleDeclarationName::Identifier(id) => vec![id.name.to_string()],
                TSModuleDeclarationName::StringLiteral(_) => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Whether a `namespace` emits a runtime object. One that only holds types
/// (or nothing) is erased, so it has no binding to export.
pub fn namespace_is_instantiated(decl: &TSModuleDeclaration) -> bool {
    match &decl.body {
        None => false,
        Some(TSModuleDeclarationBody::TSModuleDeclaration(inner)) => namespace_is_instantiated(inner),
        Some(TSModuleDeclarationBody::TSModuleBlock(block)) => {
            !block.body.iter().all(is_type_only_statement)
        }
    }
}

fn is_type_only_declaration(declaration: &Declaration) -> bool {
    match declaration {
        Declaration::TSTypeAliasDeclaration(_) | Declaration::TSInterfaceDeclaration(_) => true,
        Declaration::TSModuleDeclaration(decl) => decl.declare || !namespace_is_instantiated(decl),
        Declaration::VariableDeclaration(decl) => decl.declare,
        _ => false,
    }
}

fn is_type_only_statement(stmt: &Statement) -> bool {
    match stmt {
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(declaration) => is_type_only_declaration(declaration),
            None => true,
        },
        _ => stmt.as_declaration().is_some_and(is_type_only_declaration),
    }
}

/// Names a `namespace` body binds, including the members it exports, which
/// are reachable unqualified inside the body.
pub fn namespace_names(decl: &TSModuleDeclaration) -> HashSet<String> {
    let Some(TSModuleDeclarationBody::TSModuleBlock(block)) = &decl.body else {
        return HashSet::new();
    };
    let mut names = declared_names(&block.body, true);
    for stmt in &block.body {
        if let Statement::ExportNamedDeclaration(export) = stmt {
            if let Some(declaration) = &export.declaration {
                names.extend(declaration_names(declaration));
            }
        }
    }
    names
}

/// Collects binding identifiers anywhere below the visited node.
pub struct BindingCollector<'a> {
    pub symbols: &'a mut HashSet<String>,
}

impl<'a, 'b> Visit<'b> for BindingCollector<'a> {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'b>) {
        self.symbols.insert(ident.name.to_string());
    }
}

pub fn parameter_names(params: &FormalParameters, names: &mut HashSet<String>) {
    let mut collector = BindingCollector { symbols: names };
    collector.visit_formal_parameters(params);
}

/// Names declared directly in `statements`.
///
/// Block scopes own their lexical declarations only. A function scope also owns
/// every `var` declared anywhere in its body outside nested functions.
pub fn declared_names(statements: &[Statement], function_scope: bool) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in statements {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind != VariableDeclarationKind::Var => {
                names.extend(variable_declaration_names(decl));
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    names.insert(id.name.to_string());
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    names.insert(id.name.to_string());
                }
            }
            _ => {}
        }
    }

    if function_scope {
        let mut vars = VarCollector { names: &mut names };
        for stmt in statements {
            vars.visit_statement(stmt);
        }
    }
    names
}

/// Collects `var` bindings without descending into nested functions or classes.
struct VarCollector<'n> {
    names: &'n mut HashSet<String>,
}

impl<'a, 'n> Visit<'a> for VarCollector<'n> {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind == VariableDeclarationKind::Var {
            self.names.extend(variable_declaration_names(decl));
        }
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _func: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, _class: &Class<'a>) {}

    fn visit_ts_module_declaration(&mut self, _decl: &TSModuleDeclaration<'a>) {}
}

/// Identifiers written by an assignment target.
///
/// Expressions inside the target (member objects, computed keys, default
/// values) are read, not written, so they are skipped.
#[derive(Default)]
pub struct TargetNames {
    pub names: Vec<String>,
}

impl<'a> Visit<'a> for TargetNames {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.push(ident.name.to_string());
    }

    fn visit_expression(&mut self, _expr: &Expression<'a>) {}
}
