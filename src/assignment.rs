//! Assignment pass.
//!
//! Wraps every write to an exported local in `<alias>.runSetters(...)` so the
//! new value reaches importers as soon as it is assigned. Writes to a local
//! that shadows the exported name are left alone.

use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentExpression, BlockStatement, CatchClause, ForInStatement,
    ForOfStatement, ForStatement, ForStatementInit, ForStatementLeft, Function, FunctionType,
    SwitchStatement, TSModuleDeclaration, UpdateExpression, VariableDeclaration,
    VariableDeclarationKind,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::Span;
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

use crate::edit::EditBuffer;
use crate::scope::{
    collect_binding_pattern, declared_names, namespace_names, parameter_names,
    variable_declaration_names, TargetNames,
};

pub struct AssignmentVisitor<'v, 's> {
    exported: &'v HashSet<String>,
    alias: &'v str,
    buffer: &'v mut EditBuffer<'s>,
    scopes: Vec<HashSet<String>>,
}

impl<'v, 's> AssignmentVisitor<'v, 's> {
    pub fn new(exported: &'v HashSet<String>, alias: &'v str, buffer: &'v mut EditBuffer<'s>) -> Self {
        AssignmentVisitor {
            exported,
            alias,
            buffer,
            scopes: Vec::new(),
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn writes_export(&self, names: &[String]) -> bool {
        names
            .iter()
            .any(|name| self.exported.contains(name) && !self.is_shadowed(name))
    }

    fn wrap(&mut self, span: Span) {
        self.buffer
            .insert(span.start, format!("{}.runSetters(", self.alias));
        self.buffer.insert(span.end, ")");
    }

    fn with_scope(&mut self, names: HashSet<String>, visit: impl FnOnce(&mut Self)) {
        if names.is_empty() {
            visit(self);
            return;
        }
        self.scopes.push(names);
        visit(self);
        self.scopes.pop();
    }
}

fn lexical_names(decl: &VariableDeclaration) -> HashSet<String> {
    if decl.kind == VariableDeclarationKind::Var {
        HashSet::new()
    } else {
        variable_declaration_names(decl).into_iter().collect()
    }
}

impl<'a, 'v, 's> Visit<'a> for AssignmentVisitor<'v, 's> {
    fn visit_assignment_expression(&mut self, expr: &AssignmentExpression<'a>) {
        walk::walk_assignment_expression(self, expr);

        let mut targets = TargetNames::default();
        targets.visit_assignment_target(&expr.left);
        if self.writes_export(&targets.names) {
            self.wrap(expr.span);
        }
    }

    fn visit_update_expression(&mut self, expr: &UpdateExpression<'a>) {
        walk::walk_update_expression(self, expr);

        let mut targets = TargetNames::default();
        targets.visit_simple_assignment_target(&expr.argument);
        if self.writes_export(&targets.names) {
            self.wrap(expr.span);
        }
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        let mut names = HashSet::new();
        if func.r#type == FunctionType::FunctionExpression {
            if let Some(id) = &func.id {
                names.insert(id.name.to_string());
            }
        }
        parameter_names(&func.params, &mut names);
        if let Some(body) = &func.body {
            names.extend(declared_names(&body.statements, true));
        }
        self.with_scope(names, |v| walk::walk_function(v, func, flags));
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        let mut names = HashSet::new();
        parameter_names(&func.params, &mut names);
        names.extend(declared_names(&func.body.statements, true));
        self.with_scope(names, |v| walk::walk_arrow_function_expression(v, func));
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        let names = declared_names(&block.body, false);
        self.with_scope(names, |v| walk::walk_block_statement(v, block));
    }

    fn visit_switch_statement(&mut self, stmt: &SwitchStatement<'a>) {
        let mut names = HashSet::new();
        for case in &stmt.cases {
            names.extend(declared_names(&case.consequent, false));
        }
        self.with_scope(names, |v| walk::walk_switch_statement(v, stmt));
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let names = match &stmt.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => lexical_names(decl),
            _ => HashSet::new(),
        };
        self.with_scope(names, |v| walk::walk_for_statement(v, stmt));
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        let names = match &stmt.left {
            ForStatementLeft::VariableDeclaration(decl) => lexical_names(decl),
            _ => HashSet::new(),
        };
        self.with_scope(names, |v| walk::walk_for_in_statement(v, stmt));
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        let names = match &stmt.left {
            ForStatementLeft::VariableDeclaration(decl) => lexical_names(decl),
            _ => HashSet::new(),
        };
        self.with_scope(names, |v| walk::walk_for_of_statement(v, stmt));
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let mut names = Vec::new();
        if let Some(param) = &clause.param {
            collect_binding_pattern(&param.pattern, &mut names);
        }
        self.with_scope(names.into_iter().collect(), |v| {
            walk::walk_catch_clause(v, clause)
        });
    }

    fn visit_ts_module_declaration(&mut self, decl: &TSModuleDeclaration<'a>) {
        if decl.declare {
            return;
        }
        let names = namespace_names(decl);
        self.with_scope(names, |v| walk::walk_ts_module_declaration(v, decl));
    }
}
