// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Source analysis: walks the parsed module and collects every function-like
//! construct whose parameters should be instrumented.
//!
//! The analyzer recognises named function declarations, variable-bound
//! arrows, class methods and constructors, object-literal methods, and
//! function literals passed as call arguments (callbacks). For each site it
//! records the anchor position of the function head, a uniform descriptor
//! per formal parameter, and where instrumentation can be spliced into the
//! body.

use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::{
    ArrayPat, ArrowExpr, BlockStmtOrExpr, Callee, ClassMethod, Constructor, Expr, KeyValueProp,
    MemberProp, MethodProp, ObjectPat, ObjectPatProp, Param, ParamOrTsParamProp, Pat, PropName,
    TsParamPropParam, VarDeclarator,
};
use swc_core::ecma::visit::{Visit, VisitWith};
use tracing::debug;
use typetrace_common::Visibility;

use crate::parse::ParsedModule;

/// Entity context tag used for function-entry records.
pub const ENTRY_CONTEXT: &str = "function_entry";

/// Result of analysing one source file.
pub struct SourceAnalysis {
    /// Instrumentable function sites, in AST order.
    pub sites: Vec<FunctionSite>,
}

/// The construct a function site was recognised as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function f(..) { .. }`
    FunctionDeclaration,
    /// `const f = (..) => ..`
    ArrowFunction,
    /// `class C { m(..) { .. } }`
    ClassMethod,
    /// `class C { constructor(..) { .. } }`
    Constructor,
    /// `{ m(..) { .. } }` or `{ m: (..) => .. }`
    ObjectMethod,
    /// A function literal passed as an argument to a call
    CallbackArgument {
        /// Resolved callee path of the enclosing call
        callee: String,
        /// Zero-based index of the callback in the argument list
        arg_index: u32,
    },
}

impl FunctionKind {
    /// Entity context tag recorded for parameters of this construct.
    pub fn param_context(&self) -> &'static str {
        match self {
            Self::FunctionDeclaration => "function_declaration_parameter",
            Self::ArrowFunction => "arrow_function_parameter",
            Self::ClassMethod => "class_method_parameter",
            Self::Constructor => "constructor_parameter",
            Self::ObjectMethod => "object_method_parameter",
            Self::CallbackArgument { .. } => "callback_argument_parameter",
        }
    }
}

/// Where instrumentation can be inserted into a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySite {
    /// Block body: hooks are spliced right after the opening brace.
    Block {
        /// Byte offset immediately after the `{`
        insert_at: usize,
    },
    /// Expression-bodied arrow: the expression is rewritten into a block.
    Expression {
        /// Byte offset of the first byte of the expression
        start: usize,
        /// Byte offset one past the last byte of the expression
        end: usize,
    },
}

/// One instrumentable function-like construct.
#[derive(Debug, Clone)]
pub struct FunctionSite {
    /// Label base: function name, bound variable, method name,
    /// `constructor`, or `<callee>_arg<N>` for callbacks.
    pub base: String,
    /// Recognised construct kind
    pub kind: FunctionKind,
    /// Byte offset of the function head in the original source
    pub offset: usize,
    /// 1-based line of the function head
    pub line: u32,
    /// 0-based column of the function head
    pub column: u32,
    /// Uniform descriptors of the formal parameters
    pub params: Vec<ParamSite>,
    /// Body splice point
    pub body: BodySite,
}

/// How a parameter binds its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// Plain identifier binding
    Identifier(String),
    /// Object destructuring pattern; `reconstructed` holds an object-literal
    /// expression rebuilt from the bound names when every binding is simple.
    ObjectPattern {
        /// Rebuilt `{ a: a, b: b }` expression, if expressible
        reconstructed: Option<String>,
    },
    /// Array destructuring pattern
    ArrayPattern {
        /// Rebuilt `[ x, y ]` expression, if expressible
        reconstructed: Option<String>,
    },
}

/// Uniform descriptor of one formal parameter.
#[derive(Debug, Clone)]
pub struct ParamSite {
    /// Binding form
    pub binding: ParamBinding,
    /// Zero-based parameter index
    pub index: u32,
    /// Byte offset of the parameter in the original source
    pub offset: usize,
    /// 1-based line of the parameter
    pub line: u32,
    /// 0-based column of the parameter
    pub column: u32,
    /// Whether the parameter declares a default value
    pub has_default: bool,
    /// Whether the parameter is a rest element
    pub is_rest: bool,
    /// Whether the dialect annotates a type
    pub annotated: bool,
    /// Declared visibility for constructor parameter-properties
    pub accessibility: Option<Visibility>,
}

impl ParamSite {
    /// Name used in labels and metadata: the declared identifier, or a
    /// synthetic `destructured_*` name for pattern bindings.
    pub fn display_name(&self) -> &str {
        match &self.binding {
            ParamBinding::Identifier(name) => name,
            ParamBinding::ObjectPattern { .. } => "destructured_object",
            ParamBinding::ArrayPattern { .. } => "destructured_array",
        }
    }

    /// Expression evaluating to the observed value inside the function body.
    pub fn value_expr(&self) -> String {
        match &self.binding {
            ParamBinding::Identifier(name) => name.clone(),
            ParamBinding::ObjectPattern { reconstructed }
            | ParamBinding::ArrayPattern { reconstructed } => {
                reconstructed.clone().unwrap_or_else(|| "undefined".to_string())
            }
        }
    }
}

/// Analyse a parsed module.
pub fn analyze(parsed: &ParsedModule, source: &str) -> SourceAnalysis {
    let mut analyzer = Analyzer { parsed, source, sites: Vec::new() };
    parsed.module.visit_with(&mut analyzer);
    SourceAnalysis { sites: analyzer.sites }
}

struct Analyzer<'a> {
    parsed: &'a ParsedModule,
    source: &'a str,
    sites: Vec<FunctionSite>,
}

impl Analyzer<'_> {
    fn positions(&self, span: Span) -> (usize, u32, u32) {
        let offset = self.parsed.offset_of(span.lo);
        let (line, column) = self.parsed.line_col_of(span.lo);
        (offset, line, column)
    }

    /// Original source text of a span, whitespace runs collapsed.
    fn slice(&self, span: Span) -> String {
        let lo = self.parsed.offset_of(span.lo);
        let hi = self.parsed.offset_of(span.hi);
        let text = self.source.get(lo..hi).unwrap_or_default();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn push_site(
        &mut self,
        base: String,
        kind: FunctionKind,
        head: Span,
        params: Vec<ParamSite>,
        body: BodySite,
    ) {
        let (offset, line, column) = self.positions(head);
        self.sites.push(FunctionSite { base, kind, offset, line, column, params, body });
    }

    fn record_function(
        &mut self,
        base: String,
        kind: FunctionKind,
        head: Span,
        params: &[Param],
        body: Option<&swc_core::ecma::ast::BlockStmt>,
    ) {
        let Some(body) = body else {
            // Ambient declarations and overload signatures have no body.
            debug!(site = %base, "skipping bodyless function");
            return;
        };
        let params = self.extract_params(params.iter().map(|p| &p.pat));
        let insert_at = self.parsed.offset_of(body.span.lo) + 1;
        self.push_site(base, kind, head, params, BodySite::Block { insert_at });
    }

    fn record_arrow(&mut self, base: String, kind: FunctionKind, arrow: &ArrowExpr) {
        let params = self.extract_params(arrow.params.iter());
        let body = match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => {
                BodySite::Block { insert_at: self.parsed.offset_of(block.span.lo) + 1 }
            }
            BlockStmtOrExpr::Expr(expr) => {
                let span = expr.span();
                BodySite::Expression {
                    start: self.parsed.offset_of(span.lo),
                    end: self.parsed.offset_of(span.hi),
                }
            }
        };
        self.push_site(base, kind, arrow.span, params, body);
    }

    fn extract_params<'p>(&self, pats: impl Iterator<Item = &'p Pat>) -> Vec<ParamSite> {
        let mut out = Vec::new();
        for pat in pats {
            let Some(mut site) = self.extract_param(pat) else {
                debug!("skipping unsupported parameter form");
                continue;
            };
            // TypeScript `this` pseudo-parameters never receive an argument.
            if matches!(&site.binding, ParamBinding::Identifier(name) if name == "this") {
                continue;
            }
            site.index = out.len() as u32;
            out.push(site);
        }
        out
    }

    fn extract_param(&self, pat: &Pat) -> Option<ParamSite> {
        let site = |binding: ParamBinding, span: Span, annotated: bool| {
            let (offset, line, column) = self.positions(span);
            ParamSite {
                binding,
                index: 0,
                offset,
                line,
                column,
                has_default: false,
                is_rest: false,
                annotated,
                accessibility: None,
            }
        };

        match pat {
            Pat::Ident(binding) => Some(site(
                ParamBinding::Identifier(binding.sym.to_string()),
                binding.id.span,
                binding.type_ann.is_some(),
            )),
            Pat::Assign(assign) => {
                let mut inner = self.extract_param(&assign.left)?;
                inner.has_default = true;
                Some(inner)
            }
            Pat::Rest(rest) => {
                let mut inner = self.extract_param(&rest.arg)?;
                inner.is_rest = true;
                if rest.type_ann.is_some() {
                    inner.annotated = true;
                }
                Some(inner)
            }
            Pat::Object(object) => Some(site(
                ParamBinding::ObjectPattern { reconstructed: rebuild_object(object) },
                object.span,
                object.type_ann.is_some(),
            )),
            Pat::Array(array) => Some(site(
                ParamBinding::ArrayPattern { reconstructed: rebuild_array(array) },
                array.span,
                array.type_ann.is_some(),
            )),
            Pat::Expr(_) | Pat::Invalid(_) => None,
        }
    }

    fn extract_constructor_params(&self, params: &[ParamOrTsParamProp]) -> Vec<ParamSite> {
        let mut out = Vec::new();
        for param in params {
            let extracted = match param {
                ParamOrTsParamProp::Param(param) => self.extract_param(&param.pat),
                ParamOrTsParamProp::TsParamProp(prop) => {
                    let accessibility = prop.accessibility.map(|a| match a {
                        swc_core::ecma::ast::Accessibility::Public => Visibility::Public,
                        swc_core::ecma::ast::Accessibility::Protected => Visibility::Protected,
                        swc_core::ecma::ast::Accessibility::Private => Visibility::Private,
                    });
                    let inner = match &prop.param {
                        TsParamPropParam::Ident(binding) => self.extract_param(&Pat::Ident(binding.clone())),
                        TsParamPropParam::Assign(assign) => {
                            self.extract_param(&Pat::Assign(assign.clone()))
                        }
                    };
                    inner.map(|mut site| {
                        site.accessibility = accessibility;
                        // Parameter-properties are a typed-dialect construct.
                        site.annotated = true;
                        site
                    })
                }
            };
            let Some(mut site) = extracted else { continue };
            if matches!(&site.binding, ParamBinding::Identifier(name) if name == "this") {
                continue;
            }
            site.index = out.len() as u32;
            out.push(site);
        }
        out
    }

    /// Resolve the textual callee path of a call expression.
    ///
    /// A bare identifier yields itself, a member chain `a.b.c` yields the
    /// dotted path, anything else yields the original callee text.
    fn callee_path(&self, callee: &Callee) -> String {
        match callee {
            Callee::Expr(expr) => self.expr_path(expr),
            Callee::Super(sup) => self.slice(sup.span),
            Callee::Import(import) => self.slice(import.span),
        }
    }

    fn expr_path(&self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(ident) => ident.sym.to_string(),
            Expr::Member(member) => match &member.prop {
                MemberProp::Ident(prop) => {
                    format!("{}.{}", self.expr_path(&member.obj), prop.sym)
                }
                _ => self.slice(member.span),
            },
            other => self.slice(other.span()),
        }
    }
}

impl Visit for Analyzer<'_> {
    fn visit_fn_decl(&mut self, node: &swc_core::ecma::ast::FnDecl) {
        self.record_function(
            node.ident.sym.to_string(),
            FunctionKind::FunctionDeclaration,
            node.function.span,
            &node.function.params,
            node.function.body.as_ref(),
        );
        node.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if let (Pat::Ident(name), Some(init)) = (&node.name, &node.init) {
            if let Expr::Arrow(arrow) = &**init {
                self.record_arrow(name.sym.to_string(), FunctionKind::ArrowFunction, arrow);
            }
        }
        node.visit_children_with(self);
    }

    fn visit_class_method(&mut self, node: &ClassMethod) {
        if let Some(name) = prop_name(&node.key) {
            self.record_function(
                name,
                FunctionKind::ClassMethod,
                node.span,
                &node.function.params,
                node.function.body.as_ref(),
            );
        }
        node.visit_children_with(self);
    }

    fn visit_constructor(&mut self, node: &Constructor) {
        if let Some(body) = &node.body {
            let params = self.extract_constructor_params(&node.params);
            let insert_at = self.parsed.offset_of(body.span.lo) + 1;
            let (offset, line, column) = self.positions(node.span);
            self.sites.push(FunctionSite {
                base: "constructor".to_string(),
                kind: FunctionKind::Constructor,
                offset,
                line,
                column,
                params,
                body: BodySite::Block { insert_at },
            });
        }
        node.visit_children_with(self);
    }

    fn visit_method_prop(&mut self, node: &MethodProp) {
        if let Some(name) = prop_name(&node.key) {
            self.record_function(
                name,
                FunctionKind::ObjectMethod,
                node.function.span,
                &node.function.params,
                node.function.body.as_ref(),
            );
        }
        node.visit_children_with(self);
    }

    fn visit_key_value_prop(&mut self, node: &KeyValueProp) {
        // `{ handler: (x) => .. }` reads as an object method.
        if let (Some(name), Expr::Arrow(arrow)) = (prop_name(&node.key), &*node.value) {
            self.record_arrow(name, FunctionKind::ObjectMethod, arrow);
        }
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &swc_core::ecma::ast::CallExpr) {
        let callee = self.callee_path(&node.callee);
        for (index, arg) in node.args.iter().enumerate() {
            if arg.spread.is_some() {
                continue;
            }
            let base = format!("{callee}_arg{index}");
            let kind = FunctionKind::CallbackArgument {
                callee: callee.clone(),
                arg_index: index as u32,
            };
            match &*arg.expr {
                Expr::Arrow(arrow) => self.record_arrow(base, kind, arrow),
                Expr::Fn(fn_expr) => self.record_function(
                    base,
                    kind,
                    fn_expr.function.span,
                    &fn_expr.function.params,
                    fn_expr.function.body.as_ref(),
                ),
                _ => {}
            }
        }
        node.visit_children_with(self);
    }
}

fn prop_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string()),
        PropName::Num(n) => Some(n.value.to_string()),
        PropName::Computed(_) | PropName::BigInt(_) => None,
    }
}

fn rebuild_object(pat: &ObjectPat) -> Option<String> {
    let mut fields = Vec::new();
    for prop in &pat.props {
        match prop {
            ObjectPatProp::Assign(assign) => {
                let name = assign.key.sym.to_string();
                fields.push(format!("{name}: {name}"));
            }
            ObjectPatProp::KeyValue(kv) => {
                let key = prop_name(&kv.key)?;
                let bound = match &*kv.value {
                    Pat::Ident(binding) => binding.sym.to_string(),
                    Pat::Assign(assign) => match &*assign.left {
                        Pat::Ident(binding) => binding.sym.to_string(),
                        _ => return None,
                    },
                    _ => return None,
                };
                fields.push(format!("{key}: {bound}"));
            }
            ObjectPatProp::Rest(_) => return None,
        }
    }
    Some(format!("{{ {} }}", fields.join(", ")))
}

fn rebuild_array(pat: &ArrayPat) -> Option<String> {
    let mut names = Vec::new();
    for elem in &pat.elems {
        let name = match elem {
            Some(Pat::Ident(binding)) => binding.sym.to_string(),
            Some(Pat::Assign(assign)) => match &*assign.left {
                Pat::Ident(binding) => binding.sym.to_string(),
                _ => return None,
            },
            _ => return None,
        };
        names.push(name);
    }
    Some(format!("[ {} ]", names.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_module;

    fn analyze_source(source: &str, filename: &str) -> SourceAnalysis {
        let parsed = parse_module(source, filename).unwrap();
        analyze(&parsed, source)
    }

    #[test]
    fn test_function_declaration_site() {
        let analysis = analyze_source("function add(a, b) { return a + b; }", "math.js");
        assert_eq!(analysis.sites.len(), 1);
        let site = &analysis.sites[0];
        assert_eq!(site.base, "add");
        assert_eq!(site.kind, FunctionKind::FunctionDeclaration);
        assert_eq!(site.params.len(), 2);
        assert_eq!(site.params[0].display_name(), "a");
        assert_eq!(site.params[1].display_name(), "b");
        assert_eq!(site.params[1].index, 1);
        assert!(matches!(site.body, BodySite::Block { .. }));
    }

    #[test]
    fn test_variable_bound_arrow_site() {
        let analysis = analyze_source("const double = x => x * 2;", "math.js");
        assert_eq!(analysis.sites.len(), 1);
        let site = &analysis.sites[0];
        assert_eq!(site.base, "double");
        assert_eq!(site.kind, FunctionKind::ArrowFunction);
        assert!(matches!(site.body, BodySite::Expression { .. }));
    }

    #[test]
    fn test_class_members() {
        let source = r#"
class TodoList {
    constructor(private store: Store, public limit = 10) {}

    addTodo(todo: Todo) {
        this.store.push(todo);
    }
}
"#;
        let analysis = analyze_source(source, "todo.ts");
        assert_eq!(analysis.sites.len(), 2);

        let ctor = &analysis.sites[0];
        assert_eq!(ctor.base, "constructor");
        assert_eq!(ctor.kind, FunctionKind::Constructor);
        assert_eq!(ctor.params[0].accessibility, Some(Visibility::Private));
        assert_eq!(ctor.params[1].accessibility, Some(Visibility::Public));
        assert!(ctor.params[1].has_default);

        let method = &analysis.sites[1];
        assert_eq!(method.base, "addTodo");
        assert_eq!(method.kind, FunctionKind::ClassMethod);
        assert!(method.params[0].annotated);
    }

    #[test]
    fn test_callback_argument_site() {
        let analysis =
            analyze_source("createRoutine('T', payload => ({ x: payload.x }));", "routine.js");
        assert_eq!(analysis.sites.len(), 1);
        let site = &analysis.sites[0];
        assert_eq!(site.base, "createRoutine_arg1");
        assert_eq!(
            site.kind,
            FunctionKind::CallbackArgument { callee: "createRoutine".into(), arg_index: 1 }
        );
        assert_eq!(site.params[0].display_name(), "payload");
    }

    #[test]
    fn test_member_chain_callee_path() {
        let analysis = analyze_source("items.map(function (item) { return item.id; });", "a.js");
        assert_eq!(analysis.sites.len(), 1);
        assert_eq!(
            analysis.sites[0].kind,
            FunctionKind::CallbackArgument { callee: "items.map".into(), arg_index: 0 }
        );
    }

    #[test]
    fn test_param_forms() {
        let source = "function f({ id, done = false }, [x, y], rest = 1, ...tail) {}";
        let analysis = analyze_source(source, "forms.js");
        let site = &analysis.sites[0];
        assert_eq!(site.params.len(), 4);

        assert_eq!(site.params[0].display_name(), "destructured_object");
        assert_eq!(site.params[0].value_expr(), "{ id: id, done: done }");

        assert_eq!(site.params[1].display_name(), "destructured_array");
        assert_eq!(site.params[1].value_expr(), "[ x, y ]");

        assert!(site.params[2].has_default);
        assert!(site.params[3].is_rest);
        assert_eq!(site.params[3].display_name(), "tail");
    }

    #[test]
    fn test_unrebuildable_pattern_falls_back_to_undefined() {
        let analysis = analyze_source("function f({ a: { b } }) {}", "nested.js");
        let site = &analysis.sites[0];
        assert_eq!(site.params[0].value_expr(), "undefined");
    }

    #[test]
    fn test_this_pseudo_parameter_is_skipped() {
        let analysis = analyze_source("function f(this: Window, a: number) {}", "this.ts");
        let site = &analysis.sites[0];
        assert_eq!(site.params.len(), 1);
        assert_eq!(site.params[0].display_name(), "a");
        assert_eq!(site.params[0].index, 0);
    }

    #[test]
    fn test_bodyless_declarations_are_skipped() {
        let analysis = analyze_source("declare function f(a: number): void;", "decl.ts");
        assert!(analysis.sites.is_empty());
    }

    #[test]
    fn test_nested_callbacks_are_attributed_to_their_call() {
        let source = "app.get('/todos', (req, res) => { items.forEach(item => render(item)); });";
        let analysis = analyze_source(source, "server.js");
        assert_eq!(analysis.sites.len(), 2);
        assert_eq!(
            analysis.sites[0].kind,
            FunctionKind::CallbackArgument { callee: "app.get".into(), arg_index: 1 }
        );
        assert_eq!(
            analysis.sites[1].kind,
            FunctionKind::CallbackArgument { callee: "items.forEach".into(), arg_index: 0 }
        );
    }
}
