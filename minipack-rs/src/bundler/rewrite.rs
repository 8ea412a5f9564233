//! Rewriting of `require()` calls.
//!
//! A module is parsed into an owned swc [`Script`]. A read-only pass collects
//! one [`LoadRewrite`] per `require("...")` call, a mutating pass applies them,
//! and the tree is printed back to text. Rewritten calls address the bundle
//! runtime by module identity instead of the host module system.

use std::collections::HashMap;

use deno_ast::swc::ast::{CallExpr, Callee, Expr, Lit, Script, Str};
use deno_ast::swc::codegen::text_writer::JsWriter;
use deno_ast::swc::codegen::{Config as CodegenConfig, Emitter};
use deno_ast::swc::common::comments::SingleThreadedComments;
use deno_ast::swc::common::sync::Lrc;
use deno_ast::swc::common::{FileName, Globals, SourceMap, Span, Spanned, DUMMY_SP, GLOBALS};
use deno_ast::swc::ecma_visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::{Parser, StringInput};
use deno_ast::MediaType;

use crate::error::{PackError, Result};

/// The host's module loading function.
pub const HOST_LOAD: &str = "require";
/// The bundle runtime's module loading function.
pub const RUNTIME_LOAD: &str = "__minipack_require__";
/// Extension appended to load targets that have none.
pub const DEFAULT_EXTENSION: &str = "js";

/// A module after its load calls were rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenModule {
    pub source: String,
    /// Dependency identities in discovery order; duplicates are kept.
    pub dependencies: Vec<String>,
}

/// One `require()` call to rewrite.
#[derive(Debug, Clone)]
struct LoadRewrite {
    call: Span,
    identity: String,
}

#[derive(Debug, Default)]
pub struct ModuleRewriter;

impl ModuleRewriter {
    pub fn new() -> Self {
        Self
    }

    /// Parses `source`, rewrites its load calls relative to `module_dir` (the
    /// root-relative directory of `identity`) and prints it back.
    pub fn parse_source(
        &self,
        identity: &str,
        source: &str,
        module_dir: &str,
    ) -> Result<RewrittenModule> {
        let globals = Globals::new();
        GLOBALS.set(&globals, || {
            let cm: Lrc<SourceMap> = Default::default();
            let source_file =
                cm.new_source_file(FileName::Custom(identity.to_string()).into(), source.to_string());

            let comments = SingleThreadedComments::default();
            let input = StringInput::from(&*source_file);
            let lexer = Lexer::new(
                deno_ast::get_syntax(MediaType::JavaScript),
                deno_ast::ES_VERSION,
                input,
                Some(&comments),
            );
            let mut parser = Parser::new_from(lexer);
            let mut script = parser.parse_script().map_err(|err| {
                syntax_error(&cm, identity, err.span(), err.kind().msg().into_owned())
            })?;
            if let Some(err) = parser.take_errors().into_iter().next() {
                return Err(syntax_error(
                    &cm,
                    identity,
                    err.span(),
                    err.kind().msg().into_owned(),
                ));
            }

            let mut collector = LoadCollector {
                module_dir,
                rewrites: Vec::new(),
                error: None,
            };
            script.visit_with(&mut collector);
            if let Some((span, reason)) = collector.error {
                return Err(PackError::InvalidDependency {
                    identity: identity.to_string(),
                    line: cm.lookup_char_pos(span.lo).line,
                    reason,
                });
            }

            let dependencies = collector
                .rewrites
                .iter()
                .map(|r| r.identity.clone())
                .collect();
            let mut applier = LoadApplier {
                rewrites: collector
                    .rewrites
                    .into_iter()
                    .map(|r| (r.call, r.identity))
                    .collect(),
            };
            script.visit_mut_with(&mut applier);

            let source = print_script(&cm, &comments, &script).map_err(|e| PackError::Syntax {
                identity: identity.to_string(),
                line: 0,
                column: 0,
                message: format!("failed to print module: {e}"),
            })?;

            Ok(RewrittenModule {
                source,
                dependencies,
            })
        })
    }
}

fn syntax_error(cm: &SourceMap, identity: &str, span: Span, message: String) -> PackError {
    let loc = cm.lookup_char_pos(span.lo);
    PackError::Syntax {
        identity: identity.to_string(),
        line: loc.line,
        column: loc.col.0 + 1,
        message,
    }
}

fn print_script(
    cm: &Lrc<SourceMap>,
    comments: &SingleThreadedComments,
    script: &Script,
) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    {
        // can't use struct expr because Config has #[non_exhaustive]
        let mut cfg = CodegenConfig::default();
        cfg.minify = false;
        cfg.ascii_only = false;
        cfg.target = deno_ast::ES_VERSION;
        cfg.omit_last_semi = false;

        let mut emitter = Emitter {
            cfg,
            cm: cm.clone(),
            comments: Some(comments),
            wr: Box::new(JsWriter::new(cm.clone(), "\n", &mut buf, None)),
        };
        emitter.emit_script(script)?;
    }
    Ok(String::from_utf8(buf)?)
}

/// Returns the identity a load target names when requested from
/// `module_dir`: default extension added, joined to the directory with `.`
/// and `..` folded, and prefixed with `./`.
pub fn normalize_dependency(target: &str, module_dir: &str) -> String {
    let file_name = target.rsplit('/').next().unwrap_or(target);
    let needs_extension = match file_name.rfind('.') {
        Some(0) | None => true,
        Some(_) => false,
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in module_dir.split('/').chain(target.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            segment => segments.push(segment),
        }
    }

    let mut identity = format!("./{}", segments.join("/"));
    if needs_extension {
        identity.push('.');
        identity.push_str(DEFAULT_EXTENSION);
    }
    identity
}

/// Root-relative directory of a module identity, `.` for top-level modules.
pub fn module_dir(identity: &str) -> &str {
    match identity.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ".",
    }
}

struct LoadCollector<'a> {
    module_dir: &'a str,
    rewrites: Vec<LoadRewrite>,
    error: Option<(Span, String)>,
}

impl Visit for LoadCollector<'_> {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if self.error.is_none() && is_host_load(call) {
            match load_target(call) {
                Ok(target) => self.rewrites.push(LoadRewrite {
                    call: call.span,
                    identity: normalize_dependency(&target, self.module_dir),
                }),
                Err(reason) => self.error = Some((call.span, reason)),
            }
        }
        call.visit_children_with(self);
    }
}

struct LoadApplier {
    rewrites: HashMap<Span, String>,
}

impl VisitMut for LoadApplier {
    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        call.visit_mut_children_with(self);
        let Some(identity) = self.rewrites.get(&call.span) else {
            return;
        };
        if let Callee::Expr(callee) = &mut call.callee {
            if let Expr::Ident(ident) = &mut **callee {
                ident.sym = RUNTIME_LOAD.into();
            }
        }
        if let Some(arg) = call.args.first_mut() {
            arg.expr = Box::new(Expr::Lit(Lit::Str(Str {
                span: DUMMY_SP,
                value: identity.as_str().into(),
                raw: None,
            })));
        }
    }
}

fn is_host_load(call: &CallExpr) -> bool {
    match &call.callee {
        Callee::Expr(callee) => matches!(&**callee, Expr::Ident(ident) if &*ident.sym == HOST_LOAD),
        _ => false,
    }
}

/// Extracts the string literal a load call names.
fn load_target(call: &CallExpr) -> std::result::Result<String, String> {
    let arg = call
        .args
        .first()
        .ok_or_else(|| format!("{HOST_LOAD}() called without a target"))?;
    if arg.spread.is_some() {
        return Err(format!("spread argument passed to {HOST_LOAD}()"));
    }
    match &*arg.expr {
        Expr::Lit(Lit::Str(lit)) => lit
            .value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("{HOST_LOAD}() target is not valid UTF-8")),
        _ => Err(format!(
            "{HOST_LOAD}() target must be a string literal, dynamic targets are not supported"
        )),
    }
}
