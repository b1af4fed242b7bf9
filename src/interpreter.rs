use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::{debug, trace};

use crate::environment::{Assignment, Environment};
use crate::error::{CarlaeError, LoadError, Result};
use crate::language::{Closure, Expr, Value, is_valid_variable_name};
use crate::parser::parse_source;

// ============================================================================
// Recursion Depth
// ============================================================================

/// Default ceiling on nested `evaluate` calls
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Remaining stack below which `evaluate` switches to a fresh segment
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated once the red zone is reached
const STACK_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_DEPTH) };
}

/// Set the evaluation depth ceiling for the current thread.
pub fn set_max_depth(limit: usize) {
    MAX_DEPTH.with(|max| max.set(limit));
}

pub fn max_depth() -> usize {
    MAX_DEPTH.with(Cell::get)
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self> {
        DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > max_depth() {
                return Err(CarlaeError::evaluation(format!(
                    "maximum recursion depth ({}) exceeded",
                    max_depth()
                )));
            }
            depth.set(next);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

// ============================================================================
// Special Forms
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpecialForm {
    Define,
    If,
    And,
    Or,
    Del,
    Let,
    SetBang,
    Function,
}

impl SpecialForm {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            ":=" => Some(SpecialForm::Define),
            "if" => Some(SpecialForm::If),
            "and" => Some(SpecialForm::And),
            "or" => Some(SpecialForm::Or),
            "del" => Some(SpecialForm::Del),
            "let" => Some(SpecialForm::Let),
            "set!" => Some(SpecialForm::SetBang),
            "function" => Some(SpecialForm::Function),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Define => ":=",
            SpecialForm::If => "if",
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
            SpecialForm::Del => "del",
            SpecialForm::Let => "let",
            SpecialForm::SetBang => "set!",
            SpecialForm::Function => "function",
        }
    }
}

/// Check a special form's operand count and hand back the operands as an array
fn expect_operands<const N: usize>(form: SpecialForm, operands: &[Expr]) -> Result<&[Expr; N]> {
    operands.try_into().map_err(|_| {
        CarlaeError::evaluation(format!(
            "{}: expected {N} operands, got {}",
            form.keyword(),
            operands.len()
        ))
    })
}

fn expect_name(form: SpecialForm, expr: &Expr) -> Result<&str> {
    match expr {
        Expr::Symbol(name) if is_valid_variable_name(name) => Ok(name),
        other => Err(CarlaeError::name(format!(
            "{}: '{other}' is not a valid variable name",
            form.keyword()
        ))),
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluate an expression tree in the given environment.
///
/// Nesting is bounded by [`max_depth`], not by the caller's stack: deep
/// recursion grows the stack in segments until the depth limit turns it into
/// an Evaluation error.
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Value> {
    let _depth = DepthGuard::enter()?;
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || eval_expr(expr, env))
}

fn eval_expr(expr: &Expr, env: &Environment) -> Result<Value> {
    match expr {
        // Self-evaluating
        Expr::Number(n) => Ok(Value::Number(n.clone())),

        // Variable lookup
        Expr::Symbol(name) => env
            .lookup(name)
            .ok_or_else(|| CarlaeError::name(format!("name '{name}' is not defined"))),

        Expr::Compound(items) => {
            let Some((operator, operands)) = items.split_first() else {
                return Err(CarlaeError::evaluation("cannot evaluate an empty expression"));
            };

            if let Some(form) = operator.as_symbol().and_then(SpecialForm::from_keyword) {
                trace!("special form {}", form.keyword());
                return eval_special_form(form, operands, env);
            }

            // Function application
            let func = evaluate(operator, env)?;
            let mut args = Vec::with_capacity(operands.len());
            for operand in operands {
                args.push(evaluate(operand, env)?);
            }
            apply(&func, args)
        }
    }
}

fn eval_special_form(form: SpecialForm, operands: &[Expr], env: &Environment) -> Result<Value> {
    match form {
        SpecialForm::Define => {
            let [target, value_expr] = expect_operands::<2>(form, operands)?;
            eval_define(target, value_expr, env)
        }
        SpecialForm::If => {
            let [condition, consequent, alternative] = expect_operands::<3>(form, operands)?;
            // Only the boolean true selects the first branch; there is no truthiness
            if matches!(evaluate(condition, env)?, Value::Bool(true)) {
                evaluate(consequent, env)
            } else {
                evaluate(alternative, env)
            }
        }
        SpecialForm::And => {
            for operand in operands {
                if matches!(evaluate(operand, env)?, Value::Bool(false)) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        SpecialForm::Or => {
            for operand in operands {
                if matches!(evaluate(operand, env)?, Value::Bool(true)) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        SpecialForm::Del => {
            let [target] = expect_operands::<1>(form, operands)?;
            let name = expect_name(form, target)?;
            env.delete(name).ok_or_else(|| {
                CarlaeError::name(format!("del: '{name}' is not bound in the current environment"))
            })
        }
        SpecialForm::Let => {
            let [bindings, body] = expect_operands::<2>(form, operands)?;
            eval_let(bindings, body, env)
        }
        SpecialForm::SetBang => {
            let [target, value_expr] = expect_operands::<2>(form, operands)?;
            let name = expect_name(form, target)?;
            let value = evaluate(value_expr, env)?;
            match env.assign(name, value) {
                Assignment::Updated(value) => Ok(value),
                Assignment::Unbound => Err(CarlaeError::name(format!(
                    "set!: '{name}' is not defined in any enclosing environment"
                ))),
                Assignment::Builtin => Err(CarlaeError::name(format!(
                    "set!: cannot rebind builtin '{name}'"
                ))),
            }
        }
        SpecialForm::Function => {
            let [params_expr, body] = expect_operands::<2>(form, operands)?;
            let Expr::Compound(param_exprs) = params_expr else {
                return Err(CarlaeError::evaluation(format!(
                    "function: parameters must be a parenthesized list, got '{params_expr}'"
                )));
            };
            let params = param_exprs
                .iter()
                .map(|p| expect_name(form, p).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;

            Ok(Value::Closure(Rc::new(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            })))
        }
    }
}

fn eval_define(target: &Expr, value_expr: &Expr, env: &Environment) -> Result<Value> {
    match target {
        // (:= (name p1 p2) body) is (:= name (function (p1 p2) body))
        Expr::Compound(signature) => {
            let Some((name, params)) = signature.split_first() else {
                return Err(CarlaeError::evaluation(":=: empty function signature"));
            };
            let desugared = Expr::Compound(vec![
                Expr::symbol(":="),
                name.clone(),
                Expr::Compound(vec![
                    Expr::symbol("function"),
                    Expr::Compound(params.to_vec()),
                    value_expr.clone(),
                ]),
            ]);
            evaluate(&desugared, env)
        }
        _ => {
            let name = expect_name(SpecialForm::Define, target)?;
            let value = evaluate(value_expr, env)?;
            env.define(name, value)
        }
    }
}

fn eval_let(bindings: &Expr, body: &Expr, env: &Environment) -> Result<Value> {
    let Expr::Compound(binding_exprs) = bindings else {
        return Err(CarlaeError::evaluation(format!(
            "let: bindings must be a parenthesized list, got '{bindings}'"
        )));
    };

    // Every value sees the outer environment, never a sibling binding
    let mut evaluated = Vec::with_capacity(binding_exprs.len());
    for binding in binding_exprs {
        let Expr::Compound(parts) = binding else {
            return Err(CarlaeError::evaluation(format!(
                "let: expected (name value), got '{binding}'"
            )));
        };
        let [name, value_expr] = expect_operands::<2>(SpecialForm::Let, parts)?;
        let name = expect_name(SpecialForm::Let, name)?;
        evaluated.push((name, evaluate(value_expr, env)?));
    }

    let frame = env.child();
    debug!("let frame with {} bindings", evaluated.len());
    for (name, value) in evaluated {
        frame.define(name, value)?;
    }
    evaluate(body, &frame)
}

// ============================================================================
// Application
// ============================================================================

/// Call a closure or builtin with already-evaluated arguments
pub fn apply(func: &Value, args: Vec<Value>) -> Result<Value> {
    match func {
        Value::Closure(closure) => call_closure(closure, args),
        Value::Native(native) => {
            trace!("call builtin {} with {} args", native.name, args.len());
            (native.func)(&args)
        }
        other => Err(CarlaeError::evaluation(format!(
            "'{other}' is a {}, not a function",
            other.type_name()
        ))),
    }
}

fn call_closure(closure: &Closure, args: Vec<Value>) -> Result<Value> {
    if args.len() != closure.params.len() {
        return Err(CarlaeError::evaluation(format!(
            "function expected {} argument{}, got {}",
            closure.params.len(),
            if closure.params.len() == 1 { "" } else { "s" },
            args.len()
        )));
    }
    trace!("call function ({})", closure.params.join(" "));

    // One fresh frame per call, parented to the defining environment
    let frame = closure.env.extend(&closure.params, args)?;
    evaluate(&closure.body, &frame)
}

// ============================================================================
// Entry Points
// ============================================================================

/// A fresh global environment above the shared builtins
pub fn make_global_env() -> Environment {
    Environment::new()
}

/// Tokenize, parse, and evaluate one expression unit
pub fn run_source(source: &str, env: &Environment) -> Result<Value> {
    let expr = parse_source(source)?;
    evaluate(&expr, env)
}

/// Evaluate in `env`, or in a new global environment, and return both
pub fn result_and_env(expr: &Expr, env: Option<Environment>) -> Result<(Value, Environment)> {
    let env = env.unwrap_or_else(make_global_env);
    let result = evaluate(expr, &env)?;
    Ok((result, env))
}

/// Evaluate the single expression held in a file.
///
/// Without `env` the file runs in a fresh global environment, which is
/// cleared before returning so self-referencing definitions do not leak.
pub fn evaluate_file(
    path: impl AsRef<Path>,
    env: Option<&Environment>,
) -> std::result::Result<Value, LoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("evaluate file {} ({} bytes)", path.display(), source.len());

    match env {
        Some(env) => Ok(run_source(&source, env)?),
        None => {
            let env = make_global_env();
            let result = run_source(&source, &env);
            env.clear();
            Ok(result?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<Value> {
        run_source(source, &make_global_env())
    }

    #[test]
    fn test_numbers_self_evaluate() {
        assert_eq!(run("42").unwrap(), Value::int(42));
        assert_eq!(run("-2.5").unwrap(), Value::float(-2.5));
    }

    #[test]
    fn test_unbound_symbol() {
        assert!(matches!(run("nope"), Err(CarlaeError::Name(_))));
    }

    #[test]
    fn test_empty_application() {
        assert!(matches!(run("()"), Err(CarlaeError::Evaluation(_))));
    }

    #[test]
    fn test_special_form_arity() {
        let malformed = [
            "(:= x)",
            "(if @t 1)",
            "(del)",
            "(let ((x 1)))",
            "(set! x)",
            "(function (x))",
        ];
        for source in malformed {
            assert!(
                matches!(run(source), Err(CarlaeError::Evaluation(_))),
                "{source} should be an evaluation error"
            );
        }
    }

    #[test]
    fn test_calling_a_number() {
        assert!(matches!(run("(1 2 3)"), Err(CarlaeError::Evaluation(_))));
    }

    #[test]
    fn test_depth_guard_resets_after_error() {
        let env = make_global_env();
        run_source("(:= (loop n) (loop n))", &env).unwrap();

        set_max_depth(100);
        let err = run_source("(loop 1)", &env).unwrap_err();
        set_max_depth(DEFAULT_MAX_DEPTH);

        assert!(err.message().contains("maximum recursion depth"));
        assert_eq!(DEPTH.with(Cell::get), 0);
        assert_eq!(run_source("(+ 1 1)", &env).unwrap(), Value::int(2));
        env.clear();
    }

    #[test]
    fn test_result_and_env_keeps_definitions() {
        let expr = parse_source("(:= x 3)").unwrap();
        let (value, env) = result_and_env(&expr, None).unwrap();
        assert_eq!(value, Value::int(3));
        assert_eq!(env.lookup("x"), Some(Value::int(3)));

        let expr = parse_source("(* x x)").unwrap();
        let (value, _) = result_and_env(&expr, Some(env)).unwrap();
        assert_eq!(value, Value::int(9));
    }
}
