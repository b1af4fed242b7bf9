use carlae::{CarlaeError, Environment, ErrorKind, make_global_env, run_source};

fn eval_expr(expr: &str) -> String {
    let env = make_global_env();
    match run_source(expr, &env) {
        Ok(result) => result.to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

/// Evaluate each line in one environment and return the last result
fn eval_all(env: &Environment, lines: &[&str]) -> String {
    let mut last = String::new();
    for line in lines {
        last = match run_source(line, env) {
            Ok(result) => result.to_string(),
            Err(e) => format!("Error: {e}"),
        };
    }
    last
}

fn error_kind(env: &Environment, expr: &str) -> ErrorKind {
    match run_source(expr, env) {
        Ok(value) => panic!("expected {expr} to fail, got {value}"),
        Err(e) => e.kind(),
    }
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval_expr("(+ 2 (* 3 4))"), "14");
    assert_eq!(eval_expr("(- 10 4 3)"), "3");
    assert_eq!(eval_expr("(- 7)"), "-7");
    assert_eq!(eval_expr("(/ 6 3)"), "2.0");
    assert_eq!(eval_expr("(/ 1 2)"), "0.5");
    assert_eq!(eval_expr("(+ 1.5 2)"), "3.5");
}

#[test]
fn test_comparisons() {
    assert_eq!(eval_expr("(> 3 2)"), "@t");
    assert_eq!(eval_expr("(> 3 2 2)"), "@f");
    assert_eq!(eval_expr("(<= 1 1 2)"), "@t");
    assert_eq!(eval_expr("(=? 2 2.0)"), "@t");
    assert_eq!(eval_expr("(=? (list 1 2) (list 1 2))"), "@t");
    assert_eq!(eval_expr("(not (< 1 2))"), "@f");
}

#[test]
fn test_if() {
    assert_eq!(eval_expr("(if (> 3 2) 1 0)"), "1");
    assert_eq!(eval_expr("(if (< 3 2) 1 0)"), "0");
    // No truthiness: anything but @t takes the second branch
    assert_eq!(eval_expr("(if 1 2 3)"), "3");
    assert_eq!(eval_expr("(if nil 2 3)"), "3");
    // The untaken branch is never evaluated
    assert_eq!(eval_expr("(if @t 1 undefined-name)"), "1");
}

#[test]
fn test_and_or_short_circuit() {
    assert_eq!(eval_expr("(and @t (> 2 1))"), "@t");
    assert_eq!(eval_expr("(and @f undefined-name)"), "@f");
    assert_eq!(eval_expr("(or @f (> 2 1))"), "@t");
    assert_eq!(eval_expr("(or @t undefined-name)"), "@t");
    assert_eq!(eval_expr("(and)"), "@t");
    assert_eq!(eval_expr("(or)"), "@f");
    assert_eq!(eval_expr("(and true false)"), "@f");
}

#[test]
fn test_define_returns_value() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(:= x 7)"]), "7");
    assert_eq!(eval_all(&env, &["(* x 2)"]), "14");
}

#[test]
fn test_function_definition_sugar() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(:= (square x) (* x x))", "(square 5)"]), "25");
    assert_eq!(eval_all(&env, &["square"]), "<function (x)>");
    env.clear();
}

#[test]
fn test_curried_definition_sugar() {
    let env = make_global_env();
    assert_eq!(
        eval_all(&env, &["(:= ((adder a) b) (+ a b))", "((adder 2) 3)"]),
        "5"
    );
    env.clear();
}

#[test]
fn test_recursion() {
    let env = make_global_env();
    let result = eval_all(
        &env,
        &[
            "(:= (fact n) (if (<= n 1) 1 (* n (fact (- n 1)))))",
            "(fact 20)",
        ],
    );
    assert_eq!(result, "2432902008176640000");
    // Integers grow past 64 bits
    assert_eq!(eval_all(&env, &["(fact 25)"]), "15511210043330985984000000");
    env.clear();
}

#[test]
fn test_let() {
    assert_eq!(eval_expr("(let ((x 2) (y 3)) (+ x y))"), "5");
    assert_eq!(eval_expr("(let () 4)"), "4");
}

#[test]
fn test_let_bindings_are_parallel() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(:= x 1)", "(let ((x 10) (y x)) y)"]), "1");
}

#[test]
fn test_let_scope_ends_with_body() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(let ((y 3)) y)"]), "3");
    assert_eq!(error_kind(&env, "y"), ErrorKind::Name);
}

#[test]
fn test_function_locals_invisible_outside() {
    let env = make_global_env();
    eval_all(&env, &["(:= (f a) (let ((b 2)) (+ a b)))", "(f 1)"]);
    assert_eq!(error_kind(&env, "a"), ErrorKind::Name);
    assert_eq!(error_kind(&env, "b"), ErrorKind::Name);
    env.clear();
}

#[test]
fn test_set_bang_mutates_outer_binding() {
    let env = make_global_env();
    let result = eval_all(
        &env,
        &["(:= x 1)", "(:= (bump) (set! x (+ x 1)))", "(bump)", "(bump)", "x"],
    );
    assert_eq!(result, "3");
    env.clear();
}

#[test]
fn test_set_bang_requires_existing_binding() {
    let env = make_global_env();
    assert_eq!(error_kind(&env, "(set! nope 1)"), ErrorKind::Name);
    assert_eq!(error_kind(&env, "(set! + 1)"), ErrorKind::Name);
    assert_eq!(eval_all(&env, &["(+ 1 2)"]), "3");
}

#[test]
fn test_closures_capture_defining_environment() {
    let env = make_global_env();
    let result = eval_all(
        &env,
        &[
            "(:= (make-adder n) (function (x) (+ x n)))",
            "(:= add5 (make-adder 5))",
            "(:= n 100)",
            "(add5 1)",
        ],
    );
    assert_eq!(result, "6");
    env.clear();
}

#[test]
fn test_closure_private_state() {
    let env = make_global_env();
    let result = eval_all(
        &env,
        &[
            "(:= (make-counter) (let ((n 0)) (function () (begin (set! n (+ n 1)) n))))",
            "(:= c1 (make-counter))",
            "(:= c2 (make-counter))",
            "(c1)",
            "(c1)",
            "(c2)",
            "(c1)",
        ],
    );
    assert_eq!(result, "3");
    assert_eq!(error_kind(&env, "n"), ErrorKind::Name);
    env.clear();
}

#[test]
fn test_anonymous_function_application() {
    assert_eq!(eval_expr("((function (x y) (- x y)) 10 4)"), "6");
    assert_eq!(eval_expr("((function () 42))"), "42");
}

#[test]
fn test_arity_enforced() {
    let env = make_global_env();
    eval_all(&env, &["(:= (two a b) a)"]);
    assert_eq!(error_kind(&env, "(two 1)"), ErrorKind::Evaluation);
    assert_eq!(error_kind(&env, "(two 1 2 3)"), ErrorKind::Evaluation);
    assert_eq!(eval_all(&env, &["(two 1 2)"]), "1");
    env.clear();
}

#[test]
fn test_del() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(:= x 5)", "(del x)"]), "5");
    assert_eq!(error_kind(&env, "x"), ErrorKind::Name);
    assert_eq!(error_kind(&env, "(del x)"), ErrorKind::Name);
}

#[test]
fn test_del_only_touches_current_frame() {
    let env = make_global_env();
    eval_all(&env, &["(:= x 5)"]);
    assert_eq!(error_kind(&env, "((function () (del x)))"), ErrorKind::Name);
    assert_eq!(eval_all(&env, &["x"]), "5");
    assert_eq!(eval_all(&env, &["((function (x) (del x)) 9)"]), "9");
    assert_eq!(eval_all(&env, &["x"]), "5");
}

#[test]
fn test_special_forms_cannot_be_shadowed() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &["(:= if 5)", "(if @t 1 2)"]), "1");
    assert_eq!(eval_all(&env, &["if"]), "5");
}

#[test]
fn test_invalid_names() {
    let env = make_global_env();
    assert_eq!(error_kind(&env, "(:= 3 4)"), ErrorKind::Name);
    assert_eq!(error_kind(&env, "(let ((2 1)) 2)"), ErrorKind::Name);
    assert_eq!(error_kind(&env, "(function (1) 1)"), ErrorKind::Name);
}

#[test]
fn test_evaluation_errors() {
    let env = make_global_env();
    for expr in ["()", "(1 2)", "(head 5)", "(/)", "(+ 1 @t)", "(nth (list 1) 4)"] {
        assert_eq!(error_kind(&env, expr), ErrorKind::Evaluation, "{expr}");
    }
}

#[test]
fn test_syntax_errors() {
    let env = make_global_env();
    for expr in ["(+ 1 2", "(+ 1 2))", ")", "f(x)", "(+ 1 2) (+ 3 4)", ""] {
        assert_eq!(error_kind(&env, expr), ErrorKind::Syntax, "{expr:?}");
    }
}

#[test]
fn test_unbound_name() {
    let env = make_global_env();
    let err = run_source("(undefined-fn 1)", &env).unwrap_err();
    assert_eq!(err, CarlaeError::name("name 'undefined-fn' is not defined"));
}

#[test]
fn test_comments_and_newlines() {
    let source = "# compute a sum\n(+ 1   # first\n   2)\n";
    assert_eq!(eval_expr(source), "3");
}

#[test]
fn test_environments_are_independent() {
    let a = make_global_env();
    let b = make_global_env();
    eval_all(&a, &["(:= only-in-a 1)"]);
    assert_eq!(error_kind(&b, "only-in-a"), ErrorKind::Name);
}

#[test]
fn test_errors_leave_session_usable() {
    let env = make_global_env();
    eval_all(&env, &["(:= x 10)"]);
    assert_eq!(error_kind(&env, "(+ x (head nil))"), ErrorKind::Evaluation);
    assert_eq!(eval_all(&env, &["(+ x 1)"]), "11");
}

// ============================================================================
// Deep Recursion
// ============================================================================

const COUNT_DOWN: &str = "(:= (count-down n) (if (=? n 0) 0 (+ 1 (count-down (- n 1)))))";

#[test]
fn test_deep_recursion_on_default_thread() {
    let env = make_global_env();
    assert_eq!(eval_all(&env, &[COUNT_DOWN, "(count-down 3000)"]), "3000");
    env.clear();
}

#[test]
fn test_runaway_recursion_is_an_evaluation_error() {
    let env = make_global_env();
    eval_all(&env, &[COUNT_DOWN]);
    let err = run_source("(count-down 5000)", &env).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert!(err.message().contains("maximum recursion depth"));
    // The session is still usable afterwards
    assert_eq!(eval_all(&env, &["(count-down 10)"]), "10");
    env.clear();
}

#[test]
fn test_deeply_nested_source() {
    let nested = |levels: usize| format!("{}1{}", "(- ".repeat(levels), ")".repeat(levels));
    assert_eq!(eval_expr(&nested(500)), "1");
    assert_eq!(error_kind(&make_global_env(), &nested(200_000)), ErrorKind::Syntax);
}
