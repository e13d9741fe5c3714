use hyperscore_dsl::{DslError, Program, MAX_NESTING_DEPTH};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

proptest! {
    #[test]
    fn compile_never_panics(source in "\\PC{0,80}") {
        let _ = Program::compile(&source);
    }

    #[test]
    fn compile_never_panics_on_layout_soup(
        source in "[ \\t\\n#:()\\[\\]{}'\"a-z0-9=<>.+*/%-]{0,60}"
    ) {
        let _ = Program::compile(&source);
    }

    #[test]
    fn nesting_limit_is_exact(depth in 0usize..(MAX_NESTING_DEPTH * 3)) {
        let source = format!("return {}1{}", "(".repeat(depth), ")".repeat(depth));
        match Program::compile(&source) {
            Ok(program) => {
                prop_assert!(depth < MAX_NESTING_DEPTH);
                prop_assert_eq!(program.run(&Map::new(), &Map::new()).unwrap(), 1.0);
            }
            Err(err) => {
                prop_assert!(depth >= MAX_NESTING_DEPTH);
                let too_deep = matches!(err, DslError::TooDeeplyNested { .. });
                prop_assert!(too_deep);
            }
        }
    }

    #[test]
    fn threshold_rule_matches_comparison(price in -1.0e6f64..1.0e6, limit in -1.0e6f64..1.0e6) {
        let program = Program::compile(
            "if attrs.get('价格', 0) < params['limit']:\n    return 1.0\nreturn 0.0",
        )
        .unwrap();
        let score = program
            .run(&attrs(json!({"价格": price})), &attrs(json!({"limit": limit})))
            .unwrap();
        prop_assert_eq!(score, if price < limit { 1.0 } else { 0.0 });
    }

    #[test]
    fn modulo_takes_sign_of_divisor(a in -1000i32..1000, b in 1i32..50) {
        let program = Program::compile(&format!("return {} % {}", a, b)).unwrap();
        let result = program.run(&Map::new(), &Map::new()).unwrap();
        prop_assert!((0.0..b as f64).contains(&result));
        prop_assert_eq!(result, a.rem_euclid(b) as f64);
    }
}

#[test]
fn compile_errors_carry_position() {
    let err = Program::compile("x = 1\nif x >:\n    return 1").unwrap_err();
    assert_eq!(err.position(), (2, Some(7)));
    assert!(matches!(err, DslError::UnexpectedToken { .. }));
}

fn assert_too_deep(source: &str) {
    let err = Program::compile(source).unwrap_err();
    assert!(
        matches!(err, DslError::TooDeeplyNested { line: 1, .. }),
        "unexpected error: {:?}",
        err
    );
    assert!(err.position().1.is_some());
}

#[test]
fn deeply_nested_bodies_fail_to_compile() {
    let depth = 10_000;
    assert_too_deep(&format!("return {}1{}", "(".repeat(depth), ")".repeat(depth)));
    assert_too_deep(&format!("return {}True", "not ".repeat(depth)));
    assert_too_deep(&format!("return {}1", "- ".repeat(depth)));
    assert_too_deep(&format!("return {}1{}", "[".repeat(depth), "]".repeat(depth)));
    assert_too_deep(&format!("{}True", "not ".repeat(depth)));
}

#[test]
fn unbalanced_brackets_fail_to_compile() {
    let err = Program::compile(&"(".repeat(10_000)).unwrap_err();
    assert_eq!(err.position().0, 1);
}
