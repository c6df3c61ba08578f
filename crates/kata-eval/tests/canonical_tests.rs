//! Canonical result forms, builtins, and benchmarking.
//!
//! Test results are judged on the canonical JSON of the returned value, so
//! these tests pin the exact text produced for typical kata answers.

use kata_eval::{
    to_canonical_json, to_json_value, BenchmarkConfig, ExecutionError, Sandbox, SandboxConfig,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn canonical(source: &str, call: &str) -> Option<String> {
    let evaluation = Sandbox::default()
        .evaluate(source, call)
        .unwrap_or_else(|e| panic!("evaluation failed: {e}"));
    to_canonical_json(&evaluation.value)
}

fn eval(source: &str) -> String {
    canonical(source, "").unwrap_or_else(|| "undefined".to_string())
}

// ══════════════════════════════════════════════════════════════════════════════
// Canonical form
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn canonical_form_matches_json_stringify() {
    let cases = [
        "[1, 'two', null, true, { a: [3] }]",
        "({ z: 1, a: 2, m: { y: [], x: {} } })",
        "[1e21, 1e-7, -0, 0.5, 123456789012]",
        "'quote \" backslash \\\\ newline \\n'",
        "[undefined, function () {}, NaN, Infinity]",
        "({ keep: 1, drop: undefined, fn: () => 1 })",
    ];
    for case in cases {
        let direct = eval(case);
        let stringified = eval(&format!("JSON.stringify({case})"));
        assert_eq!(
            serde_json::from_str::<String>(&stringified).ok().as_deref(),
            Some(direct.as_str()),
            "{case}"
        );
    }
}

#[test]
fn number_formatting() {
    assert_eq!(eval("[1e21, 1e-7, -0, 100, 2.5e-3]"), "[1e+21,1e-7,0,100,0.0025]");
    assert_eq!(eval("0.1 * 3"), "0.30000000000000004");
    assert_eq!(eval("2 ** 53 + 1"), "9007199254740992");
}

#[test]
fn key_order_is_insertion_order() {
    assert_eq!(
        eval("const o = {}; o.b = 1; o.a = 2; o.c = 3; o.b = 4; o"),
        r#"{"b":4,"a":2,"c":3}"#
    );
}

#[test]
fn integer_keys_enumerate_first() {
    let source = "
        function count(text) {
            const seen = {};
            for (const c of text) seen[c] = (seen[c] || 0) + 1;
            return seen;
        }";
    assert_eq!(
        canonical(source, "count('3121')").as_deref(),
        Some(r#"{"1":2,"2":1,"3":1}"#)
    );
    assert_eq!(
        eval("Object.keys({ b: 1, 2: 2, a: 3, 1: 4, '01': 5 })"),
        r#"["1","2","b","a","01"]"#
    );
    assert_eq!(
        eval("const keys = []; for (const k in { x: 1, 10: 1, 9: 1 }) keys.push(k); keys"),
        r#"["9","10","x"]"#
    );
}

#[test]
fn structured_form_for_reports() {
    let evaluation = Sandbox::default()
        .evaluate("({ total: 3, items: ['a', 'b'] })", "")
        .unwrap();
    assert_eq!(
        to_json_value(&evaluation.value),
        serde_json::json!({ "total": 3, "items": ["a", "b"] })
    );
    let evaluation = Sandbox::default().evaluate("undefined", "").unwrap();
    assert_eq!(to_json_value(&evaluation.value), serde_json::Value::Null);
}

#[test]
fn circular_values_fail_json_stringify() {
    let err = Sandbox::default()
        .evaluate("const a = []; a.push(a); JSON.stringify(a)", "")
        .unwrap_err();
    assert!(err.to_string().starts_with("TypeError"), "{err}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Typical kata solutions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn reverse_string() {
    let source = "function reverse(s) { return s.split('').reverse().join(''); }";
    assert_eq!(canonical(source, "reverse('hello')").as_deref(), Some(r#""olleh""#));
}

#[test]
fn two_sum_with_objects() {
    let source = "
        function twoSum(nums, target) {
            const seen = {};
            for (let i = 0; i < nums.length; i++) {
                const need = target - nums[i];
                if (seen.hasOwnProperty(need)) return [seen[need], i];
                seen[nums[i]] = i;
            }
            return null;
        }";
    assert_eq!(canonical(source, "twoSum([2, 7, 11, 15], 9)").as_deref(), Some("[0,1]"));
    assert_eq!(canonical(source, "twoSum([1, 2], 10)").as_deref(), Some("null"));
}

#[test]
fn word_frequency() {
    let source = "
        function freq(text) {
            return text.toLowerCase().split(' ').reduce((acc, w) => {
                acc[w] = (acc[w] || 0) + 1;
                return acc;
            }, {});
        }";
    assert_eq!(
        canonical(source, "freq('a B a c b')").as_deref(),
        Some(r#"{"a":2,"b":2,"c":1}"#)
    );
}

#[test]
fn sorting_and_array_builtins() {
    assert_eq!(eval("[10, 9, 1, 2].sort()"), "[1,10,2,9]");
    assert_eq!(eval("[10, 9, 1, 2].sort((a, b) => a - b)"), "[1,2,9,10]");
    assert_eq!(eval("[[1, [2]], [3]].flat()"), "[1,[2],3]");
    assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * i)"), "[0,1,4]");
    assert_eq!(eval("[1, 2, 3].includes(2) && [1, 2, 3].indexOf(4)"), "-1");
    assert_eq!(eval("Object.entries({ a: 1, b: 2 })"), r#"[["a",1],["b",2]]"#);
}

#[test]
fn string_builtins() {
    assert_eq!(eval("'abc'.padStart(5, '-')"), r#""--abc""#);
    assert_eq!(eval("'a-b-c'.replaceAll('-', '+')"), r#""a+b+c""#);
    assert_eq!(eval("' x '.trim().repeat(3)"), r#""xxx""#);
    assert_eq!(eval("'héllo'.length"), "5");
    assert_eq!(eval("(3.14159).toFixed(2)"), r#""3.14""#);
    assert_eq!(eval("(255).toString(16)"), r#""ff""#);
    assert_eq!(eval("parseInt('42px') + parseFloat('0.5')"), "42.5");
}

#[test]
fn math_builtins() {
    assert_eq!(eval("[Math.floor(-1.5), Math.round(2.5), Math.round(-2.5)]"), "[-2,3,-2]");
    assert_eq!(eval("Math.abs(-3) + Math.sqrt(16) + Math.min(5, 2)"), "9");
    assert_eq!(eval("const r = Math.random(); r >= 0 && r < 1"), "true");
}

// ══════════════════════════════════════════════════════════════════════════════
// Benchmarking
// ══════════════════════════════════════════════════════════════════════════════

fn quick() -> BenchmarkConfig {
    BenchmarkConfig {
        budget_ms: 5,
        min_samples: 3,
        max_samples: 50,
    }
}

#[test]
fn benchmark_collects_samples() {
    let source = "function sum(n) { let s = 0; for (let i = 0; i < n; i++) s += i; return s; }";
    let stats = Sandbox::default()
        .benchmark(source, "sum(100)", &quick())
        .unwrap();
    assert!(stats.samples >= 3 && stats.samples <= 50, "{stats:?}");
    assert!(stats.mean_s > 0.0);
    assert!(stats.rme >= 0.0);
}

#[test]
fn benchmark_reuses_the_loaded_context() {
    let source = "let calls = 0; function tick() { calls++; return calls; }";
    let config = BenchmarkConfig {
        budget_ms: 0,
        min_samples: 4,
        max_samples: 4,
    };
    let stats = Sandbox::default().benchmark(source, "tick()", &config).unwrap();
    assert_eq!(stats.samples, 4);
}

#[test]
fn benchmark_stops_on_throw() {
    let err = Sandbox::default()
        .benchmark("function f() { throw new Error('nope'); }", "f()", &quick())
        .unwrap_err();
    assert_eq!(err, ExecutionError::Runtime("Error: nope".to_string()));
}

#[test]
fn benchmark_gas_is_per_sample() {
    let sandbox = Sandbox::new(SandboxConfig {
        gas_limit: Some(10_000),
        ..SandboxConfig::default()
    });
    let source = "function loop() { for (let i = 0; i < 100; i++) {} }";
    let stats = sandbox.benchmark(source, "loop()", &quick()).unwrap();
    assert!(stats.samples >= 3);
}
