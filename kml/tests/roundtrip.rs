use kml::{Expression, FunctionTable, Kml, Parser, Value};

const SOURCES: &[&str] = &[
    "5-1-2",
    "2(4-2)",
    "-(1+2)*3/-4",
    "--2 + +3",
    "abs(-4) 2",
    "|2 m - n|",
    "trace(m^T^-1) + dot(m, n)",
    "2*3*m",
    "m*2-n",
    "-m^T + ([[1,-2.5],[0.125,4]])",
    "(m + n) * (m - n)^-1 / 4",
    "constant(2,2,1.5) * identity(2,2) * m",
    "|m| m^T",
];

fn session() -> Kml {
    let mut kml = Kml::new();
    kml.bind("m", "[[2,1],[1,3]]").unwrap();
    kml.bind("n", "[[0,1],[-1,0]]").unwrap();
    kml
}

fn evaluate(kml: &Kml, expression: &Expression) -> Value {
    expression.evaluate(kml.matrices()).unwrap()
}

fn close(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x - y).abs() < 1e-9,
        (Value::Matrix(x), Value::Matrix(y)) => {
            x.rows() == y.rows()
                && x.columns() == y.columns()
                && x.to_row_major()
                    .iter()
                    .zip(y.to_row_major())
                    .all(|(p, q)| (p - q).abs() < 1e-9)
        }
        _ => false,
    }
}

#[test]
fn fully_parenthesized_rendering_reparses_to_the_same_value() {
    let kml = session();
    let functions = FunctionTable::default();
    for source in SOURCES {
        let original = Parser::new(&functions).parse_expression(source).unwrap();
        let rendered = original.render_fully_parenthesized();
        let reparsed = Parser::new(&functions)
            .parse_expression(&rendered)
            .unwrap_or_else(|err| panic!("`{rendered}` (from `{source}`) does not parse: {err}"));
        assert_eq!(original.kind(), reparsed.kind(), "{source}");
        assert!(
            close(&evaluate(&kml, &original), &evaluate(&kml, &reparsed)),
            "`{source}` and `{rendered}` disagree"
        );
    }
}

#[test]
fn memoization_is_transparent() {
    let kml = session();
    let functions = FunctionTable::default();
    let mut cache = kml::ExpressionCache::new(64);
    for source in SOURCES {
        let fresh = Parser::new(&functions).parse_expression(source).unwrap();
        let first = Parser::new(&functions)
            .with_expression_cache(&mut cache)
            .parse_expression(source)
            .unwrap();
        let cached = Parser::new(&functions)
            .with_expression_cache(&mut cache)
            .parse_expression(source)
            .unwrap();
        let fresh_value = evaluate(&kml, &fresh);
        assert!(close(&fresh_value, &evaluate(&kml, &first)), "{source}");
        assert!(close(&fresh_value, &evaluate(&kml, &cached)), "{source}");
        assert_eq!(fresh.render_compact(), cached.render_compact());
    }
    assert_eq!(cache.len(), SOURCES.len());
}

#[test]
fn case_distinguishes_cached_expressions() {
    let mut kml = Kml::new();
    kml.bind("a", "identity(2,2)").unwrap();
    assert!(kml.run("a").is_ok());
    let err = kml.run("A").unwrap_err();
    assert_eq!(err.to_string(), "Matrix A does not exist. Did you mean: a?");
    assert_eq!(kml.expression_cache().len(), 2);
}
