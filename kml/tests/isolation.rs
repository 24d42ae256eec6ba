use kml::{Kml, Matrix, Value};

fn seeded() -> Kml {
    let mut kml = Kml::new();
    kml.bind("m1", "identity(2,2)").unwrap();
    kml.bind("m2", "constant(2,2,3)").unwrap();
    kml
}

fn names(kml: &Kml) -> Vec<String> {
    kml.matrices().list()
}

#[test]
fn successful_programs_leave_the_cache_unchanged() {
    let mut kml = seeded();
    let before = names(&kml);
    for source in [
        "a = m1 + m2; b = a * a; |b|",
        "m1 = 2 m1; m1",
        "m1 = m2; m2 = m1 * 2; m1 + m2",
        "x = zero(1,1);",
    ] {
        kml.run(source).unwrap();
        assert_eq!(names(&kml), before, "after `{source}`");
    }
    assert_eq!(kml.matrices().lookup("m1").unwrap(), &Matrix::identity(2, 2));
    assert_eq!(kml.matrices().lookup("m2").unwrap(), &Matrix::constant(2, 2, 3.0));
}

#[test]
fn failing_programs_leave_the_cache_unchanged() {
    let mut kml = seeded();
    let before = names(&kml);
    for source in [
        "a = m1; b = nothing; a",
        "a = m1; a = zero(2,3) * m1; a",
        "m1 = zero(2,2); m1^-1",
        "m1 = m1; m2 = m1; trace(zero(2,3))",
        "a = m1; trace(a + identity(3,3))",
        "a = m1; b = A; a",
    ] {
        assert!(kml.run(source).is_err(), "`{source}` should fail");
        assert_eq!(names(&kml), before, "after `{source}`");
    }
    assert_eq!(kml.matrices().lookup("m1").unwrap(), &Matrix::identity(2, 2));
}

#[test]
fn assignment_may_not_shadow_a_function() {
    let mut kml = seeded();
    let err = kml.run("Trace = m1; 1").unwrap_err();
    assert!(err.is_name_collision());
    assert_eq!(
        err.to_string(),
        "Trace collides with the existing Function trace. Names are compared without regard to letter case."
    );
}

#[test]
fn names_differing_in_case_collide() {
    let mut kml = seeded();
    assert!(kml.bind("M1", "zero(1,1)").unwrap_err().is_name_collision());
    assert!(kml.run("M1 = zero(1,1); 1").unwrap_err().is_name_collision());
    assert_eq!(names(&kml), vec!["m1".to_string(), "m2".to_string()]);
}

#[test]
fn repeated_assignment_restores_the_original() {
    let mut kml = seeded();
    let value = kml.run("m1 = 2 m1; m1 = 3 m1; m1 = 4 m1; trace(m1)").unwrap();
    assert_eq!(value, Some(Value::Number(48.0)));
    assert_eq!(kml.matrices().lookup("m1").unwrap(), &Matrix::identity(2, 2));
}
