use std::str::FromStr;

use qsw_core::{
    FailureKind, InvocationFailure, Mode, ParameterRange, ResultRecord, ResultSet, ResultSets,
};

#[test]
fn mode_tokens_are_fixed() {
    assert_eq!(Mode::Uniform.token(), "1");
    assert_eq!(Mode::NonUniform.token(), "2");
    assert_eq!(Mode::from_token("2"), Some(Mode::NonUniform));
    assert_eq!(Mode::from_token("3"), None);
}

#[test]
fn mode_parses_names_and_tokens() {
    assert_eq!(Mode::from_str("uniform").expect("name"), Mode::Uniform);
    assert_eq!(Mode::from_str(" 2 ").expect("token"), Mode::NonUniform);
    let err = Mode::from_str("median-cut").expect_err("unknown");
    assert_eq!(err.info().code, "unknown_mode");
}

#[test]
fn mode_serde_accepts_tokens_as_aliases() {
    let modes: Vec<Mode> = serde_json::from_str(r#"["1", "non-uniform"]"#).expect("modes");
    assert_eq!(modes, vec![Mode::Uniform, Mode::NonUniform]);
    assert_eq!(
        serde_json::to_string(&Mode::NonUniform).expect("json"),
        "\"non-uniform\""
    );
}

#[test]
fn mode_serde_accepts_bare_integer_tokens() {
    let modes: Vec<Mode> = serde_json::from_str("[2, 1]").expect("integer tokens");
    assert_eq!(modes, vec![Mode::NonUniform, Mode::Uniform]);
    assert!(serde_json::from_str::<Mode>("3").is_err());
    assert!(serde_json::from_str::<Mode>("-1").is_err());
    assert!(serde_json::from_str::<Mode>("\"median-cut\"").is_err());
}

#[test]
fn range_is_inclusive() {
    let range = ParameterRange::new(2, 256);
    assert_eq!(range.len(), 255);
    assert_eq!(range.iter().next(), Some(2));
    assert_eq!(range.iter().last(), Some(256));
    assert!(ParameterRange::new(7, 7).validate().is_ok());
    let err = ParameterRange::new(8, 7).validate().expect_err("empty");
    assert_eq!(err.info().code, "empty_range");
    assert!(ParameterRange::new(8, 7).is_empty());
}

#[test]
fn result_set_pairs_are_sorted() {
    let mut set = ResultSet::new(Mode::Uniform);
    set.push(ResultRecord::parsed(9, Some(3)));
    set.push(ResultRecord::failed(
        4,
        InvocationFailure::new(FailureKind::Timeout, "killed after 1s"),
    ));
    set.push(ResultRecord::parsed(6, None));
    assert_eq!(set.pairs(), vec![(4, None), (6, None), (9, Some(3))]);
    assert_eq!(set.parameters(), vec![9, 4, 6]);
    assert!(set.get(9).expect("record").is_measured());
    assert_eq!(set.canonical().parameters(), vec![4, 6, 9]);
}

#[test]
fn result_sets_serialize_keyed_by_mode() {
    let mut sets = ResultSets::new();
    let mut uniform = ResultSet::new(Mode::Uniform);
    uniform.push(ResultRecord::parsed(2, Some(10)));
    sets.insert(uniform);
    sets.insert(ResultSet::new(Mode::NonUniform));

    let json = serde_json::to_value(&sets).expect("json");
    assert_eq!(json["uniform"]["records"][0]["measurement"], 10);
    assert!(json["uniform"]["records"][0].get("failure").is_none());
    assert_eq!(json["non-uniform"]["records"].as_array().map(Vec::len), Some(0));

    let decoded: ResultSets = serde_json::from_value(json).expect("decode");
    assert_eq!(decoded, sets);
    assert_eq!(decoded.modes(), vec![Mode::Uniform, Mode::NonUniform]);
    assert_eq!(decoded.total_records(), 1);
}
