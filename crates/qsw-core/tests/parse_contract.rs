use proptest::prelude::*;
use qsw_core::{parse_measurement, MeasurementParser};

#[test]
fn documented_examples() {
    assert_eq!(parse_measurement("Error: 0"), Some(0));
    assert_eq!(parse_measurement("computed=12345 done"), Some(12345));
    assert_eq!(parse_measurement("no numbers here"), None);
    assert_eq!(parse_measurement(""), None);
}

#[test]
fn first_run_wins_over_later_runs() {
    let output = "Number of command line arguments: 5\nQ: 1\nB: 125\nTotal Error Sum: 98765\n";
    assert_eq!(parse_measurement(output), Some(5));
}

#[test]
fn sign_and_decimal_point_are_not_interpreted() {
    assert_eq!(parse_measurement("delta=-12.75"), Some(12));
}

#[test]
fn marker_anchors_search() {
    let output = "Number of command line arguments: 5\nB: 125\nTotal Error Sum: 98765\n";
    let parser = MeasurementParser::with_marker("Total Error Sum:");
    assert_eq!(parser.parse(output), Some(98765));
    assert_eq!(parser.parse("Number of command line arguments: 5\n"), None);
}

#[test]
fn empty_marker_behaves_like_plain_rule() {
    let parser = MeasurementParser::with_marker("");
    assert_eq!(parser.parse("a1b2"), Some(1));
    assert_eq!(MeasurementParser::new().parse("a1b2"), Some(1));
}

proptest! {
    #[test]
    fn number_surrounded_by_noise_is_found(
        prefix in "[a-zA-Z :=\\-\\n]{0,24}",
        value in any::<u64>(),
        suffix in "[a-zA-Z0-9 .\\n]{0,24}",
    ) {
        let output = format!("{prefix}{value} {suffix}");
        prop_assert_eq!(parse_measurement(&output), Some(value));
    }

    #[test]
    fn digit_free_text_has_no_measurement(text in "[^0-9]{0,64}") {
        prop_assert_eq!(parse_measurement(&text), None);
    }
}
