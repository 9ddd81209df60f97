//! Command-line overrides outrank `default_options` regardless of which
//! one is applied first — the precedence `OptionTable::set` enforces via
//! `Source`'s declared ordering.

use kiln_vm::{OptionTable, OptionValue, Source};

#[test]
fn command_line_wins_when_applied_before_default_options() {
    let mut table = OptionTable::with_standard_options();
    table.set("buildtype", OptionValue::String("release".to_string()), Source::CommandLine).unwrap();
    table.set("buildtype", OptionValue::String("debug".to_string()), Source::DefaultOptions).unwrap();
    assert_eq!(table.get("buildtype").unwrap().value, OptionValue::String("release".to_string()));
}

#[test]
fn command_line_wins_when_applied_after_default_options() {
    let mut table = OptionTable::with_standard_options();
    table.set("buildtype", OptionValue::String("debug".to_string()), Source::DefaultOptions).unwrap();
    table.set("buildtype", OptionValue::String("release".to_string()), Source::CommandLine).unwrap();
    assert_eq!(table.get("buildtype").unwrap().value, OptionValue::String("release".to_string()));
}
