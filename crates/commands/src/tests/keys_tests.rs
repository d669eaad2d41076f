use super::*;

#[test]
fn falls_back_to_default_binding() {
    let bindings = KeyBindings::new().with_override("pause", "space");
    assert_eq!(bindings.key("pause"), "space");
    assert_eq!(bindings.key("reset"), RESET_KEY);
    assert_eq!(bindings.key("unbound_command"), "unbound_command");
}

#[test]
fn resolved_table_merges_overrides() {
    let table = KeyBindings::new()
        .with_override("clip", "c")
        .with_override("custom", "x")
        .resolved();
    assert_eq!(table["clip"], "c");
    assert_eq!(table["custom"], "x");
    assert_eq!(table["close"], CLOSE_KEY);
}
