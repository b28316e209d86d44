use super::*;
use pretty_assertions::assert_eq;

#[test]
fn scrolling_is_bounded_by_output_length() {
    let mut fx = Fixture::new();
    fx.fill_output(25);
    fx.state.focus = FocusPanel::Output;

    fx.user(UserAction::PageUp);
    assert_eq!(fx.state.scroll_from_bottom, 10);
    fx.user(UserAction::PageUp);
    fx.user(UserAction::PageUp);
    assert_eq!(fx.state.scroll_from_bottom, 24);

    fx.user(UserAction::WheelDown);
    assert_eq!(fx.state.scroll_from_bottom, 21);
    fx.user(UserAction::MoveDown);
    assert_eq!(fx.state.scroll_from_bottom, 20);

    fx.user(UserAction::ScrollBottom);
    assert_eq!(fx.state.scroll_from_bottom, 0);
    fx.user(UserAction::PageDown);
    assert_eq!(fx.state.scroll_from_bottom, 0);

    fx.user(UserAction::ScrollTop);
    assert_eq!(fx.state.scroll_from_bottom, 24);
}

#[test]
fn scroll_keys_are_ignored_outside_output_panel() {
    let mut fx = Fixture::new();
    fx.fill_output(25);
    assert_eq!(fx.user(UserAction::PageUp), Vec::new());
    assert_eq!(fx.user(UserAction::WheelUp), Vec::new());
    assert_eq!(fx.state.scroll_from_bottom, 0);
}

#[test]
fn scrolling_never_touches_execution_state() {
    let mut fx = Fixture::new();
    let id = fx.start_running(OperationKind::Plan);
    fx.fill_output(5);
    fx.state.focus = FocusPanel::Output;
    let phase = fx.slot.phase();

    for action in [
        UserAction::PageUp,
        UserAction::ScrollTop,
        UserAction::MoveUp,
        UserAction::ScrollBottom,
    ] {
        let effects = fx.user(action);
        assert_eq!(effects, vec![DashboardEffect::RequestFrame]);
    }
    assert_eq!(fx.slot.phase(), phase);
    assert_eq!(fx.slot.current().map(|current| current.id()), Some(id));
}

#[test]
fn empty_output_cannot_scroll() {
    let mut fx = Fixture::new();
    fx.state.focus = FocusPanel::Output;
    fx.user(UserAction::PageUp);
    assert_eq!(fx.state.scroll_from_bottom, 0);
}
