use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use crossterm::event::MouseEvent;
use crossterm::event::MouseEventKind;
use lazytf_core::OperationKind;
use lazytf_core::UserAction;

/// Maps a key press to its semantic action. Releases and repeats map to nothing.
pub fn map_key(key: KeyEvent) -> Option<UserAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(match key.code {
            KeyCode::Char('c') => UserAction::GracefulQuit,
            _ => UserAction::Unbound,
        });
    }

    let action = match key.code {
        KeyCode::Char('q') => UserAction::Quit,
        KeyCode::Char('c') => UserAction::Cancel,
        KeyCode::Char('?') => UserAction::ToggleHelp,
        KeyCode::Char('z') => UserAction::ToggleFullscreen,
        KeyCode::Esc => UserAction::Dismiss,
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => UserAction::FocusNext,
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => UserAction::FocusPrev,
        KeyCode::Up | KeyCode::Char('k') => UserAction::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => UserAction::MoveDown,
        KeyCode::PageUp => UserAction::PageUp,
        KeyCode::PageDown => UserAction::PageDown,
        KeyCode::Home | KeyCode::Char('g') => UserAction::ScrollTop,
        KeyCode::End | KeyCode::Char('G') => UserAction::ScrollBottom,
        KeyCode::Enter => UserAction::Activate,
        KeyCode::Char('a') => UserAction::Run(OperationKind::Authenticate),
        KeyCode::Char('s') => UserAction::Run(OperationKind::StatusCheck),
        KeyCode::Char('r') => UserAction::Run(OperationKind::Refresh),
        KeyCode::Char('w') => UserAction::Run(OperationKind::WorkspaceList),
        KeyCode::Char('i') => UserAction::Run(OperationKind::Init),
        KeyCode::Char('p') => UserAction::Run(OperationKind::Plan),
        KeyCode::Char('A') => UserAction::BeginApply,
        KeyCode::Char('y') => UserAction::ConfirmApply,
        _ => UserAction::Unbound,
    };
    Some(action)
}

pub fn map_mouse(mouse: MouseEvent) -> Option<UserAction> {
    match mouse.kind {
        MouseEventKind::ScrollUp => Some(UserAction::WheelUp),
        MouseEventKind::ScrollDown => Some(UserAction::WheelDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyEventState;
    use pretty_assertions::assert_eq;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn aliases_map_to_the_same_action() {
        for (left, right) in [
            (KeyCode::Up, KeyCode::Char('k')),
            (KeyCode::Down, KeyCode::Char('j')),
            (KeyCode::Tab, KeyCode::Char('l')),
            (KeyCode::BackTab, KeyCode::Char('h')),
            (KeyCode::Home, KeyCode::Char('g')),
            (KeyCode::End, KeyCode::Char('G')),
        ] {
            assert_eq!(map_key(press(left)), map_key(press(right)));
        }
    }

    #[test]
    fn apply_needs_two_distinct_keys() {
        assert_eq!(map_key(press(KeyCode::Char('A'))), Some(UserAction::BeginApply));
        assert_eq!(map_key(press(KeyCode::Char('y'))), Some(UserAction::ConfirmApply));
        assert_eq!(
            map_key(press(KeyCode::Char('p'))),
            Some(UserAction::Run(OperationKind::Plan))
        );
    }

    #[test]
    fn ctrl_c_is_graceful_quit_and_plain_c_cancels() {
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UserAction::GracefulQuit)
        );
        assert_eq!(map_key(press(KeyCode::Char('c'))), Some(UserAction::Cancel));
        assert_eq!(map_key(press(KeyCode::F(5))), Some(UserAction::Unbound));
    }

    #[test]
    fn key_release_is_ignored() {
        let release = KeyEvent::new_with_kind_and_state(
            KeyCode::Char('p'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
            KeyEventState::NONE,
        );
        assert_eq!(map_key(release), None);
    }
}
