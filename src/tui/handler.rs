use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone)]
pub enum AppAction {
    Quit,
    SignOut,
    MoveUp,
    MoveDown,
    Refresh,
    NewBookmark,
    DeleteBookmark,
    ShowHelp,
    HideHelp,
    // Add-bookmark form actions
    FormChar(char),
    FormBackspace,
    FormNextField,
    FormConfirm,
    FormCancel,
}

pub fn handle_key_event(key: KeyEvent, form_active: bool, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    // Add-bookmark form mode
    if form_active {
        return match key.code {
            KeyCode::Enter => Some(AppAction::FormConfirm),
            KeyCode::Esc => Some(AppAction::FormCancel),
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => Some(AppAction::FormNextField),
            KeyCode::Backspace => Some(AppAction::FormBackspace),
            KeyCode::Char(c) => Some(AppAction::FormChar(c)),
            _ => None,
        };
    }

    // Normal mode
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),

        (KeyCode::Char('a'), _) | (KeyCode::Char('n'), _) => Some(AppAction::NewBookmark),
        (KeyCode::Char('d'), KeyModifiers::NONE) => Some(AppAction::DeleteBookmark),
        (KeyCode::Char('r'), _) => Some(AppAction::Refresh),
        (KeyCode::Char('s'), KeyModifiers::NONE) => Some(AppAction::SignOut),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}
