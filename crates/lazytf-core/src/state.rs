use super::actions::ActionItem;
use super::actions::ACTION_ITEMS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPanel {
    Accounts,
    Actions,
    Workspaces,
    Output,
}

impl FocusPanel {
    pub fn next(self) -> Self {
        match self {
            Self::Accounts => Self::Actions,
            Self::Actions => Self::Workspaces,
            Self::Workspaces => Self::Output,
            Self::Output => Self::Accounts,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Accounts => Self::Output,
            Self::Actions => Self::Accounts,
            Self::Workspaces => Self::Actions,
            Self::Output => Self::Workspaces,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Actions => "actions",
            Self::Workspaces => "workspaces",
            Self::Output => "output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    None,
    Help,
    ApplyConfirm {
        account: String,
        workspace: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unknown,
    Checking,
    Ready,
    Failed,
}

impl AuthStatus {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Unknown => "?",
            Self::Checking => "~",
            Self::Ready => "*",
            Self::Failed => "x",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Checking => "checking",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub name: String,
    pub auth: AuthStatus,
    pub identity: Option<CallerIdentity>,
    pub workspaces: Vec<String>,
    pub current_workspace: Option<String>,
    pub selected_workspace: Option<usize>,
}

impl AccountView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth: AuthStatus::Unknown,
            identity: None,
            workspaces: Vec::new(),
            current_workspace: None,
            selected_workspace: None,
        }
    }

    pub fn selected_workspace_name(&self) -> Option<&str> {
        self.selected_workspace
            .and_then(|idx| self.workspaces.get(idx))
            .map(String::as_str)
    }

    pub fn set_workspaces(&mut self, workspaces: Vec<String>, current: Option<String>) {
        let keep = self.selected_workspace_name().map(str::to_string);
        self.selected_workspace = keep
            .as_deref()
            .or(current.as_deref())
            .and_then(|name| workspaces.iter().position(|workspace| workspace == name));
        self.workspaces = workspaces;
        self.current_workspace = current;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub focus: FocusPanel,
    pub previous_focus: FocusPanel,
    pub fullscreen: bool,
    pub scroll_from_bottom: usize,
    pub modal: Modal,
    pub input_mode: InputMode,
    pub selected_account: usize,
    pub selected_action: usize,
    pub accounts: Vec<AccountView>,
    pub status_line: String,
}

impl DashboardState {
    pub fn new(account_names: Vec<String>) -> Self {
        Self {
            focus: FocusPanel::Accounts,
            previous_focus: FocusPanel::Accounts,
            fullscreen: false,
            scroll_from_bottom: 0,
            modal: Modal::None,
            input_mode: InputMode::Normal,
            selected_account: 0,
            selected_action: 0,
            accounts: account_names.into_iter().map(AccountView::new).collect(),
            status_line: "idle".to_string(),
        }
    }

    pub fn selected_account_name(&self) -> Option<&str> {
        self.accounts
            .get(self.selected_account)
            .map(|view| view.name.as_str())
    }

    pub fn selected_account_view(&self) -> Option<&AccountView> {
        self.accounts.get(self.selected_account)
    }

    pub fn selected_action_item(&self) -> Option<&'static ActionItem> {
        ACTION_ITEMS.get(self.selected_action)
    }

    pub fn account_view(&self, name: &str) -> Option<&AccountView> {
        self.accounts.iter().find(|view| view.name == name)
    }

    pub fn account_view_mut(&mut self, name: &str) -> Option<&mut AccountView> {
        self.accounts.iter_mut().find(|view| view.name == name)
    }

    pub fn quit_requested(&self) -> bool {
        self.input_mode == InputMode::Quitting
    }

    pub fn sync_accounts(&mut self, names: Vec<String>) {
        let selected = self.selected_account_name().map(str::to_string);
        let mut previous = std::mem::take(&mut self.accounts);
        self.accounts = names
            .into_iter()
            .map(|name| {
                let known = previous.iter().position(|view| view.name == name);
                match known {
                    Some(idx) => previous.swap_remove(idx),
                    None => AccountView::new(name),
                }
            })
            .collect();
        self.selected_account = selected
            .and_then(|name| self.accounts.iter().position(|view| view.name == name))
            .unwrap_or(0)
            .min(self.accounts.len().saturating_sub(1));
    }

    pub fn enter_fullscreen(&mut self) {
        if !self.fullscreen {
            self.previous_focus = self.focus;
        }
        self.fullscreen = true;
        self.focus = FocusPanel::Output;
    }

    pub fn exit_fullscreen(&mut self) {
        if !self.fullscreen {
            return;
        }
        self.fullscreen = false;
        self.focus = self.previous_focus;
    }

    pub fn toggle_fullscreen(&mut self) {
        if self.fullscreen {
            self.exit_fullscreen();
        } else {
            self.enter_fullscreen();
        }
    }
}
