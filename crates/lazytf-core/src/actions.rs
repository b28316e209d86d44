use super::safety::OperationKind;
use super::state::AuthStatus;
use super::state::CallerIdentity;

#[derive(Debug, Clone)]
pub enum DashboardAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Quit,
    GracefulQuit,
    Cancel,
    ToggleHelp,
    ToggleFullscreen,
    FocusNext,
    FocusPrev,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,
    WheelUp,
    WheelDown,
    Run(OperationKind),
    BeginApply,
    ConfirmApply,
    Activate,
    Dismiss,
    Unbound,
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    AccountsReloaded(Vec<String>),
    AuthStatusChanged {
        account: String,
        status: AuthStatus,
    },
    IdentityLoaded {
        account: String,
        identity: CallerIdentity,
    },
    WorkspacesLoaded {
        account: String,
        workspaces: Vec<String>,
        current: Option<String>,
    },
    WorkspaceActivated {
        account: String,
        workspace: String,
    },
    SetStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionItem {
    pub kind: OperationKind,
    pub key: &'static str,
    pub title: &'static str,
}

pub const ACTION_ITEMS: &[ActionItem] = &[
    ActionItem {
        kind: OperationKind::Authenticate,
        key: "a",
        title: "AWS SSO login",
    },
    ActionItem {
        kind: OperationKind::StatusCheck,
        key: "s",
        title: "Check credentials",
    },
    ActionItem {
        kind: OperationKind::Refresh,
        key: "r",
        title: "Reload config",
    },
    ActionItem {
        kind: OperationKind::WorkspaceList,
        key: "w",
        title: "List workspaces",
    },
    ActionItem {
        kind: OperationKind::Init,
        key: "i",
        title: "terraform init",
    },
    ActionItem {
        kind: OperationKind::Plan,
        key: "p",
        title: "terraform plan",
    },
    ActionItem {
        kind: OperationKind::Apply,
        key: "A, y",
        title: "terraform apply",
    },
];
