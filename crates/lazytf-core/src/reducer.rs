use super::actions::DashboardAction;
use super::actions::ACTION_ITEMS;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::classify::LineCategory;
use super::execution::ExecutionSlot;
use super::registry::AccountRegistry;
use super::safety::authorize_request;
use super::safety::ApplyConfirmation;
use super::safety::GateDecision;
use super::safety::OperationKind;
use super::state::DashboardState;
use super::state::FocusPanel;
use super::state::InputMode;
use super::state::Modal;

const PAGE_LINES: usize = 10;
const WHEEL_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEffect {
    RequestFrame,
    Start {
        kind: OperationKind,
        account: String,
        confirmation: Option<ApplyConfirmation>,
        workspace: Option<String>,
    },
    Cancel,
    Refresh,
    Acknowledge,
    Notice {
        category: LineCategory,
        text: String,
    },
    Exit,
}

fn notice(category: LineCategory, text: impl Into<String>) -> DashboardEffect {
    DashboardEffect::Notice {
        category,
        text: text.into(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardContext<'a> {
    pub registry: &'a AccountRegistry,
    pub slot: &'a ExecutionSlot,
}

impl DashboardContext<'_> {
    fn max_scroll(&self) -> usize {
        self.slot.output().len().saturating_sub(1)
    }
}

pub fn reduce(
    state: &mut DashboardState,
    ctx: DashboardContext<'_>,
    action: DashboardAction,
) -> Vec<DashboardEffect> {
    match action {
        DashboardAction::User(user) => reduce_user(state, ctx, user),
        DashboardAction::Runtime(runtime) => {
            reduce_runtime(state, runtime);
            Vec::new()
        }
    }
}

fn reduce_user(
    state: &mut DashboardState,
    ctx: DashboardContext<'_>,
    action: UserAction,
) -> Vec<DashboardEffect> {
    if action == UserAction::GracefulQuit {
        state.modal = Modal::None;
        return request_quit(state, ctx);
    }

    match &state.modal {
        Modal::Help => reduce_help(state, action),
        Modal::ApplyConfirm { account, workspace } => {
            let (account, workspace) = (account.clone(), workspace.clone());
            reduce_apply_confirm(state, account, workspace, action)
        }
        Modal::None => reduce_panels(state, ctx, action),
    }
}

// Help captures every key. Only the toggle, Esc and quit close it.
fn reduce_help(state: &mut DashboardState, action: UserAction) -> Vec<DashboardEffect> {
    match action {
        UserAction::ToggleHelp | UserAction::Dismiss | UserAction::Quit => {
            state.modal = Modal::None;
            vec![DashboardEffect::RequestFrame]
        }
        _ => Vec::new(),
    }
}

fn reduce_apply_confirm(
    state: &mut DashboardState,
    account: String,
    workspace: Option<String>,
    action: UserAction,
) -> Vec<DashboardEffect> {
    if matches!(action, UserAction::WheelUp | UserAction::WheelDown) {
        return Vec::new();
    }
    state.modal = Modal::None;
    if action == UserAction::ConfirmApply {
        state.status_line = format!("starting terraform apply for {account}");
        let confirmation = ApplyConfirmation::new(account.as_str());
        return vec![
            DashboardEffect::Start {
                kind: OperationKind::Apply,
                account,
                confirmation: Some(confirmation),
                workspace,
            },
            DashboardEffect::RequestFrame,
        ];
    }
    state.status_line = "apply cancelled".to_string();
    vec![
        notice(
            LineCategory::Notice,
            format!("Apply for `{account}` cancelled. Nothing was started."),
        ),
        DashboardEffect::RequestFrame,
    ]
}

fn reduce_panels(
    state: &mut DashboardState,
    ctx: DashboardContext<'_>,
    action: UserAction,
) -> Vec<DashboardEffect> {
    match action {
        UserAction::Quit | UserAction::GracefulQuit => request_quit(state, ctx),
        UserAction::Cancel => {
            if ctx.slot.is_busy() {
                vec![DashboardEffect::Cancel, DashboardEffect::RequestFrame]
            } else {
                vec![notice(LineCategory::Info, "Nothing is running.")]
            }
        }
        UserAction::ToggleHelp => {
            state.modal = Modal::Help;
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::ToggleFullscreen => {
            state.toggle_fullscreen();
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::FocusNext => {
            if !state.fullscreen {
                state.focus = state.focus.next();
            }
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::FocusPrev => {
            if !state.fullscreen {
                state.focus = state.focus.prev();
            }
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::MoveUp => {
            match state.focus {
                FocusPanel::Accounts => {
                    state.selected_account = state.selected_account.saturating_sub(1);
                }
                FocusPanel::Actions => {
                    state.selected_action = state.selected_action.saturating_sub(1);
                }
                FocusPanel::Workspaces => move_workspace(state, false),
                FocusPanel::Output => scroll_up(state, ctx, 1),
            }
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::MoveDown => {
            match state.focus {
                FocusPanel::Accounts => {
                    let max = state.accounts.len().saturating_sub(1);
                    state.selected_account = (state.selected_account + 1).min(max);
                }
                FocusPanel::Actions => {
                    let max = ACTION_ITEMS.len().saturating_sub(1);
                    state.selected_action = (state.selected_action + 1).min(max);
                }
                FocusPanel::Workspaces => move_workspace(state, true),
                FocusPanel::Output => scroll_down(state, 1),
            }
            vec![DashboardEffect::RequestFrame]
        }
        UserAction::PageUp => output_only(state, |state| scroll_up(state, ctx, PAGE_LINES)),
        UserAction::PageDown => output_only(state, |state| scroll_down(state, PAGE_LINES)),
        UserAction::WheelUp => output_only(state, |state| scroll_up(state, ctx, WHEEL_LINES)),
        UserAction::WheelDown => output_only(state, |state| scroll_down(state, WHEEL_LINES)),
        UserAction::ScrollTop => output_only(state, |state| {
            state.scroll_from_bottom = ctx.max_scroll();
        }),
        UserAction::ScrollBottom => output_only(state, |state| {
            state.scroll_from_bottom = 0;
        }),
        UserAction::Run(kind) => run(state, ctx, kind),
        UserAction::BeginApply => begin_apply(state, ctx),
        UserAction::ConfirmApply => vec![notice(
            LineCategory::Info,
            "No apply is pending. Press `A` to request one.",
        )],
        UserAction::Activate => match state.focus {
            FocusPanel::Accounts => {
                state.focus = FocusPanel::Actions;
                vec![DashboardEffect::RequestFrame]
            }
            FocusPanel::Actions => match state.selected_action_item() {
                Some(item) => run(state, ctx, item.kind),
                None => Vec::new(),
            },
            FocusPanel::Workspaces => {
                let chosen = state
                    .selected_account_view()
                    .and_then(|view| Some((view.name.clone(), view.selected_workspace_name()?)))
                    .map(|(account, workspace)| {
                        format!("Plan and apply for `{account}` will run in workspace `{workspace}`.")
                    });
                match chosen {
                    Some(text) => {
                        state.focus = FocusPanel::Actions;
                        vec![notice(LineCategory::Info, text), DashboardEffect::RequestFrame]
                    }
                    None => vec![notice(
                        LineCategory::Info,
                        "No workspaces listed. Press `w` to list them.",
                    )],
                }
            }
            FocusPanel::Output => Vec::new(),
        },
        UserAction::Dismiss => {
            state.exit_fullscreen();
            let mut effects = Vec::new();
            if ctx.slot.current().is_some_and(|current| !current.is_live()) {
                state.status_line = "idle".to_string();
                effects.push(DashboardEffect::Acknowledge);
            }
            effects.push(DashboardEffect::RequestFrame);
            effects
        }
        UserAction::Unbound => Vec::new(),
    }
}

fn output_only(
    state: &mut DashboardState,
    apply: impl FnOnce(&mut DashboardState),
) -> Vec<DashboardEffect> {
    if state.focus != FocusPanel::Output {
        return Vec::new();
    }
    apply(state);
    vec![DashboardEffect::RequestFrame]
}

fn move_workspace(state: &mut DashboardState, down: bool) {
    let Some(view) = state.accounts.get_mut(state.selected_account) else {
        return;
    };
    if view.workspaces.is_empty() {
        return;
    }
    let max = view.workspaces.len() - 1;
    view.selected_workspace = Some(match view.selected_workspace {
        Some(idx) if down => (idx + 1).min(max),
        Some(idx) => idx.saturating_sub(1),
        None => 0,
    });
}

fn scroll_up(state: &mut DashboardState, ctx: DashboardContext<'_>, lines: usize) {
    state.scroll_from_bottom = state
        .scroll_from_bottom
        .saturating_add(lines)
        .min(ctx.max_scroll());
}

fn scroll_down(state: &mut DashboardState, lines: usize) {
    state.scroll_from_bottom = state.scroll_from_bottom.saturating_sub(lines);
}

fn run(
    state: &mut DashboardState,
    ctx: DashboardContext<'_>,
    kind: OperationKind,
) -> Vec<DashboardEffect> {
    match kind {
        OperationKind::Apply => begin_apply(state, ctx),
        OperationKind::Refresh => vec![DashboardEffect::Refresh, DashboardEffect::RequestFrame],
        _ => {
            let Some(view) = state.selected_account_view() else {
                return vec![notice(LineCategory::Warning, "No account selected.")];
            };
            let workspace = kind
                .runs_in_workspace()
                .then(|| view.selected_workspace_name().map(str::to_string))
                .flatten();
            vec![
                DashboardEffect::Start {
                    kind,
                    account: view.name.clone(),
                    confirmation: None,
                    workspace,
                },
                DashboardEffect::RequestFrame,
            ]
        }
    }
}

fn begin_apply(state: &mut DashboardState, ctx: DashboardContext<'_>) -> Vec<DashboardEffect> {
    let Some(view) = state.selected_account_view() else {
        return vec![notice(LineCategory::Warning, "No account selected.")];
    };
    let account = view.name.clone();
    let workspace = view.selected_workspace_name().map(str::to_string);

    match authorize_request(ctx.registry, ctx.slot, &account, OperationKind::Apply) {
        GateDecision::Allow => {
            state.status_line = "apply confirmation pending: press y to confirm".to_string();
            let target = match &workspace {
                Some(workspace) => format!("`{account}` (workspace `{workspace}`)"),
                None => format!("`{account}`"),
            };
            state.modal = Modal::ApplyConfirm { account, workspace };
            vec![
                notice(
                    LineCategory::Notice,
                    format!(
                        "Apply requested for {target}. Press `y` to confirm, any other key to cancel."
                    ),
                ),
                DashboardEffect::RequestFrame,
            ]
        }
        GateDecision::Block(reason) => vec![
            notice(
                LineCategory::Error,
                format!("Cannot run terraform apply: {reason}"),
            ),
            DashboardEffect::RequestFrame,
        ],
    }
}

fn request_quit(state: &mut DashboardState, ctx: DashboardContext<'_>) -> Vec<DashboardEffect> {
    if !ctx.slot.is_busy() {
        return vec![DashboardEffect::Exit];
    }
    state.input_mode = InputMode::Quitting;
    state.status_line = "quitting: waiting for the running operation to stop".to_string();
    vec![DashboardEffect::Cancel, DashboardEffect::RequestFrame]
}

fn reduce_runtime(state: &mut DashboardState, action: RuntimeAction) {
    match action {
        RuntimeAction::AccountsReloaded(names) => state.sync_accounts(names),
        RuntimeAction::AuthStatusChanged { account, status } => {
            if let Some(view) = state.account_view_mut(&account) {
                view.auth = status;
            }
        }
        RuntimeAction::IdentityLoaded { account, identity } => {
            if let Some(view) = state.account_view_mut(&account) {
                view.identity = Some(identity);
            }
        }
        RuntimeAction::WorkspacesLoaded {
            account,
            workspaces,
            current,
        } => {
            if let Some(view) = state.account_view_mut(&account) {
                view.set_workspaces(workspaces, current);
            }
        }
        RuntimeAction::WorkspaceActivated { account, workspace } => {
            if let Some(view) = state.account_view_mut(&account) {
                view.current_workspace = Some(workspace);
            }
        }
        RuntimeAction::SetStatus(status) => state.status_line = status,
    }
}

#[cfg(test)]
mod tests;
