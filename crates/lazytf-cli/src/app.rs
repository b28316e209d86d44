use std::time::Instant;

use chrono::Local;
use lazytf_core::reduce;
use lazytf_core::AccountRegistry;
use lazytf_core::ApplyConfirmation;
use lazytf_core::AuthStatus;
use lazytf_core::CallerIdentity;
use lazytf_core::ConfigResolver;
use lazytf_core::DashboardAction;
use lazytf_core::DashboardContext;
use lazytf_core::DashboardEffect;
use lazytf_core::DashboardState;
use lazytf_core::ExecutionSlot;
use lazytf_core::LineCategory;
use lazytf_core::LineSource;
use lazytf_core::OperationKind;
use lazytf_core::RuntimeAction;
use lazytf_core::UserAction;
use lazytf_exec::CommandExecutionEngine;
use lazytf_exec::CompletedExecution;
use serde::Deserialize;
use tracing::info;
use tracing::warn;

/// Plan or apply waiting for its workspace switch to finish.
struct PendingRun {
    kind: OperationKind,
    account: String,
    workspace: String,
    confirmation: Option<ApplyConfirmation>,
}

/// Wires the registry, dashboard state and engine together on the event-loop thread.
pub struct App {
    resolver: ConfigResolver,
    registry: AccountRegistry,
    engine: CommandExecutionEngine,
    state: DashboardState,
    pending: Option<PendingRun>,
}

impl App {
    pub fn new(
        resolver: ConfigResolver,
        registry: AccountRegistry,
        engine: CommandExecutionEngine,
    ) -> Self {
        let state = DashboardState::new(registry.names());
        let mut app = Self {
            resolver,
            registry,
            engine,
            state,
            pending: None,
        };
        app.announce_registry("Loaded config from");
        app
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn slot(&self) -> &ExecutionSlot {
        self.engine.slot()
    }

    /// Returns false once the dashboard should exit.
    pub fn handle(&mut self, action: UserAction, now: Instant) -> bool {
        let ctx = DashboardContext {
            registry: &self.registry,
            slot: self.engine.slot(),
        };
        let effects = reduce(&mut self.state, ctx, DashboardAction::User(action));
        self.apply(effects, now)
    }

    /// Drains worker events and reacts to finished operations. Returns false once a
    /// pending quit can complete.
    pub fn tick(&mut self, now: Instant) -> bool {
        for completed in self.engine.tick(now) {
            self.on_completed(completed, now);
        }
        let max_scroll = self.engine.slot().output().len().saturating_sub(1);
        self.state.scroll_from_bottom = self.state.scroll_from_bottom.min(max_scroll);
        !(self.state.quit_requested() && !self.engine.is_busy())
    }

    fn apply(&mut self, effects: Vec<DashboardEffect>, now: Instant) -> bool {
        for effect in effects {
            match effect {
                DashboardEffect::RequestFrame => {}
                DashboardEffect::Start {
                    kind,
                    account,
                    confirmation,
                    workspace,
                } => match workspace.filter(|_| kind.runs_in_workspace()) {
                    Some(workspace) => self.select_then_run(
                        PendingRun {
                            kind,
                            account,
                            workspace,
                            confirmation,
                        },
                        now,
                    ),
                    None => self.start(kind, &account, confirmation.as_ref(), now),
                },
                DashboardEffect::Cancel => {
                    self.engine.cancel(now);
                }
                DashboardEffect::Refresh => self.refresh(),
                DashboardEffect::Acknowledge => {
                    self.engine.acknowledge();
                }
                DashboardEffect::Notice { category, text } => {
                    self.engine.push_notice(category, text);
                }
                DashboardEffect::Exit => return false,
            }
        }
        true
    }

    fn dispatch(&mut self, action: RuntimeAction) {
        let ctx = DashboardContext {
            registry: &self.registry,
            slot: self.engine.slot(),
        };
        reduce(&mut self.state, ctx, DashboardAction::Runtime(action));
    }

    fn set_status(&mut self, status: String) {
        self.dispatch(RuntimeAction::SetStatus(status));
    }

    fn start(
        &mut self,
        kind: OperationKind,
        account: &str,
        confirmation: Option<&ApplyConfirmation>,
        now: Instant,
    ) {
        match self
            .engine
            .start(&self.registry, kind, account, confirmation, now)
        {
            Ok(_) => {
                self.state.scroll_from_bottom = 0;
                if matches!(kind, OperationKind::Authenticate | OperationKind::StatusCheck) {
                    self.dispatch(RuntimeAction::AuthStatusChanged {
                        account: account.to_string(),
                        status: AuthStatus::Checking,
                    });
                }
                self.set_status(format!("running {} for {account}", kind.label()));
            }
            Err(err) => {
                self.set_status(format!("{} blocked: {err}", kind.label()));
            }
        }
    }

    fn select_then_run(&mut self, run: PendingRun, now: Instant) {
        match self
            .engine
            .select_workspace(&self.registry, &run.account, &run.workspace, now)
        {
            Ok(_) => {
                self.state.scroll_from_bottom = 0;
                self.set_status(format!(
                    "selecting workspace {} for {} before {}",
                    run.workspace,
                    run.account,
                    run.kind.label()
                ));
                self.pending = Some(run);
            }
            Err(err) => {
                self.set_status(format!("{} blocked: {err}", run.kind.label()));
            }
        }
    }

    fn refresh(&mut self) {
        match self.resolver.refresh(&mut self.registry) {
            Ok(summary) => {
                info!(
                    accounts = summary.accounts,
                    changed = summary.changed.len(),
                    failed = summary.failed.len(),
                    "config refreshed"
                );
                self.dispatch(RuntimeAction::AccountsReloaded(self.registry.names()));
                self.announce_registry("Reloaded config from");
                if !summary.changed.is_empty() {
                    self.engine.push_notice(
                        LineCategory::Info,
                        format!("Changed accounts: {}", summary.changed.join(", ")),
                    );
                }
                self.set_status(format!("config refreshed at {}", clock()));
            }
            Err(err) => {
                warn!(error = %err, "config refresh failed");
                self.engine.push_notice(
                    LineCategory::Error,
                    format!("Refresh failed, keeping the previous accounts: {err}"),
                );
                self.set_status("config refresh failed".to_string());
            }
        }
    }

    fn announce_registry(&mut self, verb: &str) {
        for warning in self.registry.startup_warnings() {
            self.engine.push_notice(LineCategory::Warning, warning);
        }
        let text = format!(
            "{verb} {} ({} accounts)",
            self.registry.source().display(),
            self.registry.len()
        );
        self.engine.push_notice(LineCategory::Info, text);
    }

    fn on_completed(&mut self, completed: CompletedExecution, now: Instant) {
        let CompletedExecution {
            account,
            kind,
            reason,
            ..
        } = completed;
        let success = reason.is_success();
        self.set_status(format!(
            "{} for {account} {} at {}",
            kind.label(),
            reason.describe(),
            clock()
        ));

        match kind {
            OperationKind::Authenticate if !success => {
                self.auth_status(&account, AuthStatus::Failed);
            }
            OperationKind::Authenticate if self.state.quit_requested() => {
                self.auth_status(&account, AuthStatus::Unknown);
            }
            OperationKind::Authenticate => {
                self.engine.push_notice(
                    LineCategory::Info,
                    "Login finished. Checking credentials...",
                );
                self.start(OperationKind::StatusCheck, &account, None, now);
            }
            OperationKind::StatusCheck => {
                let identity = success
                    .then(|| parse_caller_identity(&self.process_lines()))
                    .flatten();
                match identity {
                    Some(identity) => {
                        self.engine.push_notice(
                            LineCategory::Summary,
                            format!("Authenticated as {} ({})", identity.arn, identity.account),
                        );
                        self.dispatch(RuntimeAction::IdentityLoaded {
                            account: account.clone(),
                            identity,
                        });
                        self.auth_status(&account, AuthStatus::Ready);
                    }
                    None => {
                        if success {
                            self.engine.push_notice(
                                LineCategory::Warning,
                                "Could not read the caller identity from the output.",
                            );
                        }
                        self.auth_status(&account, AuthStatus::Failed);
                    }
                }
            }
            OperationKind::WorkspaceSelect => {
                let Some(run) = self.pending.take().filter(|run| run.account == account) else {
                    return;
                };
                if !success {
                    self.engine.push_notice(
                        LineCategory::Error,
                        format!(
                            "Could not select workspace `{}`; {} was not started.",
                            run.workspace,
                            run.kind.label()
                        ),
                    );
                    return;
                }
                self.dispatch(RuntimeAction::WorkspaceActivated {
                    account,
                    workspace: run.workspace.clone(),
                });
                if self.state.quit_requested() {
                    return;
                }
                self.start(run.kind, &run.account, run.confirmation.as_ref(), now);
                self.engine.push_notice(
                    LineCategory::Info,
                    format!("Workspace `{}` selected.", run.workspace),
                );
            }
            OperationKind::WorkspaceList if success => {
                let (workspaces, current) = parse_workspaces(&self.process_lines());
                self.dispatch(RuntimeAction::WorkspacesLoaded {
                    account,
                    workspaces,
                    current,
                });
            }
            _ => {}
        }
    }

    fn auth_status(&mut self, account: &str, status: AuthStatus) {
        self.dispatch(RuntimeAction::AuthStatusChanged {
            account: account.to_string(),
            status,
        });
    }

    fn process_lines(&self) -> Vec<String> {
        self.engine
            .slot()
            .output()
            .iter()
            .filter(|line| line.source == LineSource::Process)
            .map(|line| line.text.clone())
            .collect()
    }
}

fn clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityDocument {
    account: String,
    arn: String,
}

/// Reads the JSON document printed by `aws sts get-caller-identity`.
fn parse_caller_identity(lines: &[String]) -> Option<CallerIdentity> {
    let text = lines.join("\n");
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let document: CallerIdentityDocument = serde_json::from_str(text.get(start..=end)?).ok()?;
    Some(CallerIdentity {
        account: document.account,
        arn: document.arn,
    })
}

/// Parses `terraform workspace list`; the current workspace is marked with `*`.
fn parse_workspaces(lines: &[String]) -> (Vec<String>, Option<String>) {
    let mut workspaces = Vec::new();
    let mut current = None;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let name = match trimmed.strip_prefix('*') {
            Some(rest) => {
                let name = rest.trim().to_string();
                current = Some(name.clone());
                name
            }
            None => trimmed.to_string(),
        };
        workspaces.push(name);
    }
    (workspaces, current)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use lazytf_core::ExecutionPhase;
    use lazytf_core::FocusPanel;
    use lazytf_core::Modal;
    use lazytf_exec::SimulatedLauncher;
    use lazytf_exec::TerraformAdapter;
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = r#"
accounts:
  non-prod:
    aws_profile: np-admin
    composition_path: envs/non-prod
  prod:
    aws_profile: prod-admin
    composition_path: envs/prod
"#;

    struct Harness {
        dir: tempfile::TempDir,
        launcher: SimulatedLauncher,
        app: App,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            fs::create_dir_all(dir.path().join("envs/non-prod")).expect("mkdir");
            fs::create_dir_all(dir.path().join("envs/prod")).expect("mkdir");
            fs::write(dir.path().join("config.yaml"), CONFIG).expect("write");
            let resolver = ConfigResolver::locate(dir.path(), None).expect("locate");
            let registry = resolver.load().expect("load");
            let launcher = SimulatedLauncher::new();
            let engine = CommandExecutionEngine::new(
                Box::new(launcher.clone()),
                Box::new(TerraformAdapter::default()),
                registry.settings().cancel_grace(),
            );
            let app = App::new(resolver, registry, engine);
            Self { dir, launcher, app }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn press(&mut self, action: UserAction) -> bool {
            self.app.handle(action, Instant::now())
        }

        fn select(&mut self, name: &str) {
            let index = self
                .app
                .state()
                .accounts
                .iter()
                .position(|view| view.name == name)
                .expect("account listed");
            while self.app.state().selected_account > index {
                self.press(UserAction::MoveUp);
            }
            while self.app.state().selected_account < index {
                self.press(UserAction::MoveDown);
            }
        }

        fn texts(&self) -> Vec<String> {
            self.app
                .slot()
                .output()
                .iter()
                .map(|line| line.text.clone())
                .collect()
        }
    }

    #[test]
    fn startup_reports_where_config_came_from() {
        let harness = Harness::new();
        let texts = harness.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Loaded config from "));
        assert!(texts[0].ends_with("(2 accounts)"));
    }

    #[test]
    fn deleting_prod_composition_only_breaks_prod_after_refresh() {
        let mut harness = Harness::new();
        fs::remove_dir_all(harness.path().join("envs/prod")).expect("rm");

        harness.press(UserAction::Run(OperationKind::Refresh));
        assert!(harness.app.registry().get("prod").expect("prod").resolved.is_err());
        assert!(harness.app.registry().get("non-prod").expect("np").resolved.is_ok());

        harness.select("prod");
        harness.press(UserAction::Run(OperationKind::Plan));
        assert_eq!(harness.launcher.requests(), Vec::new());
        assert!(harness
            .texts()
            .iter()
            .any(|text| text.starts_with("Cannot run terraform plan") && text.contains("envs/prod")));

        harness.select("non-prod");
        harness.press(UserAction::Run(OperationKind::Plan));
        assert_eq!(harness.launcher.requests().len(), 1);
        assert_eq!(harness.app.slot().phase(), ExecutionPhase::Running);
    }

    #[test]
    fn login_success_chains_an_identity_check() {
        let mut harness = Harness::new();
        harness.press(UserAction::Run(OperationKind::Authenticate));
        assert_eq!(
            harness.app.state().account_view("non-prod").map(|view| view.auth),
            Some(AuthStatus::Checking)
        );
        let login = harness.launcher.last_execution().expect("login");
        harness.launcher.exit(login, Some(0));
        assert!(harness.app.tick(Instant::now()));

        let requests = harness.launcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].display_command(),
            "aws sts get-caller-identity --profile np-admin --output json"
        );

        let check = harness.launcher.last_execution().expect("check");
        for line in [
            "{",
            "    \"UserId\": \"AROA:me\",",
            "    \"Account\": \"111122223333\",",
            "    \"Arn\": \"arn:aws:sts::111122223333:assumed-role/admin/me\"",
            "}",
        ] {
            harness.launcher.emit_line(check, line);
        }
        harness.launcher.exit(check, Some(0));
        harness.app.tick(Instant::now());

        let view = harness.app.state().account_view("non-prod").expect("view");
        assert_eq!(view.auth, AuthStatus::Ready);
        assert_eq!(
            view.identity.as_ref().map(|identity| identity.account.as_str()),
            Some("111122223333")
        );
    }

    #[test]
    fn failed_check_marks_account_failed() {
        let mut harness = Harness::new();
        harness.press(UserAction::Run(OperationKind::StatusCheck));
        let check = harness.launcher.last_execution().expect("check");
        harness.launcher.emit_line(check, "Error when retrieving token from sso: Token has expired");
        harness.launcher.exit(check, Some(255));
        harness.app.tick(Instant::now());

        assert_eq!(
            harness.app.state().account_view("non-prod").map(|view| view.auth),
            Some(AuthStatus::Failed)
        );
    }

    #[test]
    fn workspace_listing_updates_details() {
        let mut harness = Harness::new();
        harness.press(UserAction::Run(OperationKind::WorkspaceList));
        let id = harness.launcher.last_execution().expect("list");
        for line in ["  default", "* blue", "  green", ""] {
            harness.launcher.emit_line(id, line);
        }
        harness.launcher.exit(id, Some(0));
        harness.app.tick(Instant::now());

        let view = harness.app.state().account_view("non-prod").expect("view");
        assert_eq!(view.workspaces, vec!["default", "blue", "green"]);
        assert_eq!(view.current_workspace.as_deref(), Some("blue"));
    }

    #[test]
    fn apply_runs_only_after_confirmation() {
        let mut harness = Harness::new();
        harness.press(UserAction::BeginApply);
        assert!(matches!(harness.app.state().modal, Modal::ApplyConfirm { .. }));
        assert_eq!(harness.launcher.requests(), Vec::new());

        harness.press(UserAction::ConfirmApply);
        let requests = harness.launcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].args[0], "apply");
    }

    fn list_workspaces(harness: &mut Harness) {
        harness.press(UserAction::Run(OperationKind::WorkspaceList));
        let id = harness.launcher.last_execution().expect("list");
        for line in ["* default", "  blue"] {
            harness.launcher.emit_line(id, line);
        }
        harness.launcher.exit(id, Some(0));
        harness.app.tick(Instant::now());
        harness.press(UserAction::Dismiss);
    }

    fn choose_blue(harness: &mut Harness) {
        list_workspaces(harness);
        harness.press(UserAction::FocusNext);
        harness.press(UserAction::FocusNext);
        assert_eq!(harness.app.state().focus, FocusPanel::Workspaces);
        harness.press(UserAction::MoveDown);
    }

    fn commands(harness: &Harness) -> Vec<String> {
        harness
            .launcher
            .requests()
            .iter()
            .map(|request| request.display_command())
            .collect()
    }

    #[test]
    fn plan_in_a_chosen_workspace_selects_it_first() {
        let mut harness = Harness::new();
        choose_blue(&mut harness);

        harness.press(UserAction::Run(OperationKind::Plan));
        assert_eq!(
            commands(&harness).last().map(String::as_str),
            Some("terraform workspace select blue")
        );

        let select = harness.launcher.last_execution().expect("select");
        harness.launcher.exit(select, Some(0));
        harness.app.tick(Instant::now());

        let commands = commands(&harness);
        assert_eq!(commands.len(), 3);
        assert!(commands[2].starts_with("terraform plan"), "{}", commands[2]);
        assert_eq!(
            harness
                .app
                .state()
                .account_view("non-prod")
                .and_then(|view| view.current_workspace.as_deref()),
            Some("blue")
        );
        assert!(harness.texts().contains(&"Workspace `blue` selected.".to_string()));
    }

    #[test]
    fn failed_workspace_select_does_not_plan() {
        let mut harness = Harness::new();
        choose_blue(&mut harness);

        harness.press(UserAction::Run(OperationKind::Plan));
        let select = harness.launcher.last_execution().expect("select");
        harness
            .launcher
            .emit_line(select, "Workspace \"blue\" doesn't exist.");
        harness.launcher.exit(select, Some(1));
        harness.app.tick(Instant::now());

        assert_eq!(commands(&harness).len(), 2);
        assert!(!harness.app.slot().is_busy());
        assert!(harness
            .texts()
            .iter()
            .any(|text| text.starts_with("Could not select workspace `blue`")));
        assert_eq!(
            harness
                .app
                .state()
                .account_view("non-prod")
                .and_then(|view| view.current_workspace.as_deref()),
            Some("default")
        );
    }

    #[test]
    fn confirmed_apply_keeps_its_confirmation_across_the_select() {
        let mut harness = Harness::new();
        choose_blue(&mut harness);

        harness.press(UserAction::BeginApply);
        harness.press(UserAction::ConfirmApply);
        let select = harness.launcher.last_execution().expect("select");
        harness.launcher.exit(select, Some(0));
        harness.app.tick(Instant::now());

        let commands = commands(&harness);
        assert_eq!(commands.len(), 3);
        assert!(commands[2].starts_with("terraform apply"), "{}", commands[2]);
        assert_eq!(harness.app.slot().phase(), ExecutionPhase::Running);
    }

    #[test]
    fn quit_while_running_waits_for_exit() {
        let mut harness = Harness::new();
        harness.press(UserAction::Run(OperationKind::Init));
        let id = harness.launcher.last_execution().expect("init");

        assert!(harness.press(UserAction::Quit));
        assert!(harness.app.tick(Instant::now()));
        assert!(harness.press(UserAction::Quit));

        harness.launcher.exit(id, None);
        assert!(!harness.app.tick(Instant::now()));
    }

    #[test]
    fn caller_identity_and_workspace_parsers() {
        let lines: Vec<String> = ["noise", "{\"Account\": \"1\", \"Arn\": \"arn:x\"}"]
            .iter()
            .map(|line| line.to_string())
            .collect();
        assert_eq!(
            parse_caller_identity(&lines),
            Some(CallerIdentity {
                account: "1".to_string(),
                arn: "arn:x".to_string()
            })
        );
        assert_eq!(parse_caller_identity(&["not json".to_string()]), None);

        let (workspaces, current) = parse_workspaces(&["* default".to_string()]);
        assert_eq!(workspaces, vec!["default"]);
        assert_eq!(current, Some("default".to_string()));
    }
}
