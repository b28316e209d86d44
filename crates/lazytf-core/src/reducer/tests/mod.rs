use std::fs;
use std::path::Path;
use std::time::Instant;

use tempfile::TempDir;

pub(super) use super::reduce;
pub(super) use super::DashboardContext;
pub(super) use super::DashboardEffect;
pub(super) use crate::actions::DashboardAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::actions::ACTION_ITEMS;
pub(super) use crate::classify::LineCategory;
pub(super) use crate::config::parse_config;
pub(super) use crate::execution::ExecutionId;
pub(super) use crate::execution::ExecutionSlot;
pub(super) use crate::registry::AccountRegistry;
pub(super) use crate::safety::OperationKind;
pub(super) use crate::state::AuthStatus;
pub(super) use crate::state::CallerIdentity;
pub(super) use crate::state::DashboardState;
pub(super) use crate::state::FocusPanel;
pub(super) use crate::state::InputMode;
pub(super) use crate::state::Modal;

mod scroll;

const CONFIG: &str = r#"
accounts:
  non-prod:
    aws_profile: np
    composition_path: envs/non-prod
  prod:
    aws_profile: prod
    composition_path: envs/prod
  broken:
    composition_path: envs/non-prod
"#;

struct Fixture {
    _dir: TempDir,
    registry: AccountRegistry,
    slot: ExecutionSlot,
    state: DashboardState,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("envs/non-prod")).expect("mkdir");
        fs::create_dir_all(dir.path().join("envs/prod")).expect("mkdir");
        let registry = registry_at(dir.path());
        let state = DashboardState::new(registry.names());
        Self {
            _dir: dir,
            registry,
            slot: ExecutionSlot::new(),
            state,
        }
    }

    fn user(&mut self, action: UserAction) -> Vec<DashboardEffect> {
        let ctx = DashboardContext {
            registry: &self.registry,
            slot: &self.slot,
        };
        reduce(&mut self.state, ctx, DashboardAction::User(action))
    }

    fn runtime(&mut self, action: RuntimeAction) {
        let ctx = DashboardContext {
            registry: &self.registry,
            slot: &self.slot,
        };
        let effects = reduce(&mut self.state, ctx, DashboardAction::Runtime(action));
        assert!(effects.is_empty());
    }

    fn select_account(&mut self, name: &str) {
        self.state.selected_account = self
            .state
            .accounts
            .iter()
            .position(|view| view.name == name)
            .expect("account present");
    }

    fn start_running(&mut self, kind: OperationKind) -> ExecutionId {
        let id = self.slot.begin();
        self.slot.mark_running(id, "non-prod", kind, Instant::now());
        id
    }

    fn fill_output(&mut self, lines: usize) {
        for idx in 0..lines {
            self.slot
                .output_mut()
                .push_notice(LineCategory::Info, format!("line {idx}"));
        }
    }
}

fn registry_at(dir: &Path) -> AccountRegistry {
    let path = dir.join("config.yaml");
    let parsed = parse_config(&path, CONFIG).expect("parse");
    AccountRegistry::from_parsed(path, dir.to_path_buf(), parsed)
}

fn starts(effects: &[DashboardEffect]) -> Vec<(OperationKind, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            DashboardEffect::Start { kind, account, .. } => Some((*kind, account.clone())),
            _ => None,
        })
        .collect()
}
