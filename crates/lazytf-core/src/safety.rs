use std::path::PathBuf;

use thiserror::Error;

use super::config::AccountValidationError;
use super::execution::ExecutionSlot;
use super::registry::AccountRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Authenticate,
    StatusCheck,
    Refresh,
    WorkspaceList,
    WorkspaceSelect,
    Init,
    Plan,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskClass {
    Inspect,
    Credential,
    Execution,
    Destructive,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        Self::Authenticate,
        Self::StatusCheck,
        Self::Refresh,
        Self::WorkspaceList,
        Self::WorkspaceSelect,
        Self::Init,
        Self::Plan,
        Self::Apply,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Authenticate => "aws sso login",
            Self::StatusCheck => "auth check",
            Self::Refresh => "config refresh",
            Self::WorkspaceList => "terraform workspace list",
            Self::WorkspaceSelect => "terraform workspace select",
            Self::Init => "terraform init",
            Self::Plan => "terraform plan",
            Self::Apply => "terraform apply",
        }
    }

    pub fn risk_class(self) -> RiskClass {
        match self {
            Self::Refresh => RiskClass::Inspect,
            Self::Authenticate | Self::StatusCheck => RiskClass::Credential,
            Self::WorkspaceList | Self::WorkspaceSelect | Self::Init | Self::Plan => {
                RiskClass::Execution
            }
            Self::Apply => RiskClass::Destructive,
        }
    }

    pub fn spawns_process(self) -> bool {
        self != Self::Refresh
    }

    pub fn uses_var_files(self) -> bool {
        matches!(self, Self::Plan | Self::Apply)
    }

    pub fn runs_in_workspace(self) -> bool {
        matches!(self, Self::Plan | Self::Apply)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Startup,
    PreExecution,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockReason {
    #[error("another operation is already running ({running}); press `c` to cancel it")]
    OperationAlreadyRunning { running: String },
    #[error("account `{0}` is not configured")]
    AccountNotFound(String),
    #[error("account `{account}` configuration is invalid: {reason}")]
    AccountUnresolved {
        account: String,
        reason: AccountValidationError,
    },
    #[error("configured var_files are missing for `{account}`: {}", join_paths(.missing))]
    MissingVarFiles {
        account: String,
        missing: Vec<PathBuf>,
    },
    #[error("terraform apply needs confirmation: press `A`, then `y`")]
    ConfirmationRequired,
    #[error("composition directory for `{account}` is no longer available: {}", .path.display())]
    PathResolution { account: String, path: PathBuf },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Block(BlockReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn into_result(self) -> Result<(), BlockReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Block(reason) => Err(reason),
        }
    }
}

// Minted only by the reducer once the apply confirmation is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfirmation {
    account: String,
}

impl ApplyConfirmation {
    pub(crate) fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

pub fn authorize(
    phase: GatePhase,
    registry: &AccountRegistry,
    account: &str,
    kind: OperationKind,
) -> GateDecision {
    if phase == GatePhase::Startup {
        return GateDecision::Allow;
    }
    let risk = kind.risk_class();
    if risk == RiskClass::Inspect {
        return GateDecision::Allow;
    }

    let Some(entry) = registry.get(account) else {
        return GateDecision::Block(BlockReason::AccountNotFound(account.to_string()));
    };

    if risk == RiskClass::Credential {
        return match (&entry.config, entry.failure()) {
            (Some(_), _) => GateDecision::Allow,
            (None, Some(reason)) => GateDecision::Block(BlockReason::AccountUnresolved {
                account: entry.name.clone(),
                reason: reason.clone(),
            }),
            (None, None) => GateDecision::Block(BlockReason::AccountNotFound(entry.name.clone())),
        };
    }

    let resolution = match &entry.resolved {
        Ok(resolution) => resolution,
        Err(reason) => {
            return GateDecision::Block(BlockReason::AccountUnresolved {
                account: entry.name.clone(),
                reason: reason.clone(),
            })
        }
    };
    let missing = resolution.missing_var_files();
    if !missing.is_empty() {
        return GateDecision::Block(BlockReason::MissingVarFiles {
            account: entry.name.clone(),
            missing,
        });
    }
    GateDecision::Allow
}

pub fn authorize_request(
    registry: &AccountRegistry,
    slot: &ExecutionSlot,
    account: &str,
    kind: OperationKind,
) -> GateDecision {
    if kind.spawns_process() {
        if let Some(active) = slot.active() {
            return GateDecision::Block(BlockReason::OperationAlreadyRunning {
                running: format!("{} on `{}`", active.kind().label(), active.account()),
            });
        }
    }
    authorize(GatePhase::PreExecution, registry, account, kind)
}

pub fn authorize_start(
    registry: &AccountRegistry,
    slot: &ExecutionSlot,
    account: &str,
    kind: OperationKind,
    confirmation: Option<&ApplyConfirmation>,
) -> GateDecision {
    let decision = authorize_request(registry, slot, account, kind);
    if !decision.is_allowed() {
        return decision;
    }

    if kind == OperationKind::Apply
        && !confirmation.is_some_and(|confirmation| confirmation.account() == account)
    {
        return GateDecision::Block(BlockReason::ConfirmationRequired);
    }
    GateDecision::Allow
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Instant;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::parse_config;

    fn registry(dir: &Path) -> AccountRegistry {
        fs::create_dir_all(dir.join("envs/np")).expect("mkdir");
        fs::create_dir_all(dir.join("envs/nv")).expect("mkdir");
        fs::write(dir.join("envs/np/np.tfvars"), "").expect("write");
        let path = dir.join("config.yaml");
        let parsed = parse_config(
            &path,
            r#"
accounts:
  ok:
    aws_profile: np
    composition_path: envs/np
    var_files: [np.tfvars]
  broken:
    aws_profile: broken
    composition_path: envs/missing
  no-profile:
    composition_path: envs/np
  no-vars:
    aws_profile: nv
    composition_path: envs/nv
    var_files: [absent.tfvars]
"#,
        )
        .expect("parse");
        AccountRegistry::from_parsed(path, dir.to_path_buf(), parsed)
    }

    #[test]
    fn policy_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        let check = |account: &str, kind| authorize(GatePhase::PreExecution, &registry, account, kind);

        for kind in OperationKind::ALL {
            assert!(check("ok", kind).is_allowed(), "{kind:?} on ok");
        }
        assert!(check("broken", OperationKind::Refresh).is_allowed());
        assert!(check("broken", OperationKind::Authenticate).is_allowed());
        assert!(check("broken", OperationKind::StatusCheck).is_allowed());
        for kind in [
            OperationKind::WorkspaceList,
            OperationKind::WorkspaceSelect,
            OperationKind::Init,
            OperationKind::Plan,
            OperationKind::Apply,
        ] {
            assert!(matches!(
                check("broken", kind),
                GateDecision::Block(BlockReason::AccountUnresolved {
                    reason: AccountValidationError::NoPathMatch { .. },
                    ..
                })
            ));
            assert!(matches!(
                check("no-vars", kind),
                GateDecision::Block(BlockReason::MissingVarFiles { .. })
            ));
        }
        assert!(matches!(
            check("no-profile", OperationKind::Authenticate),
            GateDecision::Block(BlockReason::AccountUnresolved { .. })
        ));
        assert_eq!(
            check("ghost", OperationKind::Plan),
            GateDecision::Block(BlockReason::AccountNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn startup_phase_is_permissive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        for account in ["ok", "broken", "no-profile", "no-vars", "ghost"] {
            for kind in OperationKind::ALL {
                assert_eq!(
                    authorize(GatePhase::Startup, &registry, account, kind),
                    GateDecision::Allow
                );
            }
        }
    }

    #[test]
    fn apply_requires_matching_confirmation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        let slot = ExecutionSlot::new();

        assert_eq!(
            authorize_start(&registry, &slot, "ok", OperationKind::Apply, None),
            GateDecision::Block(BlockReason::ConfirmationRequired)
        );
        let other = ApplyConfirmation::new("no-vars");
        assert_eq!(
            authorize_start(&registry, &slot, "ok", OperationKind::Apply, Some(&other)),
            GateDecision::Block(BlockReason::ConfirmationRequired)
        );
        let confirmed = ApplyConfirmation::new("ok");
        assert!(
            authorize_start(&registry, &slot, "ok", OperationKind::Apply, Some(&confirmed))
                .is_allowed()
        );
    }

    #[test]
    fn busy_slot_blocks_everything_but_refresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        let mut slot = ExecutionSlot::new();
        let id = slot.begin();
        slot.mark_running(id, "ok", OperationKind::Plan, Instant::now());

        assert!(matches!(
            authorize_start(&registry, &slot, "ok", OperationKind::Init, None),
            GateDecision::Block(BlockReason::OperationAlreadyRunning { .. })
        ));
        assert!(authorize_start(&registry, &slot, "ok", OperationKind::Refresh, None).is_allowed());
    }
}
