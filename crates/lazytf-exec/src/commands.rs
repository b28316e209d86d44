use std::path::Path;

use lazytf_core::environment_overlay;
use lazytf_core::AccountEntry;
use lazytf_core::OperationKind;
use lazytf_core::Settings;

use crate::contracts::ExecRequest;
use crate::contracts::OperationAdapter;

/// Builds terraform and aws CLI invocations for the dashboard's operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformAdapter {
    terraform_bin: String,
    aws_bin: String,
}

impl Default for TerraformAdapter {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TerraformAdapter {
    pub fn new(terraform_bin: impl Into<String>, aws_bin: impl Into<String>) -> Self {
        Self {
            terraform_bin: terraform_bin.into(),
            aws_bin: aws_bin.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.terraform_bin.clone(), settings.aws_bin.clone())
    }

    fn aws(&self, entry: &AccountEntry, base_dir: &Path, args: &[&str]) -> Option<ExecRequest> {
        let config = entry.config.as_ref()?;
        let cwd = entry
            .resolution()
            .map(|resolution| resolution.composition_dir.clone())
            .unwrap_or_else(|| base_dir.to_path_buf());
        let mut args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        args.push("--profile".to_string());
        args.push(config.aws_profile.clone());
        Some(ExecRequest {
            cwd,
            program: self.aws_bin.clone(),
            args,
            env: environment_overlay(config),
        })
    }

    fn terraform(&self, kind: OperationKind, entry: &AccountEntry) -> Option<ExecRequest> {
        let resolution = entry.resolution()?;
        let mut args: Vec<String> = match kind {
            OperationKind::WorkspaceList => vec!["workspace".into(), "list".into()],
            OperationKind::WorkspaceSelect => vec!["workspace".into(), "select".into()],
            OperationKind::Init => vec!["init".into(), "-input=false".into(), "-no-color".into()],
            OperationKind::Plan => vec!["plan".into(), "-input=false".into(), "-no-color".into()],
            OperationKind::Apply => vec![
                "apply".into(),
                "-input=false".into(),
                "-no-color".into(),
                "-auto-approve".into(),
            ],
            _ => return None,
        };
        if kind.uses_var_files() {
            args.extend(
                resolution
                    .var_files
                    .iter()
                    .map(|var_file| format!("-var-file={}", var_file.path.display())),
            );
        }

        let mut env = resolution.env.clone();
        env.push(("AWS_SDK_LOAD_CONFIG".to_string(), "1".to_string()));
        env.push(("TF_IN_AUTOMATION".to_string(), "1".to_string()));
        Some(ExecRequest {
            cwd: resolution.composition_dir.clone(),
            program: self.terraform_bin.clone(),
            args,
            env,
        })
    }
}

impl OperationAdapter for TerraformAdapter {
    fn name(&self) -> &'static str {
        "terraform"
    }

    fn build(
        &self,
        kind: OperationKind,
        entry: &AccountEntry,
        base_dir: &Path,
    ) -> Option<ExecRequest> {
        match kind {
            OperationKind::Refresh | OperationKind::WorkspaceSelect => None,
            OperationKind::Authenticate => self.aws(entry, base_dir, &["sso", "login"]),
            OperationKind::StatusCheck => self
                .aws(entry, base_dir, &["sts", "get-caller-identity"])
                .map(|mut request| {
                    request.args.push("--output".to_string());
                    request.args.push("json".to_string());
                    request
                }),
            OperationKind::WorkspaceList
            | OperationKind::Init
            | OperationKind::Plan
            | OperationKind::Apply => self.terraform(kind, entry),
        }
    }

    fn select_workspace(&self, entry: &AccountEntry, workspace: &str) -> Option<ExecRequest> {
        let mut request = self.terraform(OperationKind::WorkspaceSelect, entry)?;
        request.args.push(workspace.to_string());
        Some(request)
    }
}
