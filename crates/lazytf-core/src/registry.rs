use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;

use super::config::find_config_path;
use super::config::read_config;
use super::config::AccountConfig;
use super::config::AccountValidationError;
use super::config::ConfigError;
use super::config::ParsedConfig;
use super::config::Settings;
use super::resolve::resolve_account;
use super::resolve::Resolution;
use super::resolve::ResolvedAccount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub name: String,
    pub config: Option<AccountConfig>,
    pub resolved: ResolvedAccount,
}

impl AccountEntry {
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolved.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&AccountValidationError> {
        self.resolved.as_ref().err()
    }

    pub fn profile(&self) -> Option<&str> {
        self.config.as_ref().map(|config| config.aws_profile.as_str())
    }

    pub fn region(&self) -> Option<&str> {
        self.config.as_ref().and_then(|config| config.region.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    source: PathBuf,
    base_dir: PathBuf,
    settings: Settings,
    entries: Vec<AccountEntry>,
}

impl AccountRegistry {
    pub fn from_parsed(source: PathBuf, base_dir: PathBuf, parsed: ParsedConfig) -> Self {
        let entries = parsed
            .accounts
            .into_iter()
            .map(|declared| {
                let resolved = match &declared.config {
                    Ok(config) => resolve_account(&base_dir, config),
                    Err(err) => Err(err.clone()),
                };
                match &resolved {
                    Ok(resolution) => info!(
                        account = %declared.name,
                        dir = %resolution.composition_dir.display(),
                        "account resolved"
                    ),
                    Err(err) => warn!(account = %declared.name, error = %err, "account unresolved"),
                }
                AccountEntry {
                    name: declared.name,
                    config: declared.config.ok(),
                    resolved,
                }
            })
            .collect();

        Self {
            source,
            base_dir,
            settings: parsed.settings,
            entries,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn entries(&self) -> &[AccountEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&AccountEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn startup_warnings(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for entry in &self.entries {
            match &entry.resolved {
                Err(err) => {
                    lines.push(format!("warning: account `{}` {err}", entry.name));
                    lines.push(format!(
                        "warning: `{}` stays visible; execution is blocked until the config is fixed",
                        entry.name
                    ));
                }
                Ok(resolution) => {
                    if let Some(ambiguity) = &resolution.ambiguity {
                        lines.push(format!(
                            "note: `{}` pattern `{}` matched {} directories; using {}",
                            entry.name,
                            ambiguity.pattern,
                            ambiguity.candidates,
                            ambiguity.chosen.display()
                        ));
                    }
                }
            }
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefreshSummary {
    pub accounts: usize,
    pub changed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResolver {
    path: PathBuf,
    base_dir: PathBuf,
}

impl ConfigResolver {
    pub fn locate(cwd: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let found = find_config_path(cwd, explicit)?;
        Ok(Self::at(found))
    }

    pub fn at(path: PathBuf) -> Self {
        let path = path.canonicalize().unwrap_or(path);
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { path, base_dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn load(&self) -> Result<AccountRegistry, ConfigError> {
        let parsed = read_config(&self.path)?;
        let registry =
            AccountRegistry::from_parsed(self.path.clone(), self.base_dir.clone(), parsed);
        info!(path = %self.path.display(), accounts = registry.len(), "config loaded");
        Ok(registry)
    }

    // Re-reads and re-resolves. The registry is replaced whole, and left untouched on error.
    pub fn refresh(&self, registry: &mut AccountRegistry) -> Result<RefreshSummary, ConfigError> {
        let fresh = self.load()?;
        let changed = fresh
            .entries
            .iter()
            .filter(|entry| registry.get(&entry.name) != Some(*entry))
            .map(|entry| entry.name.clone())
            .collect();
        let failed = fresh
            .entries
            .iter()
            .filter(|entry| entry.resolved.is_err())
            .map(|entry| entry.name.clone())
            .collect();
        let summary = RefreshSummary {
            accounts: fresh.len(),
            changed,
            failed,
        };
        *registry = fresh;
        Ok(summary)
    }
}
