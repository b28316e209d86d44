use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Mapping;
use serde_yaml::Value;
use thiserror::Error;

pub const CONFIG_CANDIDATES: [&str; 3] = ["lazyterraform.yaml", "Config.yaml", "config.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {}", .0.display())]
    Missing(PathBuf),
    #[error(
        "no config file found in {}; expected one of: {}",
        .dir.display(),
        CONFIG_CANDIDATES.join(", ")
    )]
    NotFound { dir: PathBuf },
    #[error("failed to read config file at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config at {} must be a mapping at the top level", .path.display())]
    NotAMapping { path: PathBuf },
    #[error("`accounts` in {} must be a mapping of account name to settings", .path.display())]
    AccountsNotAMapping { path: PathBuf },
    #[error("account names in {} must be plain scalars", .path.display())]
    InvalidAccountName { path: PathBuf },
    #[error("config at {} has no accounts; add at least one under `accounts:`", .path.display())]
    NoAccounts { path: PathBuf },
    #[error("`settings` in {} is invalid: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("invalid glob pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("composition_path `{pattern}` did not match any directory (looked for {})", .searched.display())]
    NoPathMatch { pattern: String, searched: PathBuf },
    #[error("composition_path `{pattern}` is not a directory: {}", .path.display())]
    NotADirectory { pattern: String, path: PathBuf },
}

impl AccountValidationError {
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::MissingField { .. } | Self::InvalidField { .. } => None,
            Self::InvalidPattern { pattern, .. }
            | Self::NoPathMatch { pattern, .. }
            | Self::NotADirectory { pattern, .. } => Some(pattern.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub terraform_bin: String,
    pub aws_bin: String,
    pub cancel_grace_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            terraform_bin: "terraform".to_string(),
            aws_bin: "aws".to_string(),
            cancel_grace_secs: 30,
        }
    }
}

impl Settings {
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub aws_profile: String,
    pub composition_path: String,
    pub region: Option<String>,
    pub var_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredAccount {
    pub name: String,
    pub config: Result<AccountConfig, AccountValidationError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfig {
    pub settings: Settings,
    pub accounts: Vec<DeclaredAccount>,
}

pub fn find_config_path(cwd: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        if resolved.exists() {
            return Ok(resolved);
        }
        return Err(ConfigError::Missing(resolved));
    }

    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| cwd.join(candidate))
        .find(|path| path.exists())
        .ok_or_else(|| ConfigError::NotFound {
            dir: cwd.to_path_buf(),
        })
}

pub fn read_config(path: &Path) -> Result<ParsedConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &contents)
}

// Parses the document. Only document-level problems are errors; each account is
// validated on its own and carries its own outcome.
pub fn parse_config(path: &Path, contents: &str) -> Result<ParsedConfig, ConfigError> {
    let document: Value = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Mapping(root) = document else {
        return Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
        });
    };

    let settings = match root.get("settings") {
        None | Some(Value::Null) => Settings::default(),
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|source| {
            ConfigError::Settings {
                path: path.to_path_buf(),
                source,
            }
        })?,
    };

    let accounts = match root.get("accounts") {
        Some(Value::Mapping(accounts)) => accounts,
        None | Some(Value::Null) => {
            return Err(ConfigError::NoAccounts {
                path: path.to_path_buf(),
            })
        }
        Some(_) => {
            return Err(ConfigError::AccountsNotAMapping {
                path: path.to_path_buf(),
            })
        }
    };
    if accounts.is_empty() {
        return Err(ConfigError::NoAccounts {
            path: path.to_path_buf(),
        });
    }

    let mut declared = Vec::with_capacity(accounts.len());
    for (key, value) in accounts {
        let name = scalar_name(key).ok_or_else(|| ConfigError::InvalidAccountName {
            path: path.to_path_buf(),
        })?;
        declared.push(DeclaredAccount {
            name,
            config: validate_account(value),
        });
    }

    Ok(ParsedConfig {
        settings,
        accounts: declared,
    })
}

fn scalar_name(key: &Value) -> Option<String> {
    match key {
        Value::String(name) => Some(name.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn validate_account(value: &Value) -> Result<AccountConfig, AccountValidationError> {
    let Value::Mapping(fields) = value else {
        return Err(AccountValidationError::InvalidField {
            field: "account",
            expected: "a mapping",
        });
    };

    let aws_profile = required_string(fields, "aws_profile")?;
    let composition_path = required_string(fields, "composition_path")?;
    let region = optional_string(fields, "region")?;
    let var_files = string_list(fields, "var_files")?;

    Ok(AccountConfig {
        aws_profile,
        composition_path,
        region,
        var_files,
    })
}

fn required_string(fields: &Mapping, field: &'static str) -> Result<String, AccountValidationError> {
    optional_string(fields, field)?.ok_or(AccountValidationError::MissingField { field })
}

fn optional_string(
    fields: &Mapping,
    field: &'static str,
) -> Result<Option<String>, AccountValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
        Some(_) => Err(AccountValidationError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn string_list(fields: &Mapping, field: &'static str) -> Result<Vec<String>, AccountValidationError> {
    let invalid = AccountValidationError::InvalidField {
        field,
        expected: "a list of strings",
    };
    match fields.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.clone()),
                _ => Err(invalid.clone()),
            })
            .collect(),
        Some(_) => Err(invalid),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(contents: &str) -> Result<ParsedConfig, ConfigError> {
        parse_config(Path::new("/cfg/lazyterraform.yaml"), contents)
    }

    #[test]
    fn accounts_keep_file_order_and_unknown_keys_are_ignored() {
        let parsed = parse(
            r#"
owner: platform-team
accounts:
  zeta:
    aws_profile: zeta-admin
    composition_path: envs/zeta
    colour: blue
  alpha:
    aws_profile: alpha-admin
    composition_path: envs/*/alpha
    region: eu-west-1
    var_files: [vars/a.tfvars, vars/b.tfvars]
"#,
        )
        .expect("parse");

        let names: Vec<&str> = parsed.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(
            parsed.accounts[1].config,
            Ok(AccountConfig {
                aws_profile: "alpha-admin".to_string(),
                composition_path: "envs/*/alpha".to_string(),
                region: Some("eu-west-1".to_string()),
                var_files: vec!["vars/a.tfvars".to_string(), "vars/b.tfvars".to_string()],
            })
        );
        assert_eq!(parsed.settings, Settings::default());
    }

    #[test]
    fn missing_required_field_is_scoped_to_one_account() {
        let parsed = parse(
            r#"
accounts:
  non-prod:
    aws_profile: np
    composition_path: envs/np
  prod:
    composition_path: envs/prod
"#,
        )
        .expect("parse");

        assert!(parsed.accounts[0].config.is_ok());
        assert_eq!(
            parsed.accounts[1].config,
            Err(AccountValidationError::MissingField {
                field: "aws_profile"
            })
        );
    }

    #[test]
    fn ill_typed_fields_are_validation_failures() {
        let parsed = parse(
            r#"
accounts:
  a:
    aws_profile: [not, a, string]
    composition_path: envs/a
  b:
    aws_profile: b
    composition_path: envs/b
    var_files: vars/b.tfvars
  c: just-a-string
"#,
        )
        .expect("parse");

        assert_eq!(
            parsed.accounts[0].config,
            Err(AccountValidationError::InvalidField {
                field: "aws_profile",
                expected: "a string"
            })
        );
        assert_eq!(
            parsed.accounts[1].config,
            Err(AccountValidationError::InvalidField {
                field: "var_files",
                expected: "a list of strings"
            })
        );
        assert!(parsed.accounts[2].config.is_err());
    }

    #[test]
    fn document_level_problems_are_fatal() {
        assert!(matches!(parse("accounts: [1, 2"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse("- a\n- b\n"), Err(ConfigError::NotAMapping { .. })));
        assert!(matches!(
            parse("accounts: [a, b]\n"),
            Err(ConfigError::AccountsNotAMapping { .. })
        ));
        assert!(matches!(parse("accounts: {}\n"), Err(ConfigError::NoAccounts { .. })));
        assert!(matches!(parse("settings: {}\n"), Err(ConfigError::NoAccounts { .. })));
    }

    #[test]
    fn settings_override_defaults_partially() {
        let parsed = parse(
            r#"
settings:
  terraform_bin: tofu
accounts:
  a:
    aws_profile: a
    composition_path: envs/a
"#,
        )
        .expect("parse");
        assert_eq!(parsed.settings.terraform_bin, "tofu");
        assert_eq!(parsed.settings.aws_bin, "aws");
        assert_eq!(parsed.settings.cancel_grace(), Duration::from_secs(30));
    }

    #[test]
    fn explicit_path_must_exist_and_candidates_are_searched_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            find_config_path(dir.path(), None),
            Err(ConfigError::NotFound { .. })
        ));
        assert!(matches!(
            find_config_path(dir.path(), Some(Path::new("custom.yaml"))),
            Err(ConfigError::Missing(_))
        ));

        fs::write(dir.path().join("config.yaml"), "accounts: {}\n").expect("write");
        fs::write(dir.path().join("lazyterraform.yaml"), "accounts: {}\n").expect("write");
        assert_eq!(
            find_config_path(dir.path(), None).expect("found"),
            dir.path().join("lazyterraform.yaml")
        );

        fs::write(dir.path().join("custom.yaml"), "accounts: {}\n").expect("write");
        assert_eq!(
            find_config_path(dir.path(), Some(Path::new("custom.yaml"))).expect("found"),
            dir.path().join("custom.yaml")
        );
    }
}
