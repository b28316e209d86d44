use std::path::Path;
use std::path::PathBuf;

use super::config::AccountConfig;
use super::config::AccountValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarFile {
    pub path: PathBuf,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousMatch {
    pub pattern: String,
    pub candidates: usize,
    pub chosen: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub composition_dir: PathBuf,
    pub var_files: Vec<VarFile>,
    pub env: Vec<(String, String)>,
    pub ambiguity: Option<AmbiguousMatch>,
}

impl Resolution {
    pub fn missing_var_files(&self) -> Vec<PathBuf> {
        self.var_files
            .iter()
            .filter(|file| !file.exists)
            .map(|file| file.path.clone())
            .collect()
    }
}

pub type ResolvedAccount = Result<Resolution, AccountValidationError>;

pub fn has_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

pub fn resolve_account(base_dir: &Path, config: &AccountConfig) -> ResolvedAccount {
    let (composition_dir, ambiguity) = resolve_composition_dir(base_dir, &config.composition_path)?;
    let var_files = config
        .var_files
        .iter()
        .map(|raw| {
            let path = anchor(&composition_dir, raw);
            let exists = path.exists();
            VarFile { path, exists }
        })
        .collect();

    Ok(Resolution {
        composition_dir,
        var_files,
        env: environment_overlay(config),
        ambiguity,
    })
}

pub fn resolve_composition_dir(
    base_dir: &Path,
    pattern: &str,
) -> Result<(PathBuf, Option<AmbiguousMatch>), AccountValidationError> {
    let anchored = anchor(base_dir, pattern);

    if !has_glob(pattern) {
        if !anchored.exists() {
            return Err(AccountValidationError::NoPathMatch {
                pattern: pattern.to_string(),
                searched: anchored,
            });
        }
        if !anchored.is_dir() {
            return Err(AccountValidationError::NotADirectory {
                pattern: pattern.to_string(),
                path: anchored,
            });
        }
        return Ok((anchored, None));
    }

    let entries = glob::glob(&glob_pattern(base_dir, pattern)).map_err(|err| {
        AccountValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    })?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_dir())
        .collect();
    matches.sort();
    matches.dedup();

    let candidates = matches.len();
    let Some(chosen) = matches.into_iter().next() else {
        return Err(AccountValidationError::NoPathMatch {
            pattern: pattern.to_string(),
            searched: anchored,
        });
    };
    let ambiguity = (candidates > 1).then(|| AmbiguousMatch {
        pattern: pattern.to_string(),
        candidates,
        chosen: chosen.clone(),
    });
    Ok((chosen, ambiguity))
}

pub fn environment_overlay(config: &AccountConfig) -> Vec<(String, String)> {
    let mut env = vec![("AWS_PROFILE".to_string(), config.aws_profile.clone())];
    if let Some(region) = &config.region {
        env.push(("AWS_REGION".to_string(), region.clone()));
        env.push(("AWS_DEFAULT_REGION".to_string(), region.clone()));
    }
    env
}

// The base directory is literal even when its name contains glob metacharacters.
fn glob_pattern(base_dir: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let base = glob::Pattern::escape(&base_dir.to_string_lossy());
    Path::new(&base).join(pattern).to_string_lossy().into_owned()
}

fn anchor(base: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
