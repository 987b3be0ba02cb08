use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use super::{
    paths::{BackendDataFile, ContextDir, StoreDataFile},
    semester::SemesterOption,
};

#[derive(Debug, serde::Deserialize)]
struct ConfigDO {
    context_dir: String,
    backend: String,
    role: Option<String>,
    hide_all_option_for: Option<Vec<String>>,
}

pub struct Config {
    /// Directory holding the persisted caches of this context.
    context_dir: PathBuf,
    /// TOML file answering the semester endpoints.
    backend: BackendDataFile,
    /// Role of the user looking at the options.
    role: Option<String>,
    all_option: AllOptionPolicy,
    /// Latest invalidations, shared by every context using this config.
    signal_journal: StoreDataFile,
}

/// Decides which roles get to see the "all semesters" entry of the options.
///
/// A role is matched against the configured codes after upper-casing it and
/// replacing whitespace with `_`; a code contained in the role, or a role
/// contained in a code, hides the entry. Without a role the entry is hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllOptionPolicy {
    hidden_for: Vec<String>,
}

impl Default for AllOptionPolicy {
    fn default() -> Self {
        AllOptionPolicy::new(
            ["SINH_VIEN", "GIANG_VIEN", "LOP_TRUONG", "GV", "SV", "LT"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

impl AllOptionPolicy {
    pub fn new(hidden_for: Vec<String>) -> AllOptionPolicy {
        let hidden_for = hidden_for
            .into_iter()
            .map(|it| normalize_role(&it))
            .filter(|it| !it.is_empty())
            .collect();
        AllOptionPolicy { hidden_for }
    }

    pub fn shows_all_option(&self, role: Option<&str>) -> bool {
        let Some(role) = role.map(normalize_role).filter(|it| !it.is_empty()) else {
            return false;
        };
        !self
            .hidden_for
            .iter()
            .any(|code| role.contains(code.as_str()) || code.contains(role.as_str()))
    }

    pub fn filter(&self, options: &[SemesterOption], role: Option<&str>) -> Vec<SemesterOption> {
        if self.shows_all_option(role) {
            return options.to_vec();
        }
        options
            .iter()
            .filter(|option| !option.is_all_semesters())
            .cloned()
            .collect()
    }
}

fn normalize_role(role: &str) -> String {
    role.trim()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

impl Config {
    /// Loads the configuration from the default location, writing a template
    /// first when there is none.
    ///
    /// Platform-specific config directory paths
    /// Linux: $XDG_CONFIG_HOME or $HOME/.config/semgate/config.toml
    /// macOS: $HOME/.config/semgate/config.toml
    /// Windows: {FOLDERID_RoamingAppData}\semgate\config.toml
    pub fn new() -> Result<Config> {
        let config_path = Self::config_path()?;
        if !config_path.is_file() {
            Self::create_default_config_file(&config_path)?;
            bail!(
                "A new config file has been created at: '{}'. Please set 'context_dir' and 'backend' in the config file and try again.",
                &config_path.display()
            )
        }
        Config::from_path(config_path)
    }

    pub fn from_path<P>(path: P) -> Result<Config>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = std::fs::read_to_string(path)
            .with_context(|| anyhow!("Failed to open config file at: {}", path.display()))?;
        let config_do = toml_edit::de::from_str::<ConfigDO>(&file)
            .with_context(|| anyhow!("Could not read Config from toml"))?;

        let all_option = config_do
            .hide_all_option_for
            .map(AllOptionPolicy::new)
            .unwrap_or_default();

        let config_dir = path.parent().unwrap_or(Path::new("."));
        let config = Config {
            context_dir: PathBuf::from(config_do.context_dir),
            backend: BackendDataFile::new(config_do.backend),
            role: config_do.role,
            all_option,
            signal_journal: StoreDataFile::new(config_dir.join("signals.toml")),
        };
        Ok(config)
    }

    pub fn create_default_config_file(path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("Failed to load parent of config file")?;
        std::fs::create_dir_all(parent)?;
        let config_content = include_str!("../../config.toml");
        std::fs::write(path, config_content).context("Failed to create config file")?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            let home_dir =
                dirs::home_dir().context("Failed to find home directory on your system")?;
            home_dir.join(".config")
        } else {
            dirs::config_dir().context("Failed to find config directory on your system.")?
        };
        Ok(config_dir.join("semgate").join("config.toml"))
    }

    pub fn set_context_dir(&mut self, path: PathBuf) {
        self.context_dir = path;
    }

    pub fn context_dir(&self) -> Result<ContextDir> {
        if self.context_dir.as_os_str().is_empty() {
            bail!("'context_dir' is not set. Please set it in the config file or pass --context.")
        }
        ContextDir::new(&self.context_dir)
    }

    pub fn backend(&self) -> BackendDataFile {
        self.backend.clone()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn all_option(&self) -> &AllOptionPolicy {
        &self.all_option
    }

    pub fn signal_journal(&self) -> StoreDataFile {
        self.signal_journal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_do_not_see_the_all_option() {
        let policy = AllOptionPolicy::default();
        assert!(!policy.shows_all_option(Some("sinh vien")));
        assert!(!policy.shows_all_option(Some("GV")));
        assert!(!policy.shows_all_option(None));
        assert!(policy.shows_all_option(Some("ADMIN")));
    }

    #[test]
    fn filter_drops_only_the_all_option() {
        let options = vec![
            SemesterOption::new("", "All semesters"),
            SemesterOption::new("1-2025", "Semester 1 2025"),
        ];
        let policy = AllOptionPolicy::default();
        assert_eq!(policy.filter(&options, Some("ADMIN")), options);
        assert_eq!(policy.filter(&options, Some("SV")), options[1..].to_vec());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
context_dir = "/tmp/semgate-context"
backend = "/tmp/backend.toml"
role = "ADMIN"
hide_all_option_for = ["monitor"]
"#,
        )
        .unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.role(), Some("ADMIN"));
        assert_eq!(&*config.backend(), &PathBuf::from("/tmp/backend.toml"));
        assert!(!config.all_option().shows_all_option(Some("Monitor")));
        assert!(config.all_option().shows_all_option(Some("SV")));
        assert_eq!(&*config.signal_journal(), &dir.path().join("signals.toml"));
    }

    #[test]
    fn missing_keys_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "role = \"ADMIN\"").unwrap();
        assert!(Config::from_path(&path).is_err());
    }
}
