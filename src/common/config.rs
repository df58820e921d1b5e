use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::Transform;

pub const DEFAULT_LAPTOP_DISPLAY_PREFIX: &str = "eDP";

#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, strum::Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Arrange {
    #[default]
    Row,
    #[serde(alias = "col")]
    #[value(alias = "col")]
    Column,
}

#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, strum::Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Align {
    #[default]
    Top,
    Middle,
    Bottom,
    Left,
    Right,
}

impl Align {
    pub fn default_for(arrange: Arrange) -> Align {
        match arrange {
            Arrange::Row => Align::Top,
            Arrange::Column => Align::Left,
        }
    }

    pub fn is_compatible(self, arrange: Arrange) -> bool {
        match arrange {
            Arrange::Row => matches!(self, Align::Top | Align::Middle | Align::Bottom),
            Arrange::Column => matches!(self, Align::Left | Align::Middle | Align::Right),
        }
    }
}

#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, strum::Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogThreshold {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogThreshold {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogThreshold::Debug => "debug",
            LogThreshold::Info => "info",
            LogThreshold::Warning => "warn",
            LogThreshold::Error => "error",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct UserScale {
    pub name_desc: String,
    pub scale: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct UserTransform {
    pub name_desc: String,
    pub transform: Transform,
}

/// Deltas accepted over IPC and from the command line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCommand {
    SetArrangeAlign {
        arrange: Option<Arrange>,
        align: Option<Align>,
    },
    SetOrder(Vec<String>),
    SetAutoScale(bool),
    SetScale(UserScale),
    DeleteScale(String),
    SetTransform(UserTransform),
    DeleteTransform(String),
    AddMaxPreferredRefresh(String),
    DeleteMaxPreferredRefresh(String),
    AddDisabled(String),
    DeleteDisabled(String),
    SetLaptopDisplayPrefix(String),
    SetLogThreshold(LogThreshold),
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(dir.join("way-layout"))
}

pub fn config_file() -> anyhow::Result<PathBuf> { Ok(config_dir()?.join("cfg.toml")) }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub arrange: Arrange,
    #[serde(default)]
    pub align: Align,
    /// Name or description patterns, placed first in this order.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default = "yes")]
    pub auto_scale: bool,
    #[serde(default)]
    pub max_preferred_refresh: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default = "default_laptop_display_prefix")]
    pub laptop_display_prefix: String,
    #[serde(default)]
    pub log_threshold: LogThreshold,
    // Arrays of tables have to come after plain values in TOML.
    #[serde(default)]
    pub scale: Vec<UserScale>,
    #[serde(default)]
    pub transform: Vec<UserTransform>,
}

fn yes() -> bool { true }

fn default_laptop_display_prefix() -> String { DEFAULT_LAPTOP_DISPLAY_PREFIX.to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            arrange: Arrange::default(),
            align: Align::default(),
            order: Vec::new(),
            auto_scale: true,
            max_preferred_refresh: Vec::new(),
            disabled: Vec::new(),
            laptop_display_prefix: default_laptop_display_prefix(),
            log_threshold: LogThreshold::default(),
            scale: Vec::new(),
            transform: Vec::new(),
        }
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let mut config = Self::parse(&buf)?;
        config.fix();
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when it is missing or invalid.
    pub fn load(path: &Path) -> Config {
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Config::default();
        }
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e:#}; using defaults");
                Config::default()
            }
        }
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => bail!("{e}"),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())
            .with_context(|| format!("Could not write {}", path.display()))?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.align.is_compatible(self.arrange) {
            issues.push(format!(
                "align '{}' is not compatible with arrange '{}'",
                self.align, self.arrange
            ));
        }

        for user_scale in &self.scale {
            if user_scale.scale <= 0.0 {
                issues.push(format!(
                    "scale {} for '{}' must be greater than zero",
                    user_scale.scale, user_scale.name_desc
                ));
            }
        }

        let patterns = self
            .order
            .iter()
            .chain(&self.max_preferred_refresh)
            .chain(&self.disabled)
            .chain(self.scale.iter().map(|s| &s.name_desc))
            .chain(self.transform.iter().map(|t| &t.name_desc));
        for pattern in patterns {
            issues.extend(validate_pattern(pattern));
        }

        issues
    }

    /// Repairs what [`Config::validate`] would complain about, warning for each change.
    pub fn fix(&mut self) {
        if !self.align.is_compatible(self.arrange) {
            let align = Align::default_for(self.arrange);
            warn!(
                "Ignoring align '{}' for arrange '{}', using '{}'",
                self.align, self.arrange, align
            );
            self.align = align;
        }

        self.scale.retain(|s| {
            let keep = s.scale > 0.0 && validate_pattern(&s.name_desc).is_none();
            if !keep {
                warn!("Ignoring invalid scale {} for '{}'", s.scale, s.name_desc);
            }
            keep
        });
        self.transform.retain(|t| {
            let issue = validate_pattern(&t.name_desc);
            if let Some(issue) = &issue {
                warn!("Ignoring transform: {issue}");
            }
            issue.is_none()
        });
        for list in [&mut self.order, &mut self.max_preferred_refresh, &mut self.disabled] {
            list.retain(|pattern| {
                let issue = validate_pattern(pattern);
                if let Some(issue) = &issue {
                    warn!("Ignoring {issue}");
                }
                issue.is_none()
            });
        }
    }

    /// Produces the configuration resulting from `cmd`, or the reasons it was rejected.
    pub fn apply_command(&self, cmd: ConfigCommand) -> Result<Config, String> {
        let mut new_config = self.clone();
        let mut errors: Vec<String> = Vec::new();

        macro_rules! set_value {
            ($path:expr, $value:expr, $name:literal) => {{
                $path = $value;
                info!("Updated {} to: {:?}", $name, $path);
            }};
        }

        fn add_unique(list: &mut Vec<String>, value: String, name: &str) {
            if !list.contains(&value) {
                info!("Added '{}' to {}", value, name);
                list.push(value);
            }
        }

        fn delete_from(list: &mut Vec<String>, value: &str, name: &str, errors: &mut Vec<String>) {
            let before = list.len();
            list.retain(|v| v != value);
            if list.len() == before {
                errors.push(format!("'{}' not found in {}", value, name));
            } else {
                info!("Removed '{}' from {}", value, name);
            }
        }

        match cmd {
            ConfigCommand::SetArrangeAlign { arrange, align } => {
                if arrange.is_none() && align.is_none() {
                    errors.push("Neither arrange nor align given".to_string());
                }
                if let Some(arrange) = arrange {
                    set_value!(new_config.arrange, arrange, "arrange");
                    if align.is_none() && !new_config.align.is_compatible(arrange) {
                        set_value!(new_config.align, Align::default_for(arrange), "align");
                    }
                }
                if let Some(align) = align {
                    set_value!(new_config.align, align, "align");
                }
            }
            ConfigCommand::SetOrder(order) => set_value!(new_config.order, order, "order"),
            ConfigCommand::SetAutoScale(v) => set_value!(new_config.auto_scale, v, "auto_scale"),
            ConfigCommand::SetScale(user_scale) => {
                match new_config.scale.iter_mut().find(|s| s.name_desc == user_scale.name_desc) {
                    Some(existing) => existing.scale = user_scale.scale,
                    None => new_config.scale.push(user_scale.clone()),
                }
                info!("Updated scale for '{}' to: {}", user_scale.name_desc, user_scale.scale);
            }
            ConfigCommand::DeleteScale(name_desc) => {
                let before = new_config.scale.len();
                new_config.scale.retain(|s| s.name_desc != name_desc);
                if new_config.scale.len() == before {
                    errors.push(format!("No scale for '{}'", name_desc));
                }
            }
            ConfigCommand::SetTransform(user_transform) => {
                match new_config
                    .transform
                    .iter_mut()
                    .find(|t| t.name_desc == user_transform.name_desc)
                {
                    Some(existing) => existing.transform = user_transform.transform,
                    None => new_config.transform.push(user_transform.clone()),
                }
                info!(
                    "Updated transform for '{}' to: {}",
                    user_transform.name_desc, user_transform.transform
                );
            }
            ConfigCommand::DeleteTransform(name_desc) => {
                let before = new_config.transform.len();
                new_config.transform.retain(|t| t.name_desc != name_desc);
                if new_config.transform.len() == before {
                    errors.push(format!("No transform for '{}'", name_desc));
                }
            }
            ConfigCommand::AddMaxPreferredRefresh(v) => {
                add_unique(&mut new_config.max_preferred_refresh, v, "max_preferred_refresh")
            }
            ConfigCommand::DeleteMaxPreferredRefresh(v) => delete_from(
                &mut new_config.max_preferred_refresh,
                &v,
                "max_preferred_refresh",
                &mut errors,
            ),
            ConfigCommand::AddDisabled(v) => add_unique(&mut new_config.disabled, v, "disabled"),
            ConfigCommand::DeleteDisabled(v) => {
                delete_from(&mut new_config.disabled, &v, "disabled", &mut errors)
            }
            ConfigCommand::SetLaptopDisplayPrefix(v) => {
                set_value!(new_config.laptop_display_prefix, v, "laptop_display_prefix")
            }
            ConfigCommand::SetLogThreshold(v) => {
                set_value!(new_config.log_threshold, v, "log_threshold")
            }
        }

        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        let validation_issues = new_config.validate();
        if !validation_issues.is_empty() {
            return Err(validation_issues.join("; "));
        }

        Ok(new_config)
    }
}

fn validate_pattern(pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        return Some("empty name or description pattern".to_string());
    }
    let expr = pattern.strip_prefix('!')?;
    match Regex::new(expr) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex '{}': {}", expr, e)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DEFAULT_CONFIG: &str = include_str!("../../way-layout.default.toml");

    #[test]
    fn shipped_default_matches_builtin_default() {
        let parsed = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.auto_scale);
        assert_eq!(config.laptop_display_prefix, "eDP");
    }

    #[test]
    fn parses_full_file() {
        let config = Config::parse(
            r#"
            arrange = "col"
            align = "right"
            order = ["eDP-1", "!^DP-[0-9]$"]
            auto_scale = false
            max_preferred_refresh = ["HDMI"]
            disabled = ["Acer"]
            log_threshold = "warning"

            [[scale]]
            name_desc = "eDP-1"
            scale = 1.5

            [[transform]]
            name_desc = "DP-2"
            transform = "flipped-90"
            "#,
        )
        .unwrap();

        assert_eq!(config.arrange, Arrange::Column);
        assert_eq!(config.align, Align::Right);
        assert_eq!(config.order, vec!["eDP-1", "!^DP-[0-9]$"]);
        assert!(!config.auto_scale);
        assert_eq!(config.log_threshold, LogThreshold::Warning);
        assert_eq!(config.scale, vec![UserScale { name_desc: "eDP-1".into(), scale: 1.5 }]);
        assert_eq!(config.transform[0].transform, Transform::Flipped90);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::parse("arange = \"row\"").unwrap_err();
        assert!(err.to_string().contains("arange"));
    }

    #[test]
    fn validate_reports_each_problem() {
        let config = Config {
            arrange: Arrange::Row,
            align: Align::Left,
            scale: vec![UserScale { name_desc: "DP-1".into(), scale: 0.0 }],
            disabled: vec!["![".into()],
            ..Config::default()
        };

        let issues = config.validate();
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert!(issues.iter().any(|i| i.contains("not compatible")));
        assert!(issues.iter().any(|i| i.contains("greater than zero")));
        assert!(issues.iter().any(|i| i.contains("invalid regex")));
    }

    #[test_log::test]
    fn fix_resets_incompatible_align_and_drops_bad_entries() {
        let mut config = Config {
            arrange: Arrange::Column,
            align: Align::Bottom,
            scale: vec![
                UserScale { name_desc: "DP-1".into(), scale: -1.0 },
                UserScale { name_desc: "DP-2".into(), scale: 2.0 },
            ],
            order: vec!["!(".into(), "HDMI-A-1".into()],
            ..Config::default()
        };

        config.fix();

        assert_eq!(config.align, Align::Left);
        assert_eq!(config.scale.len(), 1);
        assert_eq!(config.scale[0].name_desc, "DP-2");
        assert_eq!(config.order, vec!["HDMI-A-1"]);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn arrange_change_resets_incompatible_align() {
        let config = Config { align: Align::Bottom, ..Config::default() };
        let new = config
            .apply_command(ConfigCommand::SetArrangeAlign {
                arrange: Some(Arrange::Column),
                align: None,
            })
            .unwrap();
        assert_eq!(new.arrange, Arrange::Column);
        assert_eq!(new.align, Align::Left);
    }

    #[test]
    fn incompatible_explicit_align_is_rejected() {
        let err = Config::default()
            .apply_command(ConfigCommand::SetArrangeAlign {
                arrange: Some(Arrange::Row),
                align: Some(Align::Right),
            })
            .unwrap_err();
        assert!(err.contains("not compatible"));
    }

    #[test]
    fn set_scale_replaces_existing_entry() {
        let config = Config::default()
            .apply_command(ConfigCommand::SetScale(UserScale {
                name_desc: "eDP-1".into(),
                scale: 2.0,
            }))
            .unwrap()
            .apply_command(ConfigCommand::SetScale(UserScale {
                name_desc: "eDP-1".into(),
                scale: 1.25,
            }))
            .unwrap();
        assert_eq!(config.scale, vec![UserScale { name_desc: "eDP-1".into(), scale: 1.25 }]);

        let config = config.apply_command(ConfigCommand::DeleteScale("eDP-1".into())).unwrap();
        assert!(config.scale.is_empty());
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let err = Config::default()
            .apply_command(ConfigCommand::SetScale(UserScale {
                name_desc: "eDP-1".into(),
                scale: -2.0,
            }))
            .unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn list_add_is_idempotent_and_delete_reports_missing() {
        let config = Config::default()
            .apply_command(ConfigCommand::AddDisabled("HDMI-A-1".into()))
            .unwrap()
            .apply_command(ConfigCommand::AddDisabled("HDMI-A-1".into()))
            .unwrap();
        assert_eq!(config.disabled, vec!["HDMI-A-1"]);

        let err = config.apply_command(ConfigCommand::DeleteDisabled("DP-3".into())).unwrap_err();
        assert!(err.contains("not found"));

        let config = config.apply_command(ConfigCommand::DeleteDisabled("HDMI-A-1".into())).unwrap();
        assert!(config.disabled.is_empty());
    }

    #[test]
    fn transform_set_and_delete() {
        let config = Config::default()
            .apply_command(ConfigCommand::SetTransform(UserTransform {
                name_desc: "DP-2".into(),
                transform: Transform::Rotate90,
            }))
            .unwrap();
        assert_eq!(config.transform[0].transform, Transform::Rotate90);

        assert!(config.apply_command(ConfigCommand::DeleteTransform("DP-3".into())).is_err());
        let config = config.apply_command(ConfigCommand::DeleteTransform("DP-2".into())).unwrap();
        assert!(config.transform.is_empty());
    }

    #[test]
    fn save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cfg.toml");

        let config = Config {
            arrange: Arrange::Column,
            align: Align::Middle,
            order: vec!["DP-2".into(), "eDP-1".into()],
            max_preferred_refresh: vec!["DP-2".into()],
            log_threshold: LogThreshold::Debug,
            scale: vec![UserScale { name_desc: "eDP-1".into(), scale: 1.75 }],
            transform: vec![UserTransform {
                name_desc: "DP-2".into(),
                transform: Transform::Rotate270,
            }],
            ..Config::default()
        };
        config.save(&path).unwrap();

        assert_eq!(Config::read(&path).unwrap(), config);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_unknown_key_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(&path, "arange = \"column\"\n").unwrap();
        assert_eq!(Config::load(&path), Config::default());
    }
}
