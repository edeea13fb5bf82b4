use anyhow::{Context, Result};
use relaybot_core::{RouterSettings, SkillDescriptor, SkillsTable};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub skills: SkillsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default = "default_trigger")]
    pub trigger: String,
    #[serde(default = "default_skill")]
    pub default_skill: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            trigger: default_trigger(),
            default_skill: default_skill(),
        }
    }
}

fn default_trigger() -> String {
    "skill".to_string()
}

fn default_skill() -> String {
    "SkillBot".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3428".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    pub host_endpoint: String,
    #[serde(default)]
    pub entries: Vec<SkillEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    pub skill_endpoint: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.relaybot/state.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".relaybot")
}

impl RelayConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // Refuse group/world-readable config files (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `relaybot init` first.",
                path.display()
            )
        })?;

        Self::parse(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Parse config text, expanding allowlisted environment variables first
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;

        if config.bot.app_id.is_empty() {
            warn!("bot.app_id is empty; skills will see an anonymous sender");
        }
        if config.skills.entries.is_empty() {
            warn!("No skills configured under [[skills.entries]]");
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.gateway
            .bind
            .parse()
            .with_context(|| format!("Invalid gateway bind address '{}'", self.gateway.bind))
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            bot_id: self.bot.app_id.clone(),
            trigger: self.bot.trigger.clone(),
            default_skill: self.bot.default_skill.clone(),
        }
    }

    pub fn skills_table(&self) -> Result<SkillsTable> {
        let descriptors = self.skills.entries.iter().map(|e| SkillDescriptor {
            id: e.id.clone(),
            app_id: e.app_id.clone(),
            skill_endpoint: e.skill_endpoint.clone(),
        });
        SkillsTable::new(self.skills.host_endpoint.clone(), descriptors)
            .context("Invalid [skills] configuration")
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
const ALLOWED_ENV_VARS: &[&str] = &["RELAYBOT_APP_ID", "SKILL_BOT_APP_ID", "HOME", "USER"];

/// Expand `${VAR}` for allowlisted names in one pass; anything else stays as written
fn expand_env_vars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let name = &rest[start + 2..start + 2 + len];
        let end = start + len + 3;

        out.push_str(&rest[..start]);
        if ALLOWED_ENV_VARS.contains(&name) {
            out.push_str(&std::env::var(name).unwrap_or_default());
        } else {
            warn!("Not expanding '{}' in config: not on the allowlist", name);
            out.push_str(&rest[start..end]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = include_str!("../../../config/default.toml");

    #[test]
    fn test_default_config_parses() {
        let cfg = RelayConfig::parse(DEFAULT).unwrap();
        assert_eq!(cfg.bot.trigger, "skill");
        assert_eq!(cfg.bot.default_skill, "SkillBot");
        assert_eq!(cfg.state.backend, StateBackend::Sqlite);
        assert_eq!(cfg.transport.timeout_secs, 30);
        assert_eq!(cfg.bind_addr().unwrap().port(), 3428);

        let table = cfg.skills_table().unwrap();
        assert!(table.contains("SkillBot"));
        assert_eq!(table.host_endpoint(), "http://localhost:3428/api/skills");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = RelayConfig::parse(
            r#"
            [skills]
            host_endpoint = "http://localhost:3978/api/skills"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bot.trigger, "skill");
        assert_eq!(cfg.gateway.bind, "127.0.0.1:3428");
        assert_eq!(cfg.state.db_path, "~/.relaybot/state.db");
        assert!(cfg.skills.entries.is_empty());

        let settings = cfg.router_settings();
        assert_eq!(settings.default_skill, "SkillBot");
    }

    #[test]
    fn test_memory_backend() {
        let cfg = RelayConfig::parse(
            r#"
            [skills]
            host_endpoint = "http://host"
            [state]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.state.backend, StateBackend::Memory);
    }

    #[test]
    fn test_duplicate_skill_entries_rejected() {
        let cfg = RelayConfig::parse(
            r#"
            [skills]
            host_endpoint = "http://host"
            [[skills.entries]]
            id = "A"
            skill_endpoint = "http://a"
            [[skills.entries]]
            id = "A"
            skill_endpoint = "http://a2"
            "#,
        )
        .unwrap();
        assert!(cfg.skills_table().is_err());
    }

    #[test]
    fn test_invalid_bind() {
        let mut cfg = RelayConfig::parse(DEFAULT).unwrap();
        cfg.gateway.bind = "not an address".to_string();
        assert!(cfg.bind_addr().is_err());
    }

    #[test]
    fn test_expand_env_vars_allowlist() {
        // SAFETY: test-only env mutation of a variable no other test reads
        unsafe { std::env::set_var("SKILL_BOT_APP_ID", "skill-123") };
        let out = expand_env_vars("app_id = \"${SKILL_BOT_APP_ID}\" other = \"${SECRET_THING}\"");
        assert_eq!(out, "app_id = \"skill-123\" other = \"${SECRET_THING}\"");
    }

    #[test]
    fn test_expanded_values_are_not_expanded_again() {
        // SAFETY: test-only env mutation of a variable no other test asserts on
        unsafe { std::env::set_var("RELAYBOT_APP_ID", "${USER}") };
        let out = expand_env_vars("app_id = \"${RELAYBOT_APP_ID}\"");
        assert_eq!(out, "app_id = \"${USER}\"");
    }

    #[test]
    fn test_expand_env_vars_unterminated() {
        assert_eq!(expand_env_vars("x = \"${HOME\""), "x = \"${HOME\"");
    }

    #[test]
    fn test_load_missing_file() {
        let path = Some(PathBuf::from("/nonexistent/relaybot/config.toml"));
        let err = RelayConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("relaybot init"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_rejects_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, DEFAULT).unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(RelayConfig::load(&Some(path.clone())).is_err());

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        assert!(RelayConfig::load(&Some(path)).is_ok());
    }
}
