//! Skill descriptor table loaded once from configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One forwardable skill bot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillDescriptor {
    pub id: String,
    pub app_id: String,
    pub skill_endpoint: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkillError {
    #[error("skill '{0}' is not configured")]
    UnknownSkill(String),
    #[error("skill '{0}' is configured more than once")]
    DuplicateSkill(String),
    #[error("skill host endpoint is empty")]
    MissingHostEndpoint,
}

/// Immutable map of skill name to descriptor, plus the shared callback endpoint
#[derive(Debug, Clone)]
pub struct SkillsTable {
    skills: HashMap<String, SkillDescriptor>,
    host_endpoint: String,
}

impl SkillsTable {
    pub fn new(
        host_endpoint: impl Into<String>,
        skills: impl IntoIterator<Item = SkillDescriptor>,
    ) -> Result<Self, SkillError> {
        let host_endpoint = host_endpoint.into();
        if host_endpoint.trim().is_empty() {
            return Err(SkillError::MissingHostEndpoint);
        }

        let mut map = HashMap::new();
        for skill in skills {
            if map.contains_key(&skill.id) {
                return Err(SkillError::DuplicateSkill(skill.id));
            }
            map.insert(skill.id.clone(), skill);
        }

        Ok(Self {
            skills: map,
            host_endpoint,
        })
    }

    /// Look up a skill by name
    pub fn get(&self, id: &str) -> Result<&SkillDescriptor, SkillError> {
        self.skills
            .get(id)
            .ok_or_else(|| SkillError::UnknownSkill(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    /// Callback endpoint skills use to reach this bot
    pub fn host_endpoint(&self) -> &str {
        &self.host_endpoint
    }

    /// All skills, sorted by name
    pub fn list(&self) -> Vec<&SkillDescriptor> {
        let mut list: Vec<&SkillDescriptor> = self.skills.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
