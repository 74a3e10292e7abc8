use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The only placeholder a template may contain.
pub const CONTENT_VARIABLE: &str = "content";

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("placeholder pattern is valid");
}

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("Invalid mode '{mode}'. Available modes: {available}")]
    UnknownMode { mode: String, available: String },

    #[error("Prompt template '{name}' is empty")]
    EmptyTemplate { name: String },

    #[error("Prompt template '{name}' uses unknown placeholders: {variables}")]
    UnreplacedVariables { name: String, variables: String },

    #[error("Prompt template '{name}' is already registered")]
    DuplicateMode { name: String },
}

/// A named prompt that wraps user input through the `{content}` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(name: &str, description: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            template: template.to_string(),
        }
    }

    /// Checks the template text itself, independent of any input.
    pub fn validate(&self) -> Result<(), PromptError> {
        if self.template.trim().is_empty() {
            return Err(PromptError::EmptyTemplate {
                name: self.name.clone(),
            });
        }

        let mut unknown: Vec<&str> = PLACEHOLDER
            .captures_iter(&self.template)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str())
            .filter(|name| *name != CONTENT_VARIABLE)
            .collect();

        if !unknown.is_empty() {
            unknown.sort_unstable();
            unknown.dedup();
            return Err(PromptError::UnreplacedVariables {
                name: self.name.clone(),
                variables: unknown.join(", "),
            });
        }

        Ok(())
    }

    /// Substitutes `content` for every `{content}` placeholder.
    ///
    /// Braces inside `content` are left alone.
    pub fn render(&self, content: &str) -> Result<String, PromptError> {
        self.validate()?;
        Ok(PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures| {
                if &caps[1] == CONTENT_VARIABLE {
                    content.to_string()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned())
    }
}

/// The set of templates available to the runner, keyed by mode name.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    templates: BTreeMap<String, PromptTemplate>,
}

impl PromptTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `solo` and `dialogue` templates shipped with the binary.
    pub fn builtin() -> Self {
        let mut templates = Self::new();
        for template in super::defaults::get_default_templates() {
            templates.templates.insert(template.name.clone(), template);
        }
        templates
    }

    pub fn register(&mut self, template: PromptTemplate) -> Result<(), PromptError> {
        template.validate()?;
        if self.templates.contains_key(&template.name) {
            return Err(PromptError::DuplicateMode {
                name: template.name,
            });
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Adds or replaces a template, e.g. one defined in the config file.
    pub fn override_with(&mut self, template: PromptTemplate) -> Result<(), PromptError> {
        template.validate()?;
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn get(&self, mode: &str) -> Result<&PromptTemplate, PromptError> {
        self.templates
            .get(mode)
            .ok_or_else(|| PromptError::UnknownMode {
                mode: mode.to_string(),
                available: self.modes().join(", "),
            })
    }

    pub fn modes(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.values()
    }

    pub fn build(&self, mode: &str, content: &str) -> Result<String, PromptError> {
        self.get(mode)?.render(content)
    }
}
