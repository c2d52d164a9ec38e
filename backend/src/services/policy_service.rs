//! Content policy screening for prompts and generated answers.
//!
//! Rules are checked in order. A pattern rule contributes its name once when
//! it matches; a keyword rule contributes `rule:keyword` for every keyword
//! found (case-insensitive substring match).

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::{AppError, Result};

/// How a rule detects a violation.
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    Pattern(Regex),
    Keywords(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub name: String,
    pub matcher: RuleMatcher,
}

impl PolicyRule {
    pub fn pattern(name: &str, pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::Config(format!("invalid pattern for rule '{}': {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            matcher: RuleMatcher::Pattern(regex),
        })
    }

    pub fn keywords(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            matcher: RuleMatcher::Keywords(keywords.iter().map(|k| k.to_lowercase()).collect()),
        }
    }

    fn collect_violations(&self, text: &str, lowered: &str, out: &mut Vec<String>) {
        match &self.matcher {
            RuleMatcher::Pattern(regex) => {
                if regex.is_match(text) {
                    out.push(self.name.clone());
                }
            }
            RuleMatcher::Keywords(keywords) => {
                for keyword in keywords {
                    if lowered.contains(keyword.as_str()) {
                        out.push(format!("{}:{}", self.name, keyword));
                    }
                }
            }
        }
    }
}

/// Rule definition as read from a rules file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleDefinition {
    Pattern { name: String, pattern: String },
    Keywords { name: String, keywords: Vec<String> },
}

/// Outcome of screening a prompt and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyVerdict {
    pub flagged: bool,
    pub violations: Vec<String>,
}

/// Ordered set of policy rules.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
    enabled: bool,
}

/// Built-in rule set covering PII, harmful and sensitive-advice content.
pub fn default_rules() -> Vec<PolicyRule> {
    let patterns = [
        ("pii_ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
        ("pii_credit_card", r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b"),
        ("pii_email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ];
    let mut rules: Vec<PolicyRule> = patterns
        .iter()
        .filter_map(|(name, pattern)| PolicyRule::pattern(name, pattern).ok())
        .collect();

    rules.push(PolicyRule::keywords(
        "harmful_violence",
        &["violence", "harm", "attack", "kill"],
    ));
    rules.push(PolicyRule::keywords(
        "harmful_hate",
        &["hate", "discriminate", "racist", "sexist"],
    ));
    rules.push(PolicyRule::keywords(
        "sensitive_medical",
        &["diagnosis", "prescription", "medical advice"],
    ));
    rules.push(PolicyRule::keywords(
        "sensitive_legal",
        &["legal advice", "sue", "lawsuit"],
    ));
    rules.push(PolicyRule::keywords(
        "sensitive_financial",
        &["investment advice", "stock tip", "financial advice"],
    ));
    rules
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl PolicyEngine {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules,
            enabled: true,
        }
    }

    /// An engine that never reports violations.
    pub fn disabled() -> Self {
        Self {
            rules: Vec::new(),
            enabled: false,
        }
    }

    /// Parse a JSON array of `{name, pattern}` or `{name, keywords}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<RuleDefinition> = serde_json::from_str(json)
            .map_err(|e| AppError::Config(format!("invalid policy rules: {}", e)))?;

        let rules = definitions
            .into_iter()
            .map(|def| match def {
                RuleDefinition::Pattern { name, pattern } => PolicyRule::pattern(&name, &pattern),
                RuleDefinition::Keywords { name, keywords } => {
                    let keywords: Vec<&str> = keywords.iter().map(String::as_str).collect();
                    Ok(PolicyRule::keywords(&name, &keywords))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(rules))
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read policy rules '{}': {}", path, e)))?;
        Self::from_json(&contents)
    }

    /// Build the engine selected by configuration.
    pub fn from_config(enabled: bool, rules_path: Option<&str>) -> Result<Self> {
        if !enabled {
            tracing::warn!("Policy checking is disabled");
            return Ok(Self::disabled());
        }
        match rules_path {
            Some(path) => {
                let engine = Self::from_json_file(path)?;
                tracing::info!(path, rules = engine.rules.len(), "Loaded policy rules");
                Ok(engine)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Violations found in `text`, in rule order.
    pub fn check_text(&self, text: &str) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let lowered = text.to_lowercase();
        let mut violations = Vec::new();
        for rule in &self.rules {
            rule.collect_violations(text, &lowered, &mut violations);
        }
        violations
    }

    /// Screen both sides of an interaction; prompt violations come first.
    pub fn check_prompt_and_response(&self, prompt: &str, response: &str) -> PolicyVerdict {
        let violations: Vec<String> = self
            .check_text(prompt)
            .into_iter()
            .map(|v| format!("prompt:{}", v))
            .chain(
                self.check_text(response)
                    .into_iter()
                    .map(|v| format!("response:{}", v)),
            )
            .collect();

        if violations.is_empty() {
            tracing::debug!("Policy check passed");
        } else {
            tracing::warn!(count = violations.len(), violations = ?violations, "Policy violations detected");
        }

        PolicyVerdict {
            flagged: !violations.is_empty(),
            violations,
        }
    }
}
