//! Programs: ordered projections plus classifier rules.
//!
//! ## Responsibilities
//!
//! - Parse rule text and projection files into a validated [`Program`]
//! - Keep declared order (it decides which rule wins)
//! - Enforce unique ids and kernel-projection precedence
//! - Render the program back to rule lines for snapshots
//!
//! A program is immutable once built and can be shared between runs.

pub mod loader;
pub mod projection;
pub mod syntax;

pub use loader::load_projections;
pub use projection::{Projection, KERNEL_PREFIX};
pub use syntax::{
    parse_rule_line, parse_rules, parse_term, render_rule, render_term, RuleAction, RuleLine,
};

use crate::canonical::sha256_hex;
use crate::classify::ClassifierRule;
use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use std::collections::BTreeSet;

/// One entry of a program, in declared order.
#[derive(Debug, Clone)]
pub enum Rule {
    Rewrite(Projection),
    Route(ClassifierRule),
}

impl Rule {
    pub fn id(&self) -> &str {
        match self {
            Rule::Rewrite(p) => &p.id,
            Rule::Route(c) => &c.id,
        }
    }

    /// # Errors
    ///
    /// Returns `Serialization` if a term cannot be rendered.
    pub fn render(&self) -> Result<String> {
        match self {
            Rule::Rewrite(p) => render_rule(&p.id, &p.pattern, &RuleAction::Rewrite(p.body.clone())),
            Rule::Route(c) => render_rule(&c.id, &c.pattern, &RuleAction::Route(c.bucket)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    rules: Vec<Rule>,
}

impl Program {
    /// Validate a rule list.
    ///
    /// # Errors
    ///
    /// * `DuplicateProjection` - two rules share an id
    /// * `ProjectionOrder` - a `kernel.` projection follows a domain projection
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !seen.insert(rule.id()) {
                return Err(RcxError::DuplicateProjection {
                    projection_id: rule.id().to_string(),
                });
            }
        }

        let mut first_domain: Option<&str> = None;
        for rule in &rules {
            let Rule::Rewrite(projection) = rule else {
                continue;
            };
            match first_domain {
                None if !projection.is_kernel() => first_domain = Some(&projection.id),
                Some(after) if projection.is_kernel() => {
                    return Err(RcxError::ProjectionOrder {
                        projection_id: projection.id.clone(),
                        after: after.to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(Self { rules })
    }

    /// Build a program from rule text. Unlabelled rules get `rule.<n>`, where
    /// `n` counts rules from 1 in declared order.
    ///
    /// # Errors
    ///
    /// Returns `RuleSyntax` for unparsable lines and any validation error from
    /// [`Program::new`].
    pub fn parse(text: &str, limits: &Limits) -> Result<Self> {
        let mut rules = Vec::new();
        for (index, line) in parse_rules(text)?.into_iter().enumerate() {
            let id = line.id.unwrap_or_else(|| format!("rule.{}", index + 1));
            let rule = match line.action {
                RuleAction::Rewrite(body) => {
                    Rule::Rewrite(Projection::new(id, line.pattern, body, limits)?)
                }
                RuleAction::Route(bucket) => {
                    Rule::Route(ClassifierRule::new(id, line.pattern, bucket, limits)?)
                }
            };
            rules.push(rule);
        }
        Self::new(rules)
    }

    /// Build a program from rendered rule lines, as stored in a snapshot.
    ///
    /// # Errors
    ///
    /// See [`Program::parse`].
    pub fn from_rule_lines(lines: &[String], limits: &Limits) -> Result<Self> {
        Self::parse(&lines.join("\n"), limits)
    }

    /// Build a program from a projection file.
    ///
    /// # Errors
    ///
    /// See [`load_projections`] and [`Program::new`].
    pub fn from_projection_json(text: &str, limits: &Limits) -> Result<Self> {
        let rules = load_projections(text, limits)?
            .into_iter()
            .map(Rule::Rewrite)
            .collect();
        Self::new(rules)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rewrite projections in declared order.
    pub fn projections(&self) -> impl Iterator<Item = &Projection> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Rewrite(p) => Some(p),
            Rule::Route(_) => None,
        })
    }

    /// Classifier rules in declared order.
    pub fn classifiers(&self) -> impl Iterator<Item = &ClassifierRule> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Route(c) => Some(c),
            Rule::Rewrite(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule as a labelled line.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a term cannot be rendered.
    pub fn rule_lines(&self) -> Result<Vec<String>> {
        self.rules.iter().map(Rule::render).collect()
    }

    /// SHA-256 of the rendered rule lines joined by newlines.
    ///
    /// # Errors
    ///
    /// See [`Program::rule_lines`].
    pub fn digest(&self) -> Result<String> {
        Ok(sha256_hex(self.rule_lines()?.join("\n").as_bytes()))
    }
}
