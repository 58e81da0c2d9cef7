use std::{cmp::Reverse, collections::HashMap, fmt};

use miette::Diagnostic;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::ComponentRule;

/// One normalized ticket, no matter which source produced it. Constructed
/// once per fetched item and immutable afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Issue {
    pub(crate) key: String,
    pub(crate) summary: String,
    pub(crate) description: Option<String>,
    pub(crate) reporter: Option<String>,
    /// Renamed, de-duplicated, and sorted, so the first entry (which drives
    /// the card color) is deterministic.
    pub(crate) components: Vec<String>,
    /// Original estimate in seconds.
    pub(crate) estimate: Option<i64>,
    pub(crate) assignee: Option<String>,
    pub(crate) priority: Option<i64>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.summary)
    }
}

/// Final card order: ascending by component list, then descending by
/// priority. Issues without a priority sort after everything else in their
/// component group.
pub(crate) fn sort_issues(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.components
            .cmp(&b.components)
            .then_with(|| Reverse(priority_rank(a)).cmp(&Reverse(priority_rank(b))))
    });
}

fn priority_rank(issue: &Issue) -> i64 {
    issue.priority.unwrap_or(i64::MIN)
}

/// The compiled component rename rules plus the explicit palette colors
/// declared alongside them.
#[derive(Debug, Default)]
pub(crate) struct ComponentRules {
    matchers: Vec<Matcher>,
    colors: HashMap<String, String>,
}

#[derive(Debug)]
struct Matcher {
    regex: Regex,
    name: String,
}

impl ComponentRules {
    /// Longest pattern first, so the most specific rule wins when several
    /// match the same raw component.
    pub(crate) fn compile(mut rules: Vec<ComponentRule>) -> Result<Self, Error> {
        rules.sort_by_key(|rule| Reverse(rule.pattern.as_ref().map_or(0, String::len)));

        let mut matchers = Vec::new();
        let mut colors = HashMap::new();
        for rule in rules {
            if let Some(color) = rule.color {
                colors.insert(rule.name.clone(), color);
            }
            let Some(pattern) = rule.pattern.filter(|pattern| !pattern.is_empty()) else {
                continue;
            };
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::Pattern { pattern, source })?;
            matchers.push(Matcher {
                regex,
                name: rule.name,
            });
        }
        Ok(Self { matchers, colors })
    }

    /// Renames every raw component, then de-duplicates and sorts the result.
    pub(crate) fn rename_all(&self, raw: Vec<String>) -> Vec<String> {
        let mut components: Vec<String> = raw
            .into_iter()
            .map(|component| self.rename(component))
            .collect();
        components.sort_unstable();
        components.dedup();
        components
    }

    fn rename(&self, raw: String) -> String {
        self.matchers
            .iter()
            .find(|matcher| matcher.regex.is_match(&raw))
            .map_or(raw, |matcher| matcher.name.clone())
    }

    /// Explicit component colors from the config, keyed by renamed label.
    pub(crate) fn colors(&self) -> &HashMap<String, String> {
        &self.colors
    }
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum Error {
    #[error("Invalid component pattern {pattern:?}: {source}")]
    #[diagnostic(
        code(issue::pattern),
        help("Each `pattern` in the config's components array must be a valid regex.")
    )]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
