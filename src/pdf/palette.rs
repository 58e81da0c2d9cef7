use std::collections::HashMap;

use crate::issue::Issue;

/// Accent colors handed out to components, in sorted-name order.
const COLORS: [&str; 10] = [
    "#bd7446", "#b65cbf", "#58b758", "#c75980", "#a3b444", "#757dc9", "#d19c3f", "#4eb29d",
    "#d04d41", "#667a36",
];
pub(crate) const DEFAULT_COLOR: &str = "#eeeeee";

/// Component-name-to-color mapping, built once per run and read-only after
/// that. Explicit colors from the config win; remaining components consume
/// the fixed cycle in sorted order; past the end everything is the default
/// gray.
#[derive(Debug)]
pub(crate) struct Palette {
    colors: HashMap<String, String>,
}

impl Palette {
    pub(crate) fn build(issues: &[Issue], overrides: &HashMap<String, String>) -> Self {
        let mut names: Vec<&str> = issues
            .iter()
            .flat_map(|issue| issue.components.iter())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();

        let mut cycle = COLORS.iter();
        let colors = names
            .into_iter()
            .map(|name| {
                let color = overrides.get(name).cloned().unwrap_or_else(|| {
                    cycle.next().map_or(DEFAULT_COLOR, |color| *color).to_string()
                });
                (name.to_string(), color)
            })
            .collect();
        Self { colors }
    }

    /// The accent color for a card: the first (lexicographically smallest)
    /// component decides; an issue without components gets the default gray.
    pub(crate) fn color_for(&self, issue: &Issue) -> &str {
        issue
            .components
            .first()
            .and_then(|component| self.colors.get(component))
            .map_or(DEFAULT_COLOR, String::as_str)
    }
}
