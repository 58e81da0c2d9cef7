use std::{io, path::PathBuf, time::Duration};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::{cli::Cli, issue, issue::ComponentRules};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// The optional JSON config file. Every field can also be supplied (and is
/// overridden) by the command line, except `priorityField` and `components`
/// which only exist here.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Config {
    server: Option<String>,
    user: Option<String>,
    password: Option<String>,
    project: Option<String>,
    #[serde(rename = "fixVersion")]
    fix_version: Option<String>,
    /// Name of the custom Jira field holding the numeric priority.
    #[serde(rename = "priorityField")]
    priority_field: Option<String>,
    timeout: Option<u64>,
    /// Component rename rules, also the source of explicit palette colors.
    #[serde(default)]
    components: Vec<ComponentRule>,
}

/// A rename rule from the config file: every raw component matching
/// `pattern` (case-insensitive search) is relabeled to `name`. A rule
/// without a pattern only contributes its `color` to the palette.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ComponentRule {
    pub(crate) pattern: Option<String>,
    pub(crate) name: String,
    pub(crate) color: Option<String>,
}

impl Config {
    pub(crate) fn load(path: &PathBuf) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| Error::Parse {
            path: path.clone(),
            source,
        })
    }
}

/// Config file and command line merged into one place, with the rename
/// rules compiled. Command-line values win.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) server: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) project: Option<String>,
    pub(crate) fix_version: Option<String>,
    pub(crate) priority_field: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) xml: Option<PathBuf>,
    pub(crate) output: PathBuf,
    pub(crate) rules: ComponentRules,
}

impl Settings {
    pub(crate) fn merge(config: Config, cli: Cli) -> Result<Self, issue::Error> {
        let rules = ComponentRules::compile(config.components)?;
        Ok(Self {
            server: cli.server.or(config.server),
            user: cli.user.or(config.user),
            password: cli.passwd.or(config.password),
            project: cli.project.or(config.project),
            fix_version: cli
                .version
                .map(|tokens| tokens.join(" ").trim_matches('"').to_string())
                .or(config.fix_version),
            priority_field: config.priority_field,
            timeout: Duration::from_secs(
                cli.timeout
                    .or(config.timeout)
                    .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            ),
            xml: cli.xml,
            output: cli.output,
            rules,
        })
    }
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum Error {
    #[error("No such file or directory: {path}")]
    #[diagnostic(
        code(config::read),
        help("The path passed to --config must be a readable JSON file.")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid JSON format: {path}")]
    #[diagnostic(
        code(config::parse),
        help(
            "The config file must be a JSON object with optional keys server, user, \
             password, project, fixVersion, priorityField, timeout, and components."
        )
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = serde_json::from_str(
            r##"{
                "server": "https://jira.example.com",
                "user": "pm",
                "password": "hunter2",
                "project": "IBU",
                "fixVersion": "Sprint 91",
                "priorityField": "customfield_10201",
                "timeout": 10,
                "components": [
                    {"pattern": "front.*", "name": "Frontend", "color": "#123456"},
                    {"pattern": null, "name": "Backend", "color": "#654321"}
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(config.server.as_deref(), Some("https://jira.example.com"));
        assert_eq!(config.fix_version.as_deref(), Some("Sprint 91"));
        assert_eq!(config.priority_field.as_deref(), Some("customfield_10201"));
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.components[1].pattern, None);
    }

    #[test]
    fn cli_overrides_config_and_strips_quotes() {
        use clap::Parser;

        let cli = Cli::parse_from([
            "storycards",
            "--server",
            "https://other.example.com",
            "--version",
            "\"Sprint",
            "92\"",
            "--output",
            "out.pdf",
        ]);
        let config: Config = serde_json::from_str(
            r#"{"server": "https://jira.example.com", "fixVersion": "Sprint 91"}"#,
        )
        .unwrap();

        let settings = Settings::merge(config, cli).unwrap();
        assert_eq!(settings.server.as_deref(), Some("https://other.example.com"));
        assert_eq!(settings.fix_version.as_deref(), Some("Sprint 92"));
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }
}
