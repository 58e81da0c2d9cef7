use miette::Diagnostic;
use tracing::warn;

pub use cli::Cli;
use config::{Config, Settings};
use issue::Issue;
use pdf::Palette;

pub mod cli;
mod config;
mod issue;
mod pdf;
mod prompt;
mod source;

/// The whole program: merge config and arguments, fetch or parse issues,
/// sort them, and render the cards.
pub fn run(cli: Cli) -> Result<(), Error> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = Settings::merge(config, cli)?;

    let mut issues = fetch_issues(&settings)?;
    issue::sort_issues(&mut issues);

    let palette = Palette::build(&issues, settings.rules.colors());
    pdf::render(&issues, &palette, &settings.output)?;
    Ok(())
}

/// Static export when `--xml` was passed, otherwise the REST API, prompting
/// for whatever connection details are still missing.
fn fetch_issues(settings: &Settings) -> Result<Vec<Issue>, Error> {
    if let Some(path) = &settings.xml {
        return Ok(source::export::parse(
            path,
            settings.priority_field.as_deref(),
            &settings.rules,
        )?);
    }

    let server = match &settings.server {
        Some(server) => server.clone(),
        None => prompt::required_input("Jira server URL:")?,
    };
    let user = match &settings.user {
        Some(user) => user.clone(),
        None => prompt::required_input("User:")?,
    };
    let password = match &settings.password {
        Some(password) => password.clone(),
        None => {
            warn!("Using a password on the command line interface can be insecure.");
            prompt::password("Password:")?
        }
    };
    let project = match &settings.project {
        Some(project) => project.clone(),
        None => prompt::required_input("Project (e.g. IBU):")?,
    };
    let fix_version = match &settings.fix_version {
        Some(fix_version) => fix_version.clone(),
        None => prompt::required_input("Version (e.g. Sprint 91):")?
            .trim_matches('"')
            .to_string(),
    };

    let client = source::rest::JiraClient::new(&server, &user, &password, settings.timeout)?;
    Ok(client.fetch_stories(
        &project,
        &fix_version,
        settings.priority_field.as_deref(),
        &settings.rules,
    )?)
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rules(#[from] issue::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Prompt(#[from] prompt::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rest(#[from] source::rest::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] source::export::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pdf(#[from] pdf::Error),
}
