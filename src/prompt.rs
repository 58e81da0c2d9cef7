use inquire::{InquireError, Password, Text};
use miette::Diagnostic;

/// Asks until the answer is non-empty.
pub(crate) fn required_input(prompt: &str) -> Result<String, Error> {
    loop {
        let answer = Text::new(prompt).prompt().map_err(Error)?;
        if !answer.trim().is_empty() {
            return Ok(answer);
        }
    }
}

pub(crate) fn password(prompt: &str) -> Result<String, Error> {
    loop {
        let answer = Password::new(prompt)
            .with_display_toggle_enabled()
            .without_confirmation()
            .prompt()
            .map_err(Error)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("Failed to get user input")]
#[diagnostic(
    code(prompt),
    help(
        "Connection details missing from the config file and command line are \
         prompted for interactively. Pass them with --server, --user, --passwd, \
         --project, and --version to run non-interactively."
    )
)]
pub(crate) struct Error(#[from] InquireError);
