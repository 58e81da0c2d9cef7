use std::time::Duration;

use base64::{prelude::BASE64_STANDARD as base64, Engine};
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use ureq::Agent;

use crate::issue::{ComponentRules, Issue};

const STORY_TYPE: &str = "Story";
/// One bounded query, no pagination. Anything past this many results for a
/// single fix version is silently dropped.
const MAX_RESULTS: &str = "1000";

/// Basic-auth client for the Jira REST API. Construction probes the
/// credentials; a client that exists has already authenticated.
pub(crate) struct JiraClient {
    base_url: String,
    auth: String,
    agent: Agent,
}

impl JiraClient {
    pub(crate) fn new(
        server: &str,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = Self {
            base_url: format!("{}/rest/api/2", server.trim_end_matches('/')),
            auth: format!("Basic {}", base64.encode(format!("{user}:{password}"))),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        };
        client.probe(user)?;
        Ok(client)
    }

    /// A cheap authenticated call before any querying, so bad credentials
    /// fail the run with something better than a search error.
    fn probe(&self, user: &str) -> Result<(), Error> {
        let url = format!("{}/myself", self.base_url);
        match self.agent.get(&url).set("Authorization", &self.auth).call() {
            Ok(_) => {
                debug!("Authenticated as {user}");
                Ok(())
            }
            Err(ureq::Error::Status(401, _)) => Err(Error::AuthenticationFailed {
                user: user.to_string(),
            }),
            Err(ureq::Error::Status(403, _)) => Err(Error::AuthenticationDenied {
                user: user.to_string(),
            }),
            Err(ureq::Error::Status(404, _)) => Err(Error::ServerNotFound {
                server: self.base_url.clone(),
            }),
            Err(source) => Err(Error::Probe {
                source: Box::new(source),
            }),
        }
    }

    /// Fetches every Story for the project and fix version, already
    /// normalized through the component rules.
    pub(crate) fn fetch_stories(
        &self,
        project: &str,
        fix_version: &str,
        priority_field: Option<&str>,
        rules: &ComponentRules,
    ) -> Result<Vec<Issue>, Error> {
        let jql = format!(r#"project="{project}" AND fixVersion="{fix_version}""#);
        debug!("Searching with jql: {jql}");

        let response = self
            .agent
            .get(&format!("{}/search", self.base_url))
            .set("Authorization", &self.auth)
            .query("jql", &jql)
            .query("startAt", "0")
            .query("maxResults", MAX_RESULTS)
            .call()
            .map_err(|source| Error::Search {
                source: Box::new(source),
            })?;
        let search: SearchResponse = response.into_json().map_err(|source| Error::Decode {
            source,
        })?;

        let issues: Vec<Issue> = search
            .issues
            .into_iter()
            .filter(|raw| raw.fields.issuetype.as_ref().map(|it| it.name.as_str()) == Some(STORY_TYPE))
            .map(|raw| raw.into_issue(priority_field, rules))
            .collect();
        info!("Fetched {} stories from {}", issues.len(), self.base_url);
        Ok(issues)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    key: String,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
struct Fields {
    issuetype: Option<Named>,
    #[serde(default)]
    summary: String,
    description: Option<String>,
    reporter: Option<DisplayNamed>,
    #[serde(default)]
    components: Vec<Named>,
    aggregatetimeestimate: Option<i64>,
    assignee: Option<DisplayNamed>,
    /// Custom fields land here; the configured priority field is one of them.
    #[serde(flatten)]
    custom: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DisplayNamed {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl RawIssue {
    fn into_issue(self, priority_field: Option<&str>, rules: &ComponentRules) -> Issue {
        let priority = priority_field.and_then(|field| coerce_priority(self.fields.custom.get(field)));
        Issue {
            key: self.key,
            summary: self.fields.summary,
            description: self.fields.description.filter(|text| !text.is_empty()),
            reporter: self.fields.reporter.and_then(|named| named.display_name),
            components: rules.rename_all(
                self.fields
                    .components
                    .into_iter()
                    .map(|component| component.name)
                    .collect(),
            ),
            estimate: self.fields.aggregatetimeestimate,
            assignee: self.fields.assignee.and_then(|named| named.display_name),
            priority,
        }
    }
}

/// Jira custom fields come back as numbers or numeric strings; anything else
/// means no priority.
fn coerce_priority(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_f64().map(|float| float as i64),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|float| float as i64),
        _ => None,
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub(crate) enum Error {
    #[error("Authentication failed with user: {user}")]
    #[diagnostic(
        code(rest::authentication_failed),
        help("Check the user and password (Jira returned 401).")
    )]
    AuthenticationFailed { user: String },
    #[error("Authentication denied with user: {user}")]
    #[diagnostic(
        code(rest::authentication_denied),
        help(
            "Jira returned 403. This happens after too many failed logins; log in \
             once through the web UI to clear the captcha, then retry."
        )
    )]
    AuthenticationDenied { user: String },
    #[error("Jira server not found at: {server}")]
    #[diagnostic(
        code(rest::server_not_found),
        help("Check the server URL (the probe endpoint returned 404).")
    )]
    ServerNotFound { server: String },
    #[error("Could not reach the Jira server: {source}")]
    #[diagnostic(code(rest::probe))]
    Probe {
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("Searching for issues failed: {source}")]
    #[diagnostic(
        code(rest::search),
        help("The search request failed after a successful authentication probe.")
    )]
    Search {
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("Could not decode the search response: {source}")]
    #[diagnostic(code(rest::decode))]
    Decode {
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        sync::{Arc, Mutex},
        thread,
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::ComponentRule;

    /// Tiny one-thread HTTP server: answers each connection with the next
    /// canned (status, body) pair and records the request paths it saw.
    fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut header = String::new();
                while reader.read_line(&mut header).is_ok() && header.trim() != "" {
                    header.clear();
                }
                let path = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(path);

                let reason = match status {
                    200 => "OK",
                    401 => "Unauthorized",
                    _ => "Error",
                };
                write!(
                    stream,
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                )
                .unwrap();
            }
        });
        (url, paths)
    }

    #[test]
    fn probe_failure_stops_before_any_search() {
        let (url, paths) = serve(vec![(401, String::new())]);

        let result = JiraClient::new(&url, "pm", "wrong", Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(Error::AuthenticationFailed { user }) if user == "pm"
        ));

        let paths = paths.lock().unwrap();
        assert_eq!(paths.as_slice(), ["/rest/api/2/myself"]);
    }

    #[test]
    fn fetches_and_normalizes_stories() {
        let search_body = serde_json::json!({
            "issues": [
                {
                    "key": "IBU-1",
                    "fields": {
                        "issuetype": {"name": "Story"},
                        "summary": "Ship the thing",
                        "description": "Line one\nLine two",
                        "reporter": {"displayName": "Alex Doe"},
                        "components": [{"name": "frontend-web"}, {"name": "UI"}],
                        "aggregatetimeestimate": 7200,
                        "assignee": null,
                        "customfield_42": "3.0"
                    }
                },
                {
                    "key": "IBU-2",
                    "fields": {
                        "issuetype": {"name": "Bug"},
                        "summary": "Not a story"
                    }
                }
            ]
        })
        .to_string();
        let (url, paths) = serve(vec![(200, "{}".to_string()), (200, search_body)]);

        let rules = ComponentRules::compile(vec![
            ComponentRule {
                pattern: Some("front".to_string()),
                name: "Frontend".to_string(),
                color: None,
            },
            ComponentRule {
                pattern: Some("ui".to_string()),
                name: "Frontend".to_string(),
                color: None,
            },
        ])
        .unwrap();

        let client = JiraClient::new(&url, "pm", "hunter2", Duration::from_secs(5)).unwrap();
        let issues = client
            .fetch_stories("IBU", "Sprint 91", Some("customfield_42"), &rules)
            .unwrap();

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.key, "IBU-1");
        assert_eq!(issue.components, vec!["Frontend".to_string()]);
        assert_eq!(issue.estimate, Some(7200));
        assert_eq!(issue.assignee, None);
        assert_eq!(issue.reporter.as_deref(), Some("Alex Doe"));
        assert_eq!(issue.priority, Some(3));

        let paths = paths.lock().unwrap();
        assert_eq!(paths[0], "/rest/api/2/myself");
        assert!(paths[1].starts_with("/rest/api/2/search?"));
    }
}
