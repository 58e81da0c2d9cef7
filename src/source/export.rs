use std::{io, path::Path, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};
use xmltree::{Element, XMLNode};

use crate::issue::{ComponentRules, Issue};

const STORY_TYPE: &str = "Story";
/// Jira's XML export uses this literal instead of omitting the node.
const UNASSIGNED: &str = "Unassigned";

/// Parses a Jira XML export (`rss → channel → item*`) into the same
/// normalized issues the REST adapter produces. Items that are not Stories
/// are skipped; absent nodes and attributes degrade to `None`.
pub(crate) fn parse(
    path: &Path,
    priority_field: Option<&str>,
    rules: &ComponentRules,
) -> Result<Vec<Issue>, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let root = Element::parse(contents.as_bytes()).map_err(|source| Error::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let channel = root.get_child("channel").ok_or_else(|| Error::MissingChannel {
        path: path.to_path_buf(),
    })?;

    let issues: Vec<Issue> = channel
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|element| element.name == "item")
        .filter(|item| child_text(item, "type").as_deref() == Some(STORY_TYPE))
        .map(|item| parse_item(item, priority_field, rules))
        .collect();
    info!("Parsed {} stories from {}", issues.len(), path.display());
    Ok(issues)
}

fn parse_item(item: &Element, priority_field: Option<&str>, rules: &ComponentRules) -> Issue {
    let issue = Issue {
        key: child_text(item, "key").unwrap_or_default(),
        summary: child_text(item, "summary").unwrap_or_default(),
        description: child_text(item, "description").filter(|text| !text.is_empty()),
        reporter: child_text(item, "reporter"),
        components: rules.rename_all(
            item.children
                .iter()
                .filter_map(XMLNode::as_element)
                .filter(|element| element.name == "component")
                .filter_map(Element::get_text)
                .map(|text| text.into_owned())
                .collect(),
        ),
        estimate: item
            .get_child("timeoriginalestimate")
            .and_then(|element| element.attributes.get("seconds"))
            .and_then(|seconds| seconds.parse().ok()),
        assignee: child_text(item, "assignee").filter(|name| name != UNASSIGNED),
        priority: priority_field.and_then(|field| custom_priority(item, field)),
    };
    debug!("Parsed {issue}");
    issue
}

fn child_text(item: &Element, name: &str) -> Option<String> {
    item.get_child(name)
        .and_then(Element::get_text)
        .map(|text| text.into_owned())
}

/// Looks the configured priority field up in the item's `customfields`
/// block and coerces its first value to a whole number.
fn custom_priority(item: &Element, field: &str) -> Option<i64> {
    item.get_child("customfields")?
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|element| element.attributes.get("id").map(String::as_str) == Some(field))
        .and_then(|element| element.get_child("customfieldvalues"))
        .and_then(|element| element.get_child("customfieldvalue"))
        .and_then(Element::get_text)
        .and_then(|text| text.trim().parse::<f64>().ok())
        .map(|float| float as i64)
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum Error {
    #[error("No such file or directory: {path}")]
    #[diagnostic(
        code(export::read),
        help("The path passed to --xml must be a readable Jira XML export.")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid XML in {path}: {source}")]
    #[diagnostic(code(export::xml))]
    Xml {
        path: PathBuf,
        #[source]
        source: xmltree::ParseError,
    },
    #[error("{path} has no channel element")]
    #[diagnostic(
        code(export::missing_channel),
        help("Expected a Jira export: an rss root with a channel of item elements.")
    )]
    MissingChannel { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::ComponentRule;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="0.92">
  <channel>
    <item>
      <key>IBU-1</key>
      <type>Story</type>
      <summary>Ship the thing</summary>
      <description>Line one</description>
      <reporter>Alex Doe</reporter>
      <assignee>Unassigned</assignee>
      <component>frontend-web</component>
      <component>Web UI</component>
      <timeoriginalestimate seconds="1800">30 minutes</timeoriginalestimate>
      <customfields>
        <customfield id="customfield_42" key="com.atlassian.jira:float">
          <customfieldname>Priority Rank</customfieldname>
          <customfieldvalues>
            <customfieldvalue>2.0</customfieldvalue>
          </customfieldvalues>
        </customfield>
      </customfields>
    </item>
    <item>
      <key>IBU-2</key>
      <type>Bug</type>
      <summary>Not a story</summary>
    </item>
    <item>
      <key>IBU-3</key>
      <type>Story</type>
      <summary>Bare minimum</summary>
    </item>
  </channel>
</rss>"#;

    fn write_export(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn parses_stories_and_skips_other_types() {
        let file = write_export(EXPORT);
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

        let issues = parse(file.path(), Some("customfield_42"), &rules).unwrap();
        assert_eq!(issues.len(), 2);

        let full = &issues[0];
        assert_eq!(full.key, "IBU-1");
        assert_eq!(full.summary, "Ship the thing");
        assert_eq!(full.description.as_deref(), Some("Line one"));
        assert_eq!(full.reporter.as_deref(), Some("Alex Doe"));
        assert_eq!(full.assignee, None);
        assert_eq!(full.components, vec!["Frontend".to_string()]);
        assert_eq!(full.estimate, Some(1800));
        assert_eq!(full.priority, Some(2));
    }

    #[test]
    fn absent_optional_fields_degrade_to_none() {
        let file = write_export(EXPORT);
        let rules = ComponentRules::default();

        let issues = parse(file.path(), Some("customfield_42"), &rules).unwrap();
        let bare = &issues[1];
        assert_eq!(bare.key, "IBU-3");
        assert_eq!(bare.description, None);
        assert_eq!(bare.reporter, None);
        assert_eq!(bare.assignee, None);
        assert_eq!(bare.components, Vec::<String>::new());
        assert_eq!(bare.estimate, None);
        assert_eq!(bare.priority, None);
    }

    #[test]
    fn document_without_channel_is_an_error() {
        let file = write_export("<rss><items/></rss>");
        let result = parse(file.path(), None, &ComponentRules::default());
        assert!(matches!(result, Err(Error::MissingChannel { .. })));
    }
}
