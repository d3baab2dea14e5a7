use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PlannerError, Result};

const DELIMITER: &str = "---\n";

/// Split a document into its YAML frontmatter and the raw body that follows.
///
/// The single blank line written after the closing delimiter is not part of the body.
pub fn split<'a>(raw: &'a str, origin: &str) -> Result<(&'a str, &'a str)> {
    let Some(rest) = raw.strip_prefix(DELIMITER) else {
        return Err(PlannerError::CorruptDocument(
            origin.to_string(),
            "missing opening frontmatter delimiter".into(),
        ));
    };
    let (yaml, body) = if let Some(body) = rest.strip_prefix(DELIMITER) {
        ("", body)
    } else if let Some(split_at) = rest.find("\n---\n") {
        (&rest[..=split_at], &rest[split_at + 5..])
    } else if let Some(yaml) = rest.strip_suffix("\n---") {
        (yaml, "")
    } else {
        return Err(PlannerError::CorruptDocument(
            origin.to_string(),
            "missing closing frontmatter delimiter".into(),
        ));
    };
    Ok((yaml, body.strip_prefix('\n').unwrap_or(body)))
}

pub fn parse<'a, T: DeserializeOwned>(raw: &'a str, origin: &str) -> Result<(T, &'a str)> {
    let (yaml, body) = split(raw, origin)?;
    let meta = serde_yaml::from_str(yaml)
        .map_err(|err| PlannerError::CorruptDocument(origin.to_string(), err.to_string()))?;
    Ok((meta, body))
}

pub fn render<T: Serialize>(meta: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(meta)?;
    Ok(format!("{DELIMITER}{yaml}{DELIMITER}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Meta {
        id: String,
        tags: Vec<String>,
    }

    #[test]
    fn render_then_parse_keeps_body_verbatim() {
        let meta = Meta {
            id: "task-001".into(),
            tags: vec!["a".into()],
        };
        let body = "## Description\nline with --- dashes\n";
        let raw = render(&meta, body).unwrap();
        assert!(raw.starts_with("---\nid: task-001\n"));
        let (parsed, parsed_body): (Meta, &str) = parse(&raw, "t").unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn missing_delimiters_are_corrupt() {
        assert!(matches!(
            split("id: x\n", "t"),
            Err(PlannerError::CorruptDocument(_, _))
        ));
        assert!(matches!(
            split("---\nid: x\n", "t"),
            Err(PlannerError::CorruptDocument(_, _))
        ));
    }
}
