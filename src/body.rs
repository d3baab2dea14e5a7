//! Markdown body of a task or project file, modelled as ordered `## ` sections.
//!
//! Parsing is lossless: every byte after the frontmatter lands in the preamble
//! or in a section's raw content, so `Body::parse(raw).render() == raw`. Edits
//! only rewrite the section they name.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SUBTASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*- \[([ xX])\] (.+?)\s*$").expect("valid subtask regex"));

static IMAGE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([^\]]*)\]\(([^)]+\.(?:png|jpe?g|gif|webp|svg|bmp))\)")
        .expect("valid image link regex")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").expect("valid link regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionName {
    Description,
    Context,
    Subtasks,
    Notes,
    Attachments,
    AgentTips,
    Goals,
    Other(String),
}

/// Canonical section order for task files.
pub const TASK_SECTIONS: &[SectionName] = &[
    SectionName::Description,
    SectionName::Context,
    SectionName::Subtasks,
    SectionName::Notes,
    SectionName::Attachments,
    SectionName::AgentTips,
];

/// Canonical section order for project READMEs.
pub const PROJECT_SECTIONS: &[SectionName] = &[
    SectionName::Description,
    SectionName::Goals,
    SectionName::Notes,
];

impl SectionName {
    pub fn parse(heading: &str) -> Self {
        match heading.trim().to_ascii_lowercase().as_str() {
            "description" => Self::Description,
            "context" => Self::Context,
            "subtasks" => Self::Subtasks,
            "notes" => Self::Notes,
            "attachments" => Self::Attachments,
            "agent tips" => Self::AgentTips,
            "goals" => Self::Goals,
            _ => Self::Other(heading.trim().to_string()),
        }
    }

    pub fn heading(&self) -> &str {
        match self {
            Self::Description => "Description",
            Self::Context => "Context",
            Self::Subtasks => "Subtasks",
            Self::Notes => "Notes",
            Self::Attachments => "Attachments",
            Self::AgentTips => "Agent Tips",
            Self::Goals => "Goals",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: SectionName,
    /// Heading line as written after `## `, line ending included.
    pub heading: String,
    /// Raw text between the heading line and the next heading.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub path: String,
}

/// Parsed section as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    preamble: String,
    sections: Vec<Section>,
}

impl Body {
    pub fn parse(raw: &str) -> Self {
        let mut body = Body::default();
        let mut current: Option<Section> = None;

        for line in raw.split_inclusive('\n') {
            if let Some(heading) = line.strip_prefix("## ") {
                if let Some(done) = current.take() {
                    body.sections.push(done);
                }
                current = Some(Section {
                    name: SectionName::parse(heading.trim_end_matches(['\n', '\r'])),
                    heading: heading.to_string(),
                    content: String::new(),
                });
                continue;
            }
            match current.as_mut() {
                Some(section) => section.content.push_str(line),
                None => body.preamble.push_str(line),
            }
        }
        if let Some(done) = current {
            body.sections.push(done);
        }
        body
    }

    /// Empty placeholder sections in canonical order.
    pub fn scaffold(order: &[SectionName]) -> Self {
        let last = order.len().saturating_sub(1);
        Body {
            preamble: String::new(),
            sections: order
                .iter()
                .enumerate()
                .map(|(i, name)| Section {
                    name: name.clone(),
                    heading: format!("{}\n", name.heading()),
                    content: if i == last { String::new() } else { "\n".into() },
                })
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        for section in &self.sections {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("## ");
            out.push_str(&section.heading);
            if !section.heading.ends_with('\n') && !section.content.is_empty() {
                out.push('\n');
            }
            out.push_str(&section.content);
        }
        out
    }

    /// Trimmed section text; `None` when the section is absent or blank.
    pub fn section(&self, name: &SectionName) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| &s.name == name)
            .map(|s| s.content.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn sections(&self) -> Vec<SectionView> {
        self.sections
            .iter()
            .map(|s| SectionView {
                name: s.name.heading().to_string(),
                content: s.content.trim().to_string(),
            })
            .collect()
    }

    /// Replace a section's text, inserting it at its canonical position when missing.
    pub fn set_section(&mut self, name: SectionName, text: &str, order: &[SectionName]) {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => self.insert_section(name, order),
        };
        let is_last = idx + 1 == self.sections.len();
        let text = text.trim_end();
        self.sections[idx].content = match (text.is_empty(), is_last) {
            (true, true) => String::new(),
            (true, false) => "\n".into(),
            (false, true) => format!("{text}\n"),
            (false, false) => format!("{text}\n\n"),
        };
    }

    fn insert_section(&mut self, name: SectionName, order: &[SectionName]) -> usize {
        let rank = |n: &SectionName| order.iter().position(|o| o == n).unwrap_or(order.len());
        let wanted = rank(&name);
        let idx = self
            .sections
            .iter()
            .position(|s| rank(&s.name) > wanted)
            .unwrap_or(self.sections.len());

        // The section that used to close the body now needs a blank line after it.
        if idx == self.sections.len()
            && let Some(prev) = self.sections.last_mut()
        {
            let trimmed = prev.content.trim_end().to_string();
            prev.content = if trimmed.is_empty() {
                "\n".into()
            } else {
                format!("{trimmed}\n\n")
            };
        }

        self.sections.insert(
            idx,
            Section {
                heading: format!("{}\n", name.heading()),
                name,
                content: String::new(),
            },
        );
        idx
    }

    /// `- item` lines of a section, in order.
    pub fn bullets(&self, name: &SectionName) -> Vec<String> {
        self.section(name)
            .map(|text| {
                text.lines()
                    .filter_map(|line| line.trim().strip_prefix("- "))
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_bullets(&mut self, name: SectionName, items: &[String], order: &[SectionName]) {
        let text = items
            .iter()
            .map(|item| format!("- {}", item.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        self.set_section(name, &text, order);
    }

    pub fn subtasks(&self) -> Vec<Subtask> {
        let Some(text) = self.section(&SectionName::Subtasks) else {
            return vec![];
        };
        SUBTASK_RE
            .captures_iter(text)
            .map(|caps| Subtask {
                title: caps[2].to_string(),
                done: &caps[1] != " ",
            })
            .collect()
    }

    pub fn set_subtasks(&mut self, subtasks: &[Subtask], order: &[SectionName]) {
        let text = subtasks
            .iter()
            .map(|s| format!("- [{}] {}", if s.done { "x" } else { " " }, s.title.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        self.set_section(SectionName::Subtasks, &text, order);
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        let Some(text) = self.section(&SectionName::Attachments) else {
            return vec![];
        };
        LINK_RE
            .captures_iter(text)
            .map(|caps| Attachment {
                name: caps[1].to_string(),
                path: caps[2].to_string(),
            })
            .collect()
    }

    /// Filename of the first image link anywhere in the body.
    pub fn first_image(&self) -> Option<String> {
        let rendered = self.render();
        let caps = IMAGE_LINK_RE.captures(&rendered)?;
        Path::new(&caps[2])
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_renders_every_placeholder_in_order() {
        let body = Body::scaffold(TASK_SECTIONS);
        assert_eq!(
            body.render(),
            "## Description\n\n## Context\n\n## Subtasks\n\n## Notes\n\n## Attachments\n\n## Agent Tips\n"
        );
    }

    #[test]
    fn parse_render_is_lossless_for_hand_edits() {
        let raw = "intro line\n## Description\nHand written.\n  indented\n## Notes\n- a\n\n\n## Custom Stuff\nkept\n## Agent Tips\n- tip";
        let body = Body::parse(raw);
        assert_eq!(body.render(), raw);
        assert_eq!(body.section(&SectionName::Description), Some("Hand written.\n  indented"));
        assert_eq!(body.sections().len(), 4);
    }

    #[test]
    fn set_section_only_touches_named_section() {
        let mut body = Body::scaffold(TASK_SECTIONS);
        body.set_section(SectionName::Description, "Redesign it", TASK_SECTIONS);
        body.set_bullets(SectionName::AgentTips, &["Use a grid".into()], TASK_SECTIONS);
        body.set_section(SectionName::Notes, "Talked to design", TASK_SECTIONS);
        let rendered = body.render();
        assert!(rendered.starts_with("## Description\nRedesign it\n\n## Context\n"));
        assert!(rendered.contains("## Notes\nTalked to design\n\n## Attachments"));
        assert!(rendered.ends_with("## Agent Tips\n- Use a grid\n"));
    }

    #[test]
    fn edits_keep_hand_typed_heading_text() {
        let raw = "## description\nold\n\n## Agent tips\n- keep\n\n## notes\nmine\n## Subtasks";
        let mut body = Body::parse(raw);
        assert_eq!(body.bullets(&SectionName::AgentTips), vec!["keep"]);
        assert_eq!(body.render(), raw);

        body.set_section(SectionName::Description, "new", TASK_SECTIONS);
        body.set_subtasks(
            &[Subtask {
                title: "one".into(),
                done: false,
            }],
            TASK_SECTIONS,
        );
        assert_eq!(
            body.render(),
            "## description\nnew\n\n## Agent tips\n- keep\n\n## notes\nmine\n## Subtasks\n- [ ] one\n"
        );
    }

    #[test]
    fn missing_section_is_inserted_at_canonical_position() {
        let mut body = Body::parse("## Description\nx\n\n## Notes\nn\n");
        body.set_section(SectionName::Context, "why", TASK_SECTIONS);
        body.set_section(SectionName::AgentTips, "- tip", TASK_SECTIONS);
        assert_eq!(
            body.render(),
            "## Description\nx\n\n## Context\nwhy\n\n## Notes\nn\n\n## Agent Tips\n- tip\n"
        );
    }

    #[test]
    fn subtasks_parse_and_render() {
        let mut body = Body::parse("## Subtasks\n- [x] Research\n- [ ] Wireframes\nnot a box\n");
        let subs = body.subtasks();
        assert_eq!(subs.len(), 2);
        assert!(subs[0].done);
        assert_eq!(subs[1].title, "Wireframes");

        let mut toggled = subs.clone();
        toggled[1].done = true;
        body.set_subtasks(&toggled, TASK_SECTIONS);
        assert_eq!(body.section(&SectionName::Subtasks), Some("- [x] Research\n- [x] Wireframes"));
    }

    #[test]
    fn first_image_returns_bare_filename() {
        let body = Body::parse(
            "## Attachments\n- [brief](../attachments/brief.pdf)\n- [mock](../attachments/mock.PNG)\n",
        );
        assert_eq!(body.first_image().as_deref(), Some("mock.PNG"));
        assert_eq!(body.attachments().len(), 2);
    }
}
