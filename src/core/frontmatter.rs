use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref FRONTMATTER_RE: Regex = Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|$)").unwrap();
}

/// YAML header of an entry file
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl Frontmatter {
    /// Split `content` into frontmatter and body
    ///
    /// No header, or a header that is not valid YAML for this shape, yields
    /// `None` and the whole content as body.
    pub fn split(content: &str) -> (Option<Self>, &str) {
        let Some(caps) = FRONTMATTER_RE.captures(content) else {
            return (None, content);
        };
        let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else {
            return (None, content);
        };

        match serde_yaml::from_str::<Frontmatter>(raw.as_str()) {
            Ok(fm) => (Some(fm.normalized()), &content[whole.end()..]),
            Err(e) => {
                tracing::warn!("Ignoring malformed frontmatter: {}", e);
                (None, content)
            }
        }
    }

    pub fn parse(content: &str) -> Option<Self> {
        Self::split(content).0
    }

    /// Render as a `---` delimited header
    pub fn render(&self) -> anyhow::Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("---\n{}---\n", yaml))
    }

    fn normalized(mut self) -> Self {
        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().trim_start_matches('#').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.tags.dedup();
        self.title = self.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frontmatter() {
        let content = "---\ntitle: Ethics chat\nkind: chat\ntags: [ai, Ethics, '#ml']\n---\nUser: hello\n";
        let (fm, body) = Frontmatter::split(content);
        let fm = fm.unwrap();
        assert_eq!(fm.title.as_deref(), Some("Ethics chat"));
        assert_eq!(fm.kind.as_deref(), Some("chat"));
        assert_eq!(fm.tags, vec!["ai", "ethics", "ml"]);
        assert_eq!(body, "User: hello\n");
    }

    #[test]
    fn test_block_list_tags() {
        let content = "---\ntitle: t\ntags:\n  - rust\n  - search\n---\nbody";
        let fm = Frontmatter::parse(content).unwrap();
        assert_eq!(fm.tags, vec!["rust", "search"]);
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, body) = Frontmatter::split("just text\n---\nnot a header");
        assert!(fm.is_none());
        assert_eq!(body, "just text\n---\nnot a header");
    }

    #[test]
    fn test_malformed_frontmatter_is_body() {
        let content = "---\ntags: [unclosed\n---\nbody";
        let (fm, body) = Frontmatter::split(content);
        assert!(fm.is_none());
        assert_eq!(body, content);
    }

    #[test]
    fn test_render_roundtrips_through_split() {
        let fm = Frontmatter {
            title: Some("Imported chat".to_string()),
            kind: Some("chat".to_string()),
            tags: vec!["export".to_string()],
            ..Default::default()
        };
        let rendered = format!("{}body text", fm.render().unwrap());
        let (parsed, body) = Frontmatter::split(&rendered);
        assert_eq!(parsed.unwrap(), fm);
        assert_eq!(body, "body text");
    }
}
