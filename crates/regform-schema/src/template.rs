//! `{{ … }}` text templates

use crate::reference::Reference;
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Piece of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text
    Text(String),
    /// Substituted expression
    Expr(Reference),
}

/// A string with embedded `{{ reference }}` markers
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template; `None` when the string carries no marker
    #[must_use]
    pub fn parse(source: &str) -> Option<Self> {
        if !is_template(source) {
            return None;
        }

        let mut parts = Vec::new();
        let mut rest = source;
        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                break;
            };
            if start > 0 {
                parts.push(TemplatePart::Text(rest[..start].to_string()));
            }
            parts.push(TemplatePart::Expr(Reference::parse(&after_open[..end])));
            rest = &after_open[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Text(rest.to_string()));
        }

        Some(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Original template text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed parts
    #[inline]
    #[must_use]
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Render with a resolver; unresolved expressions render as empty text
    pub fn render(&self, mut resolve: impl FnMut(&Reference) -> Option<Value>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Text(text) => out.push_str(text),
                TemplatePart::Expr(reference) => {
                    if let Some(value) = resolve(reference) {
                        out.push_str(&value_text(&value));
                    }
                }
            }
        }
        out
    }
}

/// Whether a string contains a complete `{{ … }}` marker
#[must_use]
pub fn is_template(s: &str) -> bool {
    s.find(OPEN)
        .is_some_and(|start| s[start + OPEN.len()..].contains(CLOSE))
}

/// Text form of an answer value, as shown in rendered templates
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_is_not_a_template() {
        assert!(Template::parse("Study design").is_none());
        assert!(Template::parse("half {{ open").is_none());
    }

    #[test]
    fn parses_text_and_expressions() {
        let t = Template::parse("Hello {{$ctx.user.name}}!").unwrap();
        assert_eq!(
            t.parts(),
            &[
                TemplatePart::Text("Hello ".into()),
                TemplatePart::Expr(Reference::Context(vec!["user".into(), "name".into()])),
                TemplatePart::Text("!".into()),
            ]
        );
    }

    #[test]
    fn renders_with_resolver() {
        let t = Template::parse("{{ $svy.first }} and {{ $svy.missing }}.").unwrap();
        let rendered = t.render(|r| match r {
            Reference::Answer(k) if k == "first" => Some(json!("one")),
            _ => None,
        });
        assert_eq!(rendered, "one and .");
    }

    #[test]
    fn value_text_formats_lists() {
        assert_eq!(value_text(&json!(["a", "b"])), "a, b");
        assert_eq!(value_text(&json!(4)), "4");
        assert_eq!(value_text(&Value::Null), "");
    }
}
