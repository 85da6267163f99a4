//! Typed references used by templates, display rules, options and `each`
//!
//! A reference string is parsed once into a [`Reference`]; resolution is left
//! to the document, which knows the tree and the answer index.

use serde_json::Value;

const CONTEXT_PREFIX: &str = "$ctx";
const ANSWER_PREFIX: &str = "$svy";
const ROOT_PREFIX: &str = "$root";
const PARENT_STEP: &str = "$parent";

/// A parsed reference
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `$ctx.a.b`: path into the page context
    Context(Vec<String>),

    /// `$svy.key` or a bare key: answer looked up through the enclosing scopes
    Answer(String),

    /// `$root.key`: answer looked up in the document-wide index only
    Root(String),

    /// `$parent.$parent.key`: walk up `ups` nodes, then look `key` up there
    Relative { ups: usize, key: Option<String> },

    /// A JSON literal (`"text"`, `42`, `true`, `null`)
    Literal(Value),
}

impl Reference {
    /// Parse a reference expression
    ///
    /// Parsing never fails: anything that is not a recognised `$` form or a
    /// JSON literal is treated as a plain answer key.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(rest) = strip_head(raw, CONTEXT_PREFIX) {
            let path = rest
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Self::Context(path);
        }

        if let Some(rest) = strip_head(raw, ANSWER_PREFIX) {
            return Self::Answer(rest.to_string());
        }

        if let Some(rest) = strip_head(raw, ROOT_PREFIX) {
            return Self::Root(rest.to_string());
        }

        if strip_head(raw, PARENT_STEP).is_some() {
            let mut ups = 0;
            let mut rest = raw;
            while let Some(next) = strip_head(rest, PARENT_STEP) {
                ups += 1;
                rest = next;
            }
            let key = (!rest.is_empty()).then(|| rest.to_string());
            return Self::Relative { ups, key };
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                Self::Literal(value)
            }
            _ => Self::Answer(raw.to_string()),
        }
    }
}

/// Strip `head` and an optional following `.` when `head` is a whole segment
fn strip_head<'a>(raw: &'a str, head: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix(head)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('.')
    }
}

/// Get a value inside a JSON context by path segments
#[must_use]
pub fn lookup_context<'a>(context: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = context;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_context_path() {
        assert_eq!(
            Reference::parse("$ctx.node.title"),
            Reference::Context(vec!["node".into(), "title".into()])
        );
        assert_eq!(Reference::parse("$ctx"), Reference::Context(vec![]));
    }

    #[test]
    fn parses_answer_forms() {
        assert_eq!(
            Reference::parse("$svy.study.design"),
            Reference::Answer("study.design".into())
        );
        assert_eq!(Reference::parse("design"), Reference::Answer("design".into()));
        assert_eq!(Reference::parse("$root.q1"), Reference::Root("q1".into()));
    }

    #[test]
    fn parses_parent_steps() {
        assert_eq!(
            Reference::parse("$parent.$parent.authors"),
            Reference::Relative {
                ups: 2,
                key: Some("authors".into())
            }
        );
        assert_eq!(
            Reference::parse("$parent"),
            Reference::Relative { ups: 1, key: None }
        );
    }

    #[test]
    fn parses_literals() {
        assert_eq!(Reference::parse("\"yes\""), Reference::Literal(json!("yes")));
        assert_eq!(Reference::parse("3"), Reference::Literal(json!(3)));
        assert_eq!(Reference::parse("true"), Reference::Literal(json!(true)));
    }

    #[test]
    fn prefix_must_be_whole_segment() {
        assert_eq!(
            Reference::parse("$ctxfoo"),
            Reference::Answer("$ctxfoo".into())
        );
    }

    #[test]
    fn context_lookup_walks_objects_and_arrays() {
        let ctx = json!({"node": {"contributors": [{"name": "Ada"}]}});
        let path: Vec<String> = ["node", "contributors", "0", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(lookup_context(&ctx, &path), Some(&json!("Ada")));
        assert_eq!(lookup_context(&ctx, &["missing".to_string()]), None);
    }
}
