//! Email template rendering.
//!
//! Templates are embedded at compile time. Each one starts with a
//! `Subject:` line, then a blank line, then an HTML fragment that is placed
//! inside the shared layout. `{{ key }}` placeholders are filled from
//! [`Params`]; values are HTML-escaped in the body but not in the subject.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Params;
use crate::error::EmailError;

const LAYOUT: &str = include_str!("../../templates/email/layout.html");
const BODY_SLOT: &str = "{{ body }}";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

fn source(name: &str) -> Option<&'static str> {
    match name {
        "echo_test" => Some(include_str!("../../templates/email/echo_test.html")),
        "new_post" => Some(include_str!("../../templates/email/new_post.html")),
        "change_status" => Some(include_str!("../../templates/email/change_status.html")),
        "new_comment" => Some(include_str!("../../templates/email/new_comment.html")),
        _ => None,
    }
}

/// Render the named template with the given parameters.
pub fn render_message(name: &str, params: &Params) -> Result<Message, EmailError> {
    let src = source(name).ok_or_else(|| EmailError::TemplateNotFound(name.to_string()))?;

    let (header, fragment) =
        src.split_once("\n\n")
            .ok_or_else(|| EmailError::MalformedTemplate {
                name: name.to_string(),
                reason: "missing blank line after subject".into(),
            })?;
    let subject = header
        .trim()
        .strip_prefix("Subject:")
        .ok_or_else(|| EmailError::MalformedTemplate {
            name: name.to_string(),
            reason: "first line must be 'Subject: ...'".into(),
        })?
        .trim();

    let subject = substitute(subject, params, false).trim().to_string();
    let fragment = substitute(fragment.trim_end(), params, true);

    Ok(Message {
        subject,
        body: LAYOUT.trim_end().replacen(BODY_SLOT, &fragment, 1),
    })
}

fn substitute(text: &str, params: &Params, escape: bool) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let value = params.text(&caps[1]);
            if escape { escape_html(&value) } else { value }
        })
        .into_owned()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
