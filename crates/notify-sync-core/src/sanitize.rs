//! HTML stripping for notification display fields.
//!
//! Notification titles and descriptions come from user content and may carry
//! markup. Only plain text is ever stored.

use regex::{Captures, Regex};
use std::sync::OnceLock;

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> String;
}

/// Default sanitizer: drops script/style blocks and all tags, decodes the
/// common entities and collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripTags;

struct Patterns {
    script: Regex,
    style: Regex,
    block_break: Regex,
    tag: Regex,
    entity: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        script: Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap(),
        style: Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap(),
        block_break: Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6])\b[^>]*>").unwrap(),
        tag: Regex::new(r"(?s)<[^>]*>").unwrap(),
        entity: Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);").unwrap(),
        whitespace: Regex::new(r"\s+").unwrap(),
    })
}

fn decode_entity(caps: &Captures) -> String {
    let name = &caps[1];
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                name[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
        }
    };
    // Leave anything undecodable as it was
    decoded
        .map(|c| c.to_string())
        .unwrap_or_else(|| caps[0].to_string())
}

impl Sanitizer for StripTags {
    fn sanitize(&self, input: &str) -> String {
        if !input.contains('<') && !input.contains('&') {
            return self.collapse(input);
        }
        let p = patterns();
        let text = p.script.replace_all(input, "");
        let text = p.style.replace_all(&text, "");
        let text = p.block_break.replace_all(&text, " ");
        let text = p.tag.replace_all(&text, "");
        // Single pass so "&amp;lt;" decodes to the literal "&lt;"
        let text = p.entity.replace_all(&text, decode_entity);
        self.collapse(&text)
    }
}

impl StripTags {
    fn collapse(&self, text: &str) -> String {
        patterns().whitespace.replace_all(text, " ").trim().to_string()
    }
}
