//! Query preprocessing.
//!
//! Rhai only assigns to variables that already exist, while queries are
//! written as plain `x = ...` statements. Before evaluation we find every
//! name a query assigns with a bare `name = value` statement so the
//! evaluator can declare it in the query's own scope, and rewrite those
//! statements to `__assign name = value` so the write bypasses the
//! unbound-read check.

use regex::Regex;
use std::sync::OnceLock;

/// Keyword of the custom syntax bare assignments are rewritten to.
pub const ASSIGN_KEYWORD: &str = "__assign";

/// Statement head of the form `name = ...` (but not `==` or `=>`).
fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=(?:[^=>]|$)")
            .expect("assignment regex must compile")
    })
}

const KEYWORDS: &[&str] = &[
    "let", "const", "if", "else", "while", "loop", "for", "in", "do", "until", "return", "throw",
    "try", "catch", "break", "continue", "fn", "switch", "true", "false", "this",
];

/// Byte offset and name of every bare assignment target, in source order.
///
/// Statements are found by splitting on `;`, `{` and `}` after string
/// literals and comments have been blanked out, so `"a = b"` inside a string
/// is never mistaken for an assignment.
fn assignment_sites(script: &str) -> Vec<(usize, String)> {
    let masked = mask_strings_and_comments(script);
    let mut sites = Vec::new();
    let mut start = 0;
    for statement in masked.split([';', '{', '}']) {
        if let Some(caps) = assignment_re().captures(statement) {
            let name = &caps[1];
            if !KEYWORDS.contains(&name) {
                sites.push((start + caps.get(1).map_or(0, |m| m.start()), name.to_string()));
            }
        }
        start += statement.len() + 1;
    }
    sites
}

/// Names assigned by bare `name = value` statements, in first-seen order.
pub fn assigned_names(script: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, name) in assignment_sites(script) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Prefix every bare `name = value` statement with [`ASSIGN_KEYWORD`].
pub fn rewrite_assignments(script: &str) -> String {
    let sites = assignment_sites(script);
    let mut out = String::with_capacity(script.len() + sites.len() * (ASSIGN_KEYWORD.len() + 1));
    let mut copied = 0;
    for (offset, _) in sites {
        out.push_str(&script[copied..offset]);
        out.push_str(ASSIGN_KEYWORD);
        out.push(' ');
        copied = offset;
    }
    out.push_str(&script[copied..]);
    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}

/// Replace the contents of string/char literals and comments with spaces.
/// Quote characters are kept so statement shapes survive, and every byte
/// offset is preserved.
fn mask_strings_and_comments(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' | '`' => {
                out.push(c);
                let quote = c;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        out.push(' ');
                        if let Some(escaped) = chars.next() {
                            blank(&mut out, escaped);
                        }
                        continue;
                    }
                    if inner == quote {
                        out.push(inner);
                        break;
                    }
                    blank(&mut out, inner);
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                for inner in chars.by_ref() {
                    blank(&mut out, inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    blank(&mut out, inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            _ => out.push(c),
        }
    }
    out
}
