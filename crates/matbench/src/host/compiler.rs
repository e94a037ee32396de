//! Front-end check the host backend performs in place of a device compiler.
//!
//! The host cannot build OpenCL C, so "compiling" means confirming the source
//! declares the requested `__kernel` with the seven-parameter signature. A
//! failure produces a compiler-style log.

use std::fmt::Write as _;

/// Parameters every `matrix_mult` kernel takes: A, B, C, m, n, k, n_works.
pub const KERNEL_ARITY: usize = 7;

/// A `__kernel` declaration found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelDecl {
    pub name: String,
    pub params: usize,
    pub line: usize,
}

/// Check `source` for `entry_point`; `Err` carries the build log.
pub fn check(file: &str, source: &str, entry_point: &str) -> Result<KernelDecl, String> {
    let code = strip_comments(source);
    let decls = kernel_decls(&code);

    let mut log = String::new();
    match decls.iter().find(|d| d.name == entry_point) {
        Some(decl) if decl.params == KERNEL_ARITY => Ok(decl.clone()),
        Some(decl) => {
            let _ = writeln!(
                log,
                "{file}:{}: error: kernel '{entry_point}' declares {} parameters, \
                 expected {KERNEL_ARITY}",
                decl.line, decl.params
            );
            Err(log)
        }
        None => {
            let found: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
            let _ = writeln!(log, "{file}: error: no kernel named '{entry_point}'");
            if !found.is_empty() {
                let _ = writeln!(log, "{file}: note: kernels declared: {}", found.join(", "));
            }
            Err(log)
        }
    }
}

/// Replace `//` and `/* */` comments with spaces, keeping newlines.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Find `__kernel void name(...)` (or `kernel void`) declarations.
fn kernel_decls(code: &str) -> Vec<KernelDecl> {
    let mut decls = Vec::new();
    let mut rest = code;
    let mut offset = 0;

    while let Some(pos) = find_word(rest, &["__kernel", "kernel"]) {
        let (word_start, word_len) = pos;
        let after = &rest[word_start + word_len..];
        let consumed = word_start + word_len;

        if let Some(decl) = parse_signature(after) {
            let line = code[..offset + word_start].matches('\n').count() + 1;
            decls.push(KernelDecl { line, ..decl });
        }
        offset += consumed;
        rest = &rest[consumed..];
    }
    decls
}

/// Earliest whole-word occurrence of any of `words`.
fn find_word(haystack: &str, words: &[&str]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for word in words {
        let mut from = 0;
        while let Some(i) = haystack[from..].find(word) {
            let start = from + i;
            let end = start + word.len();
            let before_ok = haystack[..start].chars().next_back().is_none_or(|c| !is_ident(c));
            let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_ident(c));
            if before_ok && after_ok {
                if best.is_none_or(|(b, _)| start < b) {
                    best = Some((start, word.len()));
                }
                break;
            }
            from = end;
        }
    }
    best
}

/// Parse `void name ( params )` following the kernel qualifier.
fn parse_signature(after: &str) -> Option<KernelDecl> {
    let open = after.find('(')?;
    let head: Vec<&str> = after[..open].split_whitespace().collect();
    // Attributes may precede `void`; the name is the last token.
    let name = head.last()?.to_string();
    if !head.contains(&"void") || !name.chars().all(is_ident) {
        return None;
    }

    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut any_param = false;
    for c in after[open..].chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => commas += 1,
            c if depth >= 1 && !c.is_whitespace() => any_param = true,
            _ => {}
        }
    }
    let params = if any_param { commas + 1 } else { 0 };
    Some(KernelDecl { name, params, line: 0 })
}
