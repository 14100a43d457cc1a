//! GLSL scanner used by every compilation stage.
//!
//! The parser recognises exactly four shapes: the `#version` directive,
//! `#import` directives, uniform declarations, and function definitions with
//! their bodies. It never mutates the source and memoises its result, so
//! repeated `parse()` calls are free until `set_source` replaces the text.
//!
//! Recognition is line-anchored and hand-rolled; this is not a C
//! preprocessor. Malformed `#import` lines fault with a diagnosis naming
//! what is wrong, while a function whose body never closes is silently
//! skipped and left for the GPU compiler to complain about.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::SandboxError;
use crate::types::{
    DepKind, DepRef, GlslType, GlslVariable, GlslVersion, ParseResult, ShaderFunction,
    ShaderImport, ShaderUniform,
};

/// Parameter qualifiers stripped before capturing `type name` pairs.
const PARAM_QUALIFIERS: [&str; 7] = ["in", "out", "inout", "const", "highp", "mediump", "lowp"];

/// Precision qualifiers allowed between `uniform` and the type keyword.
const PRECISION_QUALIFIERS: [&str; 3] = ["highp", "mediump", "lowp"];

/// Control-flow keywords that look like calls but are not function references.
const CONTROL_KEYWORDS: [&str; 11] = [
    "if", "else", "for", "while", "do", "switch", "case", "return", "break", "continue", "discard",
];

/// Memoising scanner over one GLSL source string.
#[derive(Debug, Clone)]
pub struct Parser {
    source: String,
    memo: Option<ParseResult>,
}

impl Parser {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            memo: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the source text and drops the memoised parse.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.memo = None;
    }

    /// Cheap profile probe; does not touch the memo.
    pub fn version(&self) -> GlslVersion {
        scan_version(&self.source)
    }

    /// Scans the source, or returns the memoised result of a previous scan.
    pub fn parse(&mut self) -> Result<&ParseResult, SandboxError> {
        if self.memo.is_none() {
            let parsed = parse_source(&self.source)?;
            debug!(
                imports = parsed.imports.len(),
                uniforms = parsed.uniforms.len(),
                functions = parsed.functions.len(),
                "parsed shader source"
            );
            self.memo = Some(parsed);
        }
        Ok(self
            .memo
            .as_ref()
            .expect("parse memo populated directly above"))
    }

    /// Whether a parse result is already cached.
    pub fn is_parsed(&self) -> bool {
        self.memo.is_some()
    }
}

fn parse_source(source: &str) -> Result<ParseResult, SandboxError> {
    let version = scan_version(source);
    let imports = scan_imports(source)?;
    let uniforms = scan_uniforms(source);
    let functions = scan_functions(source, &uniforms);
    Ok(ParseResult {
        version,
        imports,
        uniforms,
        functions,
    })
}

fn scan_version(source: &str) -> GlslVersion {
    for line in source.lines() {
        let rest = line.trim_start();
        let Some(rest) = rest.strip_prefix("#version") else {
            continue;
        };
        let mut words = rest.split_whitespace();
        if words.next() == Some("300") && words.next() == Some("es") {
            return GlslVersion::Gl2;
        }
    }
    GlslVersion::Gl1
}

/// Whether a line is an `#import` directive or something close enough to one
/// that it deserves a diagnosis instead of silence.
pub(crate) fn looks_like_import(line: &str) -> bool {
    let line = line.trim_start();
    if has_keyword(line, "#import") || has_keyword(line, "import") {
        return true;
    }
    let mut chars = line.chars();
    match chars.next() {
        Some(c) if c != '#' && !c.is_alphanumeric() && c != '_' => {
            has_keyword(chars.as_str(), "import")
        }
        _ => false,
    }
}

fn scan_imports(source: &str) -> Result<Vec<ShaderImport>, SandboxError> {
    let mut imports: Vec<ShaderImport> = Vec::new();
    let mut aliases: BTreeSet<String> = BTreeSet::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        if !looks_like_import(raw) {
            continue;
        }
        let import = parse_import_line(raw.trim_start(), line_no)?;
        if !aliases.insert(import.alias.clone()) {
            return Err(SandboxError::DuplicateAlias {
                alias: import.alias,
                line: line_no,
            });
        }
        imports.push(import);
    }
    Ok(imports)
}

fn parse_import_line(line: &str, line_no: usize) -> Result<ShaderImport, SandboxError> {
    let fault = |detail: String| SandboxError::ImportSyntax {
        line: line_no,
        detail,
    };

    let mut rest = if let Some(rest) = strip_keyword(line, "#import") {
        rest
    } else if strip_keyword(line, "import").is_some() {
        return Err(fault("missing '#' before 'import'".into()));
    } else {
        let prefix = line.chars().next().unwrap_or(' ');
        return Err(fault(format!("Invalid prefix '{prefix}'")));
    };

    rest = rest.trim_start();
    let Some((name, after_name)) = take_ident(rest) else {
        return Err(fault("missing function name after '#import'".into()));
    };
    rest = after_name.trim_start();

    let mut alias = name.to_string();
    if let Some(after_as) = strip_keyword(rest, "as") {
        rest = after_as.trim_start();
        let Some((alias_ident, after_alias)) = take_ident(rest) else {
            return Err(fault("missing alias after 'as'".into()));
        };
        alias = alias_ident.to_string();
        rest = after_alias.trim_start();
    }

    let Some(after_from) = strip_keyword(rest, "from") else {
        return Err(fault("missing 'from' clause".into()));
    };
    rest = after_from.trim_start();

    let quote = rest.chars().next();
    let module = match quote {
        Some(q @ ('\'' | '"')) => {
            let inner = &rest[1..];
            let Some(end) = inner.find(q) else {
                return Err(fault("module path must be quoted".into()));
            };
            &inner[..end]
        }
        _ => return Err(fault("module path must be quoted".into())),
    };
    if module.is_empty() {
        return Err(fault("module path must not be empty".into()));
    }

    Ok(ShaderImport {
        name: name.to_string(),
        alias,
        module: module.to_string(),
        line: line_no,
    })
}

fn scan_uniforms(source: &str) -> Vec<ShaderUniform> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| uniform_on_line(line, idx + 1))
        .collect()
}

/// Matches `uniform [precision]? <type> <ident> ('[' N ']')? ;` on one line.
pub(crate) fn uniform_on_line(line: &str, line_no: usize) -> Option<ShaderUniform> {
    let mut rest = strip_keyword(line.trim_start(), "uniform")?.trim_start();

    for qualifier in PRECISION_QUALIFIERS {
        if let Some(after) = strip_keyword(rest, qualifier) {
            rest = after.trim_start();
            break;
        }
    }

    let (ty_keyword, after_ty) = take_ident(rest)?;
    let ty = GlslType::parse(ty_keyword)?;
    rest = after_ty.trim_start();

    let (name, after_name) = take_ident(rest)?;
    rest = after_name.trim_start();

    let mut array_len = None;
    if let Some(after_bracket) = rest.strip_prefix('[') {
        let inner = after_bracket.trim_start();
        let digits: String = inner.chars().take_while(|c| c.is_ascii_digit()).collect();
        let len: u32 = digits.parse().ok()?;
        if len == 0 {
            return None;
        }
        let after_digits = inner[digits.len()..].trim_start();
        rest = after_digits.strip_prefix(']')?.trim_start();
        array_len = Some(len);
    }

    rest.strip_prefix(';')?;

    Some(ShaderUniform {
        name: name.to_string(),
        ty,
        array_len,
        line: line_no,
    })
}

/// Scans for line-anchored function definitions, skipping past each body so
/// nothing inside braces is mistaken for another definition.
pub(crate) fn scan_functions(source: &str, uniforms: &[ShaderUniform]) -> Vec<ShaderFunction> {
    let mut functions = Vec::new();
    let mut line_start = 0usize;
    let mut line_no = 1usize;

    while line_start < source.len() {
        let line_end = source[line_start..]
            .find('\n')
            .map(|off| line_start + off)
            .unwrap_or(source.len());

        if let Some(header) = match_function_header(source, line_start) {
            if let Some(close) = match_braces(source, header.open_brace) {
                let body = &source[header.open_brace..=close];
                let deps = scan_deps(body, uniforms);
                functions.push(ShaderFunction {
                    name: header.name,
                    return_type: header.return_type,
                    params: header.params,
                    body: body.to_string(),
                    deps,
                    line: line_no,
                });

                // Resume scanning on the line after the closing brace.
                let resumed = source[close..]
                    .find('\n')
                    .map(|off| close + off + 1)
                    .unwrap_or(source.len());
                line_no += source[line_start..resumed].matches('\n').count();
                line_start = resumed;
                continue;
            }
            // Unclosed body: drop the definition and keep scanning below it.
        }

        line_start = line_end + 1;
        line_no += 1;
    }

    functions
}

struct HeaderMatch {
    name: String,
    return_type: GlslType,
    params: Vec<GlslVariable>,
    open_brace: usize,
}

fn match_function_header(source: &str, line_start: usize) -> Option<HeaderMatch> {
    let mut pos = line_start;
    pos += count_horizontal_space(&source[pos..]);

    let (ret_keyword, after_ret) = take_ident(&source[pos..])?;
    let return_type = GlslType::parse(ret_keyword)?;
    pos = source.len() - after_ret.len();

    let spaces = count_horizontal_space(&source[pos..]);
    if spaces == 0 {
        return None;
    }
    pos += spaces;

    let (name, after_name) = take_ident(&source[pos..])?;
    let name = name.to_string();
    pos = source.len() - after_name.len();
    pos += count_horizontal_space(&source[pos..]);

    if source.as_bytes().get(pos) != Some(&b'(') {
        return None;
    }
    let close_paren = source[pos..].find(')').map(|off| pos + off)?;
    let params = parse_params(&source[pos + 1..close_paren]);

    let mut brace = close_paren + 1;
    let bytes = source.as_bytes();
    while brace < bytes.len() && bytes[brace].is_ascii_whitespace() {
        brace += 1;
    }
    if bytes.get(brace) != Some(&b'{') {
        return None;
    }

    Some(HeaderMatch {
        name,
        return_type,
        params,
        open_brace: brace,
    })
}

fn parse_params(src: &str) -> Vec<GlslVariable> {
    src.split(',')
        .filter_map(|part| {
            let tokens: Vec<&str> = part
                .split_whitespace()
                .filter(|token| !PARAM_QUALIFIERS.contains(token))
                .collect();
            match tokens[..] {
                [ty_keyword, name] => GlslType::parse(ty_keyword).map(|ty| GlslVariable {
                    name: name.split('[').next().unwrap_or(name).to_string(),
                    ty,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Finds the `}` balancing the `{` at `open`, skipping line comments, block
/// comments, and double-quoted runs. `None` when the body never closes.
fn match_braces(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = source[i..].find('\n').map(|off| i + off).unwrap_or(bytes.len());
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = source[i + 2..].find("*/")?;
                i = i + 2 + end + 2;
                continue;
            }
            b'"' => {
                let end = source[i + 1..].find('"')?;
                i = i + 1 + end + 1;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Records every identifier occurrence that reads as a function call or a
/// declared-uniform reference, with its byte offset inside `body`.
fn scan_deps(body: &str, uniforms: &[ShaderUniform]) -> Vec<DepRef> {
    let uniform_names: BTreeSet<&str> = uniforms.iter().map(|u| u.name.as_str()).collect();
    let bytes = body.as_bytes();
    let mut deps = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let word = &body[start..i];

            let mut lookahead = i;
            while lookahead < bytes.len() && bytes[lookahead].is_ascii_whitespace() {
                lookahead += 1;
            }
            if bytes.get(lookahead) == Some(&b'(') {
                if !CONTROL_KEYWORDS.contains(&word) {
                    deps.push(DepRef {
                        kind: DepKind::Function,
                        name: word.to_string(),
                        index: start,
                    });
                }
            } else if uniform_names.contains(word) {
                deps.push(DepRef {
                    kind: DepKind::Uniform,
                    name: word.to_string(),
                    index: start,
                });
            }
        } else if c.is_ascii_digit() {
            // Swallow numeric literals whole so `0x1f` or `1.0e5` never
            // yields a bogus identifier.
            while i < bytes.len() && (is_ident_char(bytes[i]) || bytes[i] == b'.') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    deps
}

fn count_horizontal_space(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Leading identifier of `s`, plus the remainder after it.
fn take_ident(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    if bytes.first().copied().filter(|b| is_ident_start(*b)).is_none() {
        return None;
    }
    let len = bytes.iter().take_while(|b| is_ident_char(**b)).count();
    Some((&s[..len], &s[len..]))
}

/// Whether `s` starts with `keyword` followed by a word boundary.
fn has_keyword(s: &str, keyword: &str) -> bool {
    strip_keyword(s, keyword).is_some()
}

/// Strips `keyword` off the front of `s` when it ends at a word boundary.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(keyword)?;
    match rest.bytes().next() {
        Some(b) if is_ident_char(b) => None,
        _ => Some(rest),
    }
}
