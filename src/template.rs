//! Single-pass prompt template resolver with caching
//!
//! Templates contain `{{name}}` placeholders where `name` is an identifier
//! (`[A-Za-z0-9_]+`). Anything else is literal text. Tokenization happens once
//! per distinct template and is cached; the same tokenizer feeds both the
//! compiler (placeholder discovery) and the engine (substitution), so the two
//! can never disagree about what counts as a placeholder.
//!
//! Pinned edge cases:
//! - every occurrence of a repeated placeholder is substituted
//! - names that are substrings of other names cannot collide (exact token match)
//! - nested braces resolve innermost-first: `{{{x}}}` renders `{` + value + `}`

use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::context::Context;

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// Placeholder: {{name}}
    Placeholder(String),
}

/// Template resolver with caching
pub struct TemplateResolver {
    /// Cache of parsed templates
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse a template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut literal_start = 0;
        let mut scan_from = 0;

        while let Some(found) = template[scan_from..].find("{{") {
            let open = scan_from + found;
            let rest = &template[open + 2..];

            // Placeholder names are ASCII identifiers, so byte length == char count
            let ident_len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();

            if ident_len > 0 && rest[ident_len..].starts_with("}}") {
                if open > literal_start {
                    tokens.push(Token::Literal(literal_start..open));
                }
                tokens.push(Token::Placeholder(rest[..ident_len].to_string()));
                scan_from = open + 2 + ident_len + 2;
                literal_start = scan_from;
            } else {
                // Not a placeholder here; re-scan from the next brace so that
                // nested forms like {{{x}}} match the innermost pair
                scan_from = open + 1;
            }
        }

        if literal_start < template.len() {
            tokens.push(Token::Literal(literal_start..template.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(template.to_string(), tokens.clone());
        tokens
    }

    /// Substitute placeholders from the context.
    ///
    /// A placeholder with no context entry is kept verbatim; validated plans
    /// never hit that path because the engine gathers inputs before rendering.
    pub fn resolve(&self, template: &str, ctx: &Context) -> String {
        let tokens = self.tokenize(template);
        let mut result = String::with_capacity(template.len() * 2);

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&template[range.clone()]),
                Token::Placeholder(name) => match ctx.get(name) {
                    Some(value) => result.push_str(&Context::stringify(value)),
                    None => {
                        result.push_str("{{");
                        result.push_str(name);
                        result.push_str("}}");
                    }
                },
            }
        }

        result
    }

    /// Distinct placeholder names, in order of first occurrence
    pub fn placeholders(&self, template: &str) -> Vec<String> {
        let tokens = self.tokenize(template);
        let mut names: Vec<String> = Vec::new();
        for token in tokens.iter() {
            if let Token::Placeholder(name) = token {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

/// Global template resolver instance
pub static TEMPLATE_RESOLVER: Lazy<TemplateResolver> = Lazy::new(TemplateResolver::new);

/// Substitute placeholders in a template using the run context
pub fn render(template: &str, ctx: &Context) -> String {
    TEMPLATE_RESOLVER.resolve(template, ctx)
}

/// Distinct placeholder names in a template
pub fn placeholders(template: &str) -> Vec<String> {
    TEMPLATE_RESOLVER.placeholders(template)
}
