//! Policy model definition.
//!
//! A model is a sectioned text document:
//!
//! ```text
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::matcher::{self, Expr, MatchEnv, Scope};

/// Model that grants a rule when the subject holds the rule's subject (or
/// role) and resource and action are equal.
pub const DEFAULT_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

const ALLOW_OVERRIDE: &str = "some(where(p.eft==allow))";

/// Position of the subject token in request and policy definitions.
pub const SUBJECT: usize = 0;
/// Position of the resource token.
pub const RESOURCE: usize = 1;
/// Position of the action token.
pub const ACTION: usize = 2;

/// A compiled policy model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyModel {
    source: String,
    request_tokens: [String; 3],
    policy_tokens: [String; 3],
    has_role_definition: bool,
    matcher: Expr,
}

impl PolicyModel {
    /// Parses and compiles a model source.
    pub fn parse(source: &str) -> ModelResult<Self> {
        let sections = parse_sections(source)?;

        let request_tokens = tokens_of(&sections, "request_definition", "r")?;
        let policy_tokens = tokens_of(&sections, "policy_definition", "p")?;

        let has_role_definition = match sections.get("role_definition") {
            Some(entries) => {
                let value = entry(entries, "role_definition", "g")?;
                let arity = value.split(',').count();
                if arity != 2 {
                    return Err(ModelError::definition(
                        "g",
                        format!("expected 2 fields (_, _), found {arity}"),
                    ));
                }
                true
            }
            None => false,
        };

        let effect = entry(section(&sections, "policy_effect")?, "policy_effect", "e")?;
        let normalized: String = effect.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized != ALLOW_OVERRIDE {
            return Err(ModelError::definition(
                "e",
                format!("unsupported effect {effect:?}"),
            ));
        }

        let expression = entry(section(&sections, "matchers")?, "matchers", "m")?;
        let matcher = matcher::compile(
            expression,
            Scope {
                request: &request_tokens,
                policy: &policy_tokens,
                roles: has_role_definition,
            },
        )?;

        debug!(
            roles = has_role_definition,
            matcher = expression,
            "compiled policy model"
        );

        Ok(Self {
            source: source.to_string(),
            request_tokens,
            policy_tokens,
            has_role_definition,
            matcher,
        })
    }

    /// Parses [`DEFAULT_MODEL`].
    pub fn default_rbac() -> ModelResult<Self> {
        Self::parse(DEFAULT_MODEL)
    }

    /// Evaluates the matcher for a `(subject, resource, action)` request
    /// against one rule triple.
    pub fn matches(
        &self,
        request: &[&str; 3],
        rule: &[&str; 3],
        env: &dyn MatchEnv,
    ) -> ModelResult<bool> {
        self.matcher.eval(request, rule, env)
    }

    /// The text this model was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Request definition token names.
    pub fn request_tokens(&self) -> &[String; 3] {
        &self.request_tokens
    }

    /// Policy definition token names.
    pub fn policy_tokens(&self) -> &[String; 3] {
        &self.policy_tokens
    }

    /// Whether the matcher consults role assignments.
    pub fn uses_roles(&self) -> bool {
        self.has_role_definition && self.matcher.uses_roles()
    }

    /// Whether every match requires exact equality on both resource and
    /// action, so rules can be looked up by that pair.
    pub fn is_indexable(&self) -> bool {
        self.matcher.requires_exact(RESOURCE) && self.matcher.requires_exact(ACTION)
    }

    /// The compiled matcher.
    pub fn matcher(&self) -> &Expr {
        &self.matcher
    }
}

type Sections<'a> = HashMap<String, Vec<(usize, &'a str, &'a str)>>;

fn parse_sections(source: &str) -> ModelResult<Sections<'_>> {
    let mut sections: Sections<'_> = HashMap::new();
    let mut current: Option<String> = None;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[') {
            let name = name
                .strip_suffix(']')
                .ok_or_else(|| ModelError::syntax(line_no, "unterminated section header"))?
                .trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        let name = current
            .as_ref()
            .ok_or_else(|| ModelError::syntax(line_no, "definition outside of a section"))?;
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ModelError::syntax(line_no, "expected 'key = value'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ModelError::syntax(line_no, "empty key"));
        }
        sections
            .entry(name.clone())
            .or_default()
            .push((line_no, key, value.trim()));
    }

    Ok(sections)
}

fn section<'s, 'a>(
    sections: &'s Sections<'a>,
    name: &str,
) -> ModelResult<&'s [(usize, &'a str, &'a str)]> {
    sections
        .get(name)
        .map(Vec::as_slice)
        .ok_or_else(|| ModelError::MissingSection(name.to_string()))
}

fn entry<'a>(entries: &[(usize, &'a str, &'a str)], section: &str, key: &str) -> ModelResult<&'a str> {
    let mut found = entries.iter().filter(|(_, k, _)| *k == key);
    let &(line_no, _, value) = found
        .next()
        .ok_or_else(|| ModelError::definition(key, format!("missing in [{section}]")))?;
    if let Some((dup, _, _)) = found.next() {
        return Err(ModelError::syntax(
            *dup,
            format!("duplicate definition {key} (first on line {line_no})"),
        ));
    }
    if value.is_empty() {
        return Err(ModelError::syntax(line_no, format!("empty definition {key}")));
    }
    Ok(value)
}

fn tokens_of(sections: &Sections<'_>, name: &str, key: &str) -> ModelResult<[String; 3]> {
    let value = entry(section(sections, name)?, name, key)?;
    let tokens: Vec<String> = value.split(',').map(|t| t.trim().to_string()).collect();

    if tokens.iter().any(String::is_empty) {
        return Err(ModelError::definition(key, "empty token"));
    }
    let count = tokens.len();
    let tokens: [String; 3] = tokens.try_into().map_err(|_| {
        ModelError::definition(key, format!("expected 3 tokens (subject, resource, action), found {count}"))
    })?;
    if tokens[0] == tokens[1] || tokens[1] == tokens[2] || tokens[0] == tokens[2] {
        return Err(ModelError::definition(key, "duplicate token name"));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoRoles;

    impl MatchEnv for NoRoles {
        fn has_role(&self, subject: &str, role: &str) -> bool {
            subject == role
        }
    }

    #[test]
    fn test_default_model_parses() {
        let model = PolicyModel::default_rbac().unwrap();
        assert!(model.uses_roles());
        assert!(model.is_indexable());
        assert_eq!(model.request_tokens()[RESOURCE], "obj");
        assert_eq!(model.source(), DEFAULT_MODEL);
    }

    #[test]
    fn test_model_without_roles() {
        let source = r#"
            # ACL only
            [request_definition]
            r = user, thing, verb
            [policy_definition]
            p = user, thing, verb
            [policy_effect]
            e = some(where (p.eft == allow))
            [matchers]
            m = r.user == p.user && keyMatch(r.thing, p.thing) && r.verb == p.verb
        "#;
        let model = PolicyModel::parse(source).unwrap();
        assert!(!model.uses_roles());
        assert!(!model.is_indexable());
        assert!(model
            .matches(&["bob", "/files/a", "read"], &["bob", "/files/*", "read"], &NoRoles)
            .unwrap());
    }

    #[test]
    fn test_missing_section() {
        let source = "[request_definition]\nr = sub, obj, act\n";
        let err = PolicyModel::parse(source).unwrap_err();
        assert_eq!(err, ModelError::MissingSection("policy_definition".to_string()));
    }

    #[test]
    fn test_wrong_arity() {
        let source = DEFAULT_MODEL.replace("r = sub, obj, act", "r = sub, dom, obj, act");
        let err = PolicyModel::parse(&source).unwrap_err();
        assert!(err.to_string().contains("expected 3 tokens"));
    }

    #[test]
    fn test_domain_roles_rejected() {
        let source = DEFAULT_MODEL.replace("g = _, _", "g = _, _, _");
        assert!(PolicyModel::parse(&source).is_err());
    }

    #[test]
    fn test_unsupported_effect() {
        let source = DEFAULT_MODEL.replace(
            "e = some(where (p.eft == allow))",
            "e = !some(where (p.eft == deny))",
        );
        let err = PolicyModel::parse(&source).unwrap_err();
        assert!(err.to_string().contains("unsupported effect"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(PolicyModel::parse("r = sub, obj, act").is_err());
        assert!(PolicyModel::parse("[request_definition\nr = a, b, c").is_err());

        let duplicated = DEFAULT_MODEL.replace(
            "m = g(r.sub, p.sub)",
            "m = r.sub == p.sub\nm = g(r.sub, p.sub)",
        );
        let err = PolicyModel::parse(&duplicated).unwrap_err();
        assert!(err.to_string().contains("duplicate definition"));
    }

    #[test]
    fn test_bad_matcher_is_compile_error() {
        let source = DEFAULT_MODEL.replace("r.act == p.act", "r.act == p.verb");
        let err = PolicyModel::parse(&source).unwrap_err();
        assert!(matches!(err, ModelError::Matcher { .. }));
    }
}
