//! Call-site rewrite for base-type instance methods that became static.
//!
//! The host owns the syntax tree. It hands the rule the method invocations of
//! one compilation unit together with a [`TypeResolver`] for receiver
//! expressions. The rule never edits while it scans: [`StaticDispatchRule::scan`]
//! returns a [`RewritePlan`], and the host applies the whole plan afterwards
//! through a [`StaticTargetRewriter`].
//!
//! ```ignore
//! let rule = StaticDispatchRule::panache_entity_base();
//! let plan = rule.scan(unit.invocations(), &unit);
//! plan.apply(&mut unit);
//! ```
//!
//! `entity.flush()` where `entity: com.example.Person` becomes
//! `com.example.Person.flush()`. Calls without a receiver expression, or
//! whose receiver type is unknown, are left alone.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PropfigError;

const PANACHE_ENTITY_BASE: &str = "io.quarkus.hibernate.orm.panache.PanacheEntityBase";

/// Identity of a method invocation node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Identity of an expression node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u32);

/// Resolved signature of an invoked method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
    pub declaring_type: String,
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl MethodType {
    pub fn new(declaring_type: &str, name: &str, parameter_types: &[&str]) -> Self {
        Self {
            declaring_type: declaring_type.to_string(),
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// What a call is invoked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// An instance expression, e.g. `entity` in `entity.flush()`.
    Expression(ExprId),
    /// A type name, i.e. the call is already static.
    Type(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInvocation {
    pub id: NodeId,
    /// `None` when the host could not attribute the call.
    pub method: Option<MethodType>,
    /// `None` for implicit calls such as `flush()` inside the entity itself.
    pub select: Option<Receiver>,
}

/// Resolves the static type of an expression to its fully qualified name.
pub trait TypeResolver {
    /// `None` when the type is unknown or erased.
    fn resolve_type(&self, expr: ExprId) -> Option<String>;
}

impl TypeResolver for HashMap<ExprId, String> {
    fn resolve_type(&self, expr: ExprId) -> Option<String> {
        self.get(&expr).cloned()
    }
}

/// Applies one scheduled edit to the host tree.
pub trait StaticTargetRewriter {
    /// Redirect `edit.call` to a static call on `edit.target`, dropping the
    /// receiver expression. Returns whether the tree changed.
    fn redirect_to_static(&mut self, edit: &ScheduledEdit) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arguments {
    Any,
    Exact(Vec<String>),
}

/// A method signature pattern such as
/// `io.quarkus.hibernate.orm.panache.PanacheEntityBase flush()`.
///
/// The argument list is either exact (`(int, java.lang.String)`) or `(..)`
/// for any arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMatcher {
    owner: String,
    name: String,
    arguments: Arguments,
}

impl MethodMatcher {
    pub fn parse(signature: &str) -> Result<Self, PropfigError> {
        let invalid = || PropfigError::InvalidSignature(signature.to_string());

        let (owner, rest) = signature
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(invalid)?;
        let (name, args) = rest.trim_start().split_once('(').ok_or_else(invalid)?;
        let name = name.trim_end();
        let args = args.strip_suffix(')').ok_or_else(invalid)?.trim();

        if !is_qualified_name(owner) || !is_identifier(name) {
            return Err(invalid());
        }

        let arguments = match args {
            ".." => Arguments::Any,
            "" => Arguments::Exact(Vec::new()),
            list => {
                let types: Vec<String> = list.split(',').map(|a| a.trim().to_string()).collect();
                if types
                    .iter()
                    .any(|t| t.is_empty() || t.contains(char::is_whitespace) || t == "..")
                {
                    return Err(invalid());
                }
                Arguments::Exact(types)
            }
        };

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            arguments,
        })
    }

    /// Matcher for a method taking no arguments.
    pub fn no_args(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            arguments: Arguments::Exact(Vec::new()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, method: &MethodType) -> bool {
        method.declaring_type == self.owner
            && method.name == self.name
            && match &self.arguments {
                Arguments::Any => true,
                Arguments::Exact(types) => *types == method.parameter_types,
            }
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arguments {
            Arguments::Any => write!(f, "{} {}(..)", self.owner, self.name),
            Arguments::Exact(types) => write!(f, "{} {}({})", self.owner, self.name, types.join(", ")),
        }
    }
}

impl FromStr for MethodMatcher {
    type Err = PropfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn is_qualified_name(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

/// One intended redirection, recorded during the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEdit {
    pub call: NodeId,
    /// The matched signature, in [`MethodMatcher`] notation.
    pub signature: String,
    /// Fully qualified type that becomes the static target.
    pub target: String,
}

/// All edits found in one compilation unit, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewritePlan {
    edits: Vec<ScheduledEdit>,
}

impl RewritePlan {
    pub fn edits(&self) -> &[ScheduledEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn to_json(&self) -> Result<String, PropfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PropfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply every edit, returning how many changed the tree.
    pub fn apply<R: StaticTargetRewriter + ?Sized>(&self, rewriter: &mut R) -> usize {
        self.edits
            .iter()
            .filter(|edit| rewriter.redirect_to_static(edit))
            .count()
    }
}

/// In-memory compilation unit for hosts without a tree of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnit {
    invocations: Vec<MethodInvocation>,
    expression_types: HashMap<ExprId, String>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invocation(mut self, invocation: MethodInvocation) -> Self {
        self.invocations.push(invocation);
        self
    }

    pub fn with_expression_type(mut self, expr: ExprId, fully_qualified: &str) -> Self {
        self.expression_types.insert(expr, fully_qualified.to_string());
        self
    }

    pub fn invocations(&self) -> &[MethodInvocation] {
        &self.invocations
    }

    pub fn invocation(&self, id: NodeId) -> Option<&MethodInvocation> {
        self.invocations.iter().find(|i| i.id == id)
    }
}

impl TypeResolver for CompilationUnit {
    fn resolve_type(&self, expr: ExprId) -> Option<String> {
        self.expression_types.get(&expr).cloned()
    }
}

impl StaticTargetRewriter for CompilationUnit {
    fn redirect_to_static(&mut self, edit: &ScheduledEdit) -> bool {
        let Some(call) = self.invocations.iter_mut().find(|i| i.id == edit.call) else {
            return false;
        };
        if !matches!(call.select, Some(Receiver::Expression(_))) {
            return false;
        }
        call.select = Some(Receiver::Type(edit.target.clone()));
        if let Some(method) = call.method.as_mut() {
            method.declaring_type = edit.target.clone();
        }
        true
    }
}

/// Redirects matched instance calls to static calls on the receiver's type.
#[derive(Debug, Clone)]
pub struct StaticDispatchRule {
    matchers: Vec<MethodMatcher>,
}

impl StaticDispatchRule {
    pub const DISPLAY_NAME: &'static str = "Use `PanacheEntityBase` static methods";
    pub const DESCRIPTION: &'static str = "The `getEntityManager()` and the `flush()` methods of \
         `PanacheEntityBase` are now static methods.";
    pub const ESTIMATED_EFFORT: Duration = Duration::from_secs(5 * 60);

    pub fn new(matchers: Vec<MethodMatcher>) -> Self {
        Self { matchers }
    }

    /// `getEntityManager()` and `flush()` of `PanacheEntityBase`.
    pub fn panache_entity_base() -> Self {
        Self::new(vec![
            MethodMatcher::no_args(PANACHE_ENTITY_BASE, "getEntityManager"),
            MethodMatcher::no_args(PANACHE_ENTITY_BASE, "flush"),
        ])
    }

    pub fn matchers(&self) -> &[MethodMatcher] {
        &self.matchers
    }

    /// Whether any invocation uses a matched method at all.
    pub fn is_applicable(&self, invocations: &[MethodInvocation]) -> bool {
        invocations.iter().any(|call| self.matching(call).is_some())
    }

    /// Collect the edits for one compilation unit without touching it.
    pub fn scan<T: TypeResolver + ?Sized>(
        &self,
        invocations: &[MethodInvocation],
        resolver: &T,
    ) -> RewritePlan {
        if !self.is_applicable(invocations) {
            return RewritePlan::default();
        }
        RewritePlan {
            edits: invocations
                .iter()
                .filter_map(|call| self.schedule(call, resolver))
                .collect(),
        }
    }

    /// Scan `unit` and apply the resulting plan to it.
    pub fn run(&self, unit: &mut CompilationUnit) -> RewritePlan {
        let plan = self.scan(unit.invocations(), &*unit);
        plan.apply(unit);
        plan
    }

    fn matching(&self, call: &MethodInvocation) -> Option<&MethodMatcher> {
        let method = call.method.as_ref()?;
        self.matchers.iter().find(|m| m.matches(method))
    }

    fn schedule<T: TypeResolver + ?Sized>(
        &self,
        call: &MethodInvocation,
        resolver: &T,
    ) -> Option<ScheduledEdit> {
        let matcher = self.matching(call)?;
        let Some(Receiver::Expression(expr)) = &call.select else {
            tracing::trace!(call = call.id.0, "no receiver expression");
            return None;
        };
        let Some(target) = resolver.resolve_type(*expr) else {
            tracing::trace!(call = call.id.0, "receiver type unresolved");
            return None;
        };
        tracing::debug!(call = call.id.0, signature = %matcher, target = %target, "rewrite scheduled");
        Some(ScheduledEdit {
            call: call.id,
            signature: matcher.to_string(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = "com.example.Person";
    const ORDER: &str = "com.example.Order";

    fn call(id: u32, name: &str, select: Option<Receiver>) -> MethodInvocation {
        MethodInvocation {
            id: NodeId(id),
            method: Some(MethodType::new(PANACHE_ENTITY_BASE, name, &[])),
            select,
        }
    }

    fn on(expr: u32) -> Option<Receiver> {
        Some(Receiver::Expression(ExprId(expr)))
    }

    fn rule() -> StaticDispatchRule {
        StaticDispatchRule::panache_entity_base()
    }

    #[test]
    fn parses_signatures() {
        let m = MethodMatcher::parse("io.quarkus.hibernate.orm.panache.PanacheEntityBase flush()").unwrap();
        assert_eq!(m.owner(), PANACHE_ENTITY_BASE);
        assert_eq!(m.name(), "flush");
        assert_eq!(m, MethodMatcher::no_args(PANACHE_ENTITY_BASE, "flush"));

        let m: MethodMatcher = "java.util.List add(int,  java.lang.Object)".parse().unwrap();
        assert_eq!(m.to_string(), "java.util.List add(int, java.lang.Object)");
        assert!(m.matches(&MethodType::new("java.util.List", "add", &["int", "java.lang.Object"])));
        assert!(!m.matches(&MethodType::new("java.util.List", "add", &["java.lang.Object"])));
    }

    #[test]
    fn wildcard_arguments_match_any_list() {
        let m = MethodMatcher::parse("java.util.List add(..)").unwrap();
        assert_eq!(m.to_string(), "java.util.List add(..)");
        assert!(m.matches(&MethodType::new("java.util.List", "add", &[])));
        assert!(m.matches(&MethodType::new("java.util.List", "add", &["int", "E"])));
        assert!(!m.matches(&MethodType::new("java.util.Set", "add", &["E"])));
    }

    #[test]
    fn rejects_malformed_signatures() {
        for bad in [
            "",
            "flush()",
            "a.B flush",
            "a.B flush(",
            "a..B flush()",
            "a.B 1flush()",
            "a.B flush(int,)",
            "a.B flush(int, ..)",
        ] {
            assert!(
                matches!(MethodMatcher::parse(bad), Err(PropfigError::InvalidSignature(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn schedules_rewrite_for_resolved_receivers() {
        let unit = CompilationUnit::new()
            .with_invocation(call(1, "flush", on(10)))
            .with_invocation(call(2, "getEntityManager", on(10)))
            .with_expression_type(ExprId(10), PERSON);

        let plan = rule().scan(unit.invocations(), &unit);
        assert_eq!(
            plan.edits(),
            &[
                ScheduledEdit {
                    call: NodeId(1),
                    signature: format!("{PANACHE_ENTITY_BASE} flush()"),
                    target: PERSON.into(),
                },
                ScheduledEdit {
                    call: NodeId(2),
                    signature: format!("{PANACHE_ENTITY_BASE} getEntityManager()"),
                    target: PERSON.into(),
                },
            ]
        );
    }

    #[test]
    fn each_call_gets_its_own_receiver_type() {
        let unit = CompilationUnit::new()
            .with_invocation(call(1, "flush", on(10)))
            .with_invocation(call(2, "flush", on(20)))
            .with_expression_type(ExprId(10), PERSON)
            .with_expression_type(ExprId(20), ORDER);

        let plan = rule().scan(unit.invocations(), &unit);
        let targets: Vec<_> = plan.edits().iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec![PERSON, ORDER]);
    }

    #[test]
    fn leaves_implicit_and_unresolved_calls_alone() {
        let unit = CompilationUnit::new()
            .with_invocation(call(1, "flush", None))
            .with_invocation(call(2, "flush", on(99)))
            .with_invocation(call(3, "flush", Some(Receiver::Type(PERSON.into()))));

        assert!(rule().is_applicable(unit.invocations()));
        assert!(rule().scan(unit.invocations(), &unit).is_empty());
    }

    #[test]
    fn ignores_other_methods() {
        let unit = CompilationUnit::new()
            .with_invocation(MethodInvocation {
                id: NodeId(1),
                method: Some(MethodType::new(PANACHE_ENTITY_BASE, "persist", &[])),
                select: on(10),
            })
            .with_invocation(MethodInvocation {
                id: NodeId(2),
                method: Some(MethodType::new("javax.persistence.EntityManager", "flush", &[])),
                select: on(10),
            })
            .with_invocation(MethodInvocation {
                id: NodeId(3),
                method: None,
                select: on(10),
            })
            .with_expression_type(ExprId(10), PERSON);

        assert!(!rule().is_applicable(unit.invocations()));
        assert!(rule().scan(unit.invocations(), &unit).is_empty());
    }

    #[test]
    fn run_rewrites_and_is_idempotent() {
        let mut unit = CompilationUnit::new()
            .with_invocation(call(1, "flush", on(10)))
            .with_invocation(call(2, "flush", None))
            .with_expression_type(ExprId(10), PERSON);

        let plan = rule().run(&mut unit);
        assert_eq!(plan.len(), 1);

        let rewritten = unit.invocation(NodeId(1)).unwrap();
        assert_eq!(rewritten.select, Some(Receiver::Type(PERSON.into())));
        assert_eq!(rewritten.method.as_ref().unwrap().declaring_type, PERSON);
        assert_eq!(unit.invocation(NodeId(2)).unwrap().select, None);

        assert!(rule().run(&mut unit).is_empty());
    }

    #[test]
    fn plan_applies_to_any_rewriter() {
        struct Recorder(Vec<(NodeId, String)>);
        impl StaticTargetRewriter for Recorder {
            fn redirect_to_static(&mut self, edit: &ScheduledEdit) -> bool {
                self.0.push((edit.call, edit.target.clone()));
                true
            }
        }

        let mut types = HashMap::new();
        types.insert(ExprId(7), ORDER.to_string());
        let plan = rule().scan(&[call(4, "getEntityManager", on(7))], &types);

        let mut recorder = Recorder(Vec::new());
        assert_eq!(plan.apply(&mut recorder), 1);
        assert_eq!(recorder.0, vec![(NodeId(4), ORDER.to_string())]);
    }

    #[test]
    fn stale_edits_do_not_apply() {
        let plan = RewritePlan {
            edits: vec![ScheduledEdit {
                call: NodeId(42),
                signature: format!("{PANACHE_ENTITY_BASE} flush()"),
                target: PERSON.into(),
            }],
        };
        let mut unit = CompilationUnit::new().with_invocation(call(1, "flush", on(10)));
        assert_eq!(plan.apply(&mut unit), 0);
        assert_eq!(unit.invocation(NodeId(1)).unwrap().select, on(10));
    }

    #[test]
    fn plan_json_shape() {
        let unit = CompilationUnit::new()
            .with_invocation(call(3, "flush", on(1)))
            .with_expression_type(ExprId(1), PERSON);
        let plan = rule().scan(unit.invocations(), &unit);

        let json = plan.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"edits":[{"call":3,"signature":"io.quarkus.hibernate.orm.panache.PanacheEntityBase flush()","target":"com.example.Person"}]}"#
        );
        assert_eq!(RewritePlan::from_json(&json).unwrap(), plan);
        assert!(matches!(
            RewritePlan::from_json("{\"edits\":3}"),
            Err(PropfigError::PlanEncoding(_))
        ));
    }

    #[test]
    fn rule_metadata() {
        assert_eq!(StaticDispatchRule::ESTIMATED_EFFORT, Duration::from_secs(300));
        assert!(StaticDispatchRule::DESCRIPTION.contains("getEntityManager()"));
        assert_eq!(rule().matchers().len(), 2);
    }
}
