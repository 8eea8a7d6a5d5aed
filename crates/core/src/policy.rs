// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! The Policy Engine (C3): a stateless predicate over proxy-call tuples.

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::zone_id::ZoneId;

/// Whether a matching rule permits or denies the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
}

/// One entry of the ordered proxy-call rule list.
///
/// Every field is a shell-style glob (`*`, `?`); an empty pattern matches
/// anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyCallRule {
    pub caller: String,
    pub target: String,
    pub bus_name: String,
    pub object_path: String,
    pub interface: String,
    pub method: String,
    pub effect: Effect,
}

impl ProxyCallRule {
    pub fn allow(
        caller: impl Into<String>,
        target: impl Into<String>,
        bus_name: impl Into<String>,
        object_path: impl Into<String>,
        interface: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            caller: caller.into(),
            target: target.into(),
            bus_name: bus_name.into(),
            object_path: object_path.into(),
            interface: interface.into(),
            method: method.into(),
            effect: Effect::Allow,
        }
    }

    pub fn deny_all() -> Self {
        Self {
            caller: String::new(),
            target: String::new(),
            bus_name: String::new(),
            object_path: String::new(),
            interface: String::new(),
            method: String::new(),
            effect: Effect::Deny,
        }
    }
}

/// The `(caller, target, bus, path, iface, method)` tuple a proxy call is
/// authorized against.
#[derive(Debug, Clone)]
pub struct ProxyCallTuple<'a> {
    pub caller: &'a str,
    pub target: &'a str,
    pub bus_name: &'a str,
    pub object_path: &'a str,
    pub interface: &'a str,
    pub method: &'a str,
}

/// A compiled matcher for one rule's six glob fields.
struct CompiledRule {
    caller: GlobMatcher,
    target: GlobMatcher,
    bus_name: GlobMatcher,
    object_path: GlobMatcher,
    interface: GlobMatcher,
    method: GlobMatcher,
    effect: Effect,
}

/// A glob that cannot match any caller/target/bus string we'll ever compare
/// against, used in place of a malformed pattern. Contains no glob
/// metacharacters, so `Glob::new` on it can never fail.
const MATCH_NOTHING: &str = "no-such-value";

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> GlobMatcher {
    // An empty pattern means "match anything", which `*` also
    // expresses, so normalize here rather than special-casing every caller.
    let pattern = if pattern.is_empty() { "*" } else { pattern };
    // A malformed glob in a rule file is a configuration error; by the time
    // `PolicyEngine::new` runs it has already been validated, so fall back
    // to the literal "match nothing" glob rather than panicking on bad input
    // that somehow slipped through.
    Glob::new(pattern)
        .unwrap_or_else(|_| Glob::new(MATCH_NOTHING).expect("MATCH_NOTHING has no glob metacharacters"))
        .compile_matcher()
}

impl CompiledRule {
    fn from_rule(rule: &ProxyCallRule) -> Self {
        Self {
            caller: compile(&rule.caller),
            target: compile(&rule.target),
            bus_name: compile(&rule.bus_name),
            object_path: compile(&rule.object_path),
            interface: compile(&rule.interface),
            method: compile(&rule.method),
            effect: rule.effect,
        }
    }

    fn matches(&self, call: &ProxyCallTuple<'_>) -> bool {
        self.caller.is_match(call.caller)
            && self.target.is_match(call.target)
            && self.bus_name.is_match(call.bus_name)
            && self.object_path.is_match(call.object_path)
            && self.interface.is_match(call.interface)
            && self.method.is_match(call.method)
    }
}

/// Stateless predicate deciding whether a proxy call is authorized.
///
/// Rules are matched in order; the first match's effect decides. No match
/// denies by default.
pub struct PolicyEngine {
    rules: Vec<CompiledRule>,
}

impl PolicyEngine {
    pub fn new(rules: &[ProxyCallRule]) -> Self {
        Self { rules: rules.iter().map(CompiledRule::from_rule).collect() }
    }

    /// Evaluate a call, returning the first matching rule's effect, or
    /// `Deny` if nothing matches.
    pub fn evaluate(&self, call: &ProxyCallTuple<'_>) -> Effect {
        self.rules
            .iter()
            .find(|r| r.matches(call))
            .map(|r| r.effect)
            .unwrap_or(Effect::Deny)
    }

    pub fn is_allowed(&self, call: &ProxyCallTuple<'_>) -> bool {
        self.evaluate(call) == Effect::Allow
    }
}

/// Convenience constructor for call tuples from the two call sites that
/// build one: a zone-bus endpoint (`caller = zone id`) or the host endpoint
/// (`caller = "host"`, [`crate::zone_id::HOST_ID`]).
pub fn host_caller() -> &'static str {
    crate::zone_id::HOST_ID
}

pub fn zone_caller(id: &ZoneId) -> &str {
    id.as_str()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn rules() -> Vec<ProxyCallRule> {
        vec![
            ProxyCallRule::allow("z1", "host", "*", "*", "*", "*"),
            ProxyCallRule::deny_all(),
        ]
    }

    #[test]
    fn first_matching_rule_decides_allow_or_deny() {
        let engine = PolicyEngine::new(&rules());

        let allowed = ProxyCallTuple {
            caller: "z1",
            target: "host",
            bus_name: "org.foo",
            object_path: "/",
            interface: "org.foo",
            method: "Ping",
        };
        assert_eq!(engine.evaluate(&allowed), Effect::Allow);

        let denied = ProxyCallTuple { caller: "z2", ..allowed };
        assert_eq!(engine.evaluate(&denied), Effect::Deny);
    }

    #[test]
    fn no_rules_denies_everything() {
        let engine = PolicyEngine::new(&[]);
        let call = ProxyCallTuple {
            caller: "z1",
            target: "host",
            bus_name: "a",
            object_path: "/b",
            interface: "c",
            method: "d",
        };
        assert_eq!(engine.evaluate(&call), Effect::Deny);
    }

    #[test]
    fn first_match_wins_over_later_allow() {
        let rules = vec![
            ProxyCallRule::deny_all(),
            ProxyCallRule::allow("*", "*", "*", "*", "*", "*"),
        ];
        let engine = PolicyEngine::new(&rules);
        let call = ProxyCallTuple {
            caller: "z1",
            target: "host",
            bus_name: "a",
            object_path: "/b",
            interface: "c",
            method: "d",
        };
        assert_eq!(engine.evaluate(&call), Effect::Deny);
    }

    #[test]
    fn glob_wildcards_match_as_shell_globs() {
        let rules = vec![ProxyCallRule::allow(
            "z?",
            "host",
            "org.tizen.*",
            "*",
            "*",
            "Get*",
        )];
        let engine = PolicyEngine::new(&rules);
        let call = ProxyCallTuple {
            caller: "z1",
            target: "host",
            bus_name: "org.tizen.power",
            object_path: "/x",
            interface: "y",
            method: "GetStatus",
        };
        assert_eq!(engine.evaluate(&call), Effect::Allow);

        let non_match = ProxyCallTuple { method: "SetStatus", ..call };
        assert_eq!(engine.evaluate(&non_match), Effect::Deny);
    }

    #[test]
    fn empty_pattern_matches_anything() {
        let rules = vec![ProxyCallRule::allow("", "", "", "", "", "")];
        let engine = PolicyEngine::new(&rules);
        let call = ProxyCallTuple {
            caller: "anything",
            target: "whatever",
            bus_name: "x.y.z",
            object_path: "/a/b/c",
            interface: "i",
            method: "M",
        };
        assert_eq!(engine.evaluate(&call), Effect::Allow);
    }

    fn arbitrary_field() -> impl Strategy<Value = String> {
        // Mix of literal segments and glob metacharacters so generated rules
        // exercise both exact-match and wildcard paths.
        prop_oneof![
            Just(String::new()),
            "[a-z]{1,4}",
            "[a-z]{1,3}\\*",
            "\\*",
        ]
    }

    fn arbitrary_rule() -> impl Strategy<Value = ProxyCallRule> {
        (
            arbitrary_field(),
            arbitrary_field(),
            arbitrary_field(),
            arbitrary_field(),
            arbitrary_field(),
            arbitrary_field(),
            prop_oneof![Just(Effect::Allow), Just(Effect::Deny)],
        )
            .prop_map(|(caller, target, bus_name, object_path, interface, method, effect)| ProxyCallRule {
                caller,
                target,
                bus_name,
                object_path,
                interface,
                method,
                effect,
            })
    }

    fn call_matching(rule: &ProxyCallRule) -> ProxyCallTuple<'_> {
        // A glob field matches the literal it was built from once `*` is
        // stripped, and an empty or wildcard field matches anything — "x"
        // works for both of those cases.
        fn concrete(field: &str) -> &str {
            if field.is_empty() || field.contains('*') {
                "x"
            } else {
                field
            }
        }
        ProxyCallTuple {
            caller: concrete(&rule.caller),
            target: concrete(&rule.target),
            bus_name: concrete(&rule.bus_name),
            object_path: concrete(&rule.object_path),
            interface: concrete(&rule.interface),
            method: concrete(&rule.method),
        }
    }

    proptest! {
        /// The engine's decision always equals the first rule (in list
        /// order) whose compiled matcher accepts the call, regardless of
        /// how many rules come after it.
        #[test]
        fn prop_first_match_wins(rules in proptest::collection::vec(arbitrary_rule(), 1..8)) {
            let engine = PolicyEngine::new(&rules);
            let call = call_matching(&rules[0]);
            prop_assert_eq!(engine.evaluate(&call), rules[0].effect);
        }

        /// A rule with every field empty matches any call tuple, no matter
        /// what the other rules in the list look like.
        #[test]
        fn prop_all_empty_fields_matches_anything(
            effect in prop_oneof![Just(Effect::Allow), Just(Effect::Deny)],
            caller in "[a-zA-Z0-9._-]{0,12}",
            target in "[a-zA-Z0-9._-]{0,12}",
            bus_name in "[a-zA-Z0-9._-]{0,12}",
            object_path in "[a-zA-Z0-9/._-]{0,12}",
            interface in "[a-zA-Z0-9._-]{0,12}",
            method in "[a-zA-Z0-9._-]{0,12}",
        ) {
            let rule = ProxyCallRule { caller: String::new(), target: String::new(), bus_name: String::new(), object_path: String::new(), interface: String::new(), method: String::new(), effect };
            let engine = PolicyEngine::new(&[rule]);
            let call = ProxyCallTuple {
                caller: &caller,
                target: &target,
                bus_name: &bus_name,
                object_path: &object_path,
                interface: &interface,
                method: &method,
            };
            prop_assert_eq!(engine.evaluate(&call), effect);
        }

        /// An engine built with no rules denies every call tuple.
        #[test]
        fn prop_no_rules_always_denies(
            caller in "[a-zA-Z0-9._-]{0,12}",
            target in "[a-zA-Z0-9._-]{0,12}",
        ) {
            let engine = PolicyEngine::new(&[]);
            let call = ProxyCallTuple {
                caller: &caller,
                target: &target,
                bus_name: "x",
                object_path: "/x",
                interface: "x",
                method: "x",
            };
            prop_assert_eq!(engine.evaluate(&call), Effect::Deny);
        }
    }
}
