//! Clause rewrites for rules and attributed assertions.
//!
//! Rules are ordinary clauses with a fixed frame:
//!
//! ```text
//! when      <pattern...> <body> in environment <env>
//! subscribe <pattern...> <body> in environment <env>
//! ```
//!
//! and an attributed assertion has `claims` or `wishes` as its second term.
//! The rewrites below move between a bare pattern and these forms.

use tessera_foundation::{Clause, Term};

/// First term of a persistent rule.
pub const WHEN: &str = "when";
/// First term of an event rule.
pub const SUBSCRIBE: &str = "subscribe";
/// Second term of a claim.
pub const CLAIMS: &str = "claims";
/// Second term of a wish.
pub const WISHES: &str = "wishes";

/// Placeholder body used when searching for rules.
pub const BODY_PLACEHOLDER: &str = "/__body/";
/// Placeholder environment used when searching for rules.
pub const ENV_PLACEHOLDER: &str = "/__env/";
/// Variable standing for the claimant in a claimized pattern.
pub const CLAIMANT: &str = "/someone/";

/// Terms after the pattern: body, `in`, `environment`, env.
const TRAILER_LEN: usize = 4;
/// Shortest possible rule: keyword plus trailer.
const MIN_RULE_LEN: usize = 1 + TRAILER_LEN;

/// Which kind of rule a clause is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// Fires for matching statements in the database.
    When,
    /// Fires only for notified events.
    Subscribe,
}

impl RuleKind {
    /// The keyword that starts this kind of rule.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::When => WHEN,
            Self::Subscribe => SUBSCRIBE,
        }
    }
}

/// A borrowed view of a rule clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleView<'a> {
    /// The rule kind.
    pub kind: RuleKind,
    /// Pattern terms, between the keyword and the body.
    pub pattern: &'a [Term],
    /// The body term handed to the evaluator.
    pub body: &'a Term,
    /// The captured environment term.
    pub environment: &'a Term,
}

impl<'a> RuleView<'a> {
    /// Reads `clause` as a rule, if it has the rule frame.
    #[must_use]
    pub fn parse(clause: &'a Clause) -> Option<Self> {
        let terms = clause.terms();
        if terms.len() < MIN_RULE_LEN {
            return None;
        }
        let kind = match terms[0].as_str() {
            WHEN => RuleKind::When,
            SUBSCRIBE => RuleKind::Subscribe,
            _ => return None,
        };
        let n = terms.len();
        if terms[n - 3] != "in" || terms[n - 2] != "environment" {
            return None;
        }
        Some(Self {
            kind,
            pattern: &terms[1..n - TRAILER_LEN],
            body: &terms[n - TRAILER_LEN],
            environment: &terms[n - 1],
        })
    }

    /// The pattern as an owned clause.
    #[must_use]
    pub fn pattern_clause(&self) -> Clause {
        Clause::new(self.pattern.to_vec())
    }
}

/// Builds a rule clause from its parts.
#[must_use]
pub fn rule(kind: RuleKind, pattern: &Clause, body: impl Into<Term>, environment: impl Into<Term>) -> Clause {
    let mut terms = Vec::with_capacity(pattern.len() + MIN_RULE_LEN);
    terms.push(Term::from(kind.keyword()));
    terms.extend(pattern.iter().cloned());
    terms.push(body.into());
    terms.push(Term::from("in"));
    terms.push(Term::from("environment"));
    terms.push(environment.into());
    Clause::new(terms)
}

/// `the time is /t/` becomes `when the time is /t/ /__body/ in environment /__env/`.
#[must_use]
pub fn whenize(pattern: &Clause) -> Clause {
    rule(RuleKind::When, pattern, BODY_PLACEHOLDER, ENV_PLACEHOLDER)
}

/// Extracts the pattern of a `when` rule.
#[must_use]
pub fn unwhenize(clause: &Clause) -> Option<Clause> {
    RuleView::parse(clause)
        .filter(|view| view.kind == RuleKind::When)
        .map(|view| view.pattern_clause())
}

/// `the time is 3` becomes `subscribe the time is 3 /__body/ in environment /__env/`.
#[must_use]
pub fn subscriptionize(pattern: &Clause) -> Clause {
    rule(RuleKind::Subscribe, pattern, BODY_PLACEHOLDER, ENV_PLACEHOLDER)
}

/// Extracts the pattern of a `subscribe` rule.
#[must_use]
pub fn unsubscriptionize(clause: &Clause) -> Option<Clause> {
    RuleView::parse(clause)
        .filter(|view| view.kind == RuleKind::Subscribe)
        .map(|view| view.pattern_clause())
}

/// Returns true if the second term is `claims` or `wishes`.
#[must_use]
pub fn is_attributed(clause: &Clause) -> bool {
    clause.term_is(1, CLAIMS) || clause.term_is(1, WISHES)
}

/// Returns true if the clause has the form `X claims ...`.
#[must_use]
pub fn is_claim(clause: &Clause) -> bool {
    clause.term_is(1, CLAIMS)
}

/// `the time is /t/` becomes `/someone/ claims the time is /t/`.
///
/// Returns `None` for clauses that already claim or wish.
#[must_use]
pub fn claimize(pattern: &Clause) -> Option<Clause> {
    if is_attributed(pattern) {
        return None;
    }
    let mut terms = Vec::with_capacity(pattern.len() + 2);
    terms.push(Term::from(CLAIMANT));
    terms.push(Term::from(CLAIMS));
    terms.extend(pattern.iter().cloned());
    Some(Clause::new(terms))
}

/// `Omar claims the time is 3` becomes `the time is 3`.
///
/// Returns `None` for clauses shorter than two terms.
#[must_use]
pub fn unclaimize(clause: &Clause) -> Option<Clause> {
    (clause.len() >= 2).then(|| clause.slice(2..clause.len()))
}
