//! Finite automata over the literal/wildcard pattern language.
//!
//! A wildcard pattern `L0 * L1 * … * Ln` is a token sequence of literal
//! characters and `Any` tokens. The acceptor has one state per token boundary
//! (`0..=tokens.len()`):
//!
//! - a literal token is a single-character transition to the next state,
//! - an `Any` token is a self-loop on every character plus an ε-move to the
//!   next state,
//! - the only accepting state is the one past the last token.
//!
//! Two language operations are provided:
//!
//! - [`PatternAutomaton::intersects`]: reachability of the jointly accepting
//!   state in the product of both acceptors.
//! - [`PatternAutomaton::is_subset_of`]: `A ⊆ B` iff `A ∩ ¬B = ∅`, explored as
//!   the product of A's acceptor with B's acceptor determinized on the fly.
//!
//! The alphabet is all of Unicode, so transitions are explored symbolically:
//! the only characters B can tell apart are the ones its literals mention,
//! and every other character behaves the same.

use crate::WILDCARD;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Lit(char),
    Any,
}

/// Acceptor for a single wildcard pattern.
///
/// Built once per distinct pattern string and shared through the
/// [`PatternComparator`](crate::PatternComparator) cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternAutomaton {
    source: String,
    tokens: Vec<Token>,
    /// Distinct literal characters, sorted.
    alphabet: Vec<char>,
}

/// A DFA state of the determinized acceptor: sorted, ε-closed NFA states.
type StateSet = Vec<usize>;

impl PatternAutomaton {
    /// Build the acceptor for a wildcard pattern.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let tokens: Vec<Token> = pattern
            .chars()
            .map(|c| if c == WILDCARD { Token::Any } else { Token::Lit(c) })
            .collect();

        let mut alphabet: Vec<char> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Lit(c) => Some(*c),
                Token::Any => None,
            })
            .collect();
        alphabet.sort_unstable();
        alphabet.dedup();

        Self {
            source: pattern.to_owned(),
            tokens,
            alphabet,
        }
    }

    /// The pattern this acceptor was built from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of states (token boundaries).
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.tokens.len() + 1
    }

    /// The shortest string in the language: every literal, no wildcard content.
    #[must_use]
    pub fn shortest_member(&self) -> String {
        self.source.chars().filter(|&c| c != WILDCARD).collect()
    }

    /// Run the acceptor on a concrete string.
    #[must_use]
    pub fn accepts(&self, input: &str) -> bool {
        let mut current = self.closure(std::iter::once(0));
        for c in input.chars() {
            current = self.step(&current, Some(c));
            if current.is_empty() {
                return false;
            }
        }
        self.is_accepting(&current)
    }

    /// Whether the two languages share at least one string.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let (m, n) = (self.tokens.len(), other.tokens.len());
        let width = n + 1;
        let mut seen = vec![false; (m + 1) * width];
        let mut queue = VecDeque::from([(0usize, 0usize)]);
        seen[0] = true;

        while let Some((i, j)) = queue.pop_front() {
            if i == m && j == n {
                return true;
            }

            let a = self.tokens.get(i).copied();
            let b = other.tokens.get(j).copied();
            let mut next = |i: usize, j: usize| {
                let idx = i * width + j;
                if !seen[idx] {
                    seen[idx] = true;
                    queue.push_back((i, j));
                }
            };

            // ε-moves past a wildcard
            if a == Some(Token::Any) {
                next(i + 1, j);
            }
            if b == Some(Token::Any) {
                next(i, j + 1);
            }

            // joint character moves
            match (a, b) {
                (Some(Token::Lit(x)), Some(Token::Lit(y))) if x == y => next(i + 1, j + 1),
                (Some(Token::Lit(_)), Some(Token::Any)) => next(i + 1, j),
                (Some(Token::Any), Some(Token::Lit(_))) => next(i, j + 1),
                _ => {}
            }
        }

        false
    }

    /// Whether every string this acceptor accepts is accepted by `other`.
    ///
    /// Searches the product of `self` with the determinized `other` for a
    /// state where `self` accepts and `other` does not.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        let m = self.tokens.len();

        // Symbols `other` can distinguish, plus one stand-in for the rest.
        let symbols: Vec<Option<char>> = other
            .alphabet
            .iter()
            .copied()
            .map(Some)
            .chain(std::iter::once(None))
            .collect();

        let start = (0usize, other.closure(std::iter::once(0)));
        let mut seen: HashSet<(usize, StateSet)> = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.clone());
        queue.push_back(start);

        while let Some((i, set)) = queue.pop_front() {
            // Every state of `self` can still reach acceptance, so once
            // `other` has no live state a counterexample exists.
            if set.is_empty() || (i == m && !other.is_accepting(&set)) {
                return false;
            }

            let mut push = |state: (usize, StateSet)| {
                if !seen.contains(&state) {
                    seen.insert(state.clone());
                    queue.push_back(state);
                }
            };

            match self.tokens.get(i) {
                Some(Token::Lit(c)) => push((i + 1, other.step(&set, Some(*c)))),
                Some(Token::Any) => {
                    push((i + 1, set.clone()));
                    for sym in &symbols {
                        push((i, other.step(&set, *sym)));
                    }
                }
                None => {}
            }
        }

        true
    }

    fn is_accepting(&self, set: &[usize]) -> bool {
        set.last() == Some(&self.tokens.len())
    }

    /// ε-closure: a state before a wildcard also reaches the state after it.
    fn closure(&self, states: impl IntoIterator<Item = usize>) -> StateSet {
        let mut out: StateSet = Vec::new();
        for mut s in states {
            loop {
                out.push(s);
                if self.tokens.get(s) == Some(&Token::Any) {
                    s += 1;
                } else {
                    break;
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Subset-construction step. `None` stands for a character that no
    /// literal in this pattern mentions.
    fn step(&self, set: &[usize], symbol: Option<char>) -> StateSet {
        let moved = set.iter().filter_map(|&s| match (self.tokens.get(s), symbol) {
            (Some(Token::Any), _) => Some(s),
            (Some(Token::Lit(c)), Some(x)) if *c == x => Some(s + 1),
            _ => None,
        });
        self.closure(moved)
    }
}
