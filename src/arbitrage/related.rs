//! Question relatedness and grouping

use std::collections::{BTreeMap, HashSet};

use crate::types::MarketSnapshot;

const STOP_WORDS: &[&str] = &[
    "will", "be", "the", "a", "an", "in", "on", "at", "by", "for", "to", "of", "is", "are",
];

/// Shared significant keywords needed for two questions to count as related
pub const MIN_SHARED_KEYWORDS: usize = 3;

/// Lowercased word tokens (letters, digits, underscore)
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct significant keywords of a question
pub fn keywords(question: &str) -> HashSet<String> {
    tokens(question)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

pub fn are_related(q1: &str, q2: &str) -> bool {
    keywords(q1).intersection(&keywords(q2)).count() >= MIN_SHARED_KEYWORDS
}

/// True if the question carries a negation marker ("not", "never", "...n't")
pub fn is_negated(question: &str) -> bool {
    question
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .any(|w| w == "not" || w == "never" || w.ends_with("n't"))
}

/// Exactly one of the two questions is negated
pub fn is_inverse_pair(q1: &str, q2: &str) -> bool {
    is_negated(q1) != is_negated(q2)
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Transitively merge related markets into groups of two or more.
///
/// Groups hold indices into `markets`, ascending, ordered by their first
/// member. Markets related to nothing are left out.
pub fn group_related(markets: &[MarketSnapshot]) -> Vec<Vec<usize>> {
    let n = markets.len();
    let keyword_sets: Vec<HashSet<String>> = markets.iter().map(|m| keywords(&m.question)).collect();

    let mut set = DisjointSet::new(n);
    let mut linked = vec![false; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if keyword_sets[i].intersection(&keyword_sets[j]).count() >= MIN_SHARED_KEYWORDS {
                set.union(i, j);
                linked[i] = true;
                linked[j] = true;
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in (0..n).filter(|&i| linked[i]) {
        let root = set.find(i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_ignored() {
        let k = keywords("Will the Fed cut rates in March?");
        assert!(k.contains("fed"));
        assert!(k.contains("march"));
        assert!(!k.contains("will"));
        assert!(!k.contains("the"));
    }

    #[test]
    fn test_relatedness_needs_three_keywords() {
        assert!(are_related(
            "Will the Fed cut rates in March?",
            "Will the Fed not cut rates in March?"
        ));
        assert!(!are_related("Will the Fed cut rates?", "Will the ECB cut rates?"));
    }

    #[test]
    fn test_negation_markers() {
        assert!(is_negated("Will Bitcoin not reach 100k?"));
        assert!(is_negated("Bitcoin won't reach 100k"));
        assert!(is_negated("Will it never happen"));
        assert!(!is_negated("Will nothing happen?"));
        assert!(is_inverse_pair("Will X win?", "Will X not win?"));
        assert!(!is_inverse_pair("Will X not win?", "X won't win"));
    }

    #[test]
    fn test_transitive_grouping() {
        let markets = vec![
            MarketSnapshot::new("a", "Bitcoin price above 100k December", 0.5),
            MarketSnapshot::new("b", "Unrelated soccer final winner", 0.5),
            MarketSnapshot::new("c", "Bitcoin price above 100k January", 0.5),
            MarketSnapshot::new("d", "Bitcoin January close above", 0.5),
        ];
        // a~c and c~d; a and d share only two keywords but still merge
        let groups = group_related(&markets);
        assert_eq!(groups, vec![vec![0, 2, 3]]);
    }
}
