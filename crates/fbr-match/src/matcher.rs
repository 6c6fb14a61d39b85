/// Scores textual similarity between an ingredient name and an inventory
/// product name or brand.
///
/// Implementations must be pure and deterministic and return a value in
/// `[0.0, 1.0]`. The resolver only depends on this trait, so a stronger
/// strategy can replace the default without touching session logic.
pub trait Matcher {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Exact match 1.0, substring containment 0.8, otherwise token overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenContainmentMatcher;

pub const EXACT_SCORE: f64 = 1.0;
pub const CONTAINMENT_SCORE: f64 = 0.8;

impl Matcher for TokenContainmentMatcher {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);

        // "" is a substring of everything; never let it match.
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        if a == b {
            return EXACT_SCORE;
        }

        if a.contains(&b) || b.contains(&a) {
            return CONTAINMENT_SCORE;
        }

        let a_tokens: Vec<&str> = a.split(' ').collect();
        let b_tokens: Vec<&str> = b.split(' ').collect();

        let matches = a_tokens
            .iter()
            .filter(|at| {
                b_tokens
                    .iter()
                    .any(|bt| at == &bt || bt.contains(*at) || at.contains(*bt))
            })
            .count();

        matches as f64 / a_tokens.len().max(b_tokens.len()) as f64
    }
}

/// Lowercase and collapse every whitespace run to a single space.
fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
