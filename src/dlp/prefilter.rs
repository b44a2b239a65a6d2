use crate::dlp::terms::{tokenize, TermSets};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefilterAction {
    Allow,
    Check,
    Block,
}

#[derive(Debug, Clone)]
pub struct PrefilterOutcome {
    pub action: PrefilterAction,
    pub matches: Vec<String>,
}

/// Cheap lexical pass that short-circuits the embedding call for obviously
/// benign or obviously sensitive traffic. Tokens of length <= 2 are noise.
///
/// Allow: every significant token is whitelisted and nothing sensitive
/// matched. Block: sensitive matches reached the threshold. Anything else is
/// ambiguous and defers to the semantic checker.
pub fn prefilter(text: &str, sets: &TermSets, match_threshold: usize) -> PrefilterOutcome {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return PrefilterOutcome {
            action: PrefilterAction::Allow,
            matches: Vec::new(),
        };
    }

    let mut matches = Vec::new();
    let mut significant = Vec::new();
    for token in &tokens {
        if token.chars().count() <= 2 {
            continue;
        }
        significant.push(token);
        if sets.is_sensitive(token) {
            matches.push(token.clone());
        }
    }

    let all_benign = !significant.is_empty() && significant.iter().all(|t| sets.is_benign(t));
    if all_benign && matches.is_empty() {
        return PrefilterOutcome {
            action: PrefilterAction::Allow,
            matches,
        };
    }

    if matches.len() >= match_threshold {
        return PrefilterOutcome {
            action: PrefilterAction::Block,
            matches,
        };
    }

    PrefilterOutcome {
        action: PrefilterAction::Check,
        matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> TermSets {
        TermSets::build(&[])
    }

    #[test]
    fn test_all_benign_tokens_allow() {
        let outcome = prefilter("hello thanks good morning", &sets(), 1);
        assert_eq!(outcome.action, PrefilterAction::Allow);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_no_significant_tokens_allow() {
        let outcome = prefilter("ok no", &sets(), 1);
        // "ok" and "no" are <= 2 chars, so nothing significant remains
        assert_eq!(outcome.action, PrefilterAction::Allow);
    }

    #[test]
    fn test_empty_message_allow() {
        let outcome = prefilter("", &sets(), 1);
        assert_eq!(outcome.action, PrefilterAction::Allow);
    }

    #[test]
    fn test_sensitive_terms_block_without_semantic_call() {
        let outcome = prefilter("secret recipe formula disclosed", &sets(), 1);
        assert_eq!(outcome.action, PrefilterAction::Block);
        assert!(outcome.matches.contains(&"secret".to_string()));
        assert!(outcome.matches.contains(&"disclosed".to_string()));
    }

    #[test]
    fn test_ambiguous_text_defers_to_check() {
        let outcome = prefilter("the weather is lovely in lisbon", &sets(), 1);
        assert_eq!(outcome.action, PrefilterAction::Check);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_match_threshold_respected() {
        let outcome = prefilter("keep this secret", &sets(), 2);
        // Only one sensitive match, below the threshold of two
        assert_eq!(outcome.action, PrefilterAction::Check);
        assert_eq!(outcome.matches, vec!["secret"]);
    }
}
