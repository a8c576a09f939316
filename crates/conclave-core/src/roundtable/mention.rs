//! Mention routing.
//!
//! An `@token` addresses the participant whose display name equals the
//! token, case-insensitively. The token runs to the next whitespace with
//! trailing punctuation and quotes trimmed. Names containing spaces are
//! addressed with the spaces removed or replaced by `_` or `-`
//! (`@AdaLovelace`, `@ada_lovelace`, `@Ada-Lovelace`).

use uuid::Uuid;

use conclave_types::roundtable::Participant;

const TRAILING: &[char] = &[
    ',', '.', '!', '?', ';', ':', ')', ']', '}', '"', '\'', '`',
];

/// Extract the raw `@` tokens from `text`, without the `@`.
///
/// An `@` preceded by an alphanumeric character (an email address, say)
/// does not start a mention.
pub fn mention_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for (idx, ch) in text.char_indices() {
        if ch != '@' {
            continue;
        }
        let preceded_by_word = text[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '@');
        if preceded_by_word {
            continue;
        }
        let rest = &text[idx + 1..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = rest[..end].trim_end_matches(TRAILING);
        if !token.is_empty() {
            tokens.push(token);
        }
    }
    tokens
}

fn name_matches(display_name: &str, token: &str) -> bool {
    let name = display_name.trim().to_lowercase();
    let token = token.to_lowercase();
    if name == token {
        return true;
    }
    if !name.contains(char::is_whitespace) {
        return false;
    }
    let parts: Vec<&str> = name.split_whitespace().collect();
    ["", "_", "-"]
        .iter()
        .any(|sep| parts.join(sep) == token)
}

/// Participants mentioned in `text`, in roster order, deduplicated, with
/// `sender` excluded.
pub fn resolve_mentions(text: &str, roster: &[Participant], sender: Option<&Uuid>) -> Vec<Uuid> {
    let tokens = mention_tokens(text);
    if tokens.is_empty() {
        return Vec::new();
    }
    roster
        .iter()
        .filter(|p| Some(&p.agent_id) != sender)
        .filter(|p| tokens.iter().any(|t| name_matches(&p.display_name, t)))
        .map(|p| p.agent_id)
        .collect()
}

/// Recipients of a message: the mentioned participants when there are any,
/// otherwise everyone except the sender.
pub fn resolve_targets(mentions: &[Uuid], roster: &[Participant], sender: Option<&Uuid>) -> Vec<Uuid> {
    if mentions.is_empty() {
        roster
            .iter()
            .map(|p| p.agent_id)
            .filter(|id| Some(id) != sender)
            .collect()
    } else {
        roster
            .iter()
            .map(|p| p.agent_id)
            .filter(|id| mentions.contains(id) && Some(id) != sender)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Participant> {
        vec![
            Participant::new("Ada", "", "m"),
            Participant::new("Grace", "", "m"),
            Participant::new("Linus", "", "m"),
            Participant::new("Alan Turing", "", "m"),
        ]
    }

    #[test]
    fn tokens_trim_trailing_punctuation() {
        assert_eq!(
            mention_tokens("Hi @Grace, and @Linus! What about (@Ada)?"),
            vec!["Grace", "Linus", "Ada"]
        );
    }

    #[test]
    fn email_addresses_are_not_mentions() {
        assert!(mention_tokens("mail ada@example.com").is_empty());
        assert!(mention_tokens("just @ alone").is_empty());
    }

    #[test]
    fn mentions_match_case_insensitively_and_exactly() {
        let roster = roster();
        let ids = resolve_mentions("@grace please check with @LINUS", &roster, None);
        assert_eq!(ids, vec![roster[1].agent_id, roster[2].agent_id]);

        assert!(resolve_mentions("@Gra and @Graceful", &roster, None).is_empty());
    }

    #[test]
    fn mentions_follow_roster_order_and_dedup() {
        let roster = roster();
        let ids = resolve_mentions("@Linus @Ada @linus", &roster, None);
        assert_eq!(ids, vec![roster[0].agent_id, roster[2].agent_id]);
    }

    #[test]
    fn sender_is_never_mentioned() {
        let roster = roster();
        let ada = roster[0].agent_id;
        let ids = resolve_mentions("@Ada thinks @Grace is right", &roster, Some(&ada));
        assert_eq!(ids, vec![roster[1].agent_id]);
    }

    #[test]
    fn spaced_names_match_joined_forms() {
        let roster = roster();
        let alan = roster[3].agent_id;
        for text in ["@AlanTuring", "@alan_turing.", "@Alan-Turing?"] {
            assert_eq!(resolve_mentions(text, &roster, None), vec![alan], "{text}");
        }
        assert!(resolve_mentions("@Alan", &roster, None).is_empty());
    }

    #[test]
    fn targets_default_to_everyone_but_sender() {
        let roster = roster();
        let ada = roster[0].agent_id;
        let all = resolve_targets(&[], &roster, Some(&ada));
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&ada));

        let everyone = resolve_targets(&[], &roster, None);
        assert_eq!(everyone.len(), 4);
    }

    #[test]
    fn targets_are_exactly_the_mentions() {
        let roster = roster();
        let grace = roster[1].agent_id;
        let gone = Uuid::now_v7();
        assert_eq!(resolve_targets(&[grace, gone], &roster, None), vec![grace]);
    }
}
