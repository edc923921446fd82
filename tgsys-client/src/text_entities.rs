//! Text entity extraction for `getTextEntities`.
//!
//! Finds mentions, bot commands, hashtags and bare URLs. Offsets and
//! lengths are in UTF-16 code units, the convention of the client
//! surface.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use crate::api::{TextEntity, TextEntityType};

const MAX_MENTION_LENGTH: usize = 32;
const MAX_COMMAND_LENGTH: usize = 64;
const MAX_HASHTAG_LENGTH: usize = 256;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_url_char(c: char) -> bool {
    !c.is_whitespace()
}

/// Find all entities in `text`.
pub fn find_entities(text: &str) -> Vec<TextEntity> {
    let chars: Vec<char> = text.chars().collect();
    // UTF-16 offset of every char boundary, one extra slot for the end.
    let mut utf16 = Vec::with_capacity(chars.len() + 1);
    let mut offset = 0i32;
    for c in &chars {
        utf16.push(offset);
        offset += c.len_utf16() as i32;
    }
    utf16.push(offset);

    let mut entities = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        let at_word_start = i == 0 || !is_word_char(chars[i - 1]);
        match chars[i] {
            '@' | '#' | '/' if at_word_start => {
                let mut j = i + 1;
                while j < chars.len() && is_word_char(chars[j]) {
                    j += 1;
                }
                let body_len = j - i - 1;
                let max_len = match chars[i] {
                    '@' => MAX_MENTION_LENGTH,
                    '/' => MAX_COMMAND_LENGTH,
                    _ => MAX_HASHTAG_LENGTH,
                };
                if (1..=max_len).contains(&body_len) {
                    let entity_type = match chars[i] {
                        '@' => TextEntityType::Mention,
                        '/' => TextEntityType::BotCommand,
                        _ => TextEntityType::Hashtag,
                    };
                    entities.push(TextEntity {
                        offset: utf16[i],
                        length: utf16[j] - utf16[i],
                        entity_type,
                    });
                }
                i = j;
            }
            _ if at_word_start && starts_url(&chars[i..]) => {
                let mut j = i;
                while j < chars.len() && is_url_char(chars[j]) {
                    j += 1;
                }
                // Trailing punctuation belongs to the sentence, not the
                // URL.
                while j > i && matches!(chars[j - 1], '.' | ',' | ';' | ':' | '!' | '?' | ')') {
                    j -= 1;
                }
                entities.push(TextEntity {
                    offset: utf16[i],
                    length: utf16[j] - utf16[i],
                    entity_type: TextEntityType::Url,
                });
                i = j;
            }
            _ => i += 1,
        }
    }
    entities
}

fn starts_url(chars: &[char]) -> bool {
    starts_with(chars, "http://") || starts_with(chars, "https://") || starts_with(chars, "www.")
}

fn starts_with(chars: &[char], prefix: &str) -> bool {
    for (i, expected) in prefix.chars().enumerate() {
        match chars.get(i) {
            Some(c) if c.eq_ignore_ascii_case(&expected) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(offset: i32, length: i32, entity_type: TextEntityType) -> TextEntity {
        TextEntity {
            offset,
            length,
            entity_type,
        }
    }

    #[test]
    fn test_mention_and_command() {
        assert_eq!(
            find_entities("@x /cmd"),
            vec![
                entity(0, 2, TextEntityType::Mention),
                entity(3, 4, TextEntityType::BotCommand),
            ]
        );
    }

    #[test]
    fn test_hashtag() {
        assert_eq!(
            find_entities("look: #tag!"),
            vec![entity(6, 4, TextEntityType::Hashtag)]
        );
    }

    #[test]
    fn test_no_entity_inside_words() {
        assert_eq!(find_entities("mail@example"), Vec::new());
        assert_eq!(find_entities("a/b"), Vec::new());
    }

    #[test]
    fn test_bare_symbols_are_not_entities() {
        assert_eq!(find_entities("@ # /"), Vec::new());
        assert_eq!(find_entities(""), Vec::new());
    }

    #[test]
    fn test_url() {
        assert_eq!(
            find_entities("see https://example.com/a?b=1."),
            vec![entity(4, 25, TextEntityType::Url)]
        );
        assert_eq!(
            find_entities("WWW.example.org"),
            vec![entity(0, 15, TextEntityType::Url)]
        );
    }

    #[test]
    fn test_utf16_offsets_after_surrogate_pairs() {
        // The emoji occupies two UTF-16 code units.
        assert_eq!(
            find_entities("\u{1F600} @user"),
            vec![entity(3, 5, TextEntityType::Mention)]
        );
    }

    #[test]
    fn test_overlong_mention_is_skipped() {
        let long = format!("@{}", "a".repeat(MAX_MENTION_LENGTH + 1));
        assert_eq!(find_entities(&long), Vec::new());
    }
}
