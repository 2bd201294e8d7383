//! Word-preserving text chunking for plain PDF extraction.

/// Split text into chunks of at most `chunk_size` characters.
///
/// Words are packed greedily and joined by a single space. A word longer
/// than `chunk_size` is split at character boundaries. Concatenating the
/// chunks (with spaces between words) yields the input's words in order.
/// A `chunk_size` of zero is treated as one.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let limit = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "The quick brown fox jumps over the lazy dog while \
                          an extraordinarily long word appears: \
                          pneumonoultramicroscopicsilicovolcanoconiosis.";

    fn words_of(chunks: &[String]) -> String {
        chunks.join(" ")
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text(" \n\t ", 10).is_empty());
    }

    #[test]
    fn test_packs_words_greedily() {
        let chunks = chunk_text("aa bb cc dd", 5);
        assert_eq!(chunks, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn test_no_chunk_exceeds_limit() {
        for size in [1, 3, 7, 16, 50, 1000] {
            for chunk in chunk_text(SAMPLE, size) {
                assert!(chunk.chars().count() <= size, "size {size}: {chunk:?}");
                assert!(!chunk.is_empty());
            }
        }
    }

    #[test]
    fn test_words_survive_in_order() {
        let chunks = chunk_text(SAMPLE, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(words_of(&chunks), SAMPLE.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_long_word_is_split() {
        let chunks = chunk_text("abcdefghij xy", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij", "xy"]);
        assert_eq!(chunks.concat(), "abcdefghijxy");
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let chunks = chunk_text("éééé ü", 4);
        assert_eq!(chunks, vec!["éééé", "ü"]);
    }

    #[test]
    fn test_zero_size_is_one() {
        assert_eq!(chunk_text("ab", 0), vec!["a", "b"]);
    }
}
