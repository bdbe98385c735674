//! Sentence helpers used to hold agents to their length limits

/// Split text into sentences on `.`, `!` or `?` followed by whitespace or the end
pub fn sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        // keep runs like "?!" or "..." together
        while let Some(&(_, next)) = chars.peek() {
            if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')') {
                chars.next();
            } else {
                break;
            }
        }
        let end = chars.peek().map(|&(j, _)| j).unwrap_or(text.len());
        let at_boundary = chars.peek().map(|&(_, n)| n.is_whitespace()).unwrap_or(true);
        if at_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

pub fn sentence_count(text: &str) -> usize {
    sentences(text).len()
}

/// Keep at most `max` sentences
pub fn limit_sentences(text: &str, max: usize) -> String {
    sentences(text)
        .into_iter()
        .take(max)
        .collect::<Vec<_>>()
        .join(" ")
}
