//! Soundex-style phonetic keys.
//!
//! Voice transcription gets the sound of a title right far more often than its
//! spelling ("Haus" for "House"), so titles are compared by per-word phonetic
//! codes rather than by letters.

/// Words ignored when building a title key.
const STOPWORDS: &[&str] = &["the", "a", "an", "of", "and"];

fn letter_code(c: char) -> Option<u8> {
    match c {
        'B' | 'F' | 'P' | 'V' => Some(1),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some(2),
        'D' | 'T' => Some(3),
        'L' => Some(4),
        'M' | 'N' => Some(5),
        'R' => Some(6),
        // H and W neither code nor separate
        'H' | 'W' => None,
        _ => Some(0),
    }
}

/// American Soundex code of one word (`"Robert"` → `"R163"`).
///
/// Purely numeric words keep their digits so "Season 2" and "Season 3" stay
/// distinct. Returns `None` for words with neither letters nor digits.
pub fn soundex(word: &str) -> Option<String> {
    let letters: Vec<char> = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let Some((&first, rest)) = letters.split_first() else {
        let digits: String = word.chars().filter(char::is_ascii_digit).collect();
        return (!digits.is_empty()).then_some(digits);
    };

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut last = letter_code(first).unwrap_or(0);

    for &c in rest {
        let Some(digit) = letter_code(c) else {
            continue;
        };
        if digit != 0 && digit != last {
            code.push(char::from(b'0' + digit));
            if code.len() == 4 {
                break;
            }
        }
        last = digit;
    }

    while code.len() < 4 {
        code.push('0');
    }
    Some(code)
}

/// Per-word phonetic codes of a title, skipping stopwords.
pub fn title_key(title: &str) -> Vec<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .filter_map(soundex)
        .collect()
}

/// Share of codes two keys have in common, in `[0, 1]`.
///
/// Counted against the longer key so extra words on either side lower the score.
pub fn key_similarity(query: &[String], title: &[String]) -> f64 {
    let longest = query.len().max(title.len());
    if longest == 0 {
        return 0.0;
    }

    let mut remaining: Vec<&String> = title.iter().collect();
    let mut shared = 0;
    for code in query {
        if let Some(index) = remaining.iter().position(|candidate| *candidate == code) {
            remaining.swap_remove(index);
            shared += 1;
        }
    }

    shared as f64 / longest as f64
}
