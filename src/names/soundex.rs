//! American Soundex, used for "sounds like" taxon name searches

/// Soundex digit for a letter; `Some(None)` for H and W, which are dropped
fn lookup(ch: char) -> Option<Option<u8>> {
    let code = match ch {
        'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => 0,
        'B' | 'F' | 'P' | 'V' => 1,
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => 2,
        'D' | 'T' => 3,
        'L' => 4,
        'M' | 'N' => 5,
        'R' => 6,
        'H' | 'W' => return Some(None),
        _ => return None,
    };
    Some(Some(code))
}

/// Soundex code of `word`: the first character kept as is, followed by three digits.
///
/// Characters outside A-Z are ignored. An empty word has an empty code.
pub fn soundex(word: &str) -> String {
    let first = match word.chars().next() {
        Some(c) => c,
        None => return String::new(),
    };

    let mut codes: Vec<Option<u8>> = word
        .chars()
        .flat_map(char::to_uppercase)
        .filter_map(lookup)
        .collect();

    // Drop H and W and adjacent identical sounds, starting at the second code
    let mut i = 1;
    while i < codes.len() {
        if codes[i].is_none() || codes[i] == codes[i - 1] {
            codes.remove(i);
        } else {
            i += 1;
        }
    }

    let mut coding = String::new();
    coding.push(first);
    for code in codes.iter().skip(1).flatten().filter(|c| **c > 0) {
        coding.push(char::from(b'0' + code));
    }

    let mut coding: String = coding.chars().take(4).collect();
    while coding.chars().count() < 4 {
        coding.push('0');
    }
    coding
}

/// True if both strings have the same, non-empty Soundex code
pub fn sounds_like(first: &str, second: &str) -> bool {
    let a = soundex(first);
    !a.is_empty() && a == soundex(second)
}
