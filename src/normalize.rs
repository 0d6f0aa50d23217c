//! Title normalization

/// Words kept lowercase unless they open or close the title
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "of", "on", "or", "the",
    "to", "v", "v.", "via", "vs", "vs.",
];

/// Title-case a guessed title.
///
/// Each word gets an uppercase first letter (Unicode-aware). Small words
/// stay lowercase except at either end. Words that already carry
/// capitals after the first letter (`iPhone`, `McQueen`, `WALL-E`) are left
/// alone. Hyphenated parts are cased separately.
///
/// An all-caps input (`THE MATRIX`) is lowercased word by word first, except
/// for dotted initialisms such as `U.S.`.
pub fn title_case(input: &str) -> String {
    let all_caps =
        input.chars().any(char::is_alphabetic) && !input.chars().any(char::is_lowercase);
    let words: Vec<String> = input
        .split_whitespace()
        .map(|word| {
            if all_caps && !is_initialism(word) {
                word.to_lowercase()
            } else {
                word.to_string()
            }
        })
        .collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i != 0 && i != last && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                word.split('-')
                    .map(capitalize_word)
                    .collect::<Vec<_>>()
                    .join("-")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_word(word: &str) -> String {
    if has_inner_capitals(word) {
        return word.to_string();
    }

    let mut out = String::with_capacity(word.len());
    let mut done = false;
    for c in word.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// `U.S.`, `L.A.`: single letters each followed by a dot
fn is_initialism(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    !chars.is_empty()
        && chars.len() % 2 == 0
        && chars
            .chunks(2)
            .all(|pair| pair[0].is_alphabetic() && pair[1] == '.')
}

fn has_inner_capitals(word: &str) -> bool {
    word.chars()
        .skip_while(|c| !c.is_alphabetic())
        .skip(1)
        .any(char::is_uppercase)
}

/// Drop every non-ASCII character
pub fn ascii_only(input: &str) -> String {
    input.chars().filter(char::is_ascii).collect()
}
