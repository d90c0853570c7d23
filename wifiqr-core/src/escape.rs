//! LaTeX escaping for user-supplied text.

/// Characters with special meaning in LaTeX source.
pub const RESERVED: &[char] = &['&', '%', '$', '#', '_', '{', '}', '~', '^', '\\'];

pub fn is_reserved(c: char) -> bool {
    RESERVED.contains(&c)
}

/// Prefix every reserved character with a single backslash.
///
/// Each input character is handled once, in order. Inserted backslashes are
/// not rescanned, so a literal `\` becomes `\\`.
pub fn escape_latex(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    for c in input.chars() {
        if is_reserved(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
