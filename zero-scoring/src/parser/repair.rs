//! Single-pass repair for almost-JSON emitted by LLMs.
//!
//! Targets the failure modes seen in practice, not general JSON5:
//! - raw newlines, tabs and other control characters inside string literals
//! - invalid escapes such as `\x00`, `\'` or a lone backslash
//! - unescaped double quotes inside an open string literal
//!
//! A quote inside a string closes it only when the next non-whitespace
//! character is a structural one (`,` `:` `}` `]`) or the input ends;
//! any other quote is treated as content and escaped.

/// Repair `text`, returning the rewritten document.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                ' ' | '\n' | '\r' | '\t' => out.push(c),
                c if c.is_control() => {}
                c => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                i += push_escape(&chars, i, &mut out);
                continue;
            }
            '"' => {
                if closes_string(&chars, i + 1) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
        i += 1;
    }

    out
}

/// Write the escape sequence starting at `chars[at]` (a backslash) and
/// return how many input characters it consumed.
fn push_escape(chars: &[char], at: usize, out: &mut String) -> usize {
    match chars.get(at + 1).copied() {
        Some(n @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
            out.push('\\');
            out.push(n);
            2
        }
        Some('u') if hex_digits(chars, at + 2, 4) => {
            out.push_str("\\u");
            out.extend(&chars[at + 2..at + 6]);
            6
        }
        Some('x') if hex_digits(chars, at + 2, 2) => {
            out.push_str("\\u00");
            out.extend(&chars[at + 2..at + 4]);
            4
        }
        Some('\'') => {
            out.push('\'');
            2
        }
        _ => {
            out.push_str("\\\\");
            1
        }
    }
}

fn hex_digits(chars: &[char], from: usize, count: usize) -> bool {
    chars
        .get(from..from + count)
        .is_some_and(|digits| digits.iter().all(char::is_ascii_hexdigit))
}

fn closes_string(chars: &[char], from: usize) -> bool {
    chars[from.min(chars.len())..]
        .iter()
        .find(|c| !c.is_whitespace())
        .map_or(true, |c| matches!(c, ',' | ':' | '}' | ']'))
}
