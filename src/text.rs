//! Text helpers shared by the parser, the archive expander and the stampers.

use deunicode::deunicode_char;
use oem_cp::code_table::DECODING_TABLE_CP852;
use oem_cp::decode_string_complete_table;

/// Collapses every whitespace run to one space and trims the ends.
///
/// The export escapes some line breaks literally (`\t`, `\n`), those count as
/// whitespace too.
pub fn collapse_whitespace(text: &str) -> String {
    text.replace("\\t", " ")
        .replace("\\n", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transliterates to printable ASCII.
///
/// Control characters and whitespace become a space; characters without a
/// transliteration become `_`.
pub fn fold_to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_control() || c.is_whitespace() {
            out.push(' ');
        } else if c.is_ascii() {
            out.push(c);
        } else {
            match deunicode_char(c) {
                Some(folded) if !folded.is_empty() => out.push_str(folded.trim_end()),
                _ => out.push('_'),
            }
        }
    }
    out
}

/// Decodes a raw archive entry name.
///
/// Czech archive tools of the DOS/Windows era wrote names in CP852 without
/// flagging the encoding. A name that is not valid UTF-8 is taken as CP852.
pub fn decode_entry_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => decode_string_complete_table(raw, &DECODING_TABLE_CP852),
    }
}

/// Flattens an archive entry path into one safe file name.
///
/// Whitespace runs inside a component become `-`, components are joined with `_`.
pub fn flatten_entry_name(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join("-"))
        .collect::<Vec<_>>()
        .join("_")
}

/// Shortens `text` to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
