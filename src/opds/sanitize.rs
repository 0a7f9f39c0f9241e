//! Removal of codepoints the XML 1.0 Character production forbids.
//!
//! The upstream source is known to emit stray control bytes mid-document,
//! which would otherwise abort decoding. Invalid UTF-8 is left untouched so
//! the XML decoder reports the failure itself.

use std::borrow::Cow;

use tracing::{error, warn};

/// Strips runes outside the XML 1.0 Character production from `bytes`.
///
/// Returns the input unchanged when nothing needs stripping, or when the
/// buffer is not valid UTF-8.
pub fn strip_disallowed(bytes: &[u8]) -> Cow<'_, [u8]> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        error!("feed body is not valid UTF-8, leaving it to the XML decoder");
        return Cow::Borrowed(bytes);
    };

    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(bytes);
    }

    let mut cleansed = String::with_capacity(text.len());
    let mut removed = 0usize;
    for ch in text.chars() {
        if is_xml_char(ch) {
            cleansed.push(ch);
        } else {
            removed += 1;
        }
    }

    warn!(removed, "removed XML-illegal codepoints from feed body");
    Cow::Owned(cleansed.into_bytes())
}

/// The Char production of XML 1.0 §2.2. Surrogates and codepoints above
/// U+10FFFF cannot occur in a `char`, so only the low ranges need checking.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\u{09}' | '\u{0A}' | '\u{0D}')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ch >= '\u{10000}'
}
