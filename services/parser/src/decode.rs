//! Text decoding for raw extracts whose encoding changed between revisions.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Encodings tried, in order, when the source carries no byte-order mark.
/// The last candidate decodes with replacement characters and never fails.
pub fn default_candidates() -> [&'static Encoding; 2] {
    [UTF_8, WINDOWS_1252]
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    /// True when the source started with a byte-order mark (stripped here).
    pub had_bom: bool,
}

pub fn decode_source(bytes: &[u8]) -> DecodedText {
    decode_with_candidates(bytes, &default_candidates())
}

pub fn decode_with_candidates(bytes: &[u8], candidates: &[&'static Encoding]) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return DecodedText {
            text: text.into_owned(),
            encoding,
            had_bom: true,
        };
    }

    if let Some((&last, strict)) = candidates.split_last() {
        for &encoding in strict {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                return DecodedText {
                    text: text.into_owned(),
                    encoding,
                    had_bom: false,
                };
            }
            tracing::debug!(encoding = encoding.name(), "source is not valid in candidate encoding");
        }
        let (text, had_errors) = last.decode_without_bom_handling(bytes);
        if had_errors {
            tracing::warn!(encoding = last.name(), "replacement characters inserted while decoding");
        }
        return DecodedText {
            text: text.into_owned(),
            encoding: last,
            had_bom: false,
        };
    }

    let (text, _) = UTF_8.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding: UTF_8,
        had_bom: false,
    }
}
