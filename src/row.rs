//! Decoding of raw delimited-row fields into text.
//!
//! Legacy exports are frequently Latin-1 rather than UTF-8. A row is decoded
//! as UTF-8 when every field allows it, otherwise the whole row is decoded
//! with the fallback. When neither works the row comes back empty: the row
//! is dropped, not reported. Callers that need to know should check for an
//! empty result on a non-empty input.
//!
//! The default fallback is ISO-8859-1 proper, mapping every byte to the code
//! point of the same value, so it never fails. A WHATWG encoding can be used
//! instead through [`RowDecoder::with_fallback`]; note that encoding_rs
//! resolves the `ISO-8859-1` label to windows-1252, which differs in
//! 0x80..=0x9F.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, Copy)]
enum Fallback {
    Latin1,
    Encoding(&'static Encoding),
}

/// Decodes rows with UTF-8 first and a single-byte fallback second.
#[derive(Debug, Clone, Copy)]
pub struct RowDecoder {
    fallback: Fallback,
}

impl Default for RowDecoder {
    fn default() -> Self {
        RowDecoder {
            fallback: Fallback::Latin1,
        }
    }
}

impl RowDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: &'static Encoding) -> Self {
        RowDecoder {
            fallback: Fallback::Encoding(fallback),
        }
    }

    /// Name of the fallback encoding, for diagnostics.
    pub fn fallback_name(&self) -> &'static str {
        match self.fallback {
            Fallback::Latin1 => "ISO-8859-1",
            Fallback::Encoding(encoding) => encoding.name(),
        }
    }

    /// Decode every field of one row. Never fails; see the module docs.
    pub fn decode<B: AsRef<[u8]>>(&self, fields: &[B]) -> Vec<String> {
        if let Some(row) = decode_all(fields, UTF_8) {
            return row;
        }
        tracing::debug!(
            fields = fields.len(),
            "row is not valid UTF-8, retrying as {}",
            self.fallback_name()
        );
        let row = match self.fallback {
            Fallback::Latin1 => Some(
                fields
                    .iter()
                    .map(|field| encoding_rs::mem::decode_latin1(field.as_ref()).into_owned())
                    .collect(),
            ),
            Fallback::Encoding(encoding) => decode_all(fields, encoding),
        };
        row.unwrap_or_else(|| {
            tracing::warn!(
                fields = fields.len(),
                "dropping row: not decodable as UTF-8 or {}",
                self.fallback_name()
            );
            Vec::new()
        })
    }
}

fn decode_all<B: AsRef<[u8]>>(fields: &[B], encoding: &'static Encoding) -> Option<Vec<String>> {
    fields
        .iter()
        .map(|field| {
            encoding
                .decode_without_bom_handling_and_without_replacement(field.as_ref())
                .map(Cow::into_owned)
        })
        .collect()
}

/// Decode one row with the default UTF-8 / ISO-8859-1 pair.
pub fn decode_row<B: AsRef<[u8]>>(fields: &[B]) -> Vec<String> {
    RowDecoder::default().decode(fields)
}
