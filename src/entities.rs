use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Decodes character entity references before a token is dispatched.
pub trait EntityDecoder {
    fn unescape<'t>(&self, text: &'t str) -> Cow<'t, str>;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntities;

impl EntityDecoder for NoEntities {
    fn unescape<'t>(&self, text: &'t str) -> Cow<'t, str> {
        Cow::Borrowed(text)
    }
}

/// Decodes numeric references (`&#233;`, `&#xE9;`), the XML entities, the
/// HTML 4 Latin-1 set (`&nbsp;` through `&yuml;`) and common typographic
/// names such as `&euro;` and `&mdash;`. Anything else, including the rest of
/// the HTML5 named table, is left verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEntities;

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]+);").unwrap());

impl EntityDecoder for HtmlEntities {
    fn unescape<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if !text.contains('&') {
            return Cow::Borrowed(text);
        }
        ENTITY.replace_all(text, |caps: &Captures| {
            let whole = &caps[0];
            decode_entity(&caps[1])
                .map(String::from)
                .unwrap_or_else(|| whole.to_string())
        })
    }
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    if let Some(at) = LATIN1.iter().position(|&n| n == name) {
        return char::from_u32(0xA0 + at as u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "euro" => Some('\u{20AC}'),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        "lsquo" => Some('\u{2018}'),
        "rsquo" => Some('\u{2019}'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        "bull" => Some('\u{2022}'),
        "hellip" => Some('\u{2026}'),
        "trade" => Some('\u{2122}'),
        _ => None,
    }
}

/// Names of U+00A0..=U+00FF, in code point order.
const LATIN1: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect",
    "uml", "copy", "ordf", "laquo", "not", "shy", "reg", "macr",
    "deg", "plusmn", "sup2", "sup3", "acute", "micro", "para", "middot",
    "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil",
    "Egrave", "Eacute", "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml",
    "ETH", "Ntilde", "Ograve", "Oacute", "Ocirc", "Otilde", "Ouml", "times",
    "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute", "THORN", "szlig",
    "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil",
    "egrave", "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml",
    "eth", "ntilde", "ograve", "oacute", "ocirc", "otilde", "ouml", "divide",
    "oslash", "ugrave", "uacute", "ucirc", "uuml", "yacute", "thorn", "yuml",
];
