use std::collections::BTreeSet;

use crate::config::{ParserConfig, RangeOrder};
use crate::error::FormatError;

/// Expand a page-range expression such as `1-3,5,7-9` with the default config.
pub fn parse_range(text: &str) -> Result<Vec<i64>, FormatError> {
    parse_range_with(text, &ParserConfig::default())
}

/// Expand a comma-separated list of `N` / `M-N` tokens into a sorted,
/// deduplicated sequence.
///
/// Every `-`-separated component must be an integer; the first and last
/// components are the inclusive endpoints.
pub fn parse_range_with(text: &str, config: &ParserConfig) -> Result<Vec<i64>, FormatError> {
    let mut result = BTreeSet::new();
    let mut offset = 0;

    for part in text.split(',') {
        let (start, end) = parse_span(part).map_err(|e| e.at(offset))?;
        let (start, end) = match config.range_order {
            RangeOrder::Normalized if start > end => (end, start),
            _ => (start, end),
        };

        if start <= end {
            let span = (end as i128 - start as i128 + 1) as u128;
            if span > config.max_range_len as u128 {
                return Err(FormatError::new(
                    "range-too-large",
                    format!("Range expands past {} values", config.max_range_len),
                    part,
                )
                .at(offset));
            }
            result.extend(start..=end);
            if result.len() > config.max_range_len {
                return Err(FormatError::new(
                    "range-too-large",
                    format!("Range expands past {} values", config.max_range_len),
                    text,
                ));
            }
        }

        offset += part.len() + 1;
    }

    Ok(result.into_iter().collect())
}

fn parse_span(part: &str) -> Result<(i64, i64), FormatError> {
    let mut bounds = Vec::new();
    for component in part.split('-') {
        let n = component.trim().parse::<i64>().map_err(|_| {
            FormatError::new("invalid-range", "Range bound is not an integer", part)
        })?;
        bounds.push(n);
    }
    // split always yields at least one component
    match (bounds.first(), bounds.last()) {
        (Some(&start), Some(&end)) => Ok((start, end)),
        _ => Err(FormatError::new("invalid-range", "Empty range token", part)),
    }
}
