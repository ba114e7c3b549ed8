/// How a parenthesised amount such as `(500)` is recognised as negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativePolicy {
    /// A closing `)` anywhere marks the amount negative, opening `(` or not.
    #[default]
    Lenient,
    /// Both `(` and `)` must be present.
    Strict,
}

impl NegativePolicy {
    pub fn is_negative(self, text: &str) -> bool {
        match self {
            NegativePolicy::Lenient => text.contains(')'),
            NegativePolicy::Strict => text.contains('(') && text.contains(')'),
        }
    }
}

/// How a range token whose endpoints are written high-to-low (`5-2`) expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeOrder {
    /// Endpoints are used as written; `5-2` expands to nothing.
    #[default]
    Literal,
    /// Endpoints are swapped when descending; `5-2` expands to `2..=5`.
    Normalized,
}

/// Symbols and limits shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    pub thousand_symbol: char,
    pub decimal_symbol: char,
    pub currency_symbol: char,
    pub negative_policy: NegativePolicy,
    pub range_order: RangeOrder,
    /// Largest number of integers a single range expression may expand to.
    pub max_range_len: usize,
    /// Recursion cap for nested lists, geometry payloads and bracket groups.
    pub max_depth: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_RANGE_LEN: usize = 1_000_000;

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            thousand_symbol: ',',
            decimal_symbol: '.',
            currency_symbol: '$',
            negative_policy: NegativePolicy::default(),
            range_order: RangeOrder::default(),
            max_range_len: DEFAULT_MAX_RANGE_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Continental style: `1.234,50`.
    pub fn european() -> Self {
        ParserConfig {
            thousand_symbol: '.',
            decimal_symbol: ',',
            ..ParserConfig::default()
        }
    }
}
