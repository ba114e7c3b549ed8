use litval_rust::config::DEFAULT_MAX_DEPTH;
use litval_rust::json::{self, JsonStyle};
use litval_rust::{
    FormatError, NegativePolicy, ParseError, ParsedValue, ParserConfig, RangeOrder, RowDecoder,
    SourceRegistry, Token, ValueParser,
};

use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::PathBuf;

/// Parse literal tokens read from stdin, one per line, and print each as JSON.
#[derive(Parser)]
#[command(name = "litval", version)]
struct Args {
    /// Operation applied to every line
    #[arg(long, value_enum, default_value_t = Mode::Value)]
    mode: Mode,

    /// JSON file mapping source slugs to arrays of records
    #[arg(long)]
    sources: Option<PathBuf>,

    #[arg(long, default_value_t = ',')]
    thousand: char,

    #[arg(long, default_value_t = '.')]
    decimal: char,

    #[arg(long, default_value_t = '$')]
    currency: char,

    /// Require both parentheses for a negative amount
    #[arg(long)]
    strict_negatives: bool,

    /// Expand descending ranges (`5-2`) instead of ignoring them
    #[arg(long)]
    normalize_ranges: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[arg(long)]
    pretty: bool,

    /// Tag dates and times as `{"$date": ..}` objects
    #[arg(long)]
    wire: bool,

    /// Log dispatch decisions to stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Value,
    Number,
    Range,
    Enclosed,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let sources = match &args.sources {
        Some(path) => match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| SourceRegistry::from_json(&s).map_err(|e| e.to_string()))
        {
            Ok(registry) => registry,
            Err(e) => {
                eprintln!("cannot load sources from {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => SourceRegistry::new(),
    };

    let config = ParserConfig {
        thousand_symbol: args.thousand,
        decimal_symbol: args.decimal,
        currency_symbol: args.currency,
        negative_policy: if args.strict_negatives {
            NegativePolicy::Strict
        } else {
            NegativePolicy::Lenient
        },
        range_order: if args.normalize_ranges {
            RangeOrder::Normalized
        } else {
            RangeOrder::Literal
        },
        max_depth: args.max_depth,
        ..ParserConfig::default()
    };
    let parser = ValueParser::new(&sources).with_config(config);
    tracing::debug!(config = ?parser.config(), sources = ?sources, "parser ready");
    let decoder = RowDecoder::new();

    let mut input = Vec::new();
    if let Err(e) = io::stdin().read_to_end(&mut input) {
        eprintln!("cannot read stdin: {}", e);
        std::process::exit(2);
    }

    let mut failed = false;
    for (line_num, raw) in input.split(|&b| b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let token = match decoder.decode(&[raw]).pop() {
            Some(token) => token,
            None => {
                eprintln!("ERROR AT LINE {}:", line_num + 1);
                eprintln!("line is not valid UTF-8 or {}", decoder.fallback_name());
                eprintln!();
                failed = true;
                continue;
            }
        };
        if token.trim().is_empty() {
            continue;
        }

        match run(&parser, args.mode, &token) {
            Ok(value) => println!("{}", render(&value, &args)),
            Err(err) => {
                report(line_num, &token, &err);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}

fn run(parser: &ValueParser<'_>, mode: Mode, token: &str) -> Result<ParsedValue, ParseError> {
    match mode {
        Mode::Value => parser.parse(token),
        Mode::Number => Ok(parser.convert_to_number(token)?.into()),
        Mode::Range => Ok(ParsedValue::List(
            parser
                .parse_range(token)?
                .into_iter()
                .map(ParsedValue::Int)
                .collect(),
        )),
        Mode::Enclosed => Ok(tree_value(&parser.parse_enclosed(token)?)),
    }
}

/// Token trees print as nested string arrays, separators as `","`.
fn tree_value(tree: &[Token]) -> ParsedValue {
    ParsedValue::List(
        tree.iter()
            .map(|token| match token {
                Token::Literal(s) => ParsedValue::Str(s.clone()),
                Token::Separator => ParsedValue::Str(",".to_string()),
                Token::Group(terms) => tree_value(terms),
            })
            .collect(),
    )
}

fn render(value: &ParsedValue, args: &Args) -> String {
    let style = if args.pretty {
        JsonStyle::Pretty
    } else {
        JsonStyle::Compact
    };
    match (args.wire, style) {
        (true, style) => json::to_wire(value, style),
        (false, JsonStyle::Pretty) => json::to_json_pretty(value),
        (false, JsonStyle::Compact) => json::to_json(value),
    }
}

fn report(line_num: usize, token: &str, err: &ParseError) {
    eprintln!("ERROR AT LINE {}:", line_num + 1);
    eprintln!("{}", token);

    // Underline only when the offset refers to the whole token
    if let ParseError::Format(FormatError {
        offset: Some(offset),
        fragment,
        ..
    }) = err
    {
        if let Some(prefix) = token.get(..*offset).filter(|_| fragment == token) {
            eprintln!("{}^", " ".repeat(prefix.chars().count()));
        }
    }

    eprintln!("{}", err);
    eprintln!();
}
