//! Expression Language
//!
//! A small arithmetic/relational language over user variables (`$name`) and
//! predefined media attributes (`width`, `face_count`, ...). Expressions
//! compile to the underscore-joined token form the delivery service parses,
//! e.g. `w > 1000 && fc >= 2` becomes `w_gt_1000_and_fc_gte_2`.
//!
//! Unknown operators and symbols are rejected here, at compile time, so a
//! typo never reaches the network as a silently broken URL.

use crate::error::{MediaError, Result};

/// Operator-name mapping, applied both by the tree compiler and the string
/// normalizer. Order matters for tokenization: multi-character operators
/// must be matched before their single-character prefixes.
const OPERATORS: &[(&str, &str)] = &[
    ("<=", "lte"),
    (">=", "gte"),
    ("!=", "ne"),
    ("&&", "and"),
    ("||", "or"),
    ("=", "eq"),
    ("<", "lt"),
    (">", "gt"),
    ("+", "add"),
    ("-", "sub"),
    ("*", "mul"),
    ("/", "div"),
    ("%", "mod"),
    ("^", "pow"),
];

/// Long-name to short-token mapping for predefined attributes.
const PREDEFINED: &[(&str, &str)] = &[
    ("width", "w"),
    ("initial_width", "iw"),
    ("height", "h"),
    ("initial_height", "ih"),
    ("aspect_ratio", "ar"),
    ("initial_aspect_ratio", "iar"),
    ("page_count", "pc"),
    ("face_count", "fc"),
    ("illustration_score", "ils"),
    ("current_page", "cp"),
    ("duration", "du"),
    ("initial_duration", "idu"),
    ("tags", "tags"),
];

/// Binary operators usable in an [`Expression`] tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

impl Operator {
    /// Wire token for this operator
    pub fn token(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Gte => "gte",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Predefined media attributes usable in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predefined {
    Width,
    InitialWidth,
    Height,
    InitialHeight,
    AspectRatio,
    InitialAspectRatio,
    PageCount,
    FaceCount,
    IllustrationScore,
    CurrentPage,
    Duration,
    InitialDuration,
    Tags,
}

impl Predefined {
    /// Wire token for this attribute
    pub fn token(self) -> &'static str {
        match self {
            Self::Width => "w",
            Self::InitialWidth => "iw",
            Self::Height => "h",
            Self::InitialHeight => "ih",
            Self::AspectRatio => "ar",
            Self::InitialAspectRatio => "iar",
            Self::PageCount => "pc",
            Self::FaceCount => "fc",
            Self::IllustrationScore => "ils",
            Self::CurrentPage => "cp",
            Self::Duration => "du",
            Self::InitialDuration => "idu",
            Self::Tags => "tags",
        }
    }
}

/// A compiled-to-string expression tree.
///
/// Trees are built with the fluent helpers and rendered with
/// [`Expression::compile`]; free-form strings go through
/// [`Expression::normalize`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A numeric or already-tokenized literal
    Value(String),
    /// A user variable, `$name`
    Variable(String),
    /// A predefined media attribute
    Attribute(Predefined),
    /// Binary operation over two sub-expressions
    Binary {
        /// Operator joining the operands
        op: Operator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
}

impl Expression {
    /// Numeric or literal operand
    pub fn value(v: impl ToString) -> Self {
        Self::Value(v.to_string())
    }

    /// User variable operand; the `$` prefix is added when missing
    pub fn variable(name: &str) -> Self {
        let name = name.strip_prefix('$').unwrap_or(name);
        Self::Variable(format!("${name}"))
    }

    /// Predefined attribute operand
    pub fn attribute(p: Predefined) -> Self {
        Self::Attribute(p)
    }

    /// Combine two expressions with a binary operator
    pub fn binary(op: Operator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Render the tree to its wire form
    pub fn compile(&self) -> String {
        match self {
            Self::Value(v) => v.clone(),
            Self::Variable(v) => v.clone(),
            Self::Attribute(p) => p.token().to_string(),
            Self::Binary { op, left, right } => {
                format!("{}_{}_{}", left.compile(), op.token(), right.compile())
            }
        }
    }

    /// Normalize a free-form expression string to its wire form.
    ///
    /// A string that already looks compiled (no spaces, no operator glyphs,
    /// e.g. `"w_gt_1000"`) is passed through unchanged so power users can
    /// supply pre-compiled conditions. Anything else is tokenized against
    /// the fixed operator and attribute tables; unknown symbols are an
    /// error.
    pub fn normalize(raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MediaError::InvalidExpression("empty expression".into()));
        }
        if looks_compiled(raw) {
            return Ok(raw.to_string());
        }
        Ok(tokenize(raw)?.join("_"))
    }
}

macro_rules! expr_binop {
    ($($method:ident => $op:ident),* $(,)?) => {
        impl Expression {
            $(
                #[doc = concat!("Shorthand for `binary(Operator::", stringify!($op), ", self, rhs)`")]
                pub fn $method(self, rhs: Expression) -> Expression {
                    Expression::binary(Operator::$op, self, rhs)
                }
            )*
        }
    };
}

expr_binop! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    rem => Mod,
    pow => Pow,
    eq => Eq,
    ne => Ne,
    lt => Lt,
    gt => Gt,
    lte => Lte,
    gte => Gte,
    and => And,
    or => Or,
}

fn looks_compiled(s: &str) -> bool {
    !s.contains(char::is_whitespace)
        && !s
            .chars()
            .any(|c| matches!(c, '+' | '-' | '*' | '/' | '%' | '^' | '<' | '>' | '=' | '!' | '&' | '|'))
}

fn tokenize(raw: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;
    'outer: while i < raw.len() {
        let rest = &raw[i..];
        let c = bytes[i] as char;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Operators, longest match first
        for (sym, tok) in OPERATORS {
            if rest.starts_with(sym) {
                tokens.push((*tok).to_string());
                i += sym.len();
                continue 'outer;
            }
        }

        if c == '$' {
            let end = scan(rest, 1, |c| c.is_ascii_alphanumeric() || c == '_');
            if end == 1 {
                return Err(MediaError::InvalidExpression(format!(
                    "dangling '$' in `{raw}`"
                )));
            }
            tokens.push(rest[..end].to_string());
            i += end;
        } else if c.is_ascii_digit() || c == '.' {
            let end = scan(rest, 0, |c| c.is_ascii_digit() || c == '.');
            tokens.push(rest[..end].to_string());
            i += end;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = scan(rest, 0, |c| c.is_ascii_alphanumeric() || c == '_');
            let word = &rest[..end];
            tokens.push(resolve_symbol(word, raw)?);
            i += end;
        } else {
            return Err(MediaError::InvalidExpression(format!(
                "unexpected character `{c}` in `{raw}`"
            )));
        }
    }
    Ok(tokens)
}

fn scan(s: &str, from: usize, pred: impl Fn(char) -> bool) -> usize {
    s[from..]
        .find(|c| !pred(c))
        .map(|off| from + off)
        .unwrap_or(s.len())
}

fn resolve_symbol(word: &str, raw: &str) -> Result<String> {
    for (long, short) in PREDEFINED {
        if word == *long || word == *short {
            return Ok((*short).to_string());
        }
    }
    Err(MediaError::InvalidExpression(format!(
        "unknown symbol `{word}` in `{raw}`"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_compiles_with_operator_tokens() {
        let expr = Expression::attribute(Predefined::Width)
            .gt(Expression::value(1000))
            .and(Expression::attribute(Predefined::FaceCount).gte(Expression::value(2)));
        assert_eq!(expr.compile(), "w_gt_1000_and_fc_gte_2");
    }

    #[test]
    fn variables_keep_dollar_prefix() {
        let expr = Expression::variable("z").mul(Expression::value(2));
        assert_eq!(expr.compile(), "$z_mul_2");
    }

    #[test]
    fn normalize_maps_long_names_and_operators() {
        assert_eq!(
            Expression::normalize("initial_height > 300").unwrap(),
            "ih_gt_300"
        );
        assert_eq!(
            Expression::normalize("width * 2 <= 1000").unwrap(),
            "w_mul_2_lte_1000"
        );
    }

    #[test]
    fn normalize_handles_unspaced_input() {
        assert_eq!(Expression::normalize("$z*2").unwrap(), "$z_mul_2");
        assert_eq!(Expression::normalize("w>=500&&h<300").unwrap(), "w_gte_500_and_h_lt_300");
    }

    #[test]
    fn precompiled_strings_pass_through() {
        assert_eq!(Expression::normalize("w_gt_1000").unwrap(), "w_gt_1000");
        assert_eq!(Expression::normalize("fc").unwrap(), "fc");
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let err = Expression::normalize("bogus > 10").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn unexpected_character_is_rejected() {
        assert!(Expression::normalize("w > #").is_err());
    }
}
