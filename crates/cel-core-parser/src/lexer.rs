//! CEL lexer using logos.

use logos::Logos;

pub use cel_core_common::Span;

/// A token with its source span.
pub type SpannedToken = (Token, Span);

/// Lexer error with span information.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// CEL tokens.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\x0C]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // === Numeric Literals ===
    // Order matters: more specific patterns first

    // Hex unsigned: 0x1Fu, 0X1FU
    #[regex(r"0[xX][0-9a-fA-F]+[uU]", lex_hex_uint)]
    // Decimal unsigned: 123u, 123U
    #[regex(r"[0-9]+[uU]", lex_decimal_uint, priority = 4)]
    UInt(u64),

    // Hex int: 0x1F, 0X1F
    #[regex(r"0[xX][0-9a-fA-F]+", lex_hex_int, priority = 3)]
    // Decimal int: 123 (lowest priority for numbers)
    #[regex(r"[0-9]+", lex_decimal_int, priority = 1)]
    // Magnitudes up to 2^63 lex so `-9223372036854775808` can fold; the
    // parser rejects 2^63 when it is not negated.
    Int(u64),

    // Double with decimal point and optional exponent: 1.5, .5, 1.5e10
    #[regex(r"[0-9]*\.[0-9]+([eE][+-]?[0-9]+)?", lex_double, priority = 5)]
    // Double with exponent only: 1e10, 1E-5
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", lex_double, priority = 2)]
    Double(f64),

    // === String Literals ===
    #[regex(r#"""""#, |lex| lex_string(lex, "\"\"\"", false))]
    #[regex(r"'''", |lex| lex_string(lex, "'''", false))]
    #[regex(r#"[rR]""""#, |lex| lex_string(lex, "\"\"\"", true))]
    #[regex(r"[rR]'''", |lex| lex_string(lex, "'''", true))]
    #[regex(r#"[rR]""#, |lex| lex_string(lex, "\"", true))]
    #[regex(r"[rR]'", |lex| lex_string(lex, "'", true))]
    #[regex(r#"""#, |lex| lex_string(lex, "\"", false))]
    #[regex(r"'", |lex| lex_string(lex, "'", false))]
    String(String),

    // === Bytes Literals ===
    #[regex(r#"[bB]""""#, |lex| lex_bytes(lex, "\"\"\"", false))]
    #[regex(r"[bB]'''", |lex| lex_bytes(lex, "'''", false))]
    #[regex(r#"[bB]""#, |lex| lex_bytes(lex, "\"", false))]
    #[regex(r"[bB]'", |lex| lex_bytes(lex, "'", false))]
    #[regex(r#"([bB][rR]|[rR][bB])""#, |lex| lex_bytes(lex, "\"", true))]
    #[regex(r"([bB][rR]|[rR][bB])'", |lex| lex_bytes(lex, "'", true))]
    Bytes(Vec<u8>),

    // === Keywords ===
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("in")]
    In,

    // === Reserved Words ===
    #[token("as", |_| "as".to_string())]
    #[token("break", |_| "break".to_string())]
    #[token("const", |_| "const".to_string())]
    #[token("continue", |_| "continue".to_string())]
    #[token("else", |_| "else".to_string())]
    #[token("for", |_| "for".to_string())]
    #[token("function", |_| "function".to_string())]
    #[token("if", |_| "if".to_string())]
    #[token("import", |_| "import".to_string())]
    #[token("let", |_| "let".to_string())]
    #[token("loop", |_| "loop".to_string())]
    #[token("package", |_| "package".to_string())]
    #[token("namespace", |_| "namespace".to_string())]
    #[token("return", |_| "return".to_string())]
    #[token("var", |_| "var".to_string())]
    #[token("void", |_| "void".to_string())]
    #[token("while", |_| "while".to_string())]
    Reserved(String),

    // === Identifier ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 0)]
    Ident(String),

    // === Operators (multi-char first) ===
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("&&")]
    And,
    #[token("||")]
    Or,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Not,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(n) => write!(f, "{}", n),
            Token::UInt(n) => write!(f, "{}u", n),
            Token::Double(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Bytes(b) => write!(f, "b\"{}\"", String::from_utf8_lossy(b)),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::In => write!(f, "in"),
            Token::Reserved(s) => write!(f, "{}", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Not => write!(f, "!"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
        }
    }
}

// === Lexer Callbacks for Numbers ===

/// Largest int magnitude the lexer accepts: `|i64::MIN|`.
pub const MAX_INT_MAGNITUDE: u64 = i64::MIN.unsigned_abs();

fn lex_decimal_int(lex: &mut logos::Lexer<Token>) -> Option<u64> {
    lex.slice().parse().ok().filter(|n| *n <= MAX_INT_MAGNITUDE)
}

fn lex_decimal_uint(lex: &mut logos::Lexer<Token>) -> Option<u64> {
    let s = lex.slice();
    s[..s.len() - 1].parse().ok() // Remove trailing u/U
}

fn lex_hex_int(lex: &mut logos::Lexer<Token>) -> Option<u64> {
    let s = lex.slice();
    u64::from_str_radix(&s[2..], 16) // Skip 0x
        .ok()
        .filter(|n| *n <= MAX_INT_MAGNITUDE)
}

fn lex_hex_uint(lex: &mut logos::Lexer<Token>) -> Option<u64> {
    let s = lex.slice();
    u64::from_str_radix(&s[2..s.len() - 1], 16).ok() // Skip 0x, remove u
}

fn lex_double(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

// === Lexer Callbacks for Quoted Literals ===

fn lex_string(lex: &mut logos::Lexer<Token>, delimiter: &str, raw: bool) -> Option<String> {
    let (bytes, consumed) = scan_quoted(lex.remainder(), delimiter, raw, false)?;
    lex.bump(consumed);
    String::from_utf8(bytes).ok()
}

fn lex_bytes(lex: &mut logos::Lexer<Token>, delimiter: &str, raw: bool) -> Option<Vec<u8>> {
    let (bytes, consumed) = scan_quoted(lex.remainder(), delimiter, raw, true)?;
    lex.bump(consumed);
    Some(bytes)
}

/// Scan a quoted literal body up to and including `delimiter`.
///
/// Returns the decoded bytes and the number of source bytes consumed. In
/// bytes mode `\x` and octal escapes produce raw octets and `\u` escapes are
/// rejected; in string mode they produce code points.
fn scan_quoted(input: &str, delimiter: &str, raw: bool, bytes: bool) -> Option<(Vec<u8>, usize)> {
    let multiline = delimiter.len() == 3;
    let mut out = Vec::with_capacity(input.len().min(64));
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if input[pos..].starts_with(delimiter) {
            return Some((out, pos + delimiter.len()));
        }
        if c == '\n' && !multiline {
            return None;
        }
        if c != '\\' || raw {
            push_char(&mut out, c);
            continue;
        }

        let (_, escape) = chars.next()?;
        match escape {
            '\\' => out.push(b'\\'),
            '/' => out.push(b'/'),
            '"' => out.push(b'"'),
            '\'' => out.push(b'\''),
            '`' => out.push(b'`'),
            '?' => out.push(b'?'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0B),
            'x' | 'X' => {
                let value = take_digits(&mut chars, 2, 16)?;
                push_octet(&mut out, value as u8, bytes);
            }
            'u' | 'U' if !bytes => {
                let width = if escape == 'u' { 4 } else { 8 };
                let value = take_digits(&mut chars, width, 16)?;
                push_char(&mut out, char::from_u32(value)?);
            }
            first @ '0'..='3' => {
                let rest = take_digits(&mut chars, 2, 8)?;
                let value = (first as u32 - '0' as u32) * 64 + rest;
                push_octet(&mut out, value as u8, bytes);
            }
            _ => return None,
        }
    }

    None
}

fn take_digits(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    count: usize,
    radix: u32,
) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let (_, c) = chars.next()?;
        value = value.checked_mul(radix)?.checked_add(c.to_digit(radix)?)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn push_octet(out: &mut Vec<u8>, value: u8, bytes: bool) {
    if bytes {
        out.push(value);
    } else {
        push_char(out, char::from(value));
    }
}

// === Public Lexer API ===

/// Tokenize the input string, stopping at the first unrecognized token.
pub fn lex(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                let text = &input[span.clone()];
                let numeric = !text.is_empty()
                    && text.bytes().all(|b| b.is_ascii_hexdigit() || b == b'x' || b == b'X');
                let message = if numeric {
                    format!("invalid int literal: {}", text)
                } else if text.starts_with(['"', '\'']) || text.ends_with(['"', '\'']) {
                    format!("invalid or unterminated quoted literal: {}", text)
                } else {
                    format!("token recognition error at: '{}'", text)
                };
                return Err(LexError { message, span });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(input: &str) -> Vec<Token> {
        lex(input)
            .unwrap()
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn lex_integers() {
        assert_eq!(lex_tokens("123"), vec![Token::Int(123)]);
        assert_eq!(lex_tokens("0"), vec![Token::Int(0)]);
        assert_eq!(lex_tokens("0x1F"), vec![Token::Int(31)]);
        assert_eq!(lex_tokens("0XAB"), vec![Token::Int(171)]);
    }

    #[test]
    fn lex_unsigned_integers() {
        assert_eq!(lex_tokens("123u"), vec![Token::UInt(123)]);
        assert_eq!(lex_tokens("123U"), vec![Token::UInt(123)]);
        assert_eq!(lex_tokens("0x1Fu"), vec![Token::UInt(31)]);
    }

    #[test]
    fn lex_doubles() {
        assert_eq!(lex_tokens("1.5"), vec![Token::Double(1.5)]);
        assert_eq!(lex_tokens(".5"), vec![Token::Double(0.5)]);
        assert_eq!(lex_tokens("1e10"), vec![Token::Double(1e10)]);
        assert_eq!(lex_tokens("1.5e-3"), vec![Token::Double(1.5e-3)]);
    }

    #[test]
    fn int_overflow_is_reported() {
        assert_eq!(
            lex_tokens("9223372036854775808"),
            vec![Token::Int(9_223_372_036_854_775_808)]
        );
        let err = lex("9223372036854775809").unwrap_err();
        assert!(err.message.starts_with("invalid int literal"), "{}", err.message);
    }

    #[test]
    fn lex_strings() {
        assert_eq!(
            lex_tokens(r#""hello""#),
            vec![Token::String("hello".to_string())]
        );
        assert_eq!(
            lex_tokens("'world'"),
            vec![Token::String("world".to_string())]
        );
        assert_eq!(
            lex_tokens(r#""hello\nworld""#),
            vec![Token::String("hello\nworld".to_string())]
        );
    }

    #[test]
    fn lex_raw_strings() {
        assert_eq!(
            lex_tokens(r#"r"hello\n""#),
            vec![Token::String(r"hello\n".to_string())]
        );
        assert_eq!(
            lex_tokens(r"r'hello\n'"),
            vec![Token::String(r"hello\n".to_string())]
        );
    }

    #[test]
    fn lex_triple_strings() {
        assert_eq!(
            lex_tokens(
                r#""""multi
line""""#
            ),
            vec![Token::String("multi\nline".to_string())]
        );
        assert_eq!(
            lex_tokens(r"'''tab\tand 'quoted' text'''"),
            vec![Token::String("tab\tand 'quoted' text".to_string())]
        );
    }

    #[test]
    fn newline_in_single_quoted_string_fails() {
        assert!(lex("'a\nb'").is_err());
    }

    #[test]
    fn lex_bytes() {
        assert_eq!(
            lex_tokens(r#"b"hello""#),
            vec![Token::Bytes(b"hello".to_vec())]
        );
        assert_eq!(
            lex_tokens("b'world'"),
            vec![Token::Bytes(b"world".to_vec())]
        );
    }

    #[test]
    fn bytes_escapes_are_octets() {
        assert_eq!(lex_tokens(r"b'\xff\000'"), vec![Token::Bytes(vec![0xff, 0x00])]);
        assert_eq!(lex_tokens(r"b'\377'"), vec![Token::Bytes(vec![0xff])]);
        // Non-ASCII text in a bytes literal is its UTF-8 encoding.
        assert_eq!(lex_tokens("b'ÿ'"), vec![Token::Bytes(vec![0xc3, 0xbf])]);
        assert_eq!(lex_tokens(r"br'\x00'"), vec![Token::Bytes(br"\x00".to_vec())]);
    }

    #[test]
    fn unicode_escape_not_allowed_in_bytes() {
        assert!(lex(r"b'\u0041'").is_err());
    }

    #[test]
    fn lex_keywords() {
        assert_eq!(lex_tokens("true"), vec![Token::True]);
        assert_eq!(lex_tokens("false"), vec![Token::False]);
        assert_eq!(lex_tokens("null"), vec![Token::Null]);
        assert_eq!(lex_tokens("in"), vec![Token::In]);
    }

    #[test]
    fn lex_identifiers() {
        assert_eq!(
            lex_tokens("foo"),
            vec![Token::Ident("foo".to_string())]
        );
        assert_eq!(
            lex_tokens("_bar"),
            vec![Token::Ident("_bar".to_string())]
        );
        assert_eq!(
            lex_tokens("baz123"),
            vec![Token::Ident("baz123".to_string())]
        );
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            lex_tokens("+ - * / %"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent
            ]
        );
        assert_eq!(
            lex_tokens("== != < <= > >="),
            vec![
                Token::EqEq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge
            ]
        );
        assert_eq!(
            lex_tokens("&& || !"),
            vec![Token::And, Token::Or, Token::Not]
        );
        assert_eq!(lex_tokens("? :"), vec![Token::Question, Token::Colon]);
    }

    #[test]
    fn optional_select_is_dot_then_question() {
        assert_eq!(
            lex_tokens("a.?b"),
            vec![
                Token::Ident("a".to_string()),
                Token::Dot,
                Token::Question,
                Token::Ident("b".to_string())
            ]
        );
    }

    #[test]
    fn lex_with_comments() {
        assert_eq!(
            lex_tokens("a // comment\n+ b"),
            vec![
                Token::Ident("a".to_string()),
                Token::Plus,
                Token::Ident("b".to_string())
            ]
        );
    }

    #[test]
    fn lex_unicode_escapes() {
        assert_eq!(
            lex_tokens(r#""\u03B1""#),
            vec![Token::String("α".to_string())]
        );
        assert_eq!(
            lex_tokens(r#""\U0001F600""#),
            vec![Token::String("😀".to_string())]
        );
    }

    #[test]
    fn lex_octal_escapes() {
        assert_eq!(
            lex_tokens(r#""\101""#),
            vec![Token::String("A".to_string())]
        );
        assert_eq!(
            lex_tokens(r#""\377""#),
            vec![Token::String("\u{FF}".to_string())]
        );
    }

    #[test]
    fn lex_reserved_words() {
        for word in ["if", "else", "for", "while", "return", "let", "var", "namespace"] {
            assert_eq!(lex_tokens(word), vec![Token::Reserved(word.to_string())]);
        }
    }

    #[test]
    fn unknown_character_is_reported() {
        let err = lex("a # b").unwrap_err();
        assert_eq!(err.span, 2..3);
        assert_eq!(err.message, "token recognition error at: '#'");
    }
}
