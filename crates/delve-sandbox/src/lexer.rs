//! Tokenizer for the snippet language.
//!
//! Newlines are significant statement separators, except inside `(...)` and
//! `[...]` where they are skipped so long calls and list literals may span
//! lines.  Braces are left alone because they delimit both blocks and dict
//! literals; the parser skips newlines inside dict literals itself.

use crate::error::{Fault, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // keywords
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Break,
    Continue,
    Pass,
    True,
    False,
    None,
    // punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semi,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    FloorDivAssign,
    PercentAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Newline,
    Eof,
}

impl Tok {
    /// Short description used in syntax fault messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Str(_) => "string literal".into(),
            Self::Ident(name) => format!("'{name}'"),
            Self::Newline => "end of line".into(),
            Self::Eof => "end of input".into(),
            other => format!("'{}'", punct_text(other)),
        }
    }
}

fn punct_text(tok: &Tok) -> &'static str {
    match tok {
        Tok::If => "if",
        Tok::Elif => "elif",
        Tok::Else => "else",
        Tok::While => "while",
        Tok::For => "for",
        Tok::In => "in",
        Tok::Not => "not",
        Tok::And => "and",
        Tok::Or => "or",
        Tok::Break => "break",
        Tok::Continue => "continue",
        Tok::Pass => "pass",
        Tok::True => "True",
        Tok::False => "False",
        Tok::None => "None",
        Tok::LParen => "(",
        Tok::RParen => ")",
        Tok::LBracket => "[",
        Tok::RBracket => "]",
        Tok::LBrace => "{",
        Tok::RBrace => "}",
        Tok::Comma => ",",
        Tok::Colon => ":",
        Tok::Dot => ".",
        Tok::Semi => ";",
        Tok::Assign => "=",
        Tok::PlusAssign => "+=",
        Tok::MinusAssign => "-=",
        Tok::StarAssign => "*=",
        Tok::SlashAssign => "/=",
        Tok::FloorDivAssign => "//=",
        Tok::PercentAssign => "%=",
        Tok::Eq => "==",
        Tok::Ne => "!=",
        Tok::Lt => "<",
        Tok::Le => "<=",
        Tok::Gt => ">",
        Tok::Ge => ">=",
        Tok::Plus => "+",
        Tok::Minus => "-",
        Tok::Star => "*",
        Tok::DoubleStar => "**",
        Tok::Slash => "/",
        Tok::DoubleSlash => "//",
        Tok::Percent => "%",
        _ => "?",
    }
}

/// A token with the 1-based line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// Tokenize a whole snippet.  The result always ends with [`Tok::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut depth = 0usize;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\n' => {
                if depth == 0 {
                    tokens.push(Token {
                        tok: Tok::Newline,
                        line,
                    });
                }
                line += 1;
                pos += 1;
            }
            ' ' | '\t' | '\r' => pos += 1,
            '\\' if chars.get(pos + 1) == Some(&'\n') => {
                // explicit line continuation
                line += 1;
                pos += 2;
            }
            '#' => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '"' | '\'' => {
                let (s, next, lines) = lex_string(&chars, pos, line)?;
                tokens.push(Token {
                    tok: Tok::Str(s),
                    line,
                });
                line += lines;
                pos = next;
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.get(pos + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let (tok, next) = lex_number(&chars, pos, line)?;
                tokens.push(Token { tok, line });
                pos = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                tokens.push(Token {
                    tok: keyword(&word).unwrap_or(Tok::Ident(word)),
                    line,
                });
            }
            _ => {
                let (tok, width) = lex_punct(&chars, pos).ok_or_else(|| {
                    Fault::syntax(format!("invalid character '{c}' on line {line}"))
                })?;
                match tok {
                    Tok::LParen | Tok::LBracket => depth += 1,
                    Tok::RParen | Tok::RBracket => depth = depth.saturating_sub(1),
                    _ => {}
                }
                tokens.push(Token { tok, line });
                pos += width;
            }
        }
    }

    tokens.push(Token {
        tok: Tok::Eof,
        line,
    });
    Ok(tokens)
}

fn keyword(word: &str) -> Option<Tok> {
    Some(match word {
        "if" => Tok::If,
        "elif" => Tok::Elif,
        "else" => Tok::Else,
        "while" => Tok::While,
        "for" => Tok::For,
        "in" => Tok::In,
        "not" => Tok::Not,
        "and" => Tok::And,
        "or" => Tok::Or,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "pass" => Tok::Pass,
        "True" => Tok::True,
        "False" => Tok::False,
        "None" => Tok::None,
        _ => return None,
    })
}

fn lex_punct(chars: &[char], pos: usize) -> Option<(Tok, usize)> {
    let c = chars[pos];
    let next = chars.get(pos + 1).copied();
    let third = chars.get(pos + 2).copied();
    let two = |tok| Some((tok, 2));
    let one = |tok| Some((tok, 1));
    match (c, next) {
        ('/', Some('/')) if third == Some('=') => Some((Tok::FloorDivAssign, 3)),
        ('/', Some('/')) => two(Tok::DoubleSlash),
        ('*', Some('*')) => two(Tok::DoubleStar),
        ('=', Some('=')) => two(Tok::Eq),
        ('!', Some('=')) => two(Tok::Ne),
        ('<', Some('=')) => two(Tok::Le),
        ('>', Some('=')) => two(Tok::Ge),
        ('+', Some('=')) => two(Tok::PlusAssign),
        ('-', Some('=')) => two(Tok::MinusAssign),
        ('*', Some('=')) => two(Tok::StarAssign),
        ('/', Some('=')) => two(Tok::SlashAssign),
        ('%', Some('=')) => two(Tok::PercentAssign),
        ('(', _) => one(Tok::LParen),
        (')', _) => one(Tok::RParen),
        ('[', _) => one(Tok::LBracket),
        (']', _) => one(Tok::RBracket),
        ('{', _) => one(Tok::LBrace),
        ('}', _) => one(Tok::RBrace),
        (',', _) => one(Tok::Comma),
        (':', _) => one(Tok::Colon),
        ('.', _) => one(Tok::Dot),
        (';', _) => one(Tok::Semi),
        ('=', _) => one(Tok::Assign),
        ('<', _) => one(Tok::Lt),
        ('>', _) => one(Tok::Gt),
        ('+', _) => one(Tok::Plus),
        ('-', _) => one(Tok::Minus),
        ('*', _) => one(Tok::Star),
        ('/', _) => one(Tok::Slash),
        ('%', _) => one(Tok::Percent),
        _ => None,
    }
}

fn lex_number(chars: &[char], start: usize, line: usize) -> Result<(Tok, usize)> {
    let mut pos = start;
    let mut is_float = false;
    while pos < chars.len() {
        let c = chars[pos];
        if c.is_ascii_digit() || c == '_' {
            pos += 1;
        } else if c == '.' && !is_float {
            is_float = true;
            pos += 1;
        } else if (c == 'e' || c == 'E')
            && chars
                .get(pos + 1)
                .is_some_and(|n| n.is_ascii_digit() || *n == '-' || *n == '+')
        {
            is_float = true;
            pos += 2;
        } else {
            break;
        }
    }
    let text: String = chars[start..pos].iter().filter(|c| **c != '_').collect();
    let tok = if is_float {
        Tok::Float(
            text.parse()
                .map_err(|_| Fault::syntax(format!("invalid number '{text}' on line {line}")))?,
        )
    } else {
        Tok::Int(text.parse().map_err(|_| {
            Fault::syntax(format!("integer literal '{text}' too large on line {line}"))
        })?)
    };
    Ok((tok, pos))
}

/// Returns the decoded string, the position after the closing quote, and
/// the number of newlines consumed.
fn lex_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize, usize)> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut out = String::new();
    let mut lines = 0;
    while pos < chars.len() {
        let c = chars[pos];
        if c == quote {
            return Ok((out, pos + 1, lines));
        }
        if c == '\n' {
            lines += 1;
        }
        if c == '\\' {
            let escaped = chars.get(pos + 1).copied();
            match escaped {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            }
            pos += 2;
            continue;
        }
        out.push(c);
        pos += 1;
    }
    Err(Fault::syntax(format!(
        "unterminated string literal on line {line}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn assignment_and_call() {
        assert_eq!(
            toks("x = 1\nprint(x)"),
            vec![
                Tok::Ident("x".into()),
                Tok::Assign,
                Tok::Int(1),
                Tok::Newline,
                Tok::Ident("print".into()),
                Tok::LParen,
                Tok::Ident("x".into()),
                Tok::RParen,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            toks("a //= 2 ** 3 // 4"),
            vec![
                Tok::Ident("a".into()),
                Tok::FloorDivAssign,
                Tok::Int(2),
                Tok::DoubleStar,
                Tok::Int(3),
                Tok::DoubleSlash,
                Tok::Int(4),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_skipped() {
        assert_eq!(
            toks("[1,\n2]"),
            vec![
                Tok::LBracket,
                Tok::Int(1),
                Tok::Comma,
                Tok::Int(2),
                Tok::RBracket,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            toks(r#"1_000 2.5 1e3 'a\'b' "c\n""#),
            vec![
                Tok::Int(1000),
                Tok::Float(2.5),
                Tok::Float(1000.0),
                Tok::Str("a'b".into()),
                Tok::Str("c\n".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(toks("# hello\nTrue"), vec![Tok::Newline, Tok::True, Tok::Eof]);
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.to_string(), "SyntaxError: unterminated string literal on line 1");
    }

    #[test]
    fn invalid_character() {
        let err = tokenize("x = 1 $ 2").unwrap_err();
        assert!(err.to_string().contains("invalid character '$'"));
    }
}
