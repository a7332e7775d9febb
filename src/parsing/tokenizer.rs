//! Hand-written tokenizer shared by the model parser and the formula parser, in the style of the
//! teacher's `preprocessing::tokenizer` (a `Peekable<Chars>`-driven scanner returning
//! `Result<Vec<Token>, String>` with precise "expected X after Y" messages).
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Ident(String),
    /// A rational literal's raw text (`0.13`, `3/20`, `7`), parsed by the caller via
    /// [`crate::rational::parse_rational`].
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Equals,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
    FatArrow,
    Ge,
    Gt,
    Le,
    Lt,
}

pub fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut chars = text.chars().peekable();
    let mut out = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                } else {
                    return Err("unexpected `/` outside a rational literal".to_string());
                }
            }
            '(' => {
                chars.next();
                out.push(Token::LParen);
            }
            ')' => {
                chars.next();
                out.push(Token::RParen);
            }
            '[' => {
                chars.next();
                out.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                out.push(Token::RBracket);
            }
            '{' => {
                chars.next();
                out.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                out.push(Token::RBrace);
            }
            ',' => {
                chars.next();
                out.push(Token::Comma);
            }
            ';' => {
                chars.next();
                out.push(Token::Semicolon);
            }
            ':' => {
                chars.next();
                out.push(Token::Colon);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    out.push(Token::NotEq);
                } else {
                    out.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        out.push(Token::EqEq);
                    }
                    Some('>') => {
                        chars.next();
                        out.push(Token::FatArrow);
                    }
                    _ => out.push(Token::Equals),
                }
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("expected `&&`".to_string());
                }
                out.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected `||`".to_string());
                }
                out.push(Token::OrOr);
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    out.push(Token::Ge);
                } else {
                    out.push(Token::Gt);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    out.push(Token::Le);
                } else {
                    out.push(Token::Lt);
                }
            }
            c if c.is_ascii_digit() => out.push(Token::Number(scan_number(&mut chars))),
            c if c.is_alphabetic() || c == '_' => out.push(Token::Ident(scan_ident(&mut chars))),
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(out)
}

fn scan_ident(chars: &mut Peekable<Chars>) -> String {
    let mut s = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            s.push(c);
            chars.next();
        } else {
            break;
        }
    }
    s
}

/// Scans a decimal numeral (`0.13`) or a fraction (`3/20`) as raw text, leaving the rational
/// value's actual parsing to the caller.
fn scan_number(chars: &mut Peekable<Chars>) -> String {
    let mut s = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            s.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if chars.peek() == Some(&'.') {
        s.push('.');
        chars.next();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                chars.next();
            } else {
                break;
            }
        }
    } else if chars.peek() == Some(&'/') {
        let mut lookahead = chars.clone();
        lookahead.next();
        if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
            s.push('/');
            chars.next();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_operators_and_numbers() {
        let tokens = tokenize("a && !b => c == 0.13 != 3/20").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".to_string()),
                Token::AndAnd,
                Token::Bang,
                Token::Ident("b".to_string()),
                Token::FatArrow,
                Token::Ident("c".to_string()),
                Token::EqEq,
                Token::Number("0.13".to_string()),
                Token::NotEq,
                Token::Number("3/20".to_string()),
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let tokens = tokenize("a // trailing comment\n&& b").unwrap();
        assert_eq!(tokens, vec![Token::Ident("a".to_string()), Token::AndAnd, Token::Ident("b".to_string())]);
    }
}
