//! Handles lexical analysis: source text in, an ordered [Token] sequence (terminated by
//! [TokenKind::Eof]) out.
//!
//! # Example
//!
//! ```
//! use loxwalk::error::Diagnostics;
//! use loxwalk::scanner::Scanner;
//! use loxwalk::token::TokenKind;
//!
//! let mut diagnostics = Diagnostics::new();
//! let tokens = Scanner::new("print 1 + 2;").scan_tokens(&mut diagnostics);
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//!
//! use TokenKind::*;
//! assert_eq!(vec![Print, Number, Plus, Number, Semicolon, Eof], kinds);
//! ```

use crate::error::Diagnostics;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Scans Lox source code into a flat token list.
///
/// One-character lookahead, left-to-right, tracking a running 1-based line counter.
/// Invalid characters and unterminated strings are reported through the supplied
/// [Diagnostics] sink and scanning continues; the final token is always
/// [TokenKind::Eof].
#[derive(Debug)]
pub struct Scanner<'a> {
    start: &'a str,
    current: &'a str,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            start: source,
            current: source,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            self.start = self.current;

            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", None, self.line));
                return tokens;
            }

            match self.scan_one(diagnostics) {
                Some(token) => tokens.push(token),
                None => continue,
            }
        }
    }

    /// Scans exactly one token from `self.current` (whitespace already skipped).
    /// Returns `None` for a lexeme that produced no token (a reported lexical error).
    fn scan_one(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let line = self.line;
        match self.advance() {
            c if is_id_start(c) => Some(self.identifier()),
            c if c.is_ascii_digit() => Some(self.number()),
            '(' => Some(self.make_token(TokenKind::LeftParen)),
            ')' => Some(self.make_token(TokenKind::RightParen)),
            '{' => Some(self.make_token(TokenKind::LeftBrace)),
            '}' => Some(self.make_token(TokenKind::RightBrace)),
            ';' => Some(self.make_token(TokenKind::Semicolon)),
            ',' => Some(self.make_token(TokenKind::Comma)),
            '.' => Some(self.make_token(TokenKind::Dot)),
            '-' => Some(self.make_token(TokenKind::Minus)),
            '+' => Some(self.make_token(TokenKind::Plus)),
            '/' => Some(self.make_token(TokenKind::Slash)),
            '*' => Some(self.make_token(TokenKind::Star)),
            '!' => {
                let eq = self.match_and_advance('=');
                Some(self.make_token(if eq { TokenKind::BangEqual } else { TokenKind::Bang }))
            }
            '=' => {
                let eq = self.match_and_advance('=');
                Some(self.make_token(if eq { TokenKind::EqualEqual } else { TokenKind::Equal }))
            }
            '<' => {
                let eq = self.match_and_advance('=');
                Some(self.make_token(if eq { TokenKind::LessEqual } else { TokenKind::Less }))
            }
            '>' => {
                let eq = self.match_and_advance('=');
                Some(self.make_token(if eq {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }))
            }
            '"' => self.string(diagnostics),
            _ => {
                diagnostics.error(line, "Unexpected character.");
                None
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.is_empty()
    }

    fn advance(&mut self) -> char {
        let c = self.current.chars().next().expect("advance at end of file");
        let len = c.len_utf8();
        self.current = &self.current[len..];
        c
    }

    fn peek(&self) -> char {
        self.current.chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.current.chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn match_and_advance(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current = &self.current[expected.len_utf8()..];
        true
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn identifier(&mut self) -> Token {
        while is_id_continue(self.peek()) {
            self.advance();
        }
        self.make_token(self.identifier_kind())
    }

    fn identifier_kind(&self) -> TokenKind {
        match self.lexeme_text() {
            "and" => TokenKind::And,
            "class" => TokenKind::Class,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "fun" => TokenKind::Fun,
            "if" => TokenKind::If,
            "nil" => TokenKind::Nil,
            "or" => TokenKind::Or,
            "print" => TokenKind::Print,
            "return" => TokenKind::Return,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => TokenKind::Identifier,
        }
    }

    /// Scans a string literal; the opening quote has already been consumed. No escapes
    /// are supported.
    fn string(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let start_line = self.line;
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            diagnostics.error(start_line, "Unterminated string.");
            return None;
        }

        self.advance(); // closing quote
        let text = self.lexeme_text();
        let contents = &text[1..text.len() - 1];
        Some(Token::new(
            TokenKind::StrLiteral,
            text,
            Some(Value::string(contents)),
            self.line,
        ))
    }

    /// Scans a number literal; the first digit has already been consumed. Always IEEE-754
    /// double, with at most one interior `.`.
    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = self.lexeme_text();
        let n: f64 = text.parse().expect("scanned number lexeme must parse");
        Token::new(TokenKind::Number, text, Some(Value::Number(n)), self.line)
    }

    fn lexeme_text(&self) -> &'a str {
        let extent = self.start.len() - self.current.len();
        &self.start[..extent]
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme_text(), None, self.line)
    }
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        Scanner::new(source)
            .scan_tokens(&mut diagnostics)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scanning_every_keyword() {
        use TokenKind::*;

        let source_code = "class classic {
            fun fund() {
                if (ifree and anders or orvile) {
                    print printer;
                } else {
                    for (former = 0; former < 10; former = former + 1) {
                    nill = nil;
                    }
                    super.falseFlag = truede;
                    this.thistle = true;
                    superMario = false or true;
                    return returned;
                }
                var varied;
                while (whileLoop) {
                    0;
                }
            }
        }";

        #[rustfmt::skip]
        let mut expected_tokens = vec![
            Class, Identifier, LeftBrace,
                Fun, Identifier, LeftParen, RightParen, LeftBrace,
                    If, LeftParen, Identifier, And, Identifier, Or, Identifier, RightParen, LeftBrace,
                        Print, Identifier, Semicolon,
                    RightBrace, Else, LeftBrace,
                        For, LeftParen, Identifier, Equal, Number, Semicolon, Identifier, Less, Number, Semicolon, Identifier, Equal, Identifier, Plus, Number, RightParen, LeftBrace,
                            Identifier, Equal, Nil, Semicolon,
                        RightBrace,
                        Super, Dot, Identifier, Equal, Identifier, Semicolon,
                        This, Dot, Identifier, Equal,
                        True, Semicolon, Identifier, Equal, False, Or, True, Semicolon,
                        Return, Identifier, Semicolon,
                    RightBrace,
                    Var, Identifier, Semicolon,
                    While, LeftParen, Identifier, RightParen, LeftBrace,
                        Number, Semicolon,
                    RightBrace,
                RightBrace,
            RightBrace,
        ];
        expected_tokens.push(Eof);

        assert_eq!(expected_tokens, scan(source_code));
    }

    #[test]
    fn string_literal_carries_its_contents_without_quotes() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"hi\"").scan_tokens(&mut diagnostics);
        assert_eq!(TokenKind::StrLiteral, tokens[0].kind);
        assert_eq!(Some(Value::string("hi")), tokens[0].literal.clone());
    }

    #[test]
    fn unterminated_string_is_reported_and_scanning_continues() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"oops").scan_tokens(&mut diagnostics);
        assert!(diagnostics.had_error());
        assert_eq!(vec![TokenKind::Eof], tokens.iter().map(|t| t.kind).collect::<Vec<_>>());
    }

    #[test]
    fn unexpected_character_is_reported_and_scanning_continues() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("1 @ 2").scan_tokens(&mut diagnostics);
        assert!(diagnostics.had_error());
        assert_eq!(
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof],
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>()
        );
    }

    #[test]
    fn line_counter_advances_on_newline() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("1\n2").scan_tokens(&mut diagnostics);
        assert_eq!(1, tokens[0].line);
        assert_eq!(2, tokens[1].line);
    }
}
