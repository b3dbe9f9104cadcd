//! Lexical scanner.
//!
//! Character-at-a-time, one character of pushback, one token of reject
//! slot — the same shape as the original `scan.c`. `Scanner` owns the
//! source text and the running line counter so diagnostics elsewhere in
//! the pipeline can report a line without threading it through every
//! call.

use crate::config::TEXTLEN;
use crate::error::{CResult, CompileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    IntLit,
    Semi,
    Ident,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Assign,
    Comma,
    Amper,
    LogAnd,
    Pipe,
    LogOr,
    Caret,
    Tilde,
    LShift,
    RShift,
    Bang,
    StrLit,
    Dot,
    Arrow,
    Void,
    Char,
    Int,
    Long,
    If,
    Else,
    While,
    For,
    Return,
    Struct,
    Union,
    Enum,
    Typedef,
    Extern,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Sizeof,
    Static,
    Colon,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Question,
    PlusPlus,
    MinusMinus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub int_value: i64,
    pub text: String,
}

impl Token {
    fn simple(kind: TokenKind) -> Self {
        Token {
            kind,
            int_value: 0,
            text: String::new(),
        }
    }
}

/// Case-sensitive, longest-string-first, matching `keyword()`'s switch on
/// the first character in the original.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("void", TokenKind::Void),
    ("char", TokenKind::Char),
    ("int", TokenKind::Int),
    ("long", TokenKind::Long),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("return", TokenKind::Return),
    ("struct", TokenKind::Struct),
    ("union", TokenKind::Union),
    ("enum", TokenKind::Enum),
    ("typedef", TokenKind::Typedef),
    ("extern", TokenKind::Extern),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::Default),
    ("sizeof", TokenKind::Sizeof),
    ("static", TokenKind::Static),
];

fn keyword(s: &str) -> Option<TokenKind> {
    KEYWORDS.iter().find(|(name, _)| *name == s).map(|(_, k)| *k)
}

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    pub line: usize,
    putback: Option<char>,
    reject: Option<Token>,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            putback: None,
            reject: None,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        if let Some(c) = self.putback.take() {
            return Some(c);
        }
        let c = self.chars.get(self.pos).copied();
        self.pos += 1;
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn putback_char(&mut self, c: char) {
        self.putback = Some(c);
    }

    /// `reject_token`: hand one already-scanned token back, to be
    /// returned again by the next `scan` call. Used by the parser for
    /// one token of lookahead.
    pub fn reject_token(&mut self, t: Token) {
        self.reject = Some(t);
    }

    fn skip(&mut self) -> Option<char> {
        loop {
            let c = self.next_char()?;
            if !c.is_whitespace() {
                return Some(c);
            }
        }
    }

    fn scanint(&mut self, first: char) -> i64 {
        let mut val: i64 = first.to_digit(10).unwrap() as i64;
        while let Some(c) = self.next_char() {
            if let Some(d) = c.to_digit(10) {
                val = val * 10 + d as i64;
            } else {
                self.putback_char(c);
                break;
            }
        }
        val
    }

    fn scanch(&mut self) -> CResult<char> {
        let c = self
            .next_char()
            .ok_or_else(|| CompileError::at(self.line, "Unterminated character escape"))?;
        if c != '\\' {
            return Ok(c);
        }
        let e = self
            .next_char()
            .ok_or_else(|| CompileError::at(self.line, "Unterminated character escape"))?;
        Ok(match e {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            other => return Err(CompileError::at(self.line, format!("Unknown escape sequence \\{other}"))),
        })
    }

    fn scanstr(&mut self) -> CResult<String> {
        let mut s = String::new();
        loop {
            let c = self.scanch()?;
            if c == '"' {
                return Ok(s);
            }
            if s.len() >= TEXTLEN - 1 {
                return Err(CompileError::at(self.line, "String literal too long"));
            }
            s.push(c);
        }
    }

    fn scanident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(c) = self.next_char() {
            if c.is_alphanumeric() || c == '_' {
                if s.len() < TEXTLEN - 1 {
                    s.push(c);
                }
            } else {
                self.putback_char(c);
                break;
            }
        }
        s
    }

    pub fn scan(&mut self) -> CResult<Token> {
        if let Some(t) = self.reject.take() {
            return Ok(t);
        }

        let Some(mut c) = self.skip() else {
            return Ok(Token::simple(TokenKind::Eof));
        };

        // Comments: `//` to end of line, `/* ... */` nested-free block.
        loop {
            if c == '/' {
                match self.next_char() {
                    Some('/') => {
                        while let Some(n) = self.next_char() {
                            if n == '\n' {
                                break;
                            }
                        }
                        let Some(next) = self.skip() else {
                            return Ok(Token::simple(TokenKind::Eof));
                        };
                        c = next;
                        continue;
                    }
                    Some('*') => {
                        loop {
                            let n = self
                                .next_char()
                                .ok_or_else(|| CompileError::at(self.line, "Unterminated comment"))?;
                            if n == '*' {
                                if self.next_char() == Some('/') {
                                    break;
                                }
                            }
                        }
                        let Some(next) = self.skip() else {
                            return Ok(Token::simple(TokenKind::Eof));
                        };
                        c = next;
                        continue;
                    }
                    Some('=') => return Ok(Token::simple(TokenKind::SlashAssign)),
                    Some(other) => {
                        self.putback_char(other);
                        return Ok(Token::simple(TokenKind::Slash));
                    }
                    None => return Ok(Token::simple(TokenKind::Slash)),
                }
            }
            break;
        }

        macro_rules! two_char {
            ($second:expr, $two:expr, $one:expr) => {{
                match self.next_char() {
                    Some(n) if n == $second => Token::simple($two),
                    Some(n) => {
                        self.putback_char(n);
                        Token::simple($one)
                    }
                    None => Token::simple($one),
                }
            }};
        }

        let tok = match c {
            '+' => match self.next_char() {
                Some('+') => Token::simple(TokenKind::PlusPlus),
                Some('=') => Token::simple(TokenKind::PlusAssign),
                Some(n) => {
                    self.putback_char(n);
                    Token::simple(TokenKind::Plus)
                }
                None => Token::simple(TokenKind::Plus),
            },
            '-' => match self.next_char() {
                Some('>') => Token::simple(TokenKind::Arrow),
                Some('-') => Token::simple(TokenKind::MinusMinus),
                Some('=') => Token::simple(TokenKind::MinusAssign),
                Some(n) => {
                    self.putback_char(n);
                    Token::simple(TokenKind::Minus)
                }
                None => Token::simple(TokenKind::Minus),
            },
            '*' => two_char!('=', TokenKind::StarAssign, TokenKind::Star),
            '=' => two_char!('=', TokenKind::Eq, TokenKind::Assign),
            '!' => two_char!('=', TokenKind::Ne, TokenKind::Bang),
            '<' => match self.next_char() {
                Some('=') => Token::simple(TokenKind::Le),
                Some('<') => Token::simple(TokenKind::LShift),
                Some(n) => {
                    self.putback_char(n);
                    Token::simple(TokenKind::Lt)
                }
                None => Token::simple(TokenKind::Lt),
            },
            '>' => match self.next_char() {
                Some('=') => Token::simple(TokenKind::Ge),
                Some('>') => Token::simple(TokenKind::RShift),
                Some(n) => {
                    self.putback_char(n);
                    Token::simple(TokenKind::Gt)
                }
                None => Token::simple(TokenKind::Gt),
            },
            ';' => Token::simple(TokenKind::Semi),
            ':' => Token::simple(TokenKind::Colon),
            '?' => Token::simple(TokenKind::Question),
            '{' => Token::simple(TokenKind::LBrace),
            '}' => Token::simple(TokenKind::RBrace),
            '(' => Token::simple(TokenKind::LParen),
            ')' => Token::simple(TokenKind::RParen),
            '[' => Token::simple(TokenKind::LBracket),
            ']' => Token::simple(TokenKind::RBracket),
            ',' => Token::simple(TokenKind::Comma),
            '.' => Token::simple(TokenKind::Dot),
            '&' => two_char!('&', TokenKind::LogAnd, TokenKind::Amper),
            '|' => two_char!('|', TokenKind::LogOr, TokenKind::Pipe),
            '^' => Token::simple(TokenKind::Caret),
            '~' => Token::simple(TokenKind::Tilde),
            '\'' => {
                let ch = self.scanch()?;
                let close = self
                    .next_char()
                    .ok_or_else(|| CompileError::at(self.line, "Unterminated character literal"))?;
                if close != '\'' {
                    return Err(CompileError::at(self.line, "Expected ' after character literal"));
                }
                Token {
                    kind: TokenKind::IntLit,
                    int_value: ch as i64,
                    text: String::new(),
                }
            }
            '"' => Token {
                kind: TokenKind::StrLit,
                int_value: 0,
                text: self.scanstr()?,
            },
            c if c.is_ascii_digit() => Token {
                kind: TokenKind::IntLit,
                int_value: self.scanint(c),
                text: String::new(),
            },
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.scanident(c);
                match keyword(&ident) {
                    Some(kind) => Token::simple(kind),
                    None => Token {
                        kind: TokenKind::Ident,
                        int_value: 0,
                        text: ident,
                    },
                }
            }
            other => return Err(CompileError::at(self.line, format!("Unrecognised character {other:?}"))),
        };

        Ok(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(src: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let t = s.scan().unwrap();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn scans_keywords_not_as_identifiers() {
        let toks = scan_all("int x; return x;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Return,
                TokenKind::Ident,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn scans_full_keyword_set() {
        let src = "void char int long if else while for return struct union enum typedef extern break continue switch case default sizeof static";
        let toks = scan_all(src);
        assert_eq!(
            toks,
            vec![
                TokenKind::Void,
                TokenKind::Char,
                TokenKind::Int,
                TokenKind::Long,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::For,
                TokenKind::Return,
                TokenKind::Struct,
                TokenKind::Union,
                TokenKind::Enum,
                TokenKind::Typedef,
                TokenKind::Extern,
                TokenKind::Break,
                TokenKind::Continue,
                TokenKind::Switch,
                TokenKind::Case,
                TokenKind::Default,
                TokenKind::Sizeof,
                TokenKind::Static,
            ]
        );
    }

    #[test]
    fn two_character_operators_win_over_one_character() {
        let toks = scan_all("a == b != c <= d >= e << f >> g && h || i");
        assert!(toks.contains(&TokenKind::Eq));
        assert!(toks.contains(&TokenKind::Ne));
        assert!(toks.contains(&TokenKind::Le));
        assert!(toks.contains(&TokenKind::Ge));
        assert!(toks.contains(&TokenKind::LShift));
        assert!(toks.contains(&TokenKind::RShift));
        assert!(toks.contains(&TokenKind::LogAnd));
        assert!(toks.contains(&TokenKind::LogOr));
    }

    #[test]
    fn string_literal_handles_escapes() {
        let mut s = Scanner::new("\"a\\nb\"");
        let t = s.scan().unwrap();
        assert_eq!(t.kind, TokenKind::StrLit);
        assert_eq!(t.text, "a\nb");
    }

    #[test]
    fn line_comment_is_skipped() {
        let toks = scan_all("int x; // trailing comment\nint y;");
        assert_eq!(toks.len(), 6);
    }

    #[test]
    fn block_comment_is_skipped() {
        let toks = scan_all("int /* a block\n comment */ x;");
        assert_eq!(toks, vec![TokenKind::Int, TokenKind::Ident, TokenKind::Semi]);
    }

    #[test]
    fn reject_token_is_returned_once() {
        let mut s = Scanner::new("int x;");
        let first = s.scan().unwrap();
        s.reject_token(first.clone());
        let replayed = s.scan().unwrap();
        assert_eq!(replayed, first);
        let next = s.scan().unwrap();
        assert_eq!(next.kind, TokenKind::Ident);
    }
}
