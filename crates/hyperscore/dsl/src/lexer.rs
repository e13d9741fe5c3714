//! Lexer: tokenizes scoring bodies
//!
//! Layout is significant. Leading whitespace of each logical line is turned
//! into `Indent`/`Dedent` tokens and line ends into `Newline`, except inside
//! brackets where line breaks are ignored. The first non-blank line sets the
//! base indentation, so a uniformly indented body is accepted as is.

use crate::errors::{DslError, DslResult};

const TAB_WIDTH: usize = 4;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; the decoded value for string literals
    pub text: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }
}

/// Token types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    If,
    Elif,
    Else,
    Return,
    Pass,
    And,
    Or,
    Not,
    In,
    True,
    False,
    NoneLit,

    // Identifiers and literals
    Identifier,
    StringLiteral,
    NumberLiteral,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    // Structural
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Comma,
    Colon,
    Dot,

    // Layout
    Newline,
    Indent,
    Dedent,

    // End of input
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::If => "'if'",
            Self::Elif => "'elif'",
            Self::Else => "'else'",
            Self::Return => "'return'",
            Self::Pass => "'pass'",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Not => "'not'",
            Self::In => "'in'",
            Self::True => "'True'",
            Self::False => "'False'",
            Self::NoneLit => "'None'",
            Self::Identifier => "identifier",
            Self::StringLiteral => "string literal",
            Self::NumberLiteral => "number",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::DoubleSlash => "'//'",
            Self::Percent => "'%'",
            Self::Assign => "'='",
            Self::EqEq => "'=='",
            Self::NotEq => "'!='",
            Self::Lt => "'<'",
            Self::Le => "'<='",
            Self::Gt => "'>'",
            Self::Ge => "'>='",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::OpenBracket => "'['",
            Self::CloseBracket => "']'",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Comma => "','",
            Self::Colon => "':'",
            Self::Dot => "'.'",
            Self::Newline => "end of line",
            Self::Indent => "indented block",
            Self::Dedent => "end of block",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Lexer for scoring bodies
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indents: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            indents: Vec::new(),
            bracket_depth: 0,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> DslResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                if !self.read_indentation(&mut tokens)? {
                    break;
                }
                continue;
            }

            self.skip_inline_whitespace_and_comments();

            let Some(ch) = self.current() else {
                break;
            };

            if ch == '\n' {
                let (line, col) = (self.line, self.col);
                self.advance();
                if self.bracket_depth == 0 {
                    tokens.push(Token::new(TokenKind::Newline, "", line, col));
                    self.at_line_start = true;
                }
                continue;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        if self.bracket_depth > 0 {
            return Err(DslError::UnexpectedEof {
                expected: "closing bracket".into(),
                line: self.line,
            });
        }

        if tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Dedent))
        {
            tokens.push(Token::new(TokenKind::Newline, "", self.line, self.col));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(Token::new(TokenKind::Dedent, "", self.line, self.col));
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));

        Ok(tokens)
    }

    /// Measure the indentation of the next logical line and emit layout
    /// tokens. Blank and comment-only lines are consumed without effect.
    /// Returns `false` at end of input.
    fn read_indentation(&mut self, tokens: &mut Vec<Token>) -> DslResult<bool> {
        let mut width = 0;
        while let Some(ch) = self.current() {
            match ch {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                '\r' | '\x0c' => {}
                _ => break,
            }
            self.advance();
        }

        match self.current() {
            None => return Ok(false),
            Some('\n') | Some('#') => {
                while let Some(ch) = self.current() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
                return Ok(true);
            }
            Some(_) => {}
        }

        self.at_line_start = false;
        let line = self.line;
        let col = self.col;

        let Some(&current) = self.indents.last() else {
            self.indents.push(width);
            return Ok(true);
        };

        if width > current {
            self.indents.push(width);
            tokens.push(Token::new(TokenKind::Indent, "", line, col));
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                tokens.push(Token::new(TokenKind::Dedent, "", line, col));
            }
            if self.indents.last() != Some(&width) {
                return Err(DslError::IndentationError {
                    line,
                    message: "unindent does not match any outer indentation level".into(),
                });
            }
        }

        Ok(true)
    }

    fn next_token(&mut self) -> DslResult<Token> {
        let line = self.line;
        let col = self.col;
        let Some(ch) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, "", line, col));
        };

        let single = |kind: TokenKind| Token::new(kind, ch.to_string(), line, col);

        let token = match ch {
            '(' | '[' | '{' => {
                self.bracket_depth += 1;
                self.advance();
                single(match ch {
                    '(' => TokenKind::OpenParen,
                    '[' => TokenKind::OpenBracket,
                    _ => TokenKind::OpenBrace,
                })
            }
            ')' | ']' | '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.advance();
                single(match ch {
                    ')' => TokenKind::CloseParen,
                    ']' => TokenKind::CloseBracket,
                    _ => TokenKind::CloseBrace,
                })
            }
            ',' => {
                self.advance();
                single(TokenKind::Comma)
            }
            ':' => {
                self.advance();
                single(TokenKind::Colon)
            }
            '.' if !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                single(TokenKind::Dot)
            }
            '+' => {
                self.advance();
                single(TokenKind::Plus)
            }
            '-' => {
                self.advance();
                single(TokenKind::Minus)
            }
            '*' => {
                self.advance();
                single(TokenKind::Star)
            }
            '%' => {
                self.advance();
                single(TokenKind::Percent)
            }
            '/' => {
                self.advance();
                if self.current() == Some('/') {
                    self.advance();
                    Token::new(TokenKind::DoubleSlash, "//", line, col)
                } else {
                    single(TokenKind::Slash)
                }
            }
            '=' | '!' | '<' | '>' => self.read_operator(ch, line, col)?,
            '\'' | '"' => self.read_string_literal(ch)?,
            c if c.is_ascii_digit() || c == '.' => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier_or_keyword(),
            _ => {
                return Err(DslError::ParseError {
                    line,
                    col,
                    message: format!("Unexpected character: '{}'", ch),
                })
            }
        };

        Ok(token)
    }

    fn read_operator(&mut self, first: char, line: usize, col: usize) -> DslResult<Token> {
        self.advance();
        let followed_by_eq = self.current() == Some('=');
        if followed_by_eq {
            self.advance();
        }

        let kind = match (first, followed_by_eq) {
            ('=', false) => TokenKind::Assign,
            ('=', true) => TokenKind::EqEq,
            ('!', true) => TokenKind::NotEq,
            ('<', false) => TokenKind::Lt,
            ('<', true) => TokenKind::Le,
            ('>', false) => TokenKind::Gt,
            ('>', true) => TokenKind::Ge,
            _ => {
                return Err(DslError::ParseError {
                    line,
                    col,
                    message: format!("Unexpected character: '{}'", first),
                })
            }
        };

        let text = if followed_by_eq {
            format!("{}=", first)
        } else {
            first.to_string()
        };
        Ok(Token::new(kind, text, line, col))
    }

    fn read_string_literal(&mut self, quote: char) -> DslResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // skip opening quote

        let mut text = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    return Err(DslError::ParseError {
                        line,
                        col,
                        message: "Unterminated string literal".into(),
                    })
                }
                Some(ch) if ch == quote => break,
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => continue,
                    };
                    text.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        self.advance(); // skip closing quote
        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_number(&mut self) -> DslResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        self.take_digits(&mut text);
        if self.current() == Some('.') {
            text.push('.');
            self.advance();
            self.take_digits(&mut text);
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            let sign = self.peek_at(1);
            let digit_at = if matches!(sign, Some('+') | Some('-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    if let Some(ch) = self.current() {
                        text.push(ch);
                    }
                    self.advance();
                }
                self.take_digits(&mut text);
            }
        }

        if text.parse::<f64>().is_err() {
            return Err(DslError::ParseError {
                line,
                col,
                message: format!("'{}' is not a valid number", text),
            });
        }
        Ok(Token::new(TokenKind::NumberLiteral, text, line, col))
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.current().filter(|c| c.is_ascii_digit() || *c == '_') {
            if ch != '_' {
                text.push(ch);
            }
            self.advance();
        }
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while let Some(ch) = self.current().filter(|c| c.is_alphanumeric() || *c == '_') {
            text.push(ch);
            self.advance();
        }

        let kind = match text.as_str() {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::NoneLit,
            _ => TokenKind::Identifier,
        };

        Token::new(kind, text, line, col)
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            } else if ch.is_whitespace() {
                self.advance();
            } else if ch == '\\' && self.peek_at(1) == Some('\n') {
                // Explicit line continuation
                self.advance();
                self.advance();
            } else if ch == '#' {
                while self.current().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_return() {
        assert_eq!(
            kinds("return 1.0"),
            vec![
                TokenKind::Return,
                TokenKind::NumberLiteral,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let tokens = kinds("if x:\n    return 1\nreturn 0\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::If,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Return,
                TokenKind::NumberLiteral,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Return,
                TokenKind::NumberLiteral,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dedent_at_end_of_input() {
        let tokens = kinds("if x:\n    if y:\n        return 1");
        let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_uniform_base_indentation() {
        assert_eq!(kinds("    x = 1\n    return x"), kinds("x = 1\nreturn x"));
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        assert_eq!(
            kinds("# leading\n\nx = 1   # trailing\n\n   # indented comment\nreturn x"),
            kinds("x = 1\nreturn x")
        );
    }

    #[test]
    fn test_newlines_inside_brackets() {
        let tokens = kinds("x = [\n  1,\n  2,\n]");
        let newlines = tokens.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!tokens.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_bad_dedent() {
        let err = Lexer::new("if x:\n        y = 1\n    return y")
            .tokenize()
            .unwrap_err();
        assert!(matches!(err, DslError::IndentationError { line: 3, .. }));
    }

    #[test]
    fn test_string_literals() {
        let tokens = Lexer::new(r#"'秋' "it\'s" 'a\nb'"#).tokenize().unwrap();
        assert_eq!(tokens[0].text, "秋");
        assert_eq!(tokens[1].text, "it's");
        assert_eq!(tokens[2].text, "a\nb");
    }

    #[test]
    fn test_unterminated_string() {
        let result = Lexer::new("x = 'open").tokenize();
        assert!(matches!(result, Err(DslError::ParseError { line: 1, col: 5, .. })));
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("500 4.5 .5 1e3 10_000").tokenize().unwrap();
        let texts: Vec<&str> = tokens[..5].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["500", "4.5", ".5", "1e3", "10000"]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e < f > g // h"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Identifier,
                TokenKind::Le,
                TokenKind::Identifier,
                TokenKind::Ge,
                TokenKind::Identifier,
                TokenKind::Lt,
                TokenKind::Identifier,
                TokenKind::Gt,
                TokenKind::Identifier,
                TokenKind::DoubleSlash,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unicode_identifier() {
        let tokens = Lexer::new("评分 = 1").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "评分");
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Lexer::new("x = 1\n\ny = 2").tokenize().unwrap();
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!((y.line, y.col), (3, 1));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  \n# only a comment\n"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_unclosed_bracket() {
        let result = Lexer::new("x = [1, 2").tokenize();
        assert!(matches!(result, Err(DslError::UnexpectedEof { .. })));
    }
}
