/// S-expression lexer and parser for Lilium source
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Symbol(String),
    Integer(i64),
    Single(f32),
    Double(f64),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Symbol(s) => write!(f, "{}", s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Single(fl) => write!(f, "{}f", fl),
            Token::Double(fl) => write!(f, "{:?}", fl),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// A token plus the line and column it started at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Hand-written lexer for Lilium
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                // Comment runs to end of line
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn is_delimiter(ch: char) -> bool {
        ch.is_whitespace() || ch == '(' || ch == ')' || ch == ';'
    }

    /// Read the run of characters up to the next delimiter
    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current() {
            if Self::is_delimiter(ch) {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    fn starts_number(&self) -> bool {
        match self.current() {
            Some(ch) if ch.is_ascii_digit() => true,
            Some('-') => self.peek(1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    /// Classify a numeric word as an integer, a single (`1.5f`) or a double
    fn number_token(word: &str) -> Result<Token, String> {
        let invalid = || format!("Invalid number literal: {}", word);
        if let Some(mantissa) = word.strip_suffix('f') {
            return mantissa.parse::<f32>().map(Token::Single).map_err(|_| invalid());
        }
        if word.contains(['.', 'e', 'E']) {
            return word.parse::<f64>().map(Token::Double).map_err(|_| invalid());
        }
        word.parse::<i64>().map(Token::Integer).map_err(|_| invalid())
    }

    pub fn next_token(&mut self) -> Result<Spanned, String> {
        self.skip_whitespace_and_comments();
        let (line, column) = (self.line, self.column);
        let spanned = |token| Spanned { token, line, column };

        let Some(ch) = self.current() else {
            return Ok(spanned(Token::Eof));
        };

        match ch {
            '(' => {
                self.advance();
                Ok(spanned(Token::LParen))
            }
            ')' => {
                self.advance();
                Ok(spanned(Token::RParen))
            }
            _ if self.starts_number() => {
                let word = self.read_word();
                Self::number_token(&word)
                    .map(spanned)
                    .map_err(|e| format!("{} at line {}, column {}", e, line, column))
            }
            _ => Ok(spanned(Token::Symbol(self.read_word()))),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

/// Parsed S-expression
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    /// Symbolic atom (identifiers, operators, keywords)
    Atom(String),
    Integer(i64),
    /// Single-precision literal written with an `f` suffix
    Single(f32),
    Double(f64),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SExpr::Atom(s) => write!(f, "{}", s),
            SExpr::Integer(i) => write!(f, "{}", i),
            SExpr::Single(fl) => write!(f, "{}f", fl),
            SExpr::Double(fl) => write!(f, "{:?}", fl),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Hand-written parser for Lilium
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn location(&self) -> String {
        match self.tokens.get(self.pos) {
            Some(s) => format!("line {}, column {}", s.line, s.column),
            None => "end of input".to_string(),
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub fn parse_sexpr(&mut self) -> Result<SExpr, String> {
        let expr = match self.current() {
            Token::LParen => {
                let open = self.location();
                self.advance();
                let mut items = Vec::new();
                loop {
                    match self.current() {
                        Token::RParen => break,
                        Token::Eof => {
                            return Err(format!("Unclosed '(' opened at {}", open));
                        }
                        _ => items.push(self.parse_sexpr()?),
                    }
                }
                SExpr::List(items)
            }
            Token::RParen => return Err(format!("Unexpected ')' at {}", self.location())),
            Token::Symbol(s) => SExpr::Atom(s.clone()),
            Token::Integer(i) => SExpr::Integer(*i),
            Token::Single(fl) => SExpr::Single(*fl),
            Token::Double(fl) => SExpr::Double(*fl),
            Token::Eof => return Err("Unexpected end of input".to_string()),
        };
        self.advance();
        Ok(expr)
    }

    pub fn parse(&mut self) -> Result<Vec<SExpr>, String> {
        let mut exprs = Vec::new();
        while self.current() != &Token::Eof {
            exprs.push(self.parse_sexpr()?);
        }
        Ok(exprs)
    }
}

/// Tokenize and parse a whole source text
pub fn parse_source(src: &str) -> Result<Vec<SExpr>, String> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse()
}
