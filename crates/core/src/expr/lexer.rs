use crate::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    /// Identifiers are case-insensitive and stored lowercased.
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    BangEq,
    Lt,
    Gt,
    Le,
    Ge,
    Question,
    Colon,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

/// Splits formula text into tokens. The returned list always ends in
/// [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut cursor = Cursor {
        chars: source.char_indices().peekable(),
        source,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    loop {
        skip_trivia(&mut cursor)?;
        let (line, column) = (cursor.line, cursor.column);
        let Some(c) = cursor.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
            return Ok(tokens);
        };

        let kind = if c.is_ascii_digit() || (c == '.' && cursor.peek_second().is_some_and(|n| n.is_ascii_digit())) {
            number(&mut cursor)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            TokenKind::Ident(identifier(&mut cursor))
        } else if c == '$' {
            cursor.bump();
            constant(&mut cursor)?
        } else {
            cursor.bump();
            let next = cursor.peek();
            let (kind, doubled) = match (c, next) {
                ('+', Some('=')) => (TokenKind::PlusAssign, true),
                ('-', Some('=')) => (TokenKind::MinusAssign, true),
                ('*', Some('=')) => (TokenKind::StarAssign, true),
                ('/', Some('=')) => (TokenKind::SlashAssign, true),
                ('%', Some('=')) => (TokenKind::PercentAssign, true),
                ('=', Some('=')) => (TokenKind::EqEq, true),
                ('!', Some('=')) => (TokenKind::BangEq, true),
                ('<', Some('=')) => (TokenKind::Le, true),
                ('>', Some('=')) => (TokenKind::Ge, true),
                ('&', Some('&')) => (TokenKind::AmpAmp, true),
                ('|', Some('|')) => (TokenKind::PipePipe, true),
                ('+', _) => (TokenKind::Plus, false),
                ('-', _) => (TokenKind::Minus, false),
                ('*', _) => (TokenKind::Star, false),
                ('/', _) => (TokenKind::Slash, false),
                ('%', _) => (TokenKind::Percent, false),
                ('^', _) => (TokenKind::Caret, false),
                ('!', _) => (TokenKind::Bang, false),
                ('&', _) => (TokenKind::Amp, false),
                ('|', _) => (TokenKind::Pipe, false),
                ('=', _) => (TokenKind::Assign, false),
                ('<', _) => (TokenKind::Lt, false),
                ('>', _) => (TokenKind::Gt, false),
                ('?', _) => (TokenKind::Question, false),
                (':', _) => (TokenKind::Colon, false),
                ('(', _) => (TokenKind::LParen, false),
                (')', _) => (TokenKind::RParen, false),
                (',', _) => (TokenKind::Comma, false),
                (';', _) => (TokenKind::Semicolon, false),
                (other, _) => {
                    return Err(ExprError::Syntax {
                        line,
                        column,
                        message: format!("unexpected character `{other}`"),
                    })
                }
            };
            if doubled {
                cursor.bump();
            }
            kind
        };

        tokens.push(Token { kind, line, column });
    }
}

fn skip_trivia(cursor: &mut Cursor<'_>) -> Result<(), ExprError> {
    loop {
        match (cursor.peek(), cursor.peek_second()) {
            (Some(c), _) if c.is_whitespace() => {
                cursor.bump();
            }
            (Some('/'), Some('/')) => {
                while let Some(c) = cursor.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            (Some('/'), Some('*')) => {
                cursor.bump();
                cursor.bump();
                let mut closed = false;
                while let Some(c) = cursor.bump() {
                    if c == '*' && cursor.peek() == Some('/') {
                        cursor.bump();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(cursor.error("unterminated block comment"));
                }
            }
            _ => return Ok(()),
        }
    }
}

fn number(cursor: &mut Cursor<'_>) -> Result<TokenKind, ExprError> {
    let start = cursor.offset();
    while cursor.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
        cursor.bump();
    }
    if cursor.peek().is_some_and(|c| c == 'e' || c == 'E')
        && cursor
            .peek_second()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
    {
        cursor.bump();
        cursor.bump();
        while cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
            cursor.bump();
        }
    }
    let end = cursor.offset();
    let text = &cursor.source[start..end];
    text.parse::<f64>()
        .map(TokenKind::Number)
        .map_err(|_| cursor.error(format!("malformed number `{text}`")))
}

fn identifier(cursor: &mut Cursor<'_>) -> String {
    let mut name = String::new();
    while let Some(c) = cursor.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c.to_ascii_lowercase());
            cursor.bump();
        } else {
            break;
        }
    }
    name
}

fn constant(cursor: &mut Cursor<'_>) -> Result<TokenKind, ExprError> {
    let name = identifier(cursor);
    let value = match name.as_str() {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        "phi" => 1.618_033_988_749_895,
        _ => return Err(cursor.error(format!("unknown constant `${name}`"))),
    };
    Ok(TokenKind::Number(value))
}
