use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Var,
    Let,
    Const,
    If,
    Else,
    For,
    While,
    In,
    Of,
    Typeof,
    Break,
    Continue,
    True,
    False,
    Null,
    Undefined,

    // Symbols
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Comma,
    Semi,
    Dot,
    Question,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,      // =
    PlusAssign,  // +=
    MinusAssign, // -=
    StarAssign,  // *=
    SlashAssign, // /=
    EqEq,        // ==
    EqEqEq,      // ===
    NotEq,       // !=
    NotEqEq,     // !==
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    PlusPlus,
    MinusMinus,

    // Data
    Ident(String),
    Number(f64),
    Str(String),

    /// An output slot between statement fragments. Never produced by the
    /// tokenizer itself.
    Emit(usize),
}

/// A token and its byte range within the fragment it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

// Longest first so `===` wins over `==` and `=`.
const PUNCTUATION: &[(&str, Token)] = &[
    ("===", Token::EqEqEq),
    ("!==", Token::NotEqEq),
    ("==", Token::EqEq),
    ("!=", Token::NotEq),
    ("<=", Token::Le),
    (">=", Token::Ge),
    ("&&", Token::AndAnd),
    ("||", Token::OrOr),
    ("++", Token::PlusPlus),
    ("--", Token::MinusMinus),
    ("+=", Token::PlusAssign),
    ("-=", Token::MinusAssign),
    ("*=", Token::StarAssign),
    ("/=", Token::SlashAssign),
    ("(", Token::LParen),
    (")", Token::RParen),
    ("[", Token::LBracket),
    ("]", Token::RBracket),
    ("{", Token::LBrace),
    ("}", Token::RBrace),
    (",", Token::Comma),
    (";", Token::Semi),
    (".", Token::Dot),
    ("?", Token::Question),
    (":", Token::Colon),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("!", Token::Bang),
    ("=", Token::Assign),
    ("<", Token::Lt),
    (">", Token::Gt),
];

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    /// Tokenize the whole fragment.
    pub fn tokenize(input: &'a str) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokenizer = Self::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = tokenizer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned>, SyntaxError> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.advance(rest.len() - trimmed.len());

        let start = self.cursor;
        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        let token = if first == '"' || first == '\'' {
            self.string_literal(first)?
        } else if first.is_ascii_digit()
            || (first == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            self.number_literal()?
        } else if is_ident_start(first) {
            let len = rest
                .find(|c: char| !is_ident_continue(c))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            self.advance(len);
            keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()))
        } else if let Some((text, token)) = PUNCTUATION.iter().find(|(p, _)| rest.starts_with(p)) {
            self.advance(text.len());
            token.clone()
        } else {
            return Err(SyntaxError::new(
                format!("unexpected character `{first}`"),
                start,
                first.len_utf8(),
            ));
        };

        Ok(Some(Spanned {
            token,
            start,
            end: self.cursor,
        }))
    }

    fn string_literal(&mut self, quote: char) -> Result<Token, SyntaxError> {
        let start = self.cursor;
        self.advance(1);
        let mut s = String::new();
        let mut chars = self.remaining().char_indices();
        while let Some((i, c)) = chars.next() {
            if c == quote {
                self.advance(i + 1);
                return Ok(Token::Str(s));
            }
            if c != '\\' {
                s.push(c);
                continue;
            }
            match chars.next() {
                Some((_, 'n')) => s.push('\n'),
                Some((_, 't')) => s.push('\t'),
                Some((_, 'r')) => s.push('\r'),
                Some((_, '0')) => s.push('\0'),
                Some((j, 'u')) => {
                    let hex = self.remaining().get(j + 1..j + 5).unwrap_or("");
                    let decoded = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
                    match decoded {
                        Some(ch) if hex.len() == 4 => {
                            s.push(ch);
                            for _ in 0..4 {
                                chars.next();
                            }
                        }
                        _ => {
                            return Err(SyntaxError::new(
                                "invalid unicode escape",
                                start + j,
                                2,
                            ))
                        }
                    }
                }
                Some((_, other)) => s.push(other),
                None => break,
            }
        }
        Err(SyntaxError::new(
            "unterminated string literal",
            start,
            self.input.len() - start,
        ))
    }

    fn number_literal(&mut self) -> Result<Token, SyntaxError> {
        let start = self.cursor;
        let bytes = self.remaining().as_bytes();
        let mut len = 0;
        let digits = |len: &mut usize| {
            while *len < bytes.len() && bytes[*len].is_ascii_digit() {
                *len += 1;
            }
        };
        digits(&mut len);
        if len < bytes.len() && bytes[len] == b'.' {
            len += 1;
            digits(&mut len);
        }
        if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
            let mut exp = len + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            let digits_start = exp;
            digits(&mut exp);
            if exp > digits_start {
                len = exp;
            }
        }
        let text = &self.remaining()[..len];
        self.advance(len);
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| SyntaxError::new(format!("invalid number `{text}`"), start, len))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "var" => Token::Var,
        "let" => Token::Let,
        "const" => Token::Const,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "while" => Token::While,
        "in" => Token::In,
        "of" => Token::Of,
        "typeof" => Token::Typeof,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "undefined" => Token::Undefined,
        _ => return None,
    })
}
