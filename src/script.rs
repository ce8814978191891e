//! Recursive-descent parser for the embedded script language.
//!
//! Expressions come from `=`, `!=`, `#{}` and attribute values; statements
//! come from `-` lines. Statement fragments are parsed as one token stream
//! with `Token::Emit` markers standing in for the output parts between them,
//! so a `- if (x) {` fragment and the `}` that closes it can be separated by
//! any amount of template output.

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Spanned, Token, Tokenizer};

/// A token tagged with the fragment (part) it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub fragment: usize,
    pub start: usize,
    pub end: usize,
}

impl Lexeme {
    pub fn from_spanned(spanned: Spanned, fragment: usize) -> Self {
        Self {
            token: spanned.token,
            fragment,
            start: spanned.start,
            end: spanned.end,
        }
    }
}

/// A syntax error and the fragment it points into.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub fragment: usize,
    pub error: SyntaxError,
}

type ParseResult<T> = Result<T, ParseFailure>;

/// Deepest nesting of statements or of expressions the parser accepts.
pub const MAX_NESTING: usize = 200;

pub struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
    loop_depth: usize,
    depth: usize,
}

/// Parse a standalone expression; the whole fragment must be consumed.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = Tokenizer::tokenize(source)?
        .into_iter()
        .map(|t| Lexeme::from_spanned(t, 0))
        .collect();
    let mut parser = Parser::new(tokens);
    parser.parse_expression_only().map_err(|f| f.error)
}

impl Parser {
    pub fn new(tokens: Vec<Lexeme>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
            depth: 0,
        }
    }

    fn peek(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|l| &l.token)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|l| l.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek(0) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> ParseResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    /// Whether the current token comes from a later `-` line than the one
    /// before it. Postfix `++`/`--` may not cross that boundary.
    fn line_break_before(&self) -> bool {
        let prev = self.pos.checked_sub(1).and_then(|p| self.tokens.get(p));
        match (prev, self.tokens.get(self.pos)) {
            (Some(prev), Some(next)) => prev.fragment != next.fragment,
            _ => false,
        }
    }

    /// Error at the current token, or just past the previous one when the
    /// current position holds no script text (end of input or an output slot).
    fn error(&self, message: impl Into<String>) -> ParseFailure {
        let message = message.into();
        match self.tokens.get(self.pos) {
            Some(l) if !matches!(l.token, Token::Emit(_)) => ParseFailure {
                fragment: l.fragment,
                error: SyntaxError::new(
                    format!("{message}, found {}", describe(&l.token)),
                    l.start,
                    l.end - l.start,
                ),
            },
            _ => {
                let prev = self.tokens[..self.pos.min(self.tokens.len())]
                    .iter()
                    .rev()
                    .find(|l| !matches!(l.token, Token::Emit(_)));
                let (fragment, offset) = prev.map_or((0, 0), |l| (l.fragment, l.end));
                ParseFailure {
                    fragment,
                    error: SyntaxError::new(format!("{message}, found end of input"), offset, 0),
                }
            }
        }
    }

    pub fn parse_expression_only(&mut self) -> ParseResult<Expr> {
        if self.tokens.is_empty() {
            return Err(self.error("expected an expression"));
        }
        let expr = self.parse_expr()?;
        if self.pos < self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    pub fn parse_program(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while self.peek(0).is_some() {
            if self.peek(0) == Some(&Token::RBrace) {
                return Err(self.error("unmatched closing brace"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.descend()?;
        let stmt = self.parse_statement_body();
        self.depth -= 1;
        stmt
    }

    fn parse_statement_body(&mut self) -> ParseResult<Stmt> {
        let Some(token) = self.peek(0).cloned() else {
            return Err(self.error("expected a statement"));
        };
        match token {
            Token::Emit(slot) => {
                self.consume();
                Ok(Stmt::Emit(slot))
            }
            Token::Semi => {
                self.consume();
                Ok(Stmt::Empty)
            }
            Token::LBrace => self.parse_block(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Var | Token::Let | Token::Const => {
                let stmt = self.parse_declaration()?;
                self.eat(&Token::Semi);
                Ok(stmt)
            }
            Token::Break | Token::Continue => {
                self.consume();
                if self.loop_depth == 0 {
                    self.pos -= 1;
                    return Err(self.error("illegal jump outside of a loop"));
                }
                self.eat(&Token::Semi);
                Ok(if token == Token::Break {
                    Stmt::Break
                } else {
                    Stmt::Continue
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.eat(&Token::Semi);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::LBrace, "`{`")?;
        let mut body = Vec::new();
        loop {
            match self.peek(0) {
                Some(Token::RBrace) => {
                    self.consume();
                    return Ok(Stmt::Block(body));
                }
                None => return Err(self.error("expected `}`")),
                _ => body.push(self.parse_statement()?),
            }
        }
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(Token::LParen, "`(`")?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen, "`)`")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::If, "`if`")?;
        let cond = self.parse_condition()?;
        let then = self.parse_statement()?;
        let otherwise = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If(cond, Box::new(then), otherwise))
    }

    fn parse_loop_body(&mut self) -> ParseResult<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::While, "`while`")?;
        let cond = self.parse_condition()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::While(cond, body))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::For, "`for`")?;
        self.expect(Token::LParen, "`(`")?;

        let decl = match self.peek(0) {
            Some(Token::Var) => Some(DeclKind::Var),
            Some(Token::Let) => Some(DeclKind::Let),
            Some(Token::Const) => Some(DeclKind::Const),
            _ => None,
        };
        let offset = usize::from(decl.is_some());
        if let (Some(Token::Ident(name)), Some(kind @ (Token::In | Token::Of))) =
            (self.peek(offset).cloned(), self.peek(offset + 1).cloned())
        {
            self.pos += offset + 2;
            let iterable = self.parse_expr()?;
            self.expect(Token::RParen, "`)`")?;
            let body = self.parse_loop_body()?;
            return Ok(Stmt::ForEach {
                kind: if kind == Token::In {
                    ForEachKind::In
                } else {
                    ForEachKind::Of
                },
                decl,
                name,
                iterable,
                body,
            });
        }

        let init = match self.peek(0) {
            Some(Token::Semi) => None,
            _ if decl.is_some() => Some(Box::new(self.parse_declaration()?)),
            _ => Some(Box::new(Stmt::Expr(self.parse_expr()?))),
        };
        self.expect(Token::Semi, "`;`")?;
        let cond = match self.peek(0) {
            Some(Token::Semi) => None,
            _ => Some(self.parse_expr()?),
        };
        self.expect(Token::Semi, "`;`")?;
        let update = match self.peek(0) {
            Some(Token::RParen) => None,
            _ => Some(self.parse_expr()?),
        };
        self.expect(Token::RParen, "`)`")?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let kind = match self.consume() {
            Some(Token::Var) => DeclKind::Var,
            Some(Token::Let) => DeclKind::Let,
            Some(Token::Const) => DeclKind::Const,
            _ => {
                self.pos -= 1;
                return Err(self.error("expected a declaration"));
            }
        };
        let mut bindings = Vec::new();
        loop {
            let name = match self.peek(0).cloned() {
                Some(Token::Ident(name)) => {
                    self.consume();
                    name
                }
                _ => return Err(self.error("expected a variable name")),
            };
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            bindings.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::Declare(kind, bindings))
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let start = self.pos;
        let lhs = self.parse_conditional()?;
        let op = match self.peek(0) {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            Some(Token::StarAssign) => AssignOp::Mul,
            Some(Token::SlashAssign) => AssignOp::Div,
            _ => return Ok(lhs),
        };
        if !lhs.is_place() {
            self.pos = start;
            return Err(self.error("invalid assignment target"));
        }
        self.consume();
        let rhs = self.parse_assignment()?;
        Ok(Expr::Assign(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_assignment()?;
        self.expect(Token::Colon, "`:`")?;
        let otherwise = self.parse_assignment()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_eq()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_eq()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                Some(Token::EqEqEq) => BinOp::StrictEq,
                Some(Token::NotEqEq) => BinOp::StrictNotEq,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.descend()?;
        let expr = self.parse_prefix();
        self.depth -= 1;
        expr
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let op = match self.peek(0) {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Typeof) => UnaryOp::Typeof,
            Some(Token::PlusPlus | Token::MinusMinus) => {
                let increment = self.consume() == Some(Token::PlusPlus);
                let start = self.pos;
                let target = self.parse_unary()?;
                if !target.is_place() {
                    self.pos = start;
                    return Err(self.error("invalid increment target"));
                }
                return Ok(Expr::Update {
                    target: Box::new(target),
                    increment,
                    prefix: true,
                });
            }
            _ => return self.parse_postfix(),
        };
        self.consume();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_call_member()?;
        if expr.is_place() && !self.line_break_before() {
            if let Some(Token::PlusPlus | Token::MinusMinus) = self.peek(0) {
                let increment = self.consume() == Some(Token::PlusPlus);
                return Ok(Expr::Update {
                    target: Box::new(expr),
                    increment,
                    prefix: false,
                });
            }
        }
        Ok(expr)
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek(0) {
                Some(Token::Dot) => {
                    self.consume();
                    match self.consume() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Member(Box::new(expr), name);
                        }
                        _ => {
                            self.pos -= 1;
                            return Err(self.error("expected a property name after `.`"));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.consume();
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.consume();
                    let args = self.parse_list(Token::RParen, "`)`")?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_list(&mut self, close: Token, what: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.parse_assignment()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.consume() else {
            return Err(self.error("expected an expression"));
        };
        Ok(match token {
            Token::Number(n) => Expr::Number(n),
            Token::Str(s) => Expr::Str(s),
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Null => Expr::Null,
            Token::Undefined => Expr::Undefined,
            Token::Ident(name) => Expr::Var(name),
            Token::LParen => {
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "`)`")?;
                e
            }
            Token::LBracket => Expr::Array(self.parse_list(Token::RBracket, "`]`")?),
            Token::LBrace => self.parse_object()?,
            _ => {
                self.pos -= 1;
                return Err(self.error("expected an expression"));
            }
        })
    }

    fn parse_object(&mut self) -> ParseResult<Expr> {
        let mut props = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Object(props));
            }
            let key = match self.consume() {
                Some(Token::Ident(k)) | Some(Token::Str(k)) => k,
                Some(Token::Number(n)) => crate::value::format_number(n),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected a property key"));
                }
            };
            self.expect(Token::Colon, "`:`")?;
            let value = self.parse_assignment()?;
            props.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace, "`}`")?;
                return Ok(Expr::Object(props));
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("`{name}`"),
        Token::Number(n) => format!("`{n}`"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Emit(_) => "template output".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(src: &str) -> Vec<Stmt> {
        let tokens = Tokenizer::tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| Lexeme::from_spanned(t, 0))
            .collect();
        Parser::new(tokens).parse_program().unwrap()
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                Box::new(Expr::Number(1.0)),
                BinOp::Add,
                Box::new(Expr::Binary(
                    Box::new(Expr::Number(2.0)),
                    BinOp::Mul,
                    Box::new(Expr::Number(3.0)),
                )),
            )
        );
    }

    #[test]
    fn member_index_and_call_chain() {
        let expr = parse_expression("user.tags[0].toUpperCase()").unwrap();
        let Expr::Call(callee, args) = expr else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert!(matches!(*callee, Expr::Member(_, ref m) if m == "toUpperCase"));
    }

    #[test]
    fn conditional_and_typeof() {
        let expr = parse_expression("typeof x === 'undefined' ? '' : x").unwrap();
        assert!(matches!(expr, Expr::Conditional(..)));
    }

    #[test]
    fn trailing_input_is_rejected() {
        let err = parse_expression("a b").unwrap_err();
        assert!(err.message.starts_with("unexpected trailing input"));
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert!(parse_expression("   ").is_err());
    }

    #[test]
    fn for_of_with_declaration() {
        let body = program("for (var item of items) { item }");
        assert!(matches!(
            &body[0],
            Stmt::ForEach { kind: ForEachKind::Of, decl: Some(DeclKind::Var), name, .. } if name == "item"
        ));
    }

    #[test]
    fn c_style_for() {
        let body = program("for (let i = 0; i < 3; i++) {}");
        let Stmt::For { init, cond, update, .. } = &body[0] else {
            panic!("expected for");
        };
        assert!(init.is_some() && cond.is_some() && update.is_some());
    }

    #[test]
    fn if_else_chain_without_semicolons() {
        let body = program("if (a) { x = 1 } else if (b) { x = 2 } else { x = 3 } y = x");
        assert_eq!(body.len(), 2);
        let Stmt::If(_, _, Some(otherwise)) = &body[0] else {
            panic!("expected if/else");
        };
        assert!(matches!(**otherwise, Stmt::If(..)));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let tokens = Tokenizer::tokenize("break")
            .unwrap()
            .into_iter()
            .map(|t| Lexeme::from_spanned(t, 0))
            .collect();
        assert!(Parser::new(tokens).parse_program().is_err());
    }

    #[test]
    fn postfix_update_stays_on_its_own_line() {
        let lexemes = |src: &str, fragment| {
            Tokenizer::tokenize(src)
                .unwrap()
                .into_iter()
                .map(move |t| Lexeme::from_spanned(t, fragment))
        };
        let tokens = lexemes("x = y", 0).chain(lexemes("++z", 1)).collect();
        let body = Parser::new(tokens).parse_program().unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Stmt::Expr(Expr::Assign(_, AssignOp::Set, rhs)) if **rhs == Expr::Var("y".into())));
        assert!(matches!(&body[1], Stmt::Expr(Expr::Update { prefix: true, .. })));

        let same_line = program("x = y++");
        assert!(matches!(&same_line[0], Stmt::Expr(Expr::Assign(_, _, rhs)) if matches!(**rhs, Expr::Update { prefix: false, .. })));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let depth = MAX_NESTING * 4;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse_expression(&source).unwrap_err();
        assert!(err.message.starts_with("nesting deeper than"));
        assert!(parse_expression(&format!("{}1{}", "[".repeat(40), "]".repeat(40))).is_ok());

        let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        let tokens = Tokenizer::tokenize(&blocks)
            .unwrap()
            .into_iter()
            .map(|t| Lexeme::from_spanned(t, 0))
            .collect();
        assert!(Parser::new(tokens).parse_program().is_err());
        assert!(parse_expression(&"!".repeat(depth)).is_err());
    }

    #[test]
    fn assignment_needs_a_place() {
        assert!(parse_expression("1 = 2").is_err());
        assert!(parse_expression("a.b = c = 2").is_ok());
    }
}
