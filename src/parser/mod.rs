use crate::ast::{DictEntry, Expr, Stmt};
use crate::error;
use crate::lexer::{Literal, Token, TokenKind, Tokens};
use crate::value::Value;

/// Marks that a single production failed to parse; caught by the statement
/// loop, which reports nothing further here (the error was already reported
/// at the point of failure) and synchronizes to the next likely statement
/// boundary.
#[derive(Debug)]
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over a flat token stream, one token of lookahead
/// plus one additional peek (§4.C).
pub struct Parser {
    tokens: Tokens<Token>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens: Tokens::new(tokens) }
    }

    /// Parse the whole token stream into a flat statement list, recovering
    /// from each error by synchronizing and continuing.
    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        statements
    }

    // ----- token cursor helpers -----

    fn peek(&mut self) -> Token {
        self.tokens.peek().unwrap_or_else(|| Token::eof(0))
    }

    fn peek_at(&self, offset: usize) -> Option<Token> {
        self.tokens.peek_at(offset)
    }

    fn is_at_end(&mut self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        self.tokens.next().unwrap_or_else(|| Token::eof(0))
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&self.peek(), message))
        }
    }

    fn error(&self, token: &Token, message: &str) -> ParseError {
        let location = if token.kind == TokenKind::Eof { "end" } else { token.lexeme.as_str() };
        error::report(token.line, location, message);
        ParseError
    }

    /// Advance until after a `;` or until the next token starts a statement,
    /// per §4.C.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            let token = self.advance();
            if token.kind == TokenKind::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenKind::Def | TokenKind::If | TokenKind::For | TokenKind::While | TokenKind::Return
            ) {
                return;
            }
        }
    }

    // ----- statements -----

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.looks_like_class_definition() {
            return self.class_declaration();
        }
        self.statement()
    }

    /// Look ahead for `IDENT ":" [IDENT] "=" "{"` without consuming, per
    /// §4.C's class-definition detector. Implemented with save/restore over
    /// the token cursor's index rather than a dedicated lookahead grammar.
    fn looks_like_class_definition(&mut self) -> bool {
        let start = self.tokens.get_index();
        let matches = self.try_looks_like_class_definition();
        self.tokens.set_index(start);
        matches
    }

    fn try_looks_like_class_definition(&mut self) -> bool {
        if !self.check(TokenKind::Identifier) {
            return false;
        }
        self.advance();
        if !self.match_kind(TokenKind::Colon) {
            return false;
        }
        // optional parent identifier
        if self.check(TokenKind::Identifier) {
            self.advance();
        }
        if !self.match_kind(TokenKind::Equal) {
            return false;
        }
        self.check(TokenKind::LeftBrace)
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;
        self.consume(TokenKind::Colon, "Expect ':' after class name.")?;
        let parent = if self.check(TokenKind::Identifier) {
            Some(self.advance())
        } else {
            None
        };
        self.consume(TokenKind::Equal, "Expect '=' after class header.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let body = self.block_statements()?;
        Ok(Stmt::Class { name, parent, body })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.check(TokenKind::Def) && self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Identifier) {
            self.advance();
            return self.function_statement();
        }
        if self.check(TokenKind::Return) {
            let keyword = self.advance();
            return self.return_statement(keyword);
        }
        if self.check(TokenKind::LeftBrace) {
            self.advance();
            let stmts = self.block_statements()?;
            return Ok(Stmt::Block(stmts));
        }
        self.expression_statement()
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before if body.")?;
        let then_branch = Box::new(Stmt::Block(self.block_statements()?));
        let else_branch = if self.match_kind(TokenKind::Else) {
            self.consume(TokenKind::LeftBrace, "Expect '{' before else body.")?;
            Some(Box::new(Stmt::Block(self.block_statements()?)))
        } else {
            None
        };
        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before loop body.")?;
        let body = Box::new(Stmt::Block(self.block_statements()?));
        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;
        let variable = self.consume(TokenKind::Identifier, "Expect loop variable name.")?;
        self.consume(TokenKind::In, "Expect 'in' after loop variable.")?;
        let iterable = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after iterable.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before loop body.")?;
        let body = Box::new(Stmt::Block(self.block_statements()?));
        Ok(Stmt::For { variable, iterable, body })
    }

    fn function_statement(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect function name.")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block_statements()?;
        Ok(Stmt::Function { name, params, body })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Token>> {
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        Ok(params)
    }

    fn return_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RightBrace) {
            None
        } else {
            Some(self.expression()?)
        };
        self.match_kind(TokenKind::Semicolon);
        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.match_kind(TokenKind::Semicolon);
        Ok(Stmt::Expression(expr))
    }

    // ----- expressions -----

    pub fn expression(&mut self) -> ParseResult<Expr> {
        self.ternary()
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.assignment()?;
        if self.check(TokenKind::Question) {
            let question = self.advance();
            let then_branch = Box::new(self.expression()?);
            self.consume(TokenKind::Colon, "Expect ':' in ternary expression.")?;
            let else_branch = Box::new(self.ternary()?);
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch,
                else_branch,
                question,
            });
        }
        Ok(condition)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let target = self.or()?;

        if self.check(TokenKind::Equal) {
            let equals = self.advance();
            let value = Box::new(self.assignment()?);
            return match target {
                Expr::Variable(name) => Ok(Expr::Assign { name, value }),
                Expr::Get { object, index, bracket } => {
                    Ok(Expr::Set { object, index, value, bracket })
                }
                _ => Err(self.error(&equals, "Invalid assignment target.")),
            };
        }

        Ok(target)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.check(TokenKind::PipePipe) {
            let op = self.advance();
            let right = self.and()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.check(TokenKind::AmpAmp) {
            let op = self.advance();
            let right = self.equality()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        while matches!(self.peek().kind, TokenKind::EqualEqual | TokenKind::BangEqual) {
            let op = self.advance();
            let right = self.comparison()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        while matches!(
            self.peek().kind,
            TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual
        ) {
            let op = self.advance();
            let right = self.term()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        while matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance();
            let right = self.factor()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        while matches!(self.peek().kind, TokenKind::Star | TokenKind::Slash) {
            let op = self.advance();
            let right = self.unary()?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if matches!(self.peek().kind, TokenKind::Bang | TokenKind::Minus) {
            let op = self.advance();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, right });
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.subscript()?;
        loop {
            if self.check(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.check(TokenKind::Dot) {
                self.advance();
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Dot { object: Box::new(expr), name };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let paren = self.advance();
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.").map(|_| paren)?;
        Ok(Expr::Call { callee: Box::new(callee), paren, args })
    }

    fn subscript(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.check(TokenKind::LeftBracket) {
            let bracket = self.advance();
            let index = self.expression()?;
            self.consume(TokenKind::RightBracket, "Expect ']' after index.")?;
            expr = Expr::Get { object: Box::new(expr), index: Box::new(index), bracket };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::False) {
            self.advance();
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        if self.check(TokenKind::True) {
            self.advance();
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        if self.check(TokenKind::None) {
            self.advance();
            return Ok(Expr::Literal(Value::None));
        }
        if self.check(TokenKind::Number) {
            let token = self.advance();
            let Literal::Number(n) = token.literal else { unreachable!("Number token without literal") };
            return Ok(Expr::Literal(Value::Number(n)));
        }
        if self.check(TokenKind::String) {
            let token = self.advance();
            let Literal::String(s) = token.literal else { unreachable!("String token without literal") };
            return Ok(Expr::Literal(Value::String(s)));
        }
        if self.check(TokenKind::Def) {
            return self.function_expression();
        }
        if self.looks_like_lambda() {
            return self.lambda_expression();
        }
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            return Ok(Expr::Variable(token));
        }
        if self.check(TokenKind::LeftBracket) {
            return self.array_or_range();
        }
        if self.check(TokenKind::LeftBrace) {
            return self.dict_literal();
        }
        if self.check(TokenKind::LeftParen) {
            self.advance();
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        let token = self.peek();
        Err(self.error(&token, "Expect expression."))
    }

    /// `IDENT "->"` or `"(" IDENT,* ")" "->"`, per §4.C.
    fn looks_like_lambda(&mut self) -> bool {
        if self.check(TokenKind::Identifier) {
            return self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Arrow);
        }
        if !self.check(TokenKind::LeftParen) {
            return false;
        }
        let start = self.tokens.get_index();
        let matched = self.try_looks_like_paren_lambda();
        self.tokens.set_index(start);
        matched
    }

    fn try_looks_like_paren_lambda(&mut self) -> bool {
        self.advance(); // '('
        if !self.check(TokenKind::RightParen) {
            loop {
                if !self.match_kind(TokenKind::Identifier) {
                    return false;
                }
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.match_kind(TokenKind::RightParen) {
            return false;
        }
        self.check(TokenKind::Arrow)
    }

    fn lambda_expression(&mut self) -> ParseResult<Expr> {
        let params = if self.check(TokenKind::Identifier) {
            vec![self.advance()]
        } else {
            self.consume(TokenKind::LeftParen, "Expect '(' before lambda parameters.")?;
            let mut params = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "Expect ')' after lambda parameters.")?;
            params
        };
        let keyword = self.consume(TokenKind::Arrow, "Expect '->' in lambda.")?;
        let body_expr = self.expression()?;
        let body = vec![Stmt::Return { keyword: keyword.clone(), value: Some(body_expr) }];
        Ok(Expr::FunctionExpr { name: None, params, body, keyword })
    }

    fn function_expression(&mut self) -> ParseResult<Expr> {
        let keyword = self.advance();
        let name = if self.check(TokenKind::Identifier) { Some(self.advance()) } else { None };
        let params = self.parse_params()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block_statements()?;
        Ok(Expr::FunctionExpr { name, params, body, keyword })
    }

    fn array_or_range(&mut self) -> ParseResult<Expr> {
        let bracket = self.advance();
        if self.match_kind(TokenKind::RightBracket) {
            return Ok(Expr::Array { elements: Vec::new(), bracket });
        }

        let first = self.expression()?;

        if self.check(TokenKind::ColonColon) {
            self.advance();
            let end = self.expression()?;
            let step = if self.match_kind(TokenKind::ColonColon) {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            self.consume(TokenKind::RightBracket, "Expect ']' after range.")?;
            return Ok(Expr::Range { start: Box::new(first), end: Box::new(end), step, token: bracket });
        }

        let mut elements = vec![first];
        while self.match_kind(TokenKind::Comma) {
            if self.check(TokenKind::RightBracket) {
                break;
            }
            elements.push(self.expression()?);
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after array elements.")?;
        Ok(Expr::Array { elements, bracket })
    }

    fn dict_literal(&mut self) -> ParseResult<Expr> {
        let brace = self.advance();
        let mut entries = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                let key = self.dict_key()?;
                self.consume(TokenKind::Colon, "Expect ':' after dict key.")?;
                let value = self.expression()?;
                entries.push(DictEntry { key, value });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
                if self.check(TokenKind::RightBrace) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after dict entries.")?;
        Ok(Expr::Dict { entries, brace })
    }

    /// A bare identifier key is rewritten as a string literal; any other
    /// expression is parsed verbatim, per §4.C.
    fn dict_key(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::Identifier) && self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Colon) {
            let token = self.advance();
            return Ok(Expr::Literal(Value::String(token.lexeme)));
        }
        self.expression()
    }
}

/// Convenience entry point mirroring `Lexer::new(...).scan_tokens()`.
pub fn parse(tokens: Vec<Token>) -> Vec<Stmt> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(source: &str) -> Vec<Stmt> {
        let tokens = Lexer::new(source).scan_tokens();
        Parser::new(tokens).parse()
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let stmts = parse_source("1 + 2 * 3;");
        assert_eq!(stmts.len(), 1);
        let Stmt::Expression(Expr::Binary { op, .. }) = &stmts[0] else { panic!("expected binary") };
        assert_eq!(op.kind, TokenKind::Plus);
    }

    #[test]
    fn parses_class_definition() {
        let stmts = parse_source("shape: = { area = 0 }");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Class { .. }));
    }

    #[test]
    fn parses_class_definition_with_parent() {
        let stmts = parse_source("square:shape = { side = 1 }");
        let Stmt::Class { parent, .. } = &stmts[0] else { panic!("expected class") };
        assert!(parent.is_some());
    }

    #[test]
    fn distinguishes_assignment_from_class() {
        let stmts = parse_source("x = 1;");
        assert!(matches!(stmts[0], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn parses_range_literal() {
        let stmts = parse_source("[1::4];");
        assert!(matches!(stmts[0], Stmt::Expression(Expr::Range { .. })));
    }

    #[test]
    fn parses_array_literal() {
        let stmts = parse_source("[1,2,3];");
        let Stmt::Expression(Expr::Array { elements, .. }) = &stmts[0] else { panic!("expected array") };
        assert_eq!(elements.len(), 3);
    }

    #[test]
    fn parses_dict_with_bareword_key() {
        let stmts = parse_source("{name: \"Alice\", age: 30};");
        let Stmt::Expression(Expr::Dict { entries, .. }) = &stmts[0] else { panic!("expected dict") };
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].key, Expr::Literal(Value::String(_))));
    }

    #[test]
    fn parses_arrow_lambda() {
        let stmts = parse_source("x -> x + 1;");
        assert!(matches!(stmts[0], Stmt::Expression(Expr::FunctionExpr { .. })));
    }

    #[test]
    fn parses_paren_lambda() {
        let stmts = parse_source("(a, b) -> a + b;");
        let Stmt::Expression(Expr::FunctionExpr { params, .. }) = &stmts[0] else { panic!("expected lambda") };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn parses_ternary() {
        let stmts = parse_source("1 ? 2 : 3;");
        assert!(matches!(stmts[0], Stmt::Expression(Expr::Ternary { .. })));
    }

    #[test]
    fn parses_if_without_chained_elif() {
        let stmts = parse_source("if (true) { 1; } else { 2; }");
        assert!(matches!(stmts[0], Stmt::If { .. }));
    }

    #[test]
    fn parses_for_loop() {
        let stmts = parse_source("for (x in [1,2]) { print(x); }");
        assert!(matches!(stmts[0], Stmt::For { .. }));
    }

    #[test]
    fn parses_function_definition() {
        let stmts = parse_source("def add(a, b) { return a + b }");
        assert!(matches!(stmts[0], Stmt::Function { .. }));
    }
}
