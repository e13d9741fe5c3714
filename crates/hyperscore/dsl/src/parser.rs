//! Parser: recursive descent parser for scoring bodies
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! body        := statement*
//! statement   := if_stmt | simple NEWLINE
//! simple      := "return" [expr] | "pass" | NAME "=" expr | expr
//! if_stmt     := "if" expr ":" suite ("elif" expr ":" suite)* ["else" ":" suite]
//! suite       := simple NEWLINE | NEWLINE INDENT statement+ DEDENT
//! expr        := or_expr ["if" or_expr "else" expr]
//! or_expr     := and_expr ("or" and_expr)*
//! and_expr    := not_expr ("and" not_expr)*
//! not_expr    := "not" not_expr | comparison
//! comparison  := sum (cmp_op sum)*
//! sum         := term (("+" | "-") term)*
//! term        := unary (("*" | "/" | "//" | "%") unary)*
//! unary       := ("-" | "+") unary | postfix
//! postfix     := atom ("[" expr "]" | "." NAME "(" args ")")*
//! atom        := literal | NAME | NAME "(" args ")" | list | dict | "(" expr ")"
//! ```
//!
//! Call targets are checked against the builtin and method whitelists here,
//! so an unknown function is a compile error rather than a runtime one.
//!
//! Every level a construct adds to the syntax tree (a bracket, a prefix
//! operator, a chained binary operator, an indented block) counts against
//! [`MAX_NESTING_DEPTH`], which bounds recursion here and in the interpreter.

use crate::ast::{BinaryOp, Builtin, CompareOp, Expr, Method, Stmt, StmtKind, UnaryOp};
use crate::errors::{DslError, DslResult};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::Value;

/// Deepest syntax tree a scoring body may produce
pub const MAX_NESTING_DEPTH: usize = 100;

/// Parser for scoring bodies
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse source text into a statement list
    pub fn parse(input: &str) -> DslResult<Vec<Stmt>> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };
        parser.parse_body()
    }

    fn parse_body(&mut self) -> DslResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Indent) {
                let tok = self.peek();
                return Err(DslError::IndentationError {
                    line: tok.line,
                    message: "unexpected indent".into(),
                });
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> DslResult<Stmt> {
        if self.check(TokenKind::If) {
            return self.parse_if();
        }
        let stmt = self.parse_simple()?;
        self.expect(TokenKind::Newline)?;
        Ok(stmt)
    }

    fn parse_simple(&mut self) -> DslResult<Stmt> {
        let line = self.peek().line;
        let kind = match self.peek_kind() {
            TokenKind::Return => {
                self.advance();
                if self.check(TokenKind::Newline) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Identifier if self.peek_kind_at(1) == TokenKind::Assign => {
                let target = self.advance().text.clone();
                self.advance();
                StmtKind::Assign {
                    target,
                    value: self.parse_expr()?,
                }
            }
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        Ok(Stmt { line, kind })
    }

    fn parse_if(&mut self) -> DslResult<Stmt> {
        let line = self.expect(TokenKind::If)?.line;
        let mut branches = Vec::new();

        let condition = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        branches.push((condition, self.parse_suite()?));

        while self.check(TokenKind::Elif) {
            self.advance();
            let condition = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            branches.push((condition, self.parse_suite()?));
        }

        let orelse = if self.check(TokenKind::Else) {
            self.advance();
            self.expect(TokenKind::Colon)?;
            self.parse_suite()?
        } else {
            Vec::new()
        };

        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    fn parse_suite(&mut self) -> DslResult<Vec<Stmt>> {
        if !self.check(TokenKind::Newline) {
            let stmt = self.parse_simple()?;
            self.expect(TokenKind::Newline)?;
            return Ok(vec![stmt]);
        }

        self.advance();
        self.expect(TokenKind::Indent)?;
        self.descend()?;
        let mut block = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.check(TokenKind::Eof) {
            block.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent)?;
        self.ascend(1);
        Ok(block)
    }

    fn parse_expr(&mut self) -> DslResult<Expr> {
        self.descend()?;
        let expr = self.parse_conditional()?;
        self.ascend(1);
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> DslResult<Expr> {
        let then = self.parse_or()?;
        if !self.check(TokenKind::If) {
            return Ok(then);
        }

        self.advance();
        let condition = self.parse_or()?;
        self.expect(TokenKind::Else)?;
        let orelse = self.parse_expr()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            orelse: Box::new(orelse),
        })
    }

    fn parse_or(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_and()?;
        let mut levels = 0;
        while self.check(TokenKind::Or) {
            self.descend()?;
            levels += 1;
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_and(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_not()?;
        let mut levels = 0;
        while self.check(TokenKind::And) {
            self.descend()?;
            levels += 1;
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_not(&mut self) -> DslResult<Expr> {
        if self.check(TokenKind::Not) {
            self.descend()?;
            self.advance();
            let operand = self.parse_not()?;
            self.ascend(1);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> DslResult<Expr> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::NotEq,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Le => CompareOp::Le,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::Ge => CompareOp::Ge,
                TokenKind::In => CompareOp::In,
                TokenKind::Not if self.peek_kind_at(1) == TokenKind::In => {
                    self.advance();
                    CompareOp::NotIn
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_sum(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_term()?;
        let mut levels = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.descend()?;
            levels += 1;
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_term(&mut self) -> DslResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.descend()?;
            levels += 1;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_unary(&mut self) -> DslResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        self.descend()?;
        self.advance();
        let operand = self.parse_unary()?;
        self.ascend(1);
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> DslResult<Expr> {
        let mut expr = self.parse_atom()?;
        let mut levels = 0;
        loop {
            match self.peek_kind() {
                TokenKind::OpenBracket => {
                    self.descend()?;
                    levels += 1;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::CloseBracket)?;
                    expr = Expr::Subscript {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.descend()?;
                    levels += 1;
                    self.advance();
                    let name_tok = self.expect(TokenKind::Identifier)?.clone();
                    let method =
                        Method::from_name(&name_tok.text).ok_or_else(|| DslError::UnknownMethod {
                            name: name_tok.text.clone(),
                            line: name_tok.line,
                            col: name_tok.col,
                        })?;
                    if !self.check(TokenKind::OpenParen) {
                        return Err(DslError::ParseError {
                            line: name_tok.line,
                            col: name_tok.col,
                            message: format!("method '{}' must be called", name_tok.text),
                        });
                    }
                    let args = self.parse_call_args()?;
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                    };
                }
                _ => break,
            }
        }
        self.ascend(levels);
        Ok(expr)
    }

    fn parse_atom(&mut self) -> DslResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::NumberLiteral => {
                self.advance();
                let n = tok.text.parse::<f64>().map_err(|_| DslError::ParseError {
                    line: tok.line,
                    col: tok.col,
                    message: format!("'{}' is not a valid number", tok.text),
                })?;
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expr::Literal(Value::Str(tok.text)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::Literal(Value::None))
            }
            TokenKind::Identifier => {
                self.advance();
                if !self.check(TokenKind::OpenParen) {
                    return Ok(Expr::Name(tok.text));
                }
                let function =
                    Builtin::from_name(&tok.text).ok_or_else(|| DslError::UnknownFunction {
                        name: tok.text.clone(),
                        line: tok.line,
                        col: tok.col,
                    })?;
                let args = self.parse_call_args()?;
                Ok(Expr::Call { function, args })
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::OpenBracket => {
                self.advance();
                let items = self.parse_separated(TokenKind::CloseBracket, Self::parse_expr)?;
                Ok(Expr::List(items))
            }
            TokenKind::OpenBrace => {
                self.advance();
                let entries = self.parse_separated(TokenKind::CloseBrace, |p| {
                    let key = p.parse_expr()?;
                    p.expect(TokenKind::Colon)?;
                    let value = p.parse_expr()?;
                    Ok((key, value))
                })?;
                Ok(Expr::Map(entries))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call_args(&mut self) -> DslResult<Vec<Expr>> {
        self.expect(TokenKind::OpenParen)?;
        self.parse_separated(TokenKind::CloseParen, Self::parse_expr)
    }

    /// Comma-separated items up to and including `close`; a trailing comma
    /// is allowed.
    fn parse_separated<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> DslResult<T>,
    ) -> DslResult<Vec<T>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(item(self)?);
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(close)?;
        Ok(items)
    }

    // --- Nesting ---

    fn descend(&mut self) -> DslResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            let tok = self.peek();
            return Err(DslError::TooDeeplyNested {
                limit: MAX_NESTING_DEPTH,
                line: tok.line,
                col: tok.col,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    // --- Token helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[index].kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> DslResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> DslError {
        let tok = self.peek();
        if tok.kind == TokenKind::Eof {
            DslError::UnexpectedEof {
                expected: expected.to_string(),
                line: tok.line,
            }
        } else {
            let found = match tok.kind {
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent => tok.kind.to_string(),
                _ => tok.text.clone(),
            };
            DslError::UnexpectedToken {
                expected: expected.to_string(),
                found,
                line: tok.line,
                col: tok.col,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expr {
        let body = Parser::parse(src).unwrap();
        match body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_seed_rule() {
        let body = Parser::parse("if '秋' in attrs.get('季节', []):\n    return 1.0\nreturn 0.0")
            .unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[1].line, 3);

        let StmtKind::If { branches, orelse } = &body[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 1);
        assert!(orelse.is_empty());
        assert!(matches!(
            &branches[0].0,
            Expr::Compare { rest, .. } if rest[0].0 == CompareOp::In
        ));
    }

    #[test]
    fn test_parse_elif_else_chain() {
        let src = "\
if x > 4.5:
    return x
elif x > 4:
    return 1
else:
    return 0
";
        let body = Parser::parse(src).unwrap();
        let StmtKind::If { branches, orelse } = &body[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_single_line_suite() {
        let body = Parser::parse("if x: return 1\nelse: return 0").unwrap();
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_not_in_and_chained_comparison() {
        let expr = parse_expr("a not in b");
        assert!(matches!(
            expr,
            Expr::Compare { ref rest, .. } if rest[0].0 == CompareOp::NotIn
        ));

        let expr = parse_expr("0 < x <= 10");
        assert!(matches!(expr, Expr::Compare { ref rest, .. } if rest.len() == 2));
    }

    #[test]
    fn test_conditional_expression() {
        let expr = parse_expr("1.0 if ok else 0.0");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_literals() {
        assert!(matches!(parse_expr("[1, 2,]"), Expr::List(items) if items.len() == 2));
        assert!(matches!(parse_expr("{'a': 1, 'b': 2}"), Expr::Map(entries) if entries.len() == 2));
        assert!(matches!(parse_expr("None"), Expr::Literal(Value::None)));
    }

    #[test]
    fn test_assignment() {
        let body = Parser::parse("rating = attrs.get('评分', 0)").unwrap();
        assert!(matches!(
            &body[0].kind,
            StmtKind::Assign { target, .. } if target == "rating"
        ));
    }

    #[test]
    fn test_unknown_function_is_rejected() {
        let err = Parser::parse("return open('x')").unwrap_err();
        assert_eq!(
            err,
            DslError::UnknownFunction {
                name: "open".into(),
                line: 1,
                col: 8,
            }
        );
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let err = Parser::parse("return attrs.__class__()").unwrap_err();
        assert!(matches!(err, DslError::UnknownMethod { .. }));
    }

    #[test]
    fn test_attribute_access_is_rejected() {
        assert!(Parser::parse("return attrs.get").is_err());
    }

    #[test]
    fn test_loops_are_not_supported() {
        let err = Parser::parse("for x in attrs:\n    pass").unwrap_err();
        assert!(matches!(err, DslError::UnexpectedToken { line: 1, .. }));
    }

    #[test]
    fn test_missing_block() {
        let err = Parser::parse("if x:\nreturn 1").unwrap_err();
        assert!(matches!(
            err,
            DslError::UnexpectedToken { ref expected, .. } if expected == "indented block"
        ));
    }

    #[test]
    fn test_unexpected_indent() {
        let err = Parser::parse("x = 1\n    return x").unwrap_err();
        assert!(matches!(err, DslError::IndentationError { line: 2, .. }));
    }

    #[test]
    fn test_empty_body() {
        assert!(Parser::parse("").unwrap().is_empty());
        assert!(Parser::parse("# nothing here\n").unwrap().is_empty());
    }

    fn nested_parens(depth: usize) -> String {
        format!("return {}1{}", "(".repeat(depth), ")".repeat(depth))
    }

    fn assert_too_deep(result: DslResult<Vec<Stmt>>) {
        let err = result.unwrap_err();
        assert!(
            matches!(err, DslError::TooDeeplyNested { limit: MAX_NESTING_DEPTH, .. }),
            "unexpected error: {:?}",
            err
        );
        assert!(err.position().1.is_some());
    }

    #[test]
    fn test_nesting_below_limit_parses() {
        assert!(Parser::parse(&nested_parens(MAX_NESTING_DEPTH - 10)).is_ok());
    }

    #[test]
    fn test_depth_is_released_between_statements() {
        let depth = MAX_NESTING_DEPTH * 2 / 3;
        let src = format!("x = {}\n{}", &nested_parens(depth)[7..], nested_parens(depth));
        assert_eq!(Parser::parse(&src).unwrap().len(), 2);
    }

    #[test]
    fn test_deep_brackets_are_rejected() {
        let err = Parser::parse(&nested_parens(1000)).unwrap_err();
        assert_eq!(err.position().0, 1);
        assert_too_deep(Err(err));
        assert_too_deep(Parser::parse(&format!(
            "return {}1{}",
            "[".repeat(500),
            "]".repeat(500)
        )));
    }

    #[test]
    fn test_deep_prefix_operators_are_rejected() {
        assert_too_deep(Parser::parse(&format!("return {}True", "not ".repeat(20_000))));
        assert_too_deep(Parser::parse(&format!("return {}1", "-".repeat(20_000))));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        assert_too_deep(Parser::parse(&format!("return 1{}", " + 1".repeat(5_000))));
        assert_too_deep(Parser::parse(&format!("return x{}", ".get(1)".repeat(5_000))));
    }

    #[test]
    fn test_deep_blocks_are_rejected() {
        let mut src = String::new();
        for level in 0..(MAX_NESTING_DEPTH + 5) {
            src.push_str(&" ".repeat(level));
            src.push_str("if x:\n");
        }
        src.push_str(&" ".repeat(MAX_NESTING_DEPTH + 5));
        src.push_str("return 1\n");
        assert_too_deep(Parser::parse(&src));
    }
}
