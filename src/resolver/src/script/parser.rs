use std::sync::Arc;

use super::{
    ast::{
        AssignOp, BinaryOp, DeclKind, Element, Expr, FunctionBody, FunctionDef, LogicalOp,
        Property, PropertyKey, Stmt, TemplateSegment, UnaryOp,
    },
    lexer::{tokenize, Punct, Spanned, TemplatePart, Token},
};
use crate::error::{ScriptError, ScriptResult};

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "delete", "do", "else",
    "false", "finally", "for", "function", "if", "in", "instanceof", "let", "new", "null",
    "return", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while",
    "with", "yield", "await", "async",
];

const UNSUPPORTED: &[&str] = &[
    "while", "do", "switch", "try", "class", "new", "this", "delete", "void", "with", "yield",
    "await", "async", "import", "export", "break", "continue",
];

/// Parses a complete function expression, e.g. `(repo, filter) => ({ ... })`.
pub fn parse_function_expression(source: &str, max_nesting: usize) -> ScriptResult<FunctionDef> {
    let mut parser = Parser::new(source, 0, max_nesting)?;
    let expr = parser.parse_expression()?;
    while parser.eat(Punct::Semi) {}
    parser.expect_eof()?;
    match expr {
        Expr::Function(def) => Ok(Arc::unwrap_or_clone(def)),
        _ => Err(ScriptError::NotCallable),
    }
}

/// Parses a statement list and wraps it as the body of a function taking
/// `params`.
pub fn parse_function_body(
    source: &str,
    params: &[&str],
    max_nesting: usize,
) -> ScriptResult<FunctionDef> {
    let mut parser = Parser::new(source, 0, max_nesting)?;
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.parse_statement()?);
    }
    Ok(FunctionDef {
        params: params.iter().map(|p| (*p).to_owned()).collect(),
        body: FunctionBody::Block(stmts),
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    idx: usize,
    depth: usize,
    max_nesting: usize,
}

impl Parser {
    fn new(source: &str, base: usize, max_nesting: usize) -> ScriptResult<Self> {
        Ok(Self {
            tokens: tokenize(source, base)?,
            idx: 0,
            depth: 0,
            max_nesting,
        })
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.idx + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn pos(&self) -> usize {
        self.tokens[self.idx.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn is(&self, punct: Punct) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == word)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.is(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct, what: &str) -> ScriptResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            self.error(format!("expected {}", what))
        }
    }

    fn expect_eof(&self) -> ScriptResult<()> {
        if self.at_eof() {
            Ok(())
        } else {
            self.error("unexpected input after expression")
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> ScriptResult<T> {
        Err(ScriptError::Syntax {
            message: message.into(),
            pos: self.pos(),
        })
    }

    fn enter(&mut self) -> ScriptResult<()> {
        self.depth += 1;
        if self.depth > self.max_nesting {
            return Err(ScriptError::Limit(format!(
                "nesting deeper than {}",
                self.max_nesting
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn binding_name(&mut self) -> ScriptResult<String> {
        match self.peek().clone() {
            Token::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                Ok(name)
            }
            _ => self.error("expected identifier"),
        }
    }

    // 分号可省略
    fn end_statement(&mut self) {
        self.eat(Punct::Semi);
    }

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        self.enter()?;
        let stmt = self.parse_statement_inner();
        self.leave();
        stmt
    }

    fn parse_statement_inner(&mut self) -> ScriptResult<Stmt> {
        if self.eat(Punct::Semi) {
            return Ok(Stmt::Empty);
        }
        if self.is(Punct::LBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        let word = match self.peek() {
            Token::Ident(word) => word.clone(),
            _ => String::new(),
        };

        match word.as_str() {
            "let" | "const" | "var" => {
                let kind = self.parse_decl_kind();
                let mut decls = Vec::new();
                loop {
                    let name = self.binding_name()?;
                    let init = if self.eat(Punct::Assign) {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    if kind == DeclKind::Const && init.is_none() {
                        return self.error("missing initializer in const declaration");
                    }
                    decls.push((name, init));
                    if !self.eat(Punct::Comma) {
                        break;
                    }
                }
                self.end_statement();
                Ok(Stmt::Declare { kind, decls })
            }
            "if" => {
                self.advance();
                self.expect(Punct::LParen, "'(' after if")?;
                let test = self.parse_expression()?;
                self.expect(Punct::RParen, "')' after condition")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_word("else") {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "for" => {
                self.advance();
                self.expect(Punct::LParen, "'(' after for")?;
                if !(self.is_word("let") || self.is_word("const") || self.is_word("var")) {
                    return self.error("only for...of loops with a declaration are supported");
                }
                let kind = self.parse_decl_kind();
                let name = self.binding_name()?;
                if !self.eat_word("of") {
                    return self.error("only for...of loops are supported");
                }
                let iterable = self.parse_expression()?;
                self.expect(Punct::RParen, "')' after for...of head")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::ForOf {
                    kind,
                    name,
                    iterable,
                    body,
                })
            }
            "return" => {
                self.advance();
                let value = if self.is(Punct::Semi) || self.is(Punct::RBrace) || self.at_eof() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.end_statement();
                Ok(Stmt::Return(value))
            }
            "throw" => {
                self.advance();
                let value = self.parse_expression()?;
                self.end_statement();
                Ok(Stmt::Throw(value))
            }
            "function" if matches!(self.peek_at(1), Token::Ident(_)) => {
                self.advance();
                let name = self.binding_name()?;
                let def = self.parse_function_rest()?;
                Ok(Stmt::Declare {
                    kind: DeclKind::Let,
                    decls: vec![(name, Some(Expr::Function(Arc::new(def))))],
                })
            }
            word if UNSUPPORTED.contains(&word) => {
                self.error(format!("'{}' is not supported", word))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement();
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_decl_kind(&mut self) -> DeclKind {
        let kind = match self.peek() {
            Token::Ident(w) if w == "const" => DeclKind::Const,
            Token::Ident(w) if w == "var" => DeclKind::Var,
            _ => DeclKind::Let,
        };
        self.advance();
        kind
    }

    fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect(Punct::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.eat(Punct::RBrace) {
            if self.at_eof() {
                return self.error("expected '}'");
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_expression(&mut self) -> ScriptResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ScriptResult<Expr> {
        self.enter()?;
        let expr = self.parse_assignment_inner();
        self.leave();
        expr
    }

    fn parse_assignment_inner(&mut self) -> ScriptResult<Expr> {
        if self.is(Punct::LParen) && self.arrow_ahead() {
            return self.parse_arrow_with_params();
        }
        let single_param = match (self.peek(), self.peek_at(1)) {
            (Token::Ident(name), Token::Punct(Punct::Arrow)) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = single_param {
            if RESERVED.contains(&name.as_str()) {
                return self.error("expected identifier");
            }
            self.advance();
            self.advance();
            let body = self.parse_arrow_body()?;
            return Ok(Expr::Function(Arc::new(FunctionDef {
                params: vec![name],
                body,
            })));
        }

        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Token::Punct(Punct::Assign) => AssignOp::Assign,
            Token::Punct(Punct::PlusAssign) => AssignOp::Add,
            Token::Punct(Punct::MinusAssign) => AssignOp::Sub,
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Ident(_)
                | Expr::Member {
                    optional: false,
                    ..
                }
                | Expr::Index {
                    optional: false,
                    ..
                }
        ) {
            return self.error("invalid assignment target");
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    // 当前为 `(`，判断与之匹配的 `)` 之后是否是 `=>`
    fn arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut idx = self.idx;
        while idx < self.tokens.len() {
            match &self.tokens[idx].token {
                Token::Punct(Punct::LParen) => depth += 1,
                Token::Punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(idx + 1).map(|s| &s.token),
                            Some(Token::Punct(Punct::Arrow))
                        );
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
        false
    }

    fn parse_params(&mut self) -> ScriptResult<Vec<String>> {
        self.expect(Punct::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.eat(Punct::RParen) {
            params.push(self.binding_name()?);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RParen, "')' after parameters")?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_arrow_with_params(&mut self) -> ScriptResult<Expr> {
        let params = self.parse_params()?;
        self.expect(Punct::Arrow, "'=>'")?;
        let body = self.parse_arrow_body()?;
        Ok(Expr::Function(Arc::new(FunctionDef { params, body })))
    }

    fn parse_arrow_body(&mut self) -> ScriptResult<FunctionBody> {
        if self.is(Punct::LBrace) {
            Ok(FunctionBody::Block(self.parse_block()?))
        } else {
            Ok(FunctionBody::Expr(self.parse_assignment()?))
        }
    }

    fn parse_function_rest(&mut self) -> ScriptResult<FunctionDef> {
        let params = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(FunctionDef { params, body })
    }

    fn parse_conditional(&mut self) -> ScriptResult<Expr> {
        let test = self.parse_or()?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Punct::Colon, "':' in conditional expression")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_or(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_and()?;
        loop {
            let op = if self.eat(Punct::Or) {
                LogicalOp::Or
            } else if self.eat(Punct::Nullish) {
                LogicalOp::Nullish
            } else {
                return Ok(left);
            };
            let right = self.parse_and()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_and(&mut self) -> ScriptResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(Punct::And) {
            let right = self.parse_equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(Punct, BinaryOp)],
        next: fn(&mut Self) -> ScriptResult<Expr>,
    ) -> ScriptResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat(*punct) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_equality(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[
                (Punct::StrictEq, BinaryOp::StrictEq),
                (Punct::StrictNe, BinaryOp::StrictNe),
                (Punct::Eq, BinaryOp::Eq),
                (Punct::Ne, BinaryOp::Ne),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[
                (Punct::Le, BinaryOp::Le),
                (Punct::Ge, BinaryOp::Ge),
                (Punct::Lt, BinaryOp::Lt),
                (Punct::Gt, BinaryOp::Gt),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ScriptResult<Expr> {
        self.parse_binary_level(
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Percent, BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        let op = if self.eat(Punct::Bang) {
            UnaryOp::Not
        } else if self.eat(Punct::Minus) {
            UnaryOp::Neg
        } else if self.eat(Punct::Plus) {
            UnaryOp::Plus
        } else if self.eat_word("typeof") {
            UnaryOp::Typeof
        } else {
            return self.parse_postfix();
        };
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn property_name(&mut self) -> ScriptResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            _ => self.error("expected property name"),
        }
    }

    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(Punct::Dot) {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                };
            } else if self.eat(Punct::QuestionDot) {
                if self.is(Punct::LParen) {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    };
                } else if self.eat(Punct::LBracket) {
                    let index = self.parse_expression()?;
                    self.expect(Punct::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    let property = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                    };
                }
            } else if self.eat(Punct::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Punct::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if self.is(Punct::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> ScriptResult<Vec<Expr>> {
        self.expect(Punct::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.eat(Punct::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RParen, "')' after arguments")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let pos = self.pos();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s.into())),
            Token::Template(parts) => self.parse_template(parts),
            Token::Punct(Punct::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(Punct::RParen, "')'")?;
                Ok(expr)
            }
            Token::Punct(Punct::LBracket) => self.parse_array(),
            Token::Punct(Punct::LBrace) => self.parse_object(),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "function" => {
                    // 函数表达式的名字不绑定
                    if matches!(self.peek(), Token::Ident(_)) {
                        self.binding_name()?;
                    }
                    Ok(Expr::Function(Arc::new(self.parse_function_rest()?)))
                }
                w if RESERVED.contains(&w) => Err(ScriptError::Syntax {
                    message: format!("'{}' is not supported here", w),
                    pos,
                }),
                _ => Ok(Expr::Ident(word.clone())),
            },
            Token::Eof => Err(ScriptError::Syntax {
                message: "unexpected end of input".to_owned(),
                pos,
            }),
            Token::Punct(p) => Err(ScriptError::Syntax {
                message: format!("unexpected token {:?}", p),
                pos,
            }),
        }
    }

    fn parse_template(&mut self, parts: Vec<TemplatePart>) -> ScriptResult<Expr> {
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                TemplatePart::Text(text) => segments.push(TemplateSegment::Text(text)),
                TemplatePart::Expr { source, pos } => {
                    let mut sub = Parser::new(&source, pos, self.max_nesting)?;
                    sub.depth = self.depth;
                    let expr = sub.parse_expression()?;
                    sub.expect_eof()?;
                    segments.push(TemplateSegment::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(segments))
    }

    fn parse_array(&mut self) -> ScriptResult<Expr> {
        let mut elements = Vec::new();
        while !self.eat(Punct::RBracket) {
            if self.eat(Punct::Ellipsis) {
                elements.push(Element::Spread(self.parse_assignment()?));
            } else {
                elements.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBracket, "']' after array elements")?;
                break;
            }
        }
        Ok(Expr::Array(elements))
    }

    fn parse_object(&mut self) -> ScriptResult<Expr> {
        let mut properties = Vec::new();
        while !self.eat(Punct::RBrace) {
            if self.eat(Punct::Ellipsis) {
                properties.push(Property::Spread(self.parse_assignment()?));
            } else {
                let (key, shorthand) = match self.advance() {
                    Token::Ident(name) => (PropertyKey::Named(name.clone()), Some(name)),
                    Token::Str(s) => (PropertyKey::Named(s), None),
                    Token::Number(n) => (PropertyKey::Named(super::value::format_number(n)), None),
                    Token::Punct(Punct::LBracket) => {
                        let key = self.parse_assignment()?;
                        self.expect(Punct::RBracket, "']' after computed key")?;
                        (PropertyKey::Computed(key), None)
                    }
                    _ => return self.error("expected property name"),
                };

                let value = if self.eat(Punct::Colon) {
                    self.parse_assignment()?
                } else if self.is(Punct::LParen) {
                    Expr::Function(Arc::new(self.parse_function_rest()?))
                } else {
                    match shorthand {
                        Some(name) if !RESERVED.contains(&name.as_str()) => Expr::Ident(name),
                        _ => return self.error("expected ':' after property name"),
                    }
                };
                properties.push(Property::Init { key, value });
            }
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBrace, "'}' after object properties")?;
                break;
            }
        }
        Ok(Expr::Object(properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_with_parenthesized_object() {
        let def = parse_function_expression("(repo, filter) => ({ type: 'sum', fields: [] })", 32)
            .unwrap();
        assert_eq!(def.params, vec!["repo", "filter"]);
        assert_eq!(
            def.body,
            FunctionBody::Expr(Expr::Object(vec![
                Property::Init {
                    key: PropertyKey::Named("type".to_owned()),
                    value: Expr::Str("sum".into()),
                },
                Property::Init {
                    key: PropertyKey::Named("fields".to_owned()),
                    value: Expr::Array(vec![]),
                },
            ]))
        );
    }

    #[test]
    fn function_keyword_forms() {
        for source in [
            "function (repo, filter) { return null; }",
            "function config(repo, filter) { return null }",
            "(function (repo) { return null; });",
            "repo => { return null }",
        ] {
            let def = parse_function_expression(source, 32).unwrap();
            assert!(matches!(def.body, FunctionBody::Block(_)), "{}", source);
        }
    }

    #[test]
    fn non_function_expression_is_rejected() {
        assert_eq!(
            parse_function_expression("'=>'", 32),
            Err(ScriptError::NotCallable)
        );
    }

    #[test]
    fn body_statements() {
        let def = parse_function_body(
            "let sql = `SELECT COUNT(*) AS count FROM ${repo}`\n\
             if (filter && filter.$and) { sql += ' WHERE 1=1' } else sql = sql\n\
             for (const f of [1, 2]) {}\n\
             return { type: 'sql', fields: [{ field: 'id', value: sql }] }",
            &["repo", "filter"],
            32,
        )
        .unwrap();
        match def.body {
            FunctionBody::Block(stmts) => {
                assert_eq!(stmts.len(), 4);
                assert!(matches!(stmts[0], Stmt::Declare { kind: DeclKind::Let, .. }));
                assert!(matches!(stmts[1], Stmt::If { alternate: Some(_), .. }));
                assert!(matches!(stmts[2], Stmt::ForOf { .. }));
                assert!(matches!(stmts[3], Stmt::Return(Some(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn precedence() {
        let def = parse_function_body("return 1 + 2 * 3 > 6 && !false", &[], 32).unwrap();
        let FunctionBody::Block(stmts) = def.body else {
            panic!("expected block");
        };
        let Stmt::Return(Some(Expr::Logical { op, left, .. })) = &stmts[0] else {
            panic!("expected logical return");
        };
        assert_eq!(*op, LogicalOp::And);
        assert!(matches!(**left, Expr::Binary { op: BinaryOp::Gt, .. }));
    }

    #[test]
    fn unsupported_and_broken_sources() {
        assert!(matches!(
            parse_function_body("while (true) {}", &[], 32),
            Err(ScriptError::Syntax { .. })
        ));
        assert!(matches!(
            parse_function_body("return { type: ", &[], 32),
            Err(ScriptError::Syntax { .. })
        ));
        assert!(matches!(
            parse_function_body("const x;", &[], 32),
            Err(ScriptError::Syntax { .. })
        ));
        assert!(matches!(
            parse_function_body("1 = 2", &[], 32),
            Err(ScriptError::Syntax { .. })
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let source = format!("return {}1{}", "[".repeat(50), "]".repeat(50));
        assert!(matches!(
            parse_function_body(&source, &[], 16),
            Err(ScriptError::Limit(_))
        ));
        assert!(parse_function_body(&source, &[], 128).is_ok());
    }
}
