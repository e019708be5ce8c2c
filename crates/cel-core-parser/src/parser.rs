//! CEL parser - hand-written recursive descent with inline macro expansion.
//!
//! Ids are handed out in source order: an operator or call reserves its id
//! after its target or left operand has been parsed and before its arguments
//! or right operand.

use std::fmt;

use cel_core_common::operators;
use cel_core_common::{
    Constant, Expr, ListElement, MapEntry, SourceInfo, Span, Spanned, SpannedExpr, StructField,
};

use crate::error::{ParseError, ParseErrors};
use crate::factory::ExprFactory;
use crate::lexer::{SpannedToken, Token, MAX_INT_MAGNITUDE};
use crate::macros::{MacroExpansion, MacroRegistry};
use crate::options::ParserOptions;

type ParseStep<T> = Result<T, ParseError>;

/// Recursive descent parser for CEL expressions.
pub(crate) struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    /// Byte length of the source, used for end-of-input positions.
    input_len: usize,
    factory: ExprFactory,
    macros: &'a MacroRegistry,
    options: &'a ParserOptions,
    /// Current nesting depth of the expression being built.
    depth: usize,
    /// Syntax errors recovered from so far.
    recoveries: usize,
    /// Set once a limit is hit; no further recovery is attempted.
    aborted: bool,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        tokens: &'a [SpannedToken],
        source_info: SourceInfo,
        options: &'a ParserOptions,
        macros: &'a MacroRegistry,
    ) -> Self {
        let input_len = source_info.content().len();
        Self {
            tokens,
            pos: 0,
            input_len,
            factory: ExprFactory::new(source_info, options.accumulator_name()),
            macros,
            options,
            depth: 0,
            recoveries: 0,
            aborted: false,
        }
    }

    /// Parse the whole token stream as one expression.
    pub(crate) fn parse(mut self) -> (Option<SpannedExpr>, SourceInfo, ParseErrors) {
        let ast = match self.parse_expr() {
            Ok(expr) => {
                if let Some((token, span)) = self.tokens.get(self.pos) {
                    let error = syntax_error(format!("extraneous input '{}'", token), span.clone());
                    self.factory.push_error(error);
                }
                Some(expr)
            }
            Err(error) => {
                self.factory.push_error(error);
                None
            }
        };
        let (source_info, errors) = self.factory.into_parts();
        (ast, source_info, errors)
    }

    // === Utility Methods ===

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    /// Span of the current token, or the end of input.
    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| self.eof_span())
    }

    fn eof_span(&self) -> Span {
        self.input_len..self.input_len
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `token` or fail with a mismatch error at the current token.
    fn expect(&mut self, token: &Token) -> ParseStep<Span> {
        if self.check(token) {
            let span = self.peek_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.mismatch(&format!("'{}'", token)))
        }
    }

    /// Consume an identifier, returning its name and span.
    fn expect_ident(&mut self) -> ParseStep<(String, Span)> {
        match self.tokens.get(self.pos) {
            Some((Token::Ident(name), span)) => {
                let result = (name.clone(), span.clone());
                self.pos += 1;
                Ok(result)
            }
            Some((Token::Reserved(word), span)) => {
                Err(syntax_error(format!("reserved identifier: {}", word), span.clone()))
            }
            _ => Err(self.mismatch("IDENTIFIER")),
        }
    }

    fn mismatch(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "<EOF>".to_string(),
        };
        syntax_error(
            format!("mismatched input '{}' expecting {}", found, expected),
            self.peek_span(),
        )
    }

    /// Record that a limit was hit and build the error that ends the parse.
    fn fatal(&mut self, message: String) -> ParseError {
        self.aborted = true;
        ParseError::new(message, self.peek_span())
    }

    /// Increase the nesting depth, failing once it passes the configured limit.
    fn enter(&mut self) -> ParseStep<()> {
        if self.depth >= self.options.max_recursion_depth {
            return Err(self.fatal(format!(
                "expression recursion limit exceeded: {}",
                self.options.max_recursion_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    // === Error Recovery ===

    /// Record `error` and skip ahead to the next `,` or closing delimiter at
    /// the current nesting level.
    fn recover(&mut self, error: ParseError) -> ParseStep<()> {
        if self.aborted {
            return Err(error);
        }
        self.factory.push_error(error);
        self.recoveries += 1;
        if self.recoveries > self.options.error_recovery_limit {
            return Err(self.fatal(format!(
                "error recovery attempt limit exceeded: {}",
                self.options.error_recovery_limit
            )));
        }

        let mut nesting = 0usize;
        let mut skipped = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::LParen | Token::LBracket | Token::LBrace => nesting += 1,
                Token::RParen | Token::RBracket | Token::RBrace if nesting == 0 => break,
                Token::RParen | Token::RBracket | Token::RBrace => nesting -= 1,
                Token::Comma if nesting == 0 => break,
                _ => {}
            }
            if skipped == self.options.error_recovery_lookahead_limit {
                return Err(self.fatal(format!(
                    "error recovery token lookahead limit exceeded: {}",
                    self.options.error_recovery_lookahead_limit
                )));
            }
            skipped += 1;
            self.pos += 1;
        }
        Ok(())
    }

    /// Parse a comma-separated list of items up to and including `close`.
    ///
    /// A failed item is recorded and skipped; `placeholder` may supply a
    /// stand-in for it. Returns the items and the span of `close`.
    fn parse_delimited<T>(
        &mut self,
        close: &Token,
        allow_trailing_comma: bool,
        mut item: impl FnMut(&mut Self) -> ParseStep<T>,
        mut placeholder: impl FnMut(&mut Self, Span) -> Option<T>,
    ) -> ParseStep<(Vec<T>, Span)> {
        let mut items = Vec::new();
        if !self.check(close) {
            loop {
                match item(self) {
                    Ok(value) => {
                        items.push(value);
                        if !self.check(&Token::Comma) && !self.check(close) {
                            let error = self.mismatch(&format!("{{',', '{}'}}", close));
                            self.recover(error)?;
                        }
                    }
                    Err(error) => {
                        let span = error.span.clone().unwrap_or_else(|| self.peek_span());
                        self.recover(error)?;
                        if let Some(value) = placeholder(self, span) {
                            items.push(value);
                        }
                    }
                }
                if !self.match_token(&Token::Comma) {
                    break;
                }
                if allow_trailing_comma && self.check(close) {
                    break;
                }
            }
        }
        let close_span = self.expect(close)?;
        Ok((items, close_span))
    }

    // === Expression Parsing ===

    /// expr : conditionalOr ('?' conditionalOr ':' expr)?
    fn parse_expr(&mut self) -> ParseStep<SpannedExpr> {
        self.enter()?;
        let result = self.parse_ternary();
        self.depth -= 1;
        result
    }

    fn parse_ternary(&mut self) -> ParseStep<SpannedExpr> {
        let cond = self.parse_or()?;
        if !self.check(&Token::Question) {
            return Ok(cond);
        }
        let op_span = self.peek_span();
        self.advance();
        let id = self.factory.next_id(&op_span);
        let then_expr = self.parse_or()?;
        self.expect(&Token::Colon)?;
        let else_expr = self.parse_expr()?;
        let span = cond.span.start..else_expr.span.end;
        Ok(global_call(
            id,
            span,
            operators::CONDITIONAL,
            vec![cond, then_expr, else_expr],
        ))
    }

    fn parse_or(&mut self) -> ParseStep<SpannedExpr> {
        self.parse_left_assoc(Self::parse_and, or_operator)
    }

    fn parse_and(&mut self) -> ParseStep<SpannedExpr> {
        self.parse_left_assoc(Self::parse_relation, and_operator)
    }

    fn parse_relation(&mut self) -> ParseStep<SpannedExpr> {
        self.parse_left_assoc(Self::parse_additive, relation_operator)
    }

    fn parse_additive(&mut self) -> ParseStep<SpannedExpr> {
        self.parse_left_assoc(Self::parse_multiplicative, additive_operator)
    }

    fn parse_multiplicative(&mut self) -> ParseStep<SpannedExpr> {
        self.parse_left_assoc(Self::parse_unary, multiplicative_operator)
    }

    /// A left-associative chain of binary operators. Every link of the chain
    /// counts toward the nesting depth.
    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> ParseStep<SpannedExpr>,
        operator: fn(&Token) -> Option<&'static str>,
    ) -> ParseStep<SpannedExpr> {
        let depth = self.depth;
        let result = self.left_assoc_chain(operand, operator);
        self.depth = depth;
        result
    }

    fn left_assoc_chain(
        &mut self,
        operand: fn(&mut Self) -> ParseStep<SpannedExpr>,
        operator: fn(&Token) -> Option<&'static str>,
    ) -> ParseStep<SpannedExpr> {
        let mut left = operand(self)?;
        while let Some(function) = self.peek().and_then(operator) {
            let op_span = self.peek_span();
            self.advance();
            self.enter()?;
            let id = self.factory.next_id(&op_span);
            let right = operand(self)?;
            let span = left.span.start..right.span.end;
            left = global_call(id, span, function, vec![left, right]);
        }
        Ok(left)
    }

    /// unary : member | '!'+ member | '-'+ member
    ///
    /// An even run of the same operator cancels out.
    fn parse_unary(&mut self) -> ParseStep<SpannedExpr> {
        let (token, function) = match self.peek() {
            Some(Token::Minus) if !self.negative_literal_ahead() => {
                (Token::Minus, operators::NEGATE)
            }
            Some(Token::Not) => (Token::Not, operators::LOGICAL_NOT),
            _ => return self.parse_member(),
        };
        let op_span = self.peek_span();
        let mut count = 0usize;
        while self.match_token(&token) {
            count += 1;
        }
        let id = (count % 2 == 1).then(|| self.factory.next_id(&op_span));

        self.enter()?;
        let operand = self.parse_unary();
        self.depth -= 1;
        let operand = operand?;

        Ok(match id {
            Some(id) => {
                let span = op_span.start..operand.span.end;
                global_call(id, span, function, vec![operand])
            }
            None => operand,
        })
    }

    /// `-` directly followed by an int or double literal.
    fn negative_literal_ahead(&self) -> bool {
        self.check(&Token::Minus)
            && matches!(self.peek_at(1), Some(Token::Int(_)) | Some(Token::Double(_)))
    }

    /// member : primary ('.' IDENT | '.' IDENT '(' args ')' | '[' expr ']')*
    fn parse_member(&mut self) -> ParseStep<SpannedExpr> {
        let depth = self.depth;
        let result = self.member_chain();
        self.depth = depth;
        result
    }

    fn member_chain(&mut self) -> ParseStep<SpannedExpr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.enter()?;
                    expr = self.parse_select(expr)?;
                }
                Some(Token::LBracket) => {
                    self.enter()?;
                    expr = self.parse_index(expr)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `.field`, `.?field` or `.method(args)` applied to `operand`.
    fn parse_select(&mut self, operand: SpannedExpr) -> ParseStep<SpannedExpr> {
        let dot_span = self.expect(&Token::Dot)?;
        let optional = self.optional_marker(".?")?;
        let (field, field_span) = self.expect_ident()?;

        if !optional && self.check(&Token::LParen) {
            let open = self.peek_span();
            self.advance();
            let id = self.factory.next_id(&open);
            let (args, close) = self.parse_call_args()?;
            let span = operand.span.start..close.end;
            return Ok(self.call_or_macro(id, span, field, Some(operand), args));
        }

        let id = self.factory.next_id(&dot_span);
        let span = operand.span.start..field_span.end;
        if optional {
            let field = self.factory.new_const(field_span, Constant::String(field));
            return Ok(global_call(id, span, operators::OPT_SELECT, vec![operand, field]));
        }
        Ok(Spanned::new(
            id,
            Expr::Select {
                operand: Box::new(operand),
                field,
                test_only: false,
            },
            span,
        ))
    }

    /// `[index]` or `[?index]` applied to `operand`.
    fn parse_index(&mut self, operand: SpannedExpr) -> ParseStep<SpannedExpr> {
        let open = self.expect(&Token::LBracket)?;
        let optional = self.optional_marker("[?")?;
        let id = self.factory.next_id(&open);
        let index = self.parse_expr()?;
        let close = self.expect(&Token::RBracket)?;
        let function = if optional {
            operators::OPT_INDEX
        } else {
            operators::INDEX
        };
        let span = operand.span.start..close.end;
        Ok(global_call(id, span, function, vec![operand, index]))
    }

    /// Consume a `?` optional marker if present.
    fn optional_marker(&mut self, syntax: &str) -> ParseStep<bool> {
        if !self.check(&Token::Question) {
            return Ok(false);
        }
        if !self.options.enable_optional_syntax {
            return Err(syntax_error(
                format!("unsupported syntax '{}'", syntax),
                self.peek_span(),
            ));
        }
        self.advance();
        Ok(true)
    }

    fn parse_primary(&mut self) -> ParseStep<SpannedExpr> {
        let span = self.peek_span();
        let Some(token) = self.peek().cloned() else {
            return Err(syntax_error("unexpected end of input", self.eof_span()));
        };

        let constant = match token {
            Token::Int(n) => match i64::try_from(n) {
                Ok(n) => Constant::Int(n),
                Err(_) => {
                    return Err(syntax_error(format!("invalid int literal: {}", n), span));
                }
            },
            Token::UInt(n) => Constant::UInt(n),
            Token::Double(n) => Constant::Double(n),
            Token::String(s) => Constant::String(s),
            Token::Bytes(b) => Constant::Bytes(b),
            Token::True => Constant::Bool(true),
            Token::False => Constant::Bool(false),
            Token::Null => Constant::Null,
            Token::Minus if self.negative_literal_ahead() => {
                return self.parse_negative_literal();
            }
            Token::Ident(_) | Token::Dot => return self.parse_ident_or_call(),
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => return self.parse_list(),
            Token::LBrace => return self.parse_map(),
            Token::Reserved(word) => {
                return Err(syntax_error(format!("reserved identifier: {}", word), span));
            }
            token => {
                return Err(syntax_error(format!("unexpected token '{}'", token), span));
            }
        };
        self.advance();
        Ok(self.factory.new_const(span, constant))
    }

    /// `-1` and `-2.5` are literals rather than negations, which also lets
    /// `-9223372036854775808` denote `i64::MIN`.
    fn parse_negative_literal(&mut self) -> ParseStep<SpannedExpr> {
        let start = self.peek_span().start;
        self.advance();
        let literal_span = self.peek_span();
        let constant = match self.peek() {
            Some(Token::Int(n)) if *n == MAX_INT_MAGNITUDE => Constant::Int(i64::MIN),
            Some(Token::Int(n)) => match i64::try_from(*n) {
                Ok(n) => Constant::Int(-n),
                Err(_) => {
                    let message = format!("invalid int literal: {}", n);
                    return Err(syntax_error(message, literal_span));
                }
            },
            Some(Token::Double(n)) => Constant::Double(-*n),
            _ => Constant::Null,
        };
        self.advance();
        Ok(self.factory.new_const(start..literal_span.end, constant))
    }

    /// Identifier, leading-dot identifier, global call or message literal.
    fn parse_ident_or_call(&mut self) -> ParseStep<SpannedExpr> {
        let start = self.peek_span().start;
        let leading_dot = self.match_token(&Token::Dot);
        let (name, name_span) = self.expect_ident()?;
        let name = if leading_dot {
            format!(".{}", name)
        } else {
            name
        };

        if self.check(&Token::LParen) {
            let open = self.peek_span();
            self.advance();
            let id = self.factory.next_id(&open);
            let (args, close) = self.parse_call_args()?;
            return Ok(self.call_or_macro(id, start..close.end, name, None, args));
        }
        if self.message_name_ahead() {
            return self.parse_message(start, name);
        }
        Ok(self.factory.new_ident(start..name_span.end, name))
    }

    /// True when the tokens ahead are `(.IDENT)* {`.
    fn message_name_ahead(&self) -> bool {
        let mut offset = 0;
        loop {
            match (self.peek_at(offset), self.peek_at(offset + 1)) {
                (Some(Token::LBrace), _) => return true,
                (Some(Token::Dot), Some(Token::Ident(_))) => offset += 2,
                _ => return false,
            }
        }
    }

    /// Arguments after an already-consumed `(`, up to and including `)`.
    fn parse_call_args(&mut self) -> ParseStep<(Vec<SpannedExpr>, Span)> {
        self.parse_delimited(&Token::RParen, false, Self::parse_expr, |p, span| {
            Some(p.factory.new_expr(span, Expr::Unspecified))
        })
    }

    /// Build the call, or its macro expansion when a registered macro
    /// matches the call shape and accepts it.
    fn call_or_macro(
        &mut self,
        id: i64,
        span: Span,
        function: String,
        target: Option<SpannedExpr>,
        args: Vec<SpannedExpr>,
    ) -> SpannedExpr {
        let macros = self.macros;
        let Some(macro_def) = macros.lookup(&function, args.len(), target.is_some()) else {
            return call(id, span, function, target, args);
        };

        let original = self
            .options
            .populate_macro_calls
            .then(|| (target.clone(), args.clone()));

        match (macro_def.expander)(&mut self.factory, span.clone(), target, args) {
            MacroExpansion::Expanded(expansion) => {
                tracing::debug!(
                    function = %function,
                    call_id = id,
                    expansion_id = expansion.id,
                    "expanded macro"
                );
                self.factory.retire_id(id);
                if let Some((target, args)) = original {
                    if expansion.node != Expr::Unspecified {
                        self.factory.record_macro_call(
                            expansion.id,
                            span,
                            &function,
                            target.as_ref(),
                            &args,
                        );
                    }
                }
                expansion
            }
            MacroExpansion::Declined { target, args } => {
                tracing::debug!(function = %function, call_id = id, "macro declined call site");
                call(id, span, function, target, args)
            }
        }
    }

    /// `[elem, ?elem, ...]`
    fn parse_list(&mut self) -> ParseStep<SpannedExpr> {
        let open = self.expect(&Token::LBracket)?;
        let id = self.factory.next_id(&open);
        let (elements, close) = self.parse_delimited(
            &Token::RBracket,
            true,
            |p| {
                let optional = p.optional_marker("?")?;
                let expr = p.parse_expr()?;
                Ok(ListElement { expr, optional })
            },
            |p, span| {
                Some(ListElement {
                    expr: p.factory.new_expr(span, Expr::Unspecified),
                    optional: false,
                })
            },
        )?;
        Ok(Spanned::new(id, Expr::List(elements), open.start..close.end))
    }

    /// `{key: value, ?key: value, ...}`
    fn parse_map(&mut self) -> ParseStep<SpannedExpr> {
        let open = self.expect(&Token::LBrace)?;
        let id = self.factory.next_id(&open);
        let (entries, close) = self.parse_delimited(
            &Token::RBrace,
            true,
            |p| {
                let optional = p.optional_marker("?")?;
                let key = p.parse_expr()?;
                let colon = p.expect(&Token::Colon)?;
                let id = p.factory.next_id(&colon);
                let value = p.parse_expr()?;
                Ok(MapEntry {
                    id,
                    key,
                    value,
                    optional,
                })
            },
            |_, _| None,
        )?;
        Ok(Spanned::new(id, Expr::Map(entries), open.start..close.end))
    }

    /// `a.b.Name{field: value, ?field: value, ...}` where `name` is the
    /// first segment, already consumed.
    fn parse_message(&mut self, start: usize, name: String) -> ParseStep<SpannedExpr> {
        let mut name = name;
        while self.match_token(&Token::Dot) {
            let (segment, _) = self.expect_ident()?;
            name.push('.');
            name.push_str(&segment);
        }
        let open = self.expect(&Token::LBrace)?;
        let id = self.factory.next_id(&open);
        let (fields, close) = self.parse_delimited(
            &Token::RBrace,
            true,
            |p| {
                let optional = p.optional_marker("?")?;
                let (field, _) = p.expect_ident()?;
                let colon = p.expect(&Token::Colon)?;
                let id = p.factory.next_id(&colon);
                let value = p.parse_expr()?;
                Ok(StructField {
                    id,
                    name: field,
                    value,
                    optional,
                })
            },
            |_, _| None,
        )?;
        Ok(Spanned::new(
            id,
            Expr::Struct { name, fields },
            start..close.end,
        ))
    }
}

fn syntax_error(message: impl fmt::Display, span: Span) -> ParseError {
    ParseError::new(format!("Syntax error: {}", message), span)
}

fn call(
    id: i64,
    span: Span,
    function: String,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> SpannedExpr {
    Spanned::new(
        id,
        Expr::Call {
            target: target.map(Box::new),
            function,
            args,
        },
        span,
    )
}

fn global_call(id: i64, span: Span, function: &str, args: Vec<SpannedExpr>) -> SpannedExpr {
    call(id, span, function.to_string(), None, args)
}

fn or_operator(token: &Token) -> Option<&'static str> {
    matches!(token, Token::Or).then_some(operators::LOGICAL_OR)
}

fn and_operator(token: &Token) -> Option<&'static str> {
    matches!(token, Token::And).then_some(operators::LOGICAL_AND)
}

fn relation_operator(token: &Token) -> Option<&'static str> {
    match token {
        Token::EqEq => Some(operators::EQUALS),
        Token::Ne => Some(operators::NOT_EQUALS),
        Token::Lt => Some(operators::LESS),
        Token::Le => Some(operators::LESS_EQUALS),
        Token::Gt => Some(operators::GREATER),
        Token::Ge => Some(operators::GREATER_EQUALS),
        Token::In => Some(operators::IN),
        _ => None,
    }
}

fn additive_operator(token: &Token) -> Option<&'static str> {
    match token {
        Token::Plus => Some(operators::ADD),
        Token::Minus => Some(operators::SUBTRACT),
        _ => None,
    }
}

fn multiplicative_operator(token: &Token) -> Option<&'static str> {
    match token {
        Token::Star => Some(operators::MULTIPLY),
        Token::Slash => Some(operators::DIVIDE),
        Token::Percent => Some(operators::MODULO),
        _ => None,
    }
}
