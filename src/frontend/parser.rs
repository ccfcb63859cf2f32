//! Parser for Kestrel
//!
//! Recursive descent over a comment-free token stream, one statement per call
//! to [`Parser::advance`]. Mismatches are reported and parsing continues with a
//! best-effort tree wherever one can be built.

use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::lexer::{Lexer, LexerConfig};
use crate::frontend::token::{Token, TokenKind, TokenValue};
use crate::utils::{
    DiagnosticHandler, DiagnosticLog, LexicalError, LexicalWarning, Position, Span, SyntaxError,
    SyntaxWarning,
};

/// Result of one [`Parser::advance`] call
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// The parsed statement, if any alternative matched
    pub statement: Option<Statement>,
    /// No error was raised while parsing it
    pub success: bool,
}

/// Lexer adapter that drops comments and buffers lookahead on demand
struct TokenStream<'a> {
    lexer: Lexer<'a>,
    buffer: VecDeque<Token>,
    lexical: DiagnosticLog<LexicalError, LexicalWarning>,
    /// Number of tokens consumed so far
    consumed: usize,
    /// End of the last consumed token
    previous_end: Position,
}

impl<'a> TokenStream<'a> {
    fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            buffer: VecDeque::new(),
            lexical: DiagnosticLog::new(),
            consumed: 0,
            previous_end: Position::start(),
        }
    }

    fn pull(&mut self) -> Token {
        loop {
            let token = self.lexer.advance();
            self.lexer.report_to(&mut self.lexical);
            if !token.kind.is_comment() {
                return token;
            }
        }
    }

    fn peek_nth(&mut self, n: usize) -> &Token {
        while self.buffer.len() <= n {
            let token = self.pull();
            self.buffer.push_back(token);
        }
        &self.buffer[n]
    }

    fn bump(&mut self) -> Token {
        let token = match self.buffer.pop_front() {
            Some(token) => token,
            None => self.pull(),
        };
        self.consumed += 1;
        self.previous_end = token.span.end;
        token
    }
}

/// The parser
pub struct Parser<'a> {
    tokens: TokenStream<'a>,
    syntax: DiagnosticLog<SyntaxError, SyntaxWarning>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given source code
    pub fn new(source: &'a str) -> Self {
        Self::from_lexer(Lexer::new(source))
    }

    pub fn with_config(source: &'a str, config: LexerConfig) -> Self {
        Self::from_lexer(Lexer::with_config(source, config))
    }

    /// Create a parser pulling from an existing lexer
    pub fn from_lexer(lexer: Lexer<'a>) -> Self {
        Self {
            tokens: TokenStream::new(lexer),
            syntax: DiagnosticLog::new(),
        }
    }

    /// Lexical diagnostics collected so far
    pub fn lexical_diagnostics(&self) -> &DiagnosticLog<LexicalError, LexicalWarning> {
        &self.tokens.lexical
    }

    /// Syntax diagnostics collected so far
    pub fn syntax_diagnostics(&self) -> &DiagnosticLog<SyntaxError, SyntaxWarning> {
        &self.syntax
    }

    pub fn drain_lexical_into<H>(&mut self, handler: &mut H)
    where
        H: DiagnosticHandler<LexicalError, LexicalWarning> + ?Sized,
    {
        self.tokens.lexical.drain_into(handler);
    }

    pub fn drain_syntax_into<H>(&mut self, handler: &mut H)
    where
        H: DiagnosticHandler<SyntaxError, SyntaxWarning> + ?Sized,
    {
        self.syntax.drain_into(handler);
    }

    /// Check whether only the end of text remains
    pub fn is_at_end(&mut self) -> bool {
        self.peek_kind() == TokenKind::EndOfText
    }

    /// Parse the next statement.
    ///
    /// Always makes progress: when no statement can be built and nothing was
    /// consumed, the offending token is skipped.
    pub fn advance(&mut self) -> ParseOutcome {
        if self.is_at_end() {
            return ParseOutcome { statement: None, success: true };
        }

        let errors_before = self.error_count();
        let consumed_before = self.tokens.consumed;

        let statement = self.parse_statement();

        if statement.is_none() && self.tokens.consumed == consumed_before {
            let skipped = self.bump();
            debug!("skipping {} at {}", skipped.kind, skipped.span.start);
        }

        let success = statement.is_some() && self.error_count() == errors_before;
        match &statement {
            Some(statement) => debug!(
                "parsed statement at {} (terminated: {}, success: {})",
                statement.span.start, statement.terminated, success
            ),
            None => debug!("no statement parsed"),
        }

        ParseOutcome { statement, success }
    }

    /// Parse the next statement, keeping it only if it parsed without errors
    pub fn try_advance(&mut self) -> Option<Statement> {
        let outcome = self.advance();
        if outcome.success {
            outcome.statement
        } else {
            None
        }
    }

    // ==================== Helper Methods ====================

    fn error_count(&self) -> usize {
        self.syntax.errors.len() + self.tokens.lexical.errors.len()
    }

    fn peek(&mut self) -> &Token {
        self.tokens.peek_nth(0)
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth_kind(&mut self, n: usize) -> TokenKind {
        self.tokens.peek_nth(n).kind
    }

    fn current_start(&mut self) -> Position {
        self.peek().span.start
    }

    fn bump(&mut self) -> Token {
        self.tokens.bump()
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume `expected` or report it missing. Parsing continues either way.
    fn expect(&mut self, expected: TokenKind) -> bool {
        if self.eat(expected) {
            return true;
        }
        let token = self.peek();
        let error = SyntaxError::UnexpectedToken {
            actual: token.kind,
            expected,
            position: token.span.start,
        };
        self.raise(error);
        false
    }

    fn expect_identifier(&mut self) -> Option<String> {
        if self.check(TokenKind::Identifier) {
            let token = self.bump();
            return Some(token.text().unwrap_or_default().to_string());
        }
        self.expect(TokenKind::Identifier);
        None
    }

    fn raise(&mut self, error: SyntaxError) {
        debug!("syntax error: {}", error);
        self.syntax.handle_error(error);
    }

    fn warn(&mut self, warning: SyntaxWarning) {
        self.syntax.handle_warning(warning);
    }

    fn expected_expression(&mut self) {
        let token = self.peek();
        let error = SyntaxError::ExpectedExpression {
            actual: token.kind,
            position: token.span.start,
        };
        self.raise(error);
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.tokens.previous_end.max(start))
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> Option<Statement> {
        let start = self.current_start();

        let kind = match self.peek_kind() {
            TokenKind::Pull => self.parse_namespace_import()?,
            TokenKind::Init => self.parse_variable_init_list()?,
            TokenKind::Break => {
                self.bump();
                StatementKind::Break
            }
            TokenKind::BreakIf => {
                self.bump();
                self.expect(TokenKind::LeftParen);
                let condition = self.parse_expression()?;
                self.expect(TokenKind::RightParen);
                StatementKind::BreakIf(condition)
            }
            TokenKind::Return => {
                self.bump();
                let value = if can_start_expression(self.peek_kind()) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StatementKind::Return(value)
            }
            _ => StatementKind::Expression(self.parse_expression()?),
        };

        let terminated = self.eat(TokenKind::Semicolon);

        if terminated {
            if let StatementKind::Expression(expression) = &kind {
                if expression.is_inert() {
                    self.warn(SyntaxWarning::IgnoredResult { position: start });
                }
            }
        }

        Some(Statement {
            kind,
            terminated,
            span: self.span_from(start),
        })
    }

    fn parse_namespace_import(&mut self) -> Option<StatementKind> {
        self.bump();

        let mut path = vec![self.expect_identifier()?];
        while self.eat(TokenKind::Dot) {
            path.push(self.expect_identifier()?);
        }

        Some(StatementKind::NamespaceImport { path })
    }

    fn parse_variable_init_list(&mut self) -> Option<StatementKind> {
        self.bump();

        let mut inits = Vec::new();
        loop {
            let start = self.current_start();
            let is_const = self.eat(TokenKind::Const);
            let name = self.expect_identifier()?;

            let value = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            match &value {
                None if is_const => self.raise(SyntaxError::ImplicitConstInitialization {
                    name: name.clone(),
                    position: start,
                }),
                Some(Expression { kind: ExpressionKind::Literal(Literal::Null), .. }) if !is_const => {
                    self.warn(SyntaxWarning::NullInitialization {
                        name: name.clone(),
                        position: start,
                    })
                }
                _ => {}
            }

            inits.push(VariableInit {
                name,
                is_const,
                value,
                span: self.span_from(start),
            });

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        Some(StatementKind::VariableInitList(inits))
    }

    // ==================== Expressions ====================

    /// Parse an expression
    pub fn parse_expression(&mut self) -> Option<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expression> {
        let left = self.parse_null_coalescing()?;

        let Some(operator) = assignment_operator(self.peek_kind()) else {
            return Some(left);
        };
        let operator_position = self.bump().span.start;

        if !matches!(left.kind, ExpressionKind::Identifier(_)) {
            self.raise(SyntaxError::InvalidAssignmentTarget { position: operator_position });
        }

        // Right associative
        let right = self.parse_assignment()?;
        Some(Expression::binary(left, operator, right))
    }

    /// Parse one left-associative precedence level
    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> Option<Expression>,
        operator: fn(TokenKind) -> Option<Operator>,
    ) -> Option<Expression> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.peek_kind()) {
            self.bump();
            let right = operand(self)?;
            left = Expression::binary(left, op, right);
        }
        Some(left)
    }

    fn parse_null_coalescing(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_nullsafe_pipe, |kind| match kind {
            TokenKind::QuestionQuestion => Some(Operator::NullCoalescing),
            _ => None,
        })
    }

    fn parse_nullsafe_pipe(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_disjunction, |kind| match kind {
            TokenKind::QuestionGreater => Some(Operator::NullsafePipe),
            _ => None,
        })
    }

    fn parse_disjunction(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_conjunction, |kind| match kind {
            TokenKind::OrOr => Some(Operator::Or),
            _ => None,
        })
    }

    fn parse_conjunction(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_type_check, |kind| match kind {
            TokenKind::AndAnd => Some(Operator::And),
            _ => None,
        })
    }

    fn parse_type_check(&mut self) -> Option<Expression> {
        let mut left = self.parse_comparison()?;
        while self.eat(TokenKind::Is) {
            let operator = if self.eat(TokenKind::Not) {
                Operator::IsNot
            } else {
                Operator::Is
            };
            let target = self.parse_type_expression()?;
            left = Expression::binary(left, operator, target);
        }
        Some(left)
    }

    fn parse_comparison(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_concatenation, comparison_operator)
    }

    fn parse_concatenation(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_additive, |kind| match kind {
            TokenKind::DotDot => Some(Operator::Concatenate),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(Operator::Add),
            TokenKind::Minus => Some(Operator::Subtract),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Option<Expression> {
        self.parse_left_assoc(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(Operator::Multiply),
            TokenKind::Slash => Some(Operator::Divide),
            TokenKind::Percent => Some(Operator::Remainder),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Option<Expression> {
        let operator = match self.peek_kind() {
            TokenKind::Plus => Operator::Plus,
            TokenKind::Minus => Operator::Negate,
            TokenKind::Bang => Operator::Not,
            _ => return self.parse_exponent(),
        };
        let start = self.bump().span;
        let operand = self.parse_unary()?;
        Some(Expression::unary(operator, operand, start))
    }

    fn parse_exponent(&mut self) -> Option<Expression> {
        let base = self.parse_postfix()?;
        if !self.eat(TokenKind::Caret) {
            return Some(base);
        }
        // Right associative; the exponent may carry its own sign
        let exponent = self.parse_unary()?;
        Some(Expression::binary(base, Operator::Exponent, exponent))
    }

    fn parse_postfix(&mut self) -> Option<Expression> {
        let mut expression = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let start = self.current_start();
                    let member = self.expect_identifier()?;
                    let member = Expression::new(ExpressionKind::Identifier(member), self.span_from(start));
                    expression = Expression::binary(expression, Operator::Access, member);
                }
                TokenKind::LeftParen => {
                    self.bump();
                    let arguments = self.parse_arguments()?;
                    let span = expression.span.merge(&Span::at(self.tokens.previous_end));
                    expression = Expression::new(
                        ExpressionKind::FunctionCall {
                            callee: Box::new(expression),
                            arguments,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Some(expression)
    }

    /// Parse call arguments after the opening parenthesis
    fn parse_arguments(&mut self) -> Option<Vec<Expression>> {
        let mut arguments = Vec::new();
        if self.eat(TokenKind::RightParen) {
            return Some(arguments);
        }

        loop {
            arguments.push(self.parse_expression()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen);

        Some(arguments)
    }

    fn parse_primary(&mut self) -> Option<Expression> {
        let kind = self.peek_kind();

        match kind {
            TokenKind::LiteralInteger
            | TokenKind::LiteralFloat
            | TokenKind::LiteralString
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                let token = self.bump();
                let literal = literal_from_token(&token);
                Some(Expression::new(ExpressionKind::Literal(literal), token.span))
            }

            TokenKind::Identifier => {
                let token = self.bump();
                let name = token.text().unwrap_or_default().to_string();
                Some(Expression::new(ExpressionKind::Identifier(name), token.span))
            }

            TokenKind::LeftParen => {
                let start = self.bump().span.start;
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen);
                Some(Expression::new(
                    ExpressionKind::Grouping(Box::new(inner)),
                    self.span_from(start),
                ))
            }

            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::If => self.parse_conditional(),
            TokenKind::For => self.parse_for_loop(),
            TokenKind::While => self.parse_while_loop(),
            TokenKind::Functi => self.parse_function_definition(),
            TokenKind::Match => self.parse_pattern_matching(),

            _ if kind.is_type_name() => {
                let token = self.bump();
                let target = type_name(token.kind)?;
                if !self.eat(TokenKind::LeftParen) {
                    return Some(Expression::new(ExpressionKind::Type(target), token.span));
                }
                let operand = self.parse_expression()?;
                self.expect(TokenKind::RightParen);
                Some(Expression::new(
                    ExpressionKind::TypeCast {
                        target,
                        operand: Box::new(operand),
                    },
                    self.span_from(token.span.start),
                ))
            }

            _ => {
                self.expected_expression();
                None
            }
        }
    }

    /// Parse the type operand of `is` / `is not`
    fn parse_type_expression(&mut self) -> Option<Expression> {
        let token = self.peek().clone();
        match type_name(token.kind) {
            Some(target) => {
                self.bump();
                Some(Expression::new(ExpressionKind::Type(target), token.span))
            }
            None => {
                self.raise(SyntaxError::ExpectedType {
                    actual: token.kind,
                    position: token.span.start,
                });
                None
            }
        }
    }

    /// Parse the body of a conditional, loop, function or match branch.
    ///
    /// A braced body ends at its closing brace, so `functi() { ... }()`
    /// calls the function rather than the block.
    fn parse_body(&mut self) -> Option<Expression> {
        match self.peek_kind() {
            TokenKind::LeftBrace => self.parse_block(),
            kind if can_start_expression(kind) => self.parse_expression(),
            _ => {
                self.expected_expression();
                None
            }
        }
    }

    fn parse_block(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;
        let mut statements = Vec::new();

        loop {
            if matches!(self.peek_kind(), TokenKind::RightBrace | TokenKind::EndOfText) {
                break;
            }

            let consumed_before = self.tokens.consumed;
            match self.parse_statement() {
                Some(statement) => {
                    let terminated = statement.terminated;
                    statements.push(statement);
                    // The first unterminated statement yields the block's value
                    if !terminated {
                        break;
                    }
                }
                None => {
                    if self.tokens.consumed == consumed_before {
                        self.bump();
                    }
                }
            }
        }

        self.expect(TokenKind::RightBrace);
        Some(Expression::new(ExpressionKind::Block(statements), self.span_from(start)))
    }

    fn parse_conditional(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;

        let mut branches = vec![self.parse_conditional_branch()?];
        while self.eat(TokenKind::Elif) {
            branches.push(self.parse_conditional_branch()?);
        }

        let otherwise = if self.eat(TokenKind::Else) {
            Some(Box::new(self.parse_body()?))
        } else {
            None
        };

        Some(Expression::new(
            ExpressionKind::Conditional { branches, otherwise },
            self.span_from(start),
        ))
    }

    fn parse_conditional_branch(&mut self) -> Option<ConditionalBranch> {
        self.expect(TokenKind::LeftParen);
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen);
        let body = self.parse_body()?;
        Some(ConditionalBranch { condition, body })
    }

    fn parse_for_loop(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;

        // Missing parentheses are reported but do not stop the loop
        self.expect(TokenKind::LeftParen);

        let counter = if self.check(TokenKind::Identifier) && self.peek_nth_kind(1) == TokenKind::Comma {
            let name = self.bump().text().unwrap_or_default().to_string();
            self.bump();
            Some(name)
        } else {
            None
        };

        let first = self.parse_expression()?;
        let range = if self.eat(TokenKind::Colon) {
            let end = self.parse_expression()?;
            let step = if self.eat(TokenKind::Colon) {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            Range {
                start: Some(Box::new(first)),
                end: Box::new(end),
                step,
            }
        } else {
            Range {
                start: None,
                end: Box::new(first),
                step: None,
            }
        };

        self.expect(TokenKind::RightParen);
        let body = self.parse_body()?;

        Some(Expression::new(
            ExpressionKind::ForLoop {
                counter,
                range,
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    fn parse_while_loop(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;

        self.expect(TokenKind::LeftParen);
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen);
        let body = self.parse_body()?;

        Some(Expression::new(
            ExpressionKind::WhileLoop {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    fn parse_function_definition(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;

        self.expect(TokenKind::LeftParen);
        let mut parameters: Vec<Parameter> = Vec::new();
        if !self.eat(TokenKind::RightParen) {
            loop {
                let parameter = self.parse_parameter()?;
                if parameters.iter().any(|p| p.name == parameter.name) {
                    self.raise(SyntaxError::DuplicateParameter {
                        name: parameter.name.clone(),
                        position: parameter.span.start,
                    });
                }
                parameters.push(parameter);

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightParen);
        }

        let body = self.parse_body()?;
        let span = self.span_from(start);

        let definition = FunctionDefinition { parameters, body, span };
        Some(Expression::new(
            ExpressionKind::FunctionDefinition(Rc::new(definition)),
            span,
        ))
    }

    fn parse_parameter(&mut self) -> Option<Parameter> {
        let start = self.current_start();
        let is_const = self.eat(TokenKind::Const);

        let name = match self.peek_kind() {
            TokenKind::Identifier => self.bump().text().unwrap_or_default().to_string(),
            TokenKind::Comma | TokenKind::RightParen => {
                self.expected_expression();
                return None;
            }
            _ => {
                self.expect(TokenKind::Identifier);
                return None;
            }
        };

        let non_null = self.eat(TokenKind::Bang);

        Some(Parameter {
            name,
            is_const,
            non_null,
            span: self.span_from(start),
        })
    }

    // ==================== Pattern Matching ====================

    fn parse_pattern_matching(&mut self) -> Option<Expression> {
        let start = self.bump().span.start;

        self.expect(TokenKind::LeftParen);
        let argument = self.parse_expression()?;
        self.expect(TokenKind::RightParen);
        self.expect(TokenKind::LeftBrace);

        let mut branches = Vec::new();
        let mut has_default = false;

        while !matches!(self.peek_kind(), TokenKind::RightBrace | TokenKind::EndOfText) {
            let branch_start = self.current_start();

            let pattern = if self.eat(TokenKind::Default) {
                if has_default {
                    self.raise(SyntaxError::DuplicateDefaultBranch { position: branch_start });
                }
                has_default = true;
                None
            } else {
                Some(self.parse_pattern()?)
            };

            self.expect(TokenKind::Colon);
            let consequent = self.parse_body()?;
            self.expect(TokenKind::Semicolon);

            branches.push(MatchBranch {
                pattern,
                consequent,
                span: self.span_from(branch_start),
            });
        }

        self.expect(TokenKind::RightBrace);

        Some(Expression::new(
            ExpressionKind::PatternMatching {
                argument: Box::new(argument),
                branches,
            },
            self.span_from(start),
        ))
    }

    fn parse_pattern(&mut self) -> Option<Expression> {
        let mut left = self.parse_pattern_conjunction()?;
        while self.eat(TokenKind::Or) {
            let right = self.parse_pattern_conjunction()?;
            left = Expression::binary(left, Operator::MatchOr, right);
        }
        Some(left)
    }

    fn parse_pattern_conjunction(&mut self) -> Option<Expression> {
        let mut left = self.parse_pattern_atom()?;
        while self.eat(TokenKind::And) {
            let right = self.parse_pattern_atom()?;
            left = Expression::binary(left, Operator::MatchAnd, right);
        }
        Some(left)
    }

    fn parse_pattern_atom(&mut self) -> Option<Expression> {
        let kind = self.peek_kind();

        if let Some(operator) = comparison_operator(kind).and_then(match_operator) {
            let start = self.bump().span;
            let operand = self.parse_concatenation()?;
            return Some(Expression::unary(operator, operand, start));
        }

        if kind == TokenKind::Is {
            let start = self.bump().span;
            let operator = if self.eat(TokenKind::Not) {
                Operator::MatchIsNot
            } else {
                Operator::MatchIs
            };
            let target = self.parse_type_expression()?;
            return Some(Expression::unary(operator, target, start));
        }

        // A parenthesized group of patterns, told apart from a grouped
        // expression by the token after the parenthesis
        if kind == TokenKind::LeftParen && starts_pattern_group(self.peek_nth_kind(1)) {
            let start = self.bump().span.start;
            let inner = self.parse_pattern()?;
            self.expect(TokenKind::RightParen);
            return Some(Expression::new(
                ExpressionKind::Grouping(Box::new(inner)),
                self.span_from(start),
            ));
        }

        self.parse_expression()
    }
}

impl Iterator for Parser<'_> {
    type Item = ParseOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_at_end() {
            None
        } else {
            Some(self.advance())
        }
    }
}

// ==================== Token Classification ====================

fn can_start_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LiteralInteger
            | TokenKind::LiteralFloat
            | TokenKind::LiteralString
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::Identifier
            | TokenKind::LeftParen
            | TokenKind::LeftBrace
            | TokenKind::If
            | TokenKind::For
            | TokenKind::While
            | TokenKind::Functi
            | TokenKind::Match
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Bang
    ) || kind.is_type_name()
}

fn starts_pattern_group(kind: TokenKind) -> bool {
    kind == TokenKind::Is || kind == TokenKind::LeftParen || comparison_operator(kind).is_some()
}

fn assignment_operator(kind: TokenKind) -> Option<Operator> {
    match kind {
        TokenKind::Assign => Some(Operator::Assign),
        TokenKind::PlusAssign => Some(Operator::AddAssign),
        TokenKind::MinusAssign => Some(Operator::SubtractAssign),
        TokenKind::StarAssign => Some(Operator::MultiplyAssign),
        TokenKind::SlashAssign => Some(Operator::DivideAssign),
        TokenKind::PercentAssign => Some(Operator::RemainderAssign),
        _ => None,
    }
}

fn comparison_operator(kind: TokenKind) -> Option<Operator> {
    match kind {
        TokenKind::Less => Some(Operator::Less),
        TokenKind::LessEqual => Some(Operator::LessEqual),
        TokenKind::Greater => Some(Operator::Greater),
        TokenKind::GreaterEqual => Some(Operator::GreaterEqual),
        TokenKind::EqualEqual => Some(Operator::Equal),
        TokenKind::NotEqual => Some(Operator::NotEqual),
        _ => None,
    }
}

fn match_operator(comparison: Operator) -> Option<Operator> {
    match comparison {
        Operator::Less => Some(Operator::MatchLess),
        Operator::LessEqual => Some(Operator::MatchLessEqual),
        Operator::Greater => Some(Operator::MatchGreater),
        Operator::GreaterEqual => Some(Operator::MatchGreaterEqual),
        Operator::Equal => Some(Operator::MatchEqual),
        Operator::NotEqual => Some(Operator::MatchNotEqual),
        _ => None,
    }
}

fn type_name(kind: TokenKind) -> Option<TypeName> {
    match kind {
        TokenKind::TypeInt => Some(TypeName::Int),
        TokenKind::TypeFloat => Some(TypeName::Float),
        TokenKind::TypeString => Some(TypeName::String),
        TokenKind::TypeBool => Some(TypeName::Bool),
        TokenKind::TypeFunction => Some(TypeName::Function),
        TokenKind::Null => Some(TypeName::Null),
        _ => None,
    }
}

fn literal_from_token(token: &Token) -> Literal {
    match (token.kind, &token.value) {
        (TokenKind::True, _) => Literal::Bool(true),
        (TokenKind::False, _) => Literal::Bool(false),
        (TokenKind::Null, _) => Literal::Null,
        (_, Some(TokenValue::Integer(value))) => Literal::Integer(*value),
        (_, Some(TokenValue::Float(value))) => Literal::Float(*value),
        (_, Some(TokenValue::String(text))) => Literal::String(text.clone()),
        (TokenKind::LiteralInteger, None) => Literal::Integer(0),
        (TokenKind::LiteralFloat, None) => Literal::Float(0.0),
        _ => Literal::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Compact prefix rendering of an expression tree
    fn render(expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Literal(Literal::Integer(value)) => value.to_string(),
            ExpressionKind::Literal(Literal::String(text)) => format!("{text:?}"),
            ExpressionKind::Literal(literal) => format!("{literal:?}"),
            ExpressionKind::Type(target) => target.to_string(),
            ExpressionKind::Grouping(inner) => format!("[{}]", render(inner)),
            ExpressionKind::Binary { left, operator, right } => {
                format!("({} {} {})", operator, render(left), render(right))
            }
            ExpressionKind::Unary { operator, operand } => format!("({} {})", operator, render(operand)),
            ExpressionKind::FunctionCall { callee, arguments } => {
                let mut out = format!("(call {}", render(callee));
                for argument in arguments {
                    out.push(' ');
                    out.push_str(&render(argument));
                }
                out.push(')');
                out
            }
            ExpressionKind::TypeCast { target, operand } => format!("({} {})", target, render(operand)),
            other => format!("{other:?}"),
        }
    }

    fn parse_expression(source: &str) -> String {
        let mut parser = Parser::new(source);
        let outcome = parser.advance();
        assert!(outcome.success, "{source}: {:?}", parser.syntax_diagnostics());
        match outcome.statement.map(|s| s.kind) {
            Some(StatementKind::Expression(expression)) => render(&expression),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    fn parse_all(source: &str) -> (Vec<ParseOutcome>, DiagnosticLog<SyntaxError, SyntaxWarning>) {
        let mut parser = Parser::new(source);
        let outcomes: Vec<_> = parser.by_ref().collect();
        let mut log = DiagnosticLog::new();
        parser.drain_syntax_into(&mut log);
        (outcomes, log)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse_expression("a + b * c"), "(+ a (* b c))");
        assert_eq!(parse_expression("a * b - c / d % e"), "(- (* a b) (% (/ c d) e))");
        assert_eq!(parse_expression("a .. b == c"), "(== (.. a b) c)");
        assert_eq!(parse_expression("a is not int && b"), "(&& (is not a int) b)");
        assert_eq!(parse_expression("x ?? y ?> f || z"), "(?? x (?> y (|| f z)))");
        assert_eq!(parse_expression("!a && b || c"), "(|| (&& (! a) b) c)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(parse_expression("a = b = c"), "(= a (= b c))");
        assert_eq!(parse_expression("a += b ?? 1"), "(+= a (?? b 1))");
    }

    #[test]
    fn test_exponent() {
        assert_eq!(parse_expression("2 ^ 3 ^ 2"), "(^ 2 (^ 3 2))");
        assert_eq!(parse_expression("-a ^ b"), "(- (^ a b))");
        assert_eq!(parse_expression("a ^ -b"), "(^ a (- b))");
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(parse_expression("math.sqrt(2)"), "(call (. math sqrt) 2)");
        assert_eq!(parse_expression("f(1, g())(x)"), "(call (call f 1 (call g)) x)");
        assert_eq!(parse_expression("(a + b) * c"), "(* [(+ a b)] c)");
    }

    #[test]
    fn test_types_and_casts() {
        assert_eq!(parse_expression("int(\"4\") + 1"), "(+ (int \"4\") 1)");
        assert_eq!(parse_expression("x is null"), "(is x null)");
        assert_eq!(parse_expression("string"), "string");
    }

    #[test]
    fn test_statement_termination() {
        let (outcomes, log) = parse_all("init a = 1, const b = 2; a");
        assert!(log.is_empty());
        assert_eq!(outcomes.len(), 2);

        let first = outcomes[0].statement.as_ref().unwrap();
        assert!(first.terminated);
        match &first.kind {
            StatementKind::VariableInitList(inits) => {
                assert_eq!(inits.len(), 2);
                assert_eq!(inits[0].name, "a");
                assert!(!inits[0].is_const);
                assert_eq!(inits[1].name, "b");
                assert!(inits[1].is_const);
            }
            other => panic!("unexpected {other:?}"),
        }

        let second = outcomes[1].statement.as_ref().unwrap();
        assert!(!second.terminated);
    }

    #[test]
    fn test_namespace_import() {
        let (outcomes, _) = parse_all("pull math.sqrt;");
        assert_eq!(
            outcomes[0].statement.as_ref().unwrap().kind,
            StatementKind::NamespaceImport {
                path: vec!["math".to_string(), "sqrt".to_string()]
            }
        );
    }

    #[test]
    fn test_const_requires_initializer() {
        let (outcomes, log) = parse_all("init const a;");
        assert!(!outcomes[0].success);
        assert!(outcomes[0].statement.is_some());
        assert!(matches!(
            log.errors[..],
            [SyntaxError::ImplicitConstInitialization { ref name, .. }] if name == "a"
        ));
    }

    #[test]
    fn test_null_initialization_warning() {
        let (outcomes, log) = parse_all("init a = null; init const b = null;");
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(log.warnings.len(), 1);
        assert!(matches!(
            log.warnings[0],
            SyntaxWarning::NullInitialization { ref name, .. } if name == "a"
        ));
    }

    #[test]
    fn test_ignored_result_warning() {
        let (_, log) = parse_all("a; (1); f(); a = 2; a");
        assert_eq!(log.warnings.len(), 2);
        assert!(log
            .warnings
            .iter()
            .all(|w| matches!(w, SyntaxWarning::IgnoredResult { .. })));
    }

    #[test]
    fn test_block_yields_last_unterminated_statement() {
        let (outcomes, log) = parse_all("{ init a = 1; a }");
        assert!(log.is_empty());
        match &outcomes[0].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression { kind: ExpressionKind::Block(statements), .. }) => {
                assert_eq!(statements.len(), 2);
                assert!(statements[0].terminated);
                assert!(!statements[1].terminated);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_block_missing_closing_brace() {
        let (outcomes, log) = parse_all("{ a b }");
        assert!(!outcomes[0].success);
        assert_eq!(
            log.errors[0],
            SyntaxError::UnexpectedToken {
                actual: TokenKind::Identifier,
                expected: TokenKind::RightBrace,
                position: Position::new(4, 1, 5),
            }
        );
    }

    #[test]
    fn test_for_loop_forms() {
        let (outcomes, log) = parse_all("for (i, 0:10:2) i; for (3) x;");
        assert!(log.errors.is_empty());
        match &outcomes[0].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression {
                kind: ExpressionKind::ForLoop { counter, range, .. },
                ..
            }) => {
                assert_eq!(counter.as_deref(), Some("i"));
                assert!(range.start.is_some());
                assert!(range.step.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        match &outcomes[1].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression {
                kind: ExpressionKind::ForLoop { counter: None, range, .. },
                ..
            }) => {
                assert!(range.start.is_none());
                assert_eq!(render(&range.end), "3");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_for_loop_missing_parentheses_are_reported_independently() {
        let (outcomes, log) = parse_all("for i, 3 x;");
        assert!(outcomes[0].statement.is_some());
        assert!(!outcomes[0].success);
        assert_eq!(
            log.errors
                .iter()
                .map(|e| match e {
                    SyntaxError::UnexpectedToken { expected, .. } => *expected,
                    other => panic!("unexpected {other:?}"),
                })
                .collect::<Vec<_>>(),
            vec![TokenKind::LeftParen, TokenKind::RightParen]
        );
    }

    #[test]
    fn test_conditional() {
        let (outcomes, log) = parse_all("if (a) 1 elif (b) 2 else 3;");
        assert!(log.errors.is_empty());
        match &outcomes[0].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression {
                kind: ExpressionKind::Conditional { branches, otherwise },
                ..
            }) => {
                assert_eq!(branches.len(), 2);
                assert!(otherwise.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_conditional_missing_body() {
        let (outcomes, log) = parse_all("if (a) ;");
        assert!(!outcomes[0].success);
        assert!(matches!(
            log.errors[0],
            SyntaxError::ExpectedExpression { actual: TokenKind::Semicolon, .. }
        ));
    }

    #[test]
    fn test_function_parameters() {
        let (outcomes, log) = parse_all("functi(a, const b!) { a };");
        assert!(log.errors.is_empty());
        match &outcomes[0].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression {
                kind: ExpressionKind::FunctionDefinition(definition),
                ..
            }) => {
                let names: Vec<_> = definition.parameters.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert!(definition.parameters[1].is_const);
                assert!(definition.parameters[1].non_null);
                assert!(!definition.parameters[0].non_null);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_function_parameter_errors() {
        let (_, log) = parse_all("functi(a, a) a;");
        assert!(matches!(
            log.errors[..],
            [SyntaxError::DuplicateParameter { ref name, .. }] if name == "a"
        ));

        let (outcomes, log) = parse_all("functi(a, ) a;");
        assert!(!outcomes[0].success);
        assert!(matches!(
            log.errors[0],
            SyntaxError::ExpectedExpression { actual: TokenKind::RightParen, .. }
        ));
    }

    #[test]
    fn test_pattern_matching() {
        let source = "match (x) { < 3 and > 0: \"small\"; is string or is null: \"text\"; (== 5 or == 6): 1; default: 2; };";
        let (outcomes, log) = parse_all(source);
        assert!(log.errors.is_empty(), "{:?}", log.errors);
        match &outcomes[0].statement.as_ref().unwrap().kind {
            StatementKind::Expression(Expression {
                kind: ExpressionKind::PatternMatching { branches, .. },
                ..
            }) => {
                assert_eq!(branches.len(), 4);
                let patterns: Vec<_> = branches
                    .iter()
                    .map(|b| b.pattern.as_ref().map(render))
                    .collect();
                assert_eq!(
                    patterns,
                    vec![
                        Some("(and (< 3) (> 0))".to_string()),
                        Some("(or (is string) (is null))".to_string()),
                        Some("[(or (== 5) (== 6))]".to_string()),
                        None,
                    ]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pattern_matching_errors() {
        let (_, log) = parse_all("match (x) { default: 1; default: 2; };");
        assert!(matches!(log.errors[..], [SyntaxError::DuplicateDefaultBranch { .. }]));

        let (outcomes, log) = parse_all("match (x) { 1 2; };");
        assert!(!outcomes[0].success);
        assert!(matches!(
            log.errors[0],
            SyntaxError::UnexpectedToken { expected: TokenKind::Colon, .. }
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (outcomes, log) = parse_all("1 = 2;");
        assert!(!outcomes[0].success);
        assert!(matches!(log.errors[..], [SyntaxError::InvalidAssignmentTarget { .. }]));
    }

    #[test]
    fn test_return_and_break_statements() {
        let (outcomes, log) = parse_all("return; return 1; break; break_if(a > 1);");
        assert!(log.errors.is_empty());
        let kinds: Vec<_> = outcomes.into_iter().map(|o| o.statement.unwrap().kind).collect();
        assert!(matches!(kinds[0], StatementKind::Return(None)));
        assert!(matches!(kinds[1], StatementKind::Return(Some(_))));
        assert!(matches!(kinds[2], StatementKind::Break));
        assert!(matches!(kinds[3], StatementKind::BreakIf(_)));
    }

    #[test]
    fn test_braced_body_ends_at_its_brace() {
        let mut parser = Parser::new("functi() { 1 }(2)");
        let outcome = parser.advance();
        assert!(outcome.success);
        match outcome.statement.map(|s| s.kind) {
            Some(StatementKind::Expression(Expression {
                kind: ExpressionKind::FunctionCall { callee, arguments },
                ..
            })) => {
                assert!(matches!(callee.kind, ExpressionKind::FunctionDefinition(_)));
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(parse_expression("a /* c */ + // note\n b"), "(+ a b)");
    }

    #[test]
    fn test_recovery_always_progresses() {
        let (outcomes, _) = parse_all(") ) a;");
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
    }

    #[test]
    fn test_lexical_errors_fail_the_statement() {
        let mut parser = Parser::new("a # b;");
        let outcome = parser.advance();
        assert!(!outcome.success);
        assert_eq!(parser.lexical_diagnostics().errors.len(), 1);
    }

    #[test]
    fn test_statement_span() {
        let mut parser = Parser::new("  init a = 1;");
        let statement = parser.advance().statement.unwrap();
        assert_eq!(statement.span.start, Position::new(2, 1, 3));
        assert_eq!(statement.span.end, Position::new(13, 1, 14));
    }
}
