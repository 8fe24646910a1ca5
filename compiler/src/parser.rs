// Parser for .pif interface files.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators.
//
// Grammar:
//   interface := NL* (item (NL+ item)*)? NL*
//   item      := 'param' IDENT ':' IDENT
//              | ('image' | 'output') IDENT ':' IDENT '[' INT ']'
//              | 'show' expr
//              | IDENT '.' IDENT '(' args ')'
//   expr      := term (('+' | '-') term)*
//   term      := unary (('*' | '/') unary)*
//   unary     := '-'? atom
//   atom      := INT | FLOAT | IDENT '.' IDENT '(' args ')' | IDENT '(' args ')'
//              | IDENT | '(' expr ')'
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub interface: Option<Interface>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an interface source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = interface_parser(source);
    let (interface, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        interface,
        errors: all_errors,
    }
}

/// Join two spans into one covering both.
fn cover(a: Span, b: Span) -> Span {
    (a.start()..b.end()).into()
}

fn binary(lhs: ExprAst, op: BinOp, rhs: ExprAst) -> ExprAst {
    let span = cover(lhs.span, rhs.span);
    ExprAst {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}

// ── Main parser builder ──

fn interface_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Interface, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Expressions ──

    let expr = recursive({
        let ident = ident.clone();
        move |expr| {
            let args = expr
                .clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen));

            let literal = select! {
                Token::Int(n) => ExprKind::Int(n),
                Token::Float(f) => ExprKind::Float(f),
            };

            let method = ident
                .clone()
                .then_ignore(just(Token::Dot))
                .then(ident.clone())
                .then(args.clone())
                .map_with(|((receiver, method), args), e| {
                    ExprKind::Method(MethodCall {
                        receiver,
                        method,
                        args,
                        span: e.span(),
                    })
                });

            let call = ident
                .clone()
                .then(args)
                .map(|(callee, args)| ExprKind::Call { callee, args });

            let name = ident.clone().map(ExprKind::Name);

            let atom = choice((literal, method, call, name))
                .map_with(|kind, e| ExprAst {
                    kind,
                    span: e.span(),
                })
                .or(expr
                    .clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)));

            let unary = just(Token::Minus)
                .or_not()
                .then(atom)
                .map_with(|(minus, operand), e| match minus {
                    Some(_) => ExprAst {
                        kind: ExprKind::Neg(Box::new(operand)),
                        span: e.span(),
                    },
                    None => operand,
                });

            let product_op = just(Token::Star)
                .to(BinOp::Mul)
                .or(just(Token::Slash).to(BinOp::Div));
            let product = unary
                .clone()
                .foldl(product_op.then(unary).repeated(), |lhs, (op, rhs)| {
                    binary(lhs, op, rhs)
                });

            let sum_op = just(Token::Plus)
                .to(BinOp::Add)
                .or(just(Token::Minus).to(BinOp::Sub));
            product
                .clone()
                .foldl(sum_op.then(product).repeated(), |lhs, (op, rhs)| {
                    binary(lhs, op, rhs)
                })
        }
    });

    // ── Declarations ──

    let param_item = just(Token::Param)
        .ignore_then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .map(|(name, ty)| ItemKind::Param(ParamDecl { name, ty }));

    let dims = select! {
        Token::Int(n) = e => (n, e.span()),
    }
    .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let image_decl = ident
        .clone()
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .then(dims)
        .map(|((name, ty), (dims, dims_span))| ImageDecl {
            name,
            ty,
            dims,
            dims_span,
        });

    let image_item = just(Token::Image)
        .ignore_then(image_decl.clone())
        .map(ItemKind::Image);

    let output_item = just(Token::Output)
        .ignore_then(image_decl)
        .map(ItemKind::Output);

    // ── Statements ──

    let show_item = just(Token::Show)
        .ignore_then(expr.clone())
        .map(ItemKind::Show);

    let method_item = expr.try_map(|e, span| match e.kind {
        ExprKind::Method(call) => Ok(ItemKind::Method(call)),
        _ => Err(Rich::custom(
            span,
            "expected a declaration, `show`, or a method call",
        )),
    });

    let item = choice((param_item, image_item, output_item, show_item, method_item)).map_with(
        |kind, e| Item {
            kind,
            span: e.span(),
        },
    );

    // ── Interface ──

    nl.clone()
        .ignore_then(
            item.separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|items, e| Interface {
            items,
            span: e.span(),
        })
}

// ── Tests ──
