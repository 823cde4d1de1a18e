use super::lexer::Token;
use chumsky::prelude::*;

/// One grammar line: a head and its alternative bodies, as symbol indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub head: usize,
    pub bodies: Vec<Vec<usize>>,
}

/// Parses the tokens of one non-empty line into a [`Rule`].
pub fn parser<'a>() -> impl Parser<'a, &'a [Token], Rule> {
    let symbol = select! {
        Token::Sym(s) => s,
    }
    .labelled("symbol");

    let derives = select! { Token::Derives => () }.labelled("::=");
    let alt = select! { Token::Alt => () }.labelled("|");

    let body = symbol.clone().repeated().collect::<Vec<_>>();
    let bodies = body.separated_by(alt).at_least(1).collect::<Vec<_>>();

    symbol
        .then_ignore(derives)
        .then(bodies)
        .then_ignore(end())
        .map(|(head, bodies)| Rule { head, bodies })
}
