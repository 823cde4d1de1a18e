//! Regular-expression front end.
//!
//! A pattern is turned into postfix form in small, separately testable
//! passes:
//!
//! 1. [`tokenize`]: drop whitespace, split into literals and operators,
//!    check `()`/`[]` balance;
//! 2. [`validate`]: reject operator sequences with no meaning;
//! 3. [`rewrite`]: `e?` becomes `(e|&)`, `e+` becomes `(e e*)`;
//! 4. [`expand_classes`]: `[a-cx]` becomes `(a|b|c|x)`;
//! 5. [`insert_concatenation`]: make concatenation explicit;
//! 6. [`to_postfix`]: shunting-yard over `*`, concatenation and `|`.
//!
//! [`compile`] runs all of them and builds the annotated [`SyntaxTree`].
//!
//! Escapes: `\c` is always the literal `c`. An unescaped `.` is an explicit
//! concatenation and is dropped, since concatenation is re-inserted anyway.
//! `&` is ε and `-` is only meaningful inside a class.

use super::tree::SyntaxTree;
use lexslr::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Regular-expression operators. [`Op::Concat`] never appears in patterns;
/// it is inserted by [`insert_concatenation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    LParen,
    RParen,
    LBrack,
    RBrack,
    Star,
    Plus,
    Question,
    Alt,
    Dash,
    Epsilon,
    Concat,
}

impl Op {
    fn from_char(c: char) -> Option<Op> {
        Some(match c {
            '(' => Op::LParen,
            ')' => Op::RParen,
            '[' => Op::LBrack,
            ']' => Op::RBrack,
            '*' => Op::Star,
            '+' => Op::Plus,
            '?' => Op::Question,
            '|' => Op::Alt,
            '-' => Op::Dash,
            '&' => Op::Epsilon,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            Op::LParen => '(',
            Op::RParen => ')',
            Op::LBrack => '[',
            Op::RBrack => ']',
            Op::Star => '*',
            Op::Plus => '+',
            Op::Question => '?',
            Op::Alt => '|',
            Op::Dash => '-',
            Op::Epsilon => '&',
            Op::Concat => '.',
        }
    }

    fn is_postfix(self) -> bool {
        matches!(self, Op::Star | Op::Plus | Op::Question)
    }

    fn precedence(self) -> u8 {
        match self {
            Op::Star => 2,
            Op::Concat => 1,
            _ => 0,
        }
    }
}

/// One lexical unit of a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegexToken {
    Literal(char),
    Operator(Op),
}

use RegexToken::{Literal, Operator as O};

impl RegexToken {
    /// A literal or ε.
    fn is_operand(self) -> bool {
        matches!(self, Literal(_) | O(Op::Epsilon))
    }

    fn ends_operand(self) -> bool {
        self.is_operand() || matches!(self, O(Op::Star | Op::RParen | Op::RBrack))
    }

    fn starts_operand(self) -> bool {
        self.is_operand() || matches!(self, O(Op::LParen | Op::LBrack))
    }
}

impl fmt::Display for RegexToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Literal(c) if Op::from_char(c).is_some() || c == '\\' || c == '.' => write!(f, "\\{}", c),
            Literal(c) => write!(f, "{}", c),
            O(op) => write!(f, "{}", op.as_char()),
        }
    }
}

/// Renders tokens back to pattern syntax, escaping literal operator characters.
pub fn render(tokens: &[RegexToken]) -> String {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// Splits `pattern` into tokens, checking that parentheses and brackets nest.
///
/// # Errors
/// [`Error::MalformedExpression`] on imbalance, a dangling `\` or an empty
/// pattern.
pub fn tokenize(pattern: &str) -> Result<Vec<RegexToken>> {
    let mut tokens = Vec::new();
    let mut open: Vec<Op> = Vec::new();
    let mut chars = pattern.chars().filter(|c| !c.is_whitespace());
    while let Some(c) = chars.next() {
        let token = match c {
            '\\' => match chars.next() {
                Some(escaped) => Literal(escaped),
                None => return Err(Error::malformed(pattern)),
            },
            '.' => continue,
            c => Op::from_char(c).map_or(Literal(c), O),
        };
        if let O(op) = token {
            match op {
                Op::LParen | Op::LBrack => open.push(op),
                Op::RParen | Op::RBrack => {
                    let expected = if op == Op::RParen { Op::LParen } else { Op::LBrack };
                    if open.pop() != Some(expected) {
                        return Err(Error::malformed(pattern));
                    }
                }
                _ => {}
            }
        }
        tokens.push(token);
    }
    if !open.is_empty() || tokens.is_empty() {
        return Err(Error::malformed(pattern));
    }
    Ok(tokens)
}

/// Rejects operators that have nothing to apply to: a postfix operator or
/// `|` at the start, after `(` or after `|`; a postfix operator after another
/// one; `|` at the end or before `)`; an empty group; `-` outside a class.
/// Class contents are checked by [`expand_classes`].
pub fn validate(tokens: &[RegexToken]) -> Result<()> {
    let pair = |prev: Option<RegexToken>, tok: RegexToken| {
        let prev = prev.map(|p| p.to_string()).unwrap_or_default();
        Error::operator_sequence(format!("{}{}", prev, tok))
    };
    let mut prev: Option<RegexToken> = None;
    let mut in_class = false;
    for &tok in tokens {
        if in_class {
            in_class = tok != O(Op::RBrack);
            prev = Some(tok);
            continue;
        }
        match tok {
            O(op) if op.is_postfix() || op == Op::Alt => {
                let dangling = match prev {
                    None => true,
                    Some(O(p)) => matches!(p, Op::LParen | Op::Alt) || (p.is_postfix() && op.is_postfix()),
                    Some(Literal(_)) => false,
                };
                if dangling {
                    return Err(pair(prev, tok));
                }
            }
            O(Op::RParen) if matches!(prev, Some(O(Op::LParen | Op::Alt))) => {
                return Err(pair(prev, tok));
            }
            O(Op::Dash) => return Err(Error::operator_sequence("-")),
            O(Op::LBrack) => in_class = true,
            _ => {}
        }
        prev = Some(tok);
    }
    if let Some(O(Op::Alt)) = prev {
        return Err(Error::operator_sequence("|"));
    }
    Ok(())
}

/// Index at which the operand ending at the top of `out` begins.
fn operand_start(out: &[RegexToken]) -> Option<usize> {
    let mut i = out.len().checked_sub(1)?;
    while out[i] == O(Op::Star) {
        i = i.checked_sub(1)?;
    }
    let (open, close) = match out[i] {
        O(Op::RParen) => (O(Op::LParen), O(Op::RParen)),
        O(Op::RBrack) => (O(Op::LBrack), O(Op::RBrack)),
        tok if tok.is_operand() => return Some(i),
        _ => return None,
    };
    let mut depth = 0usize;
    loop {
        if out[i] == close {
            depth += 1;
        } else if out[i] == open {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i = i.checked_sub(1)?;
    }
}

/// Rewrites `?` and `+` into primitive operators. The operand is the
/// preceding literal, or the whole preceding `(...)` or `[...]` group.
pub fn rewrite(tokens: &[RegexToken]) -> Result<Vec<RegexToken>> {
    let mut out: Vec<RegexToken> = Vec::with_capacity(tokens.len());
    let mut in_class = false;
    for &tok in tokens {
        match tok {
            O(op @ (Op::Question | Op::Plus)) if !in_class => {
                let start = operand_start(&out).ok_or_else(|| Error::operator_sequence(op.as_char().to_string()))?;
                let operand = out.split_off(start);
                out.push(O(Op::LParen));
                out.extend_from_slice(&operand);
                if op == Op::Question {
                    out.extend([O(Op::Alt), O(Op::Epsilon)]);
                } else {
                    out.extend_from_slice(&operand);
                    out.push(O(Op::Star));
                }
                out.push(O(Op::RParen));
            }
            _ => {
                match tok {
                    O(Op::LBrack) => in_class = true,
                    O(Op::RBrack) => in_class = false,
                    _ => {}
                }
                out.push(tok);
            }
        }
    }
    Ok(out)
}

fn same_class(lo: char, hi: char) -> bool {
    (lo.is_ascii_uppercase() && hi.is_ascii_uppercase())
        || (lo.is_ascii_lowercase() && hi.is_ascii_lowercase())
        || (lo.is_ascii_digit() && hi.is_ascii_digit())
}

/// Members of one `[...]` class, given with its brackets.
fn class_members(class: &[RegexToken]) -> Result<BTreeSet<RegexToken>> {
    let inner = &class[1..class.len() - 1];
    if inner.is_empty() {
        return Err(Error::malformed(render(class)));
    }
    let mut members = BTreeSet::new();
    for (k, &tok) in inner.iter().enumerate() {
        match tok {
            tok if tok.is_operand() => {
                members.insert(tok);
            }
            O(Op::Dash) => {
                let lo = k.checked_sub(1).map(|j| inner[j]);
                let hi = inner.get(k + 1).copied();
                let (Some(Literal(lo)), Some(Literal(hi))) = (lo, hi) else {
                    return Err(Error::invalid_range(render(class)));
                };
                if !same_class(lo, hi) || lo > hi {
                    return Err(Error::invalid_range(format!("[{}-{}]", lo, hi)));
                }
                members.extend((lo..=hi).map(Literal));
            }
            _ => return Err(Error::malformed(render(class))),
        }
    }
    Ok(members)
}

/// Replaces every `[...]` class with a parenthesised alternation of its
/// members in sorted order.
///
/// # Errors
/// [`Error::InvalidRange`] if a range mixes case/digit classes or runs
/// backwards; [`Error::MalformedExpression`] for an empty class or an
/// operator inside one.
pub fn expand_classes(tokens: &[RegexToken]) -> Result<Vec<RegexToken>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] != O(Op::LBrack) {
            out.push(tokens[i]);
            i += 1;
            continue;
        }
        let end = tokens[i..]
            .iter()
            .position(|t| *t == O(Op::RBrack))
            .map(|n| i + n)
            .ok_or_else(|| Error::malformed(render(&tokens[i..])))?;
        let members = class_members(&tokens[i..=end])?;
        out.push(O(Op::LParen));
        for (k, member) in members.into_iter().enumerate() {
            if k > 0 {
                out.push(O(Op::Alt));
            }
            out.push(member);
        }
        out.push(O(Op::RParen));
        i = end + 1;
    }
    Ok(out)
}

/// Inserts [`Op::Concat`] between every token that can end an operand and
/// the following token that can start one.
pub fn insert_concatenation(tokens: &[RegexToken]) -> Vec<RegexToken> {
    let mut out: Vec<RegexToken> = Vec::with_capacity(tokens.len() * 2);
    for &tok in tokens {
        if let Some(&prev) = out.last() {
            if prev.ends_operand() && tok.starts_operand() {
                out.push(O(Op::Concat));
            }
        }
        out.push(tok);
    }
    out
}

/// Shunting-yard conversion to postfix. Parentheses are consumed.
pub fn to_postfix(tokens: &[RegexToken]) -> Vec<RegexToken> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Op> = Vec::new();
    for &tok in tokens {
        match tok {
            Literal(_) | O(Op::Epsilon) => output.push(tok),
            O(Op::LParen) => stack.push(Op::LParen),
            O(Op::RParen) => {
                while let Some(op) = stack.pop() {
                    if op == Op::LParen {
                        break;
                    }
                    output.push(O(op));
                }
            }
            O(op) => {
                while let Some(&top) = stack.last() {
                    if top == Op::LParen || top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(O(top));
                    stack.pop();
                }
                stack.push(op);
            }
        }
    }
    while let Some(op) = stack.pop() {
        if op != Op::LParen {
            output.push(O(op));
        }
    }
    output
}

/// Compiles `pattern` into an annotated syntax tree ending in the accepting
/// marker.
pub fn compile(pattern: &str) -> Result<SyntaxTree> {
    let tokens = tokenize(pattern)?;
    validate(&tokens)?;
    let tokens = rewrite(&tokens)?;
    let tokens = expand_classes(&tokens)?;
    let tokens = insert_concatenation(&tokens);
    let postfix = to_postfix(&tokens);
    log::trace!("{:?} → {}", pattern, render(&postfix));
    SyntaxTree::from_postfix(&postfix)
}
