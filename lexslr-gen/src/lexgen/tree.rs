//! Syntax trees for regular expressions and the followpos construction that
//! turns them directly into a DFA.
//!
//! Nodes live in an arena and are pushed children-first, so walking the
//! arena in index order visits every child before its parent. Each symbol
//! leaf gets a position id (1, 2, … in construction order); the last position
//! belongs to the accepting end marker `#`.

use super::regex::{Op, RegexToken, render};
use lexslr::{Automaton, Error, Label, Result};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub type PositionId = usize;
pub type NodeId = usize;

/// `followpos(p)` for every position that has followers.
pub type FollowposTable = BTreeMap<PositionId, BTreeSet<PositionId>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Matches `symbol`.
    Symbol { position: PositionId, symbol: char },
    /// Matches the empty string.
    Epsilon,
    /// The accepting marker appended to every expression.
    End { position: PositionId },
    Star(NodeId),
    Concat(NodeId, NodeId),
    Alt(NodeId, NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub nullable: bool,
    pub firstpos: BTreeSet<PositionId>,
    pub lastpos: BTreeSet<PositionId>,
}

/// An annotated syntax tree `(e).#`.
#[derive(Clone, Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: NodeId,
    end: PositionId,
    symbols: BTreeMap<PositionId, char>,
    followpos: FollowposTable,
}

impl SyntaxTree {
    /// Builds the tree for a postfix token sequence, appends the end marker
    /// and annotates every node.
    ///
    /// # Errors
    /// [`Error::MalformedExpression`] if the sequence does not reduce to a
    /// single expression.
    pub fn from_postfix(postfix: &[RegexToken]) -> Result<SyntaxTree> {
        let broken = || Error::malformed(render(postfix));
        let mut tree = SyntaxTree::default();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut next_position: PositionId = 1;
        for &tok in postfix {
            let kind = match tok {
                RegexToken::Literal(symbol) => {
                    let position = next_position;
                    next_position += 1;
                    tree.symbols.insert(position, symbol);
                    NodeKind::Symbol { position, symbol }
                }
                RegexToken::Operator(Op::Epsilon) => NodeKind::Epsilon,
                RegexToken::Operator(Op::Star) => NodeKind::Star(stack.pop().ok_or_else(broken)?),
                RegexToken::Operator(op @ (Op::Concat | Op::Alt)) => {
                    let right = stack.pop().ok_or_else(broken)?;
                    let left = stack.pop().ok_or_else(broken)?;
                    if op == Op::Concat {
                        NodeKind::Concat(left, right)
                    } else {
                        NodeKind::Alt(left, right)
                    }
                }
                RegexToken::Operator(_) => return Err(broken()),
            };
            stack.push(tree.push(kind));
        }
        let body = stack.pop().ok_or_else(broken)?;
        if !stack.is_empty() {
            return Err(broken());
        }
        let end = tree.push(NodeKind::End {
            position: next_position,
        });
        tree.end = next_position;
        tree.root = tree.push(NodeKind::Concat(body, end));
        tree.annotate();
        Ok(tree)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            nullable: false,
            firstpos: BTreeSet::new(),
            lastpos: BTreeSet::new(),
        });
        self.nodes.len() - 1
    }

    /// Computes `nullable`, `firstpos`, `lastpos` and the followpos table in
    /// a single pass over the arena.
    fn annotate(&mut self) {
        self.followpos.clear();
        for id in 0..self.nodes.len() {
            let kind = self.nodes[id].kind;
            let (nullable, firstpos, lastpos) = match kind {
                NodeKind::Symbol { position, .. } | NodeKind::End { position } => {
                    (false, BTreeSet::from([position]), BTreeSet::from([position]))
                }
                NodeKind::Epsilon => (true, BTreeSet::new(), BTreeSet::new()),
                NodeKind::Star(child) => {
                    let child = &self.nodes[child];
                    for &p in &child.lastpos {
                        self.followpos
                            .entry(p)
                            .or_default()
                            .extend(child.firstpos.iter().copied());
                    }
                    (true, child.firstpos.clone(), child.lastpos.clone())
                }
                NodeKind::Alt(left, right) => {
                    let (left, right) = (&self.nodes[left], &self.nodes[right]);
                    (
                        left.nullable || right.nullable,
                        left.firstpos.union(&right.firstpos).copied().collect(),
                        left.lastpos.union(&right.lastpos).copied().collect(),
                    )
                }
                NodeKind::Concat(left, right) => {
                    let (left, right) = (&self.nodes[left], &self.nodes[right]);
                    for &p in &left.lastpos {
                        self.followpos
                            .entry(p)
                            .or_default()
                            .extend(right.firstpos.iter().copied());
                    }
                    let firstpos = if left.nullable {
                        left.firstpos.union(&right.firstpos).copied().collect()
                    } else {
                        left.firstpos.clone()
                    };
                    let lastpos = if right.nullable {
                        left.lastpos.union(&right.lastpos).copied().collect()
                    } else {
                        right.lastpos.clone()
                    };
                    (left.nullable && right.nullable, firstpos, lastpos)
                }
            };
            let node = &mut self.nodes[id];
            node.nullable = nullable;
            node.firstpos = firstpos;
            node.lastpos = lastpos;
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Position of the accepting end marker.
    pub fn end_position(&self) -> PositionId {
        self.end
    }

    /// Symbol at each position, end marker excluded.
    pub fn symbols(&self) -> &BTreeMap<PositionId, char> {
        &self.symbols
    }

    pub fn followpos(&self) -> &FollowposTable {
        &self.followpos
    }

    /// Builds the DFA for this tree. States are sets of positions, named by
    /// joining the sorted positions with `.`; final states recognise `token`.
    pub fn to_automaton(&self, token: &str) -> Automaton {
        let name = |set: &BTreeSet<PositionId>| -> String {
            let parts: Vec<std::string::String> = set.iter().map(|p| p.to_string()).collect();
            parts.join(".").into()
        };
        let alphabet: BTreeSet<char> = self.symbols.values().copied().collect();

        let start = self.root().firstpos.clone();
        let mut fa = Automaton::new(name(&start));
        fa.alphabet = alphabet.clone();
        let mut seen: BTreeSet<BTreeSet<PositionId>> = BTreeSet::from([start.clone()]);
        let mut work: VecDeque<BTreeSet<PositionId>> = VecDeque::from([start]);

        while let Some(set) = work.pop_front() {
            let from = name(&set);
            if set.contains(&self.end) {
                fa.add_final(&from, Some(token));
            }
            for &c in &alphabet {
                let next: BTreeSet<PositionId> = set
                    .iter()
                    .filter(|p| self.symbols.get(p) == Some(&c))
                    .flat_map(|p| self.followpos.get(p).into_iter().flatten().copied())
                    .collect();
                if next.is_empty() {
                    continue;
                }
                fa.add_transition(&from, Label::Symbol(c), name(&next));
                if seen.insert(next.clone()) {
                    work.push_back(next);
                }
            }
        }
        log::debug!("token {:?}: {} states", token, fa.states.len());
        fa
    }
}
