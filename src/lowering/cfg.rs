//! Control flow graph over a lowered statement list
//!
//! A block starts at every label and right after every jump or return. The graph only stores
//! statement ranges, the statements themselves stay in the list it was built from.

use std::collections::{HashMap, VecDeque};

use crate::binding::BoundStatement;
use crate::symbols::Label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Index of the first statement
    pub start: usize,
    /// Index one past the last statement
    pub end: usize,
    pub successors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    statement_count: usize,
    /// Whether control can leave the last statement of a block without a jump or return
    falls_off_end: Vec<bool>,
}

impl ControlFlowGraph {
    /// Build the graph of a flat statement list.
    ///
    /// # Panics
    ///
    /// If a jump targets a label that is not part of the list. Lowering never produces such a
    /// jump, so this is a bug in an earlier pass.
    pub fn build(statements: &[BoundStatement]) -> Self {
        let mut starts = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            let after_jump = index > 0
                && matches!(
                    statements[index - 1],
                    BoundStatement::Goto(_)
                        | BoundStatement::ConditionalGoto { .. }
                        | BoundStatement::Return(_)
                );
            if index == 0 || after_jump || matches!(statement, BoundStatement::Label(_)) {
                starts.push(index);
            }
        }

        let mut labels: HashMap<&Label, usize> = HashMap::new();
        for (block, &start) in starts.iter().enumerate() {
            if let BoundStatement::Label(label) = &statements[start] {
                labels.insert(label, block);
            }
        }
        let block_of = |label: &Label| -> usize {
            match labels.get(label) {
                Some(&block) => block,
                None => panic!("jump to undefined label `{label}`"),
            }
        };

        let mut blocks = Vec::with_capacity(starts.len());
        let mut falls_off_end = Vec::with_capacity(starts.len());
        for (block, &start) in starts.iter().enumerate() {
            let end = starts.get(block + 1).copied().unwrap_or(statements.len());
            let next = (block + 1 < starts.len()).then_some(block + 1);

            let (successors, falls_through) = match &statements[end - 1] {
                BoundStatement::Goto(label) => (vec![block_of(label)], false),
                BoundStatement::Return(_) => (vec![], false),
                BoundStatement::ConditionalGoto { label, .. } => {
                    let mut successors: Vec<_> = next.into_iter().collect();
                    successors.push(block_of(label));
                    (successors, true)
                }
                _ => (next.into_iter().collect(), true),
            };

            blocks.push(BasicBlock {
                start,
                end,
                successors,
            });
            falls_off_end.push(falls_through && next.is_none());
        }

        Self {
            blocks,
            statement_count: statements.len(),
            falls_off_end,
        }
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Blocks reachable from the first one, in index order
    pub fn reachable_blocks(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.blocks.len()];
        let mut queue = VecDeque::new();
        if !self.blocks.is_empty() {
            reachable[0] = true;
            queue.push_back(0);
        }

        while let Some(block) = queue.pop_front() {
            for &successor in &self.blocks[block].successors {
                if !reachable[successor] {
                    reachable[successor] = true;
                    queue.push_back(successor);
                }
            }
        }
        reachable
    }

    /// For every statement of the list the graph was built from, whether it can execute
    pub fn reachable_statements(&self) -> Vec<bool> {
        let mut statements = vec![false; self.statement_count];
        for (block, reachable) in self.blocks.iter().zip(self.reachable_blocks()) {
            if reachable {
                statements[block.start..block.end].fill(true);
            }
        }
        statements
    }

    /// Whether no execution reaches the end of the list without a return.
    ///
    /// Paths that loop forever count as returning.
    pub fn all_paths_return(&self) -> bool {
        !self.blocks.is_empty()
            && self
                .reachable_blocks()
                .into_iter()
                .zip(&self.falls_off_end)
                .all(|(reachable, &falls_off)| !reachable || !falls_off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BoundExpression, BoundExpressionKind};
    use crate::symbols::{Constant, TypeTable, VariableId};
    use crate::util::Idx;

    fn label(name: &str) -> Label {
        Label::new(name)
    }

    fn condition() -> BoundExpression {
        let types = TypeTable::new();
        BoundExpression::new(
            BoundExpressionKind::Variable(VariableId::new(0)),
            types.bool(),
        )
    }

    fn unit() -> BoundStatement {
        let types = TypeTable::new();
        BoundStatement::Expression(BoundExpression::literal(Constant::Int(1), types.any()))
    }

    #[test]
    fn blocks_split_at_labels_and_jumps() {
        let statements = vec![
            unit(),
            BoundStatement::ConditionalGoto {
                label: label("else"),
                condition: condition(),
                jump_if_true: false,
            },
            unit(),
            BoundStatement::Goto(label("end")),
            BoundStatement::Label(label("else")),
            unit(),
            BoundStatement::Label(label("end")),
        ];

        let graph = ControlFlowGraph::build(&statements);
        let ranges: Vec<_> = graph.blocks().iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(ranges, [(0, 2), (2, 4), (4, 6), (6, 7)]);
        assert_eq!(graph.blocks()[0].successors, [1, 2]);
        assert_eq!(graph.blocks()[1].successors, [3]);
        assert_eq!(graph.blocks()[2].successors, [3]);
        assert!(graph.reachable_statements().iter().all(|&r| r));
        assert!(!graph.all_paths_return());
    }

    #[test]
    fn code_after_return_is_unreachable() {
        let statements = vec![
            BoundStatement::Return(None),
            unit(),
            BoundStatement::Label(label("skipped")),
            unit(),
        ];

        let graph = ControlFlowGraph::build(&statements);
        assert_eq!(graph.reachable_statements(), [true, false, false, false]);
        assert!(graph.all_paths_return());
    }

    #[test]
    fn endless_loops_return() {
        let statements = vec![
            BoundStatement::Label(label("continue")),
            unit(),
            BoundStatement::Goto(label("continue")),
        ];
        assert!(ControlFlowGraph::build(&statements).all_paths_return());
        assert!(!ControlFlowGraph::build(&[]).all_paths_return());
    }

    #[test]
    #[should_panic(expected = "undefined label")]
    fn unknown_labels_are_fatal() {
        ControlFlowGraph::build(&[BoundStatement::Goto(label("nowhere"))]);
    }
}
