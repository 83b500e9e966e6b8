//! Depth-first traversal of the syntax tree.
//!
//! [`walk`] owns the traversal order; a visitor only reacts through three
//! hooks. `between` fires after every child except the last, which is where
//! separators and infix operators go.

use crate::ast::Node;

/// What [`walk`] does after [`AstVisitor::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the node's children and its `leave` hook.
    SkipChildren,
}

pub trait AstVisitor {
    type Error;

    fn enter(&mut self, _node: &Node) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    /// Called after child `index` when another child follows it.
    fn between(&mut self, _node: &Node, _index: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn leave(&mut self, _node: &Node) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn walk<V: AstVisitor + ?Sized>(node: &Node, visitor: &mut V) -> Result<(), V::Error> {
    if visitor.enter(node)? == Flow::SkipChildren {
        return Ok(());
    }
    for (index, child) in node.children().into_iter().enumerate() {
        if index > 0 {
            visitor.between(node, index - 1)?;
        }
        walk(child, visitor)?;
    }
    visitor.leave(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use crate::ty::{BasicKind, ValueType};

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl AstVisitor for Trace {
        type Error = ();

        fn enter(&mut self, node: &Node) -> Result<Flow, ()> {
            self.0.push(format!("enter {}", node.kind_name()));
            match node {
                Node::Norm { .. } => Ok(Flow::SkipChildren),
                _ => Ok(Flow::Continue),
            }
        }

        fn between(&mut self, _node: &Node, index: usize) -> Result<(), ()> {
            self.0.push(format!("between {index}"));
            Ok(())
        }

        fn leave(&mut self, node: &Node) -> Result<(), ()> {
            self.0.push(format!("leave {}", node.kind_name()));
            Ok(())
        }
    }

    fn number(text: &str) -> Node {
        Node::Number {
            value: text.parse().unwrap(),
            text: text.into(),
        }
    }

    #[test]
    fn test_hooks_order() {
        let scalar = ValueType::single(BasicKind::Scalar);
        let tree = Node::Binary {
            op: BinaryOp::Add,
            left: Box::new(number("1")),
            right: Box::new(Node::Norm {
                expr: Box::new(number("2")),
                ty: scalar.clone(),
            }),
            ty: scalar,
        };
        let mut trace = Trace::default();
        walk(&tree, &mut trace).unwrap();
        assert_eq!(
            trace.0,
            [
                "enter binary operation",
                "enter number",
                "leave number",
                "between 0",
                "enter norm",
                "leave binary operation",
            ]
        );
    }
}
