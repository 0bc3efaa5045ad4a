// Value Provider - External literals for input blocks
//
// The UI owns the literal-entry widgets; the interpreter only asks for the
// text attached to an input block, once per block per run.

use std::collections::HashMap;

use blockscript_types::BlockId;

/// Source of literals for input blocks
pub trait ValueProvider: Send + Sync {
    /// Literal entered for `block`, if any
    fn provide_value(&self, block: BlockId) -> Option<String>;
}

impl<F> ValueProvider for F
where
    F: Fn(BlockId) -> Option<String> + Send + Sync,
{
    fn provide_value(&self, block: BlockId) -> Option<String> {
        self(block)
    }
}

impl ValueProvider for HashMap<BlockId, String> {
    fn provide_value(&self, block: BlockId) -> Option<String> {
        self.get(&block).cloned()
    }
}

#[cfg(test)]
mod tests {
    use blockscript_types::{BlockGraph, BlockKind};

    use super::*;

    #[test]
    fn test_map_and_closure_providers() {
        let mut graph = BlockGraph::new();
        let a = graph.add_block(BlockKind::InputVariable, Some("a"));
        let b = graph.add_block(BlockKind::InputVariable, Some("b"));

        let map = HashMap::from([(a, "42".to_string())]);
        assert_eq!(map.provide_value(a).as_deref(), Some("42"));
        assert_eq!(map.provide_value(b), None);

        let closure = move |id: BlockId| (id == b).then(|| "hi".to_string());
        assert_eq!(closure.provide_value(b).as_deref(), Some("hi"));
        assert_eq!(closure.provide_value(a), None);
    }
}
