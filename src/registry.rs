use fnv::FnvHashMap;

use crate::board::{Board, Push};
use crate::zobrist::Zobrist;

/// Index of a node in the registry arena.
pub type NodeId = usize;

/// One visited configuration, linked to the node it was pushed from.
#[derive(Debug, Clone)]
pub struct Node {
    pub board: Board,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// The push that led here from `parent`
    pub push: Option<Push>,
}

/// Deduplicating store of every configuration a search has seen.
///
/// Nodes live in an arena and refer to their parent by index, so the search
/// tree is acyclic by construction. Buckets map a Zobrist hash to the nodes
/// sharing it; membership is decided by full board equality within a bucket.
pub struct Registry {
    zobrist: Box<Zobrist>,
    buckets: FnvHashMap<u64, Vec<NodeId>>,
    nodes: Vec<Node>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            zobrist: Box::new(Zobrist::new()),
            buckets: FnvHashMap::default(),
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn contains(&self, board: &Board) -> bool {
        let hash = self.zobrist.compute_hash(board);
        self.find(hash, board).is_some()
    }

    fn find(&self, hash: u64, board: &Board) -> Option<NodeId> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| self.nodes[id].board == *board)
    }

    /// Register a flood-filled board. Returns None if an equal board is
    /// already present.
    pub fn insert(
        &mut self,
        board: Board,
        depth: usize,
        parent: Option<NodeId>,
        push: Option<Push>,
    ) -> Option<NodeId> {
        let hash = self.zobrist.compute_hash(&board);
        if self.find(hash, &board).is_some() {
            return None;
        }

        let id = self.nodes.len();
        self.nodes.push(Node {
            board,
            depth,
            parent,
            push,
        });
        self.buckets.entry(hash).or_default().push(id);
        Some(id)
    }

    /// Node ids from the root down to `id`.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.nodes[id].depth + 1);
        let mut current = Some(id);
        while let Some(node_id) = current {
            path.push(node_id);
            current = self.nodes[node_id].parent;
        }
        path.reverse();
        path
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Direction, Position};

    fn filled(text: &str) -> Board {
        let mut board = Board::from_text(text).unwrap();
        board.flood_fill_reachable();
        board
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut registry = Registry::new();
        let a = filled("######\n#@  $#\n#   .#\n######");
        let b = filled("######\n#   $#\n#  @.#\n######");

        assert!(registry.insert(a, 0, None, None).is_some());
        assert!(registry.contains(&b));
        assert!(registry.insert(b, 1, Some(0), None).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_path_to_follows_parents() {
        let mut registry = Registry::new();
        let root = filled("#######\n#@$  .#\n#######");
        let root_id = registry.insert(root.clone(), 0, None, None).unwrap();

        let push = Push {
            box_pos: Position::new(2, 1),
            direction: Direction::Right,
        };
        let mut child = root.apply_push(push).unwrap();
        child.flood_fill_reachable();
        let child_id = registry.insert(child, 1, Some(root_id), Some(push)).unwrap();

        assert_eq!(registry.path_to(child_id), vec![root_id, child_id]);
        assert_eq!(registry.node(child_id).push, Some(push));
        assert_eq!(registry.node(root_id).parent, None);
    }
}
