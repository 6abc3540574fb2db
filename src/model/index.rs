/// An opaque position in a [`TreeModel`](super::TreeModel).
///
/// A `ModelIndex` addresses a cell by row and column, plus the row of its parent if it is not a
/// top-level item. It owns nothing and points to nothing: the model rebuilds the shape of the
/// tree from these few numbers and its own bounds, so an index stays safe to use even after the
/// data behind it was replaced.
///
/// The default `ModelIndex` is invalid and stands for the (invisible) root of the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    position: Option<Position>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Position {
    row: usize,
    column: usize,
    parent_row: Option<usize>,
}

impl ModelIndex {
    /// The invalid index, which is also the root of the tree.
    pub const fn invalid() -> Self {
        Self { position: None }
    }

    /// Creates an index for `row` and `column` below `parent`.
    ///
    /// Only the row of `parent` is kept, so this can only express two levels below the root.
    /// Models should hand out indices through [`TreeModel::index`](super::TreeModel::index),
    /// which checks bounds; `encode` does not.
    pub fn encode(row: usize, column: usize, parent: ModelIndex) -> Self {
        Self {
            position: Some(Position {
                row,
                column,
                parent_row: parent.row(),
            }),
        }
    }

    /// Returns `true` unless this is the invalid/root index.
    pub fn is_valid(&self) -> bool {
        self.position.is_some()
    }

    /// The row of this index among its siblings.
    pub fn row(&self) -> Option<usize> {
        self.position.map(|p| p.row)
    }

    /// The column of this index.
    pub fn column(&self) -> Option<usize> {
        self.position.map(|p| p.column)
    }

    /// The row of the parent, or `None` for top-level and invalid indices.
    pub fn parent_row(&self) -> Option<usize> {
        self.position.and_then(|p| p.parent_row)
    }

    /// Returns `true` for valid indices directly below the root.
    pub fn is_top_level(&self) -> bool {
        self.is_valid() && self.parent_row().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::ModelIndex;

    #[test]
    fn invalid_is_default() {
        let root = ModelIndex::invalid();
        assert_eq!(root, ModelIndex::default());
        assert!(!root.is_valid());
        assert!(!root.is_top_level());
        assert_eq!(root.row(), None);
        assert_eq!(root.column(), None);
        assert_eq!(root.parent_row(), None);
    }

    #[test]
    fn top_level() {
        let index = ModelIndex::encode(3, 2, ModelIndex::invalid());
        assert!(index.is_valid());
        assert!(index.is_top_level());
        assert_eq!(index.row(), Some(3));
        assert_eq!(index.column(), Some(2));
        assert_eq!(index.parent_row(), None);
    }

    #[test]
    fn child_keeps_parent_row_only() {
        let parent = ModelIndex::encode(7, 4, ModelIndex::invalid());
        let child = ModelIndex::encode(1, 5, parent);
        assert!(!child.is_top_level());
        assert_eq!(child.row(), Some(1));
        assert_eq!(child.column(), Some(5));
        assert_eq!(child.parent_row(), Some(7));

        // the parent's own column does not matter
        let other = ModelIndex::encode(1, 5, ModelIndex::encode(7, 0, ModelIndex::invalid()));
        assert_eq!(child, other);
    }

    #[test]
    fn grandchild_forgets_grandparent() {
        let parent = ModelIndex::encode(7, 0, ModelIndex::invalid());
        let child = ModelIndex::encode(1, 0, parent);
        let grandchild = ModelIndex::encode(0, 0, child);
        assert_eq!(grandchild.parent_row(), Some(1));
    }
}
