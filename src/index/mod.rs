mod b_plus_tree;
mod index_iterator;
mod key_comparator;
mod tree_page;

pub use b_plus_tree::BPlusTree;
pub use index_iterator::IndexIterator;
pub use key_comparator::{IndexKey, KeyComparator, SignedIntComparator, UnsignedIntComparator};
pub use tree_page::{TreeNode, TreeNodeRef};
