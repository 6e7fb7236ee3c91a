//! Live set template handling: the owned XML tree, identifier bookkeeping and
//! clip slot fragments.

pub mod fragments;
pub mod ids;
pub mod loader;
pub mod tree;

pub use fragments::FragmentTemplateEngine;
pub use ids::{scan_ids, SequentialIdAllocator, TemplateIdSet};
pub use loader::load_template;
pub use tree::{Element, Node};
