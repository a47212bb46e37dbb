//! Presentation state: routes, pages, tree rows and dialogs.
//!
//! Nothing here draws anything. The CLI renders to text; another front end
//! would read the same state.

pub mod boundary;
pub mod delete;
pub mod pages;
pub mod route;
pub mod tree;

pub use boundary::render_guarded;
pub use delete::DeleteFlow;
pub use pages::{Dashboard, ListPage};
pub use route::Route;
pub use tree::{NodeState, TaskTreeView};
