//! The task tree and the document that carries it.
//!
//! Field names on the wire are fixed by documents already stored remotely,
//! so the serde renames here are part of the persisted format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved id of the top-level node that acts as the trash bin.
pub const TRASH_ID: &str = "trash";

/// A node in the task tree.
///
/// Children are owned by their parent and ordered; the order is the display
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Stable identifier. String-typed so the `"trash"` sentinel fits.
    pub id: String,
    /// Free text. May be empty.
    #[serde(rename = "value", default)]
    pub label: String,
    /// Completion flag. Absent on container-only nodes such as the trash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Nested tasks in display order.
    #[serde(default)]
    pub children: Vec<TaskNode>,
    /// Keys written by other clients (e.g. `collapsed`), carried through
    /// untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskNode {
    /// Creates an open task with no children.
    pub fn task(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            done: Some(false),
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Creates the trash bin node.
    pub fn trash() -> Self {
        Self {
            id: TRASH_ID.to_string(),
            label: "Trash".to_string(),
            done: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Marks the task as done or open.
    #[must_use]
    pub fn with_done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    /// Replaces the children of this node.
    #[must_use]
    pub fn with_children(mut self, children: Vec<TaskNode>) -> Self {
        self.children = children;
        self
    }

    /// Returns true if this is the trash bin.
    pub fn is_trash(&self) -> bool {
        self.id == TRASH_ID
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(TaskNode::subtree_len).sum::<usize>()
    }

    fn find(&self, id: &str) -> Option<&TaskNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// The synchronized application state: the task tree plus two display flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDocument {
    /// Top-level nodes in display order.
    pub items: Vec<TaskNode>,
    /// Hide completed tasks in the tree view.
    pub hide_done_items: bool,
    /// Dark theme.
    pub dark_mode: bool,
}

impl AppDocument {
    /// A document with only the trash bin and both flags off.
    pub fn new() -> Self {
        Self {
            items: vec![TaskNode::trash()],
            hide_done_items: false,
            dark_mode: false,
        }
    }

    /// The cleared document left behind after a session is torn down.
    ///
    /// It has no trash node, so it never passes validation and can never be
    /// pushed to the remote.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            hide_done_items: false,
            dark_mode: false,
        }
    }

    /// The starter document shown on first run.
    pub fn sample() -> Self {
        let project_one = TaskNode::task("0", "Project 1").with_children(vec![
            TaskNode::task("1", "Do now").with_children(vec![
                TaskNode::task("2", "Call Alice\n000-0000-0000"),
                TaskNode::task("3", "Reply to Bob").with_done(true),
            ]),
            TaskNode::task("4", "Do later"),
            TaskNode::task("5", "Think about later"),
            TaskNode::task("6", "Someday"),
        ]);
        let project_two = TaskNode::task("7", "Project 2").with_children(vec![
            TaskNode::task("8", "Do now"),
            TaskNode::task("9", "Do later"),
        ]);

        Self {
            items: vec![
                project_one,
                project_two,
                TaskNode::task("10", "Private"),
                TaskNode::trash(),
            ],
            hide_done_items: false,
            dark_mode: false,
        }
    }

    /// Returns the top-level trash node, if present.
    pub fn trash(&self) -> Option<&TaskNode> {
        self.items.iter().find(|node| node.is_trash())
    }

    /// Finds a node anywhere in the tree by id.
    pub fn find(&self, id: &str) -> Option<&TaskNode> {
        self.items.iter().find_map(|node| node.find(id))
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.items.iter().map(TaskNode::subtree_len).sum()
    }

    /// Returns true if the document satisfies the validity contract.
    ///
    /// The flags are always present on a typed document, so only the trash
    /// rule can fail here.
    pub fn is_valid(&self) -> bool {
        self.trash().is_some()
    }
}

impl Default for AppDocument {
    fn default() -> Self {
        Self::new()
    }
}
