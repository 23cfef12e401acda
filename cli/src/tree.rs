use std::fmt::{self, Display, Formatter};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const INDENT: &str = "│   ";
const LAST_INDENT: &str = "    ";

/// A labelled tree rendered with box-drawing connectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Node {
    value: String,
    children: Vec<Node>,
}

impl Node {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Node {
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Appends a child and returns it for further nesting.
    pub(crate) fn add(&mut self, value: impl Into<String>) -> &mut Node {
        let index = self.children.len();
        self.children.push(Node::new(value));
        &mut self.children[index]
    }

    pub(crate) fn add_pair(&mut self, key: &str, value: impl Display) -> &mut Node {
        self.add(format!("{key}: {value}"))
    }

    fn fmt_children(&self, f: &mut Formatter<'_>, prefix: &str) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == self.children.len();
            let (branch, indent) = if last {
                (LAST_BRANCH, LAST_INDENT)
            } else {
                (BRANCH, INDENT)
            };
            writeln!(f, "{prefix}{branch}{}", child.value)?;
            child.fmt_children(f, &format!("{prefix}{indent}"))?;
        }
        Ok(())
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.value)?;
        self.fmt_children(f, "")
    }
}
