// Copyright 2026 Hybrid Mount Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::BTreeMap,
    fmt,
    fs::FileType,
    path::PathBuf,
};

/// The four closed shapes a node in the merged mount tree can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    RegularFile,
    Symlink,
    Whiteout,
}

impl NodeKind {
    /// Infer a node kind from a live `lstat`. Whiteouts are never inferred
    /// this way — they only ever come from a module's own tree.
    pub fn from_file_type(file_type: FileType) -> Option<Self> {
        if file_type.is_dir() {
            Some(Self::Directory)
        } else if file_type.is_file() {
            Some(Self::RegularFile)
        } else if file_type.is_symlink() {
            Some(Self::Symlink)
        } else {
            None
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Directory => "DIR",
            Self::RegularFile => "FILE",
            Self::Symlink => "LINK",
            Self::Whiteout => "WHT",
        };
        write!(f, "{s}")
    }
}

/// A vertex of the merged mount tree. Children are exclusively owned; there
/// is no sharing and no cycles, so a plain owned map is enough.
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub children: BTreeMap<String, Node>,
    pub module_path: Option<PathBuf>,
    pub module_name: Option<String>,
    pub replace: bool,
    /// Set by the oracle when a required type divergence can't be honored
    /// because the parent has no `module_path` to carve a tmpfs from.
    pub skip: bool,
}

impl Node {
    pub fn new_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            children: BTreeMap::new(),
            module_path: None,
            module_name: None,
            replace: false,
            skip: false,
        }
    }

    pub fn leaf(
        name: impl Into<String>,
        kind: NodeKind,
        module_path: PathBuf,
        module_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            children: BTreeMap::new(),
            module_path: Some(module_path),
            module_name: Some(module_name.into()),
            replace: false,
            skip: false,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn total_count(&self) -> usize {
        1 + self.children.values().map(Node::total_count).sum::<usize>()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn print_tree(node: &Node, f: &mut fmt::Formatter<'_>, prefix: &str, is_last: bool, is_root: bool) -> fmt::Result {
            let connector = if is_root {
                ""
            } else if is_last {
                "\u{2514}\u{2500}\u{2500} "
            } else {
                "\u{251c}\u{2500}\u{2500} "
            };
            let name = if node.name.is_empty() { "/" } else { &node.name };

            let mut flags = Vec::new();
            if node.replace {
                flags.push("REPLACE");
            }
            if node.skip {
                flags.push("SKIP");
            }
            let flag_str = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join("|"))
            };
            let source_str = match &node.module_path {
                Some(p) => format!(" -> {}", p.display()),
                None => String::new(),
            };

            writeln!(f, "{prefix}{connector}{name} [{}]{flag_str}{source_str}", node.kind)?;

            let child_prefix = if is_root {
                ""
            } else if is_last {
                "    "
            } else {
                "\u{2502}   "
            };
            let new_prefix = format!("{prefix}{child_prefix}");

            let count = node.children.len();
            for (i, child) in node.children.values().enumerate() {
                print_tree(child, f, &new_prefix, i + 1 == count, false)?;
            }
            Ok(())
        }

        print_tree(self, f, "", true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_count_counts_self_and_descendants() {
        let mut root = Node::new_dir("");
        let mut system = Node::new_dir("system");
        system.children.insert(
            "bin".into(),
            Node::leaf("bin", NodeKind::RegularFile, PathBuf::from("/mod/bin"), "modA"),
        );
        root.children.insert("system".into(), system);
        assert_eq!(root.total_count(), 3);
    }

    #[test]
    fn children_are_name_ordered() {
        let mut root = Node::new_dir("");
        for n in ["zeta", "alpha", "mid"] {
            root.children.insert(n.into(), Node::new_dir(n));
        }
        let names: Vec<_> = root.children.keys().cloned().collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
