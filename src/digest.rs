//! Digest Assembler (spec §4.6, component C6).
//!
//! Grounded on the Python original's `output_formatter.py`
//! (`_create_summary_prefix`, `_create_tree_structure`,
//! `_gather_file_contents`) for the exact summary/tree/content shapes, and on
//! the teacher's `pdf/tree.rs` for the box-drawing connector style. Replaces
//! the original's ad-hoc formatter functions with the `Renderer` trait DESIGN
//! NOTES §9 calls for, so alternate renderings are additional
//! implementations rather than subclasses inspecting reflective fields.

use crate::content::{self, FileContent};
use crate::tokens;
use crate::types::{Digest, Node, Query, RepoMetadata};

/// Exactly 48 `=` characters (spec §4.6, §6 "File format").
pub fn separator() -> String {
    "=".repeat(48)
}

pub struct SummaryInput<'a> {
    pub query: &'a Query,
    pub metadata: &'a RepoMetadata,
}

/// Renders the three digest parts from a resolved node graph. A single
/// implementation (`StandardRenderer`) ships today; DESIGN NOTES §9 calls
/// for this to stay a trait so a debug renderer can be added without
/// touching callers.
pub trait Renderer {
    fn render_summary(&self, input: &SummaryInput<'_>, root: &Node) -> String;
    fn render_tree(&self, root: &Node) -> String;
    fn render_content(&self, root: &Node, bodies: &[(String, FileContent)]) -> Vec<String>;
}

pub struct StandardRenderer;

impl Renderer for StandardRenderer {
    fn render_summary(&self, input: &SummaryInput<'_>, root: &Node) -> String {
        let query = input.query;
        let metadata = input.metadata;
        let single_file = matches!(root, Node::File { .. });

        let mut lines = Vec::new();
        match (&query.owner, &query.repo) {
            (Some(owner), Some(repo)) => lines.push(format!("Repository: {owner}/{repo}")),
            _ => lines.push(format!("Directory: {}", query.slug)),
        }

        if let Some(tag) = &metadata.tag {
            lines.push(format!("Tag: {tag}"));
        }
        if let Some(branch) = &metadata.branch {
            if branch != "main" && branch != "master" {
                lines.push(format!("Branch: {branch}"));
            }
        }
        if let Some(commit) = &metadata.commit_sha {
            lines.push(format!("Commit: {commit}"));
        }
        if query.subpath != "/" && !single_file {
            lines.push(format!("Subpath: {}", query.subpath));
        }

        match root {
            Node::Directory { file_count, .. } => lines.push(format!("Files analyzed: {file_count}")),
            Node::File { .. } => {
                // Lines populated by the caller once content is known; see
                // `assemble`, which rewrites this placeholder line.
                lines.push(format!("File: {}", root.name()));
            }
            Node::Symlink { .. } => {}
        }

        lines.join("\n") + "\n"
    }

    fn render_tree(&self, root: &Node) -> String {
        let mut out = String::new();
        match root {
            Node::Directory { name, children, .. } => {
                out.push_str(&format!("{name}/\n"));
                render_children(children, "", &mut out);
            }
            Node::File { name, .. } => out.push_str(&format!("{name}\n")),
            Node::Symlink { name, target, .. } => {
                out.push_str(&format!("{name} -> {}\n", target.display()));
            }
        }
        out
    }

    fn render_content(&self, _root: &Node, bodies: &[(String, FileContent)]) -> Vec<String> {
        let sep = separator();
        bodies
            .iter()
            .map(|(rel_path, content)| {
                let posix_path = rel_path.replace('\\', "/");
                format!(
                    "{sep}\nFILE: {posix_path}\n{sep}\n{}\n\n",
                    content.as_body()
                )
            })
            .collect()
    }
}

fn render_children(children: &[Node], prefix: &str, out: &mut String) {
    let last_idx = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
        let is_last = i == last_idx;
        let connector = if is_last { "\u{2514}\u{2500}\u{2500} " } else { "\u{251C}\u{2500}\u{2500} " };
        let extension = if is_last { "    " } else { "\u{2502}   " };

        match child {
            Node::Directory { name, children, .. } => {
                out.push_str(&format!("{prefix}{connector}{name}/\n"));
                render_children(children, &format!("{prefix}{extension}"), out);
            }
            Node::File { name, .. } => {
                out.push_str(&format!("{prefix}{connector}{name}\n"));
            }
            Node::Symlink { name, target, .. } => {
                out.push_str(&format!("{prefix}{connector}{name} -> {}\n", target.display()));
            }
        }
    }
}

/// Depth-first, already-sorted traversal order collecting every [`Node::File`]
/// under `root` (spec §4.4 sort order, carried through unchanged here).
fn collect_files<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match node {
        Node::File { .. } => out.push(node),
        Node::Directory { children, .. } => {
            for child in children {
                collect_files(child, out);
            }
        }
        Node::Symlink { .. } => {}
    }
}

/// Reads every file's content (spec §4.5) and assembles the digest (spec
/// §4.6), applying a token budget (spec §4.7) when `max_tokens` is set.
pub async fn assemble(
    root: &Node,
    query: &Query,
    metadata: &RepoMetadata,
    max_tokens: Option<usize>,
) -> Digest {
    let renderer = StandardRenderer;
    let input = SummaryInput { query, metadata };

    let mut file_nodes = Vec::new();
    collect_files(root, &mut file_nodes);

    let mut bodies = Vec::with_capacity(file_nodes.len());
    for node in &file_nodes {
        let content = content::read_content(node).await;
        bodies.push((node.rel_path().to_string(), content));
    }

    let tree = renderer.render_tree(root);
    let mut summary = renderer.render_summary(&input, root);

    if let Node::File { .. } = root {
        let lines = bodies
            .first()
            .map(|(_, c)| c.as_body().lines().count())
            .unwrap_or(0);
        summary.push_str(&format!("Lines: {lines}\n"));
    }

    let blocks = renderer.render_content(root, &bodies);
    let (counter, warning) = tokens::resolve_counter();

    let content = match max_tokens {
        Some(budget) => {
            let header_tokens = counter.count(&summary) + counter.count(&tree);
            let result = tokens::assemble_within_budget(counter, header_tokens, &blocks, budget);
            result.content
        }
        None => blocks.concat(),
    };

    let estimate_text = format!("{tree}{content}");
    let token_count = counter.count(&estimate_text);
    summary.push_str(&format!("\nEstimated tokens: {}\n", tokens::format_count(token_count)));
    if let Some(warning) = warning {
        summary.push_str(&format!("Warning: {warning}\n"));
    }

    Digest {
        summary,
        tree,
        content,
        digest_id: query.id,
    }
}
