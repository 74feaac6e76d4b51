use std::fmt::Write;
use worldquat_common::NodeId;
use worldquat_kernel::{Capability, Node, World};

/// What [`format_tree`] prints besides kinds and mount names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub show_caps: bool,
    pub show_ids: bool,
    /// Levels below the root before the printer stops descending.
    pub max_depth: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            show_caps: false,
            show_ids: false,
            max_depth: 32,
        }
    }
}

/// Render `root` and every mount beneath it, one line per mount.
///
/// ```text
/// Entity<cube> pos=[0, 0, 5]
/// ├─ (motor) Asset<motor>
/// ├─ (left) Asset<weapon> "Left gun"
/// └─ (top) <empty>
/// ```
///
/// Returns an empty string for unknown ids.
pub fn format_tree(world: &World, root: NodeId, opts: TreeOptions) -> String {
    let mut out = String::new();
    let Some(node) = world.graph().get(root) else {
        return out;
    };
    out.push_str(&label(node, opts.show_ids, false));
    out.push('\n');
    walk(world, node, "", 0, opts, &mut out);
    out
}

fn walk(world: &World, node: &Node, prefix: &str, depth: usize, opts: TreeOptions, out: &mut String) {
    if depth >= opts.max_depth {
        let _ = writeln!(out, "{prefix}└─ (max depth reached)");
        return;
    }

    let mounts = node.mounts();
    for (i, mount) in mounts.iter().enumerate() {
        let last = i + 1 == mounts.len();
        let branch = if last { "└─ " } else { "├─ " };
        let child = mount.occupant().and_then(|id| world.graph().get(id));
        match child {
            None => {
                let _ = writeln!(out, "{prefix}{branch}({}) <empty>", mount.id);
            }
            Some(child) => {
                let _ = writeln!(
                    out,
                    "{prefix}{branch}({}) {}",
                    mount.id,
                    label(child, opts.show_ids, opts.show_caps)
                );
                let next = format!("{prefix}{}", if last { "   " } else { "│  " });
                walk(world, child, &next, depth + 1, opts, out);
            }
        }
    }
}

fn label(node: &Node, show_ids: bool, show_caps: bool) -> String {
    let id = if show_ids {
        format!(" id={}", node.id)
    } else {
        String::new()
    };

    if node.is_entity() {
        let p = node.local.pos;
        return format!(
            "Entity<{}>{id} pos=[{}, {}, {}]",
            node.kind,
            num(p.x),
            num(p.y),
            num(p.z)
        );
    }

    let name = node
        .name
        .as_ref()
        .map(|n| format!(" \"{n}\""))
        .unwrap_or_default();
    let caps = node.capabilities();
    let caps = if show_caps && !caps.is_empty() {
        let tags: Vec<&str> = caps.iter().map(Capability::as_str).collect();
        format!(" [{}]", tags.join(", "))
    } else {
        String::new()
    };
    format!("Asset<{}>{name}{id}{caps}", node.kind)
}

/// Three decimals, trailing zeros dropped; magnitudes under 1e-6 print as `0`.
fn num(v: f64) -> String {
    if v.abs() < 1e-6 {
        return "0".to_string();
    }
    let r = (v * 1000.0).round() / 1000.0;
    if r == 0.0 { "0".to_string() } else { r.to_string() }
}
