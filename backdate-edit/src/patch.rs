use diffy::PatchFormatter;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Unified diff between two renders, one section per changed module.
///
/// Modules are keyed by name and shown as `<name>.toml`. Unchanged modules
/// are omitted, so identical inputs yield an empty string.
pub fn render_patch(before: &BTreeMap<String, String>, after: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    let formatter = PatchFormatter::new();
    let empty = String::new();

    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for name in names {
        let old = before.get(name).unwrap_or(&empty);
        let new = after.get(name).unwrap_or(&empty);
        if old == new {
            continue;
        }

        let _ = writeln!(out, "diff --git a/{name}.toml b/{name}.toml");
        let patch = diffy::create_patch(old, new);
        let _ = write!(out, "{}", formatter.fmt_patch(&patch));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}
