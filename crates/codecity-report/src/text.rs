use colored::Colorize;

use crate::city::{CityDocument, ObjectEntry};

/// Format a city document for terminal output, listing the `top` largest objects.
pub fn format_report(doc: &CityDocument, top: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "codecity - Code City Metrics".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));
    out.push_str(&format!("{}: {}\n", "Project".bold(), doc.project));

    if doc.is_empty() {
        out.push_str(&format!(
            "\n{}\n\n",
            "No analyzable declarations found.".yellow()
        ));
        return out;
    }

    let root = &doc.root;
    let files: usize = root.children.iter().map(|p| p.children.len()).sum();
    out.push_str(&format!(
        "\n{}: {} packages, {} files, {} structs\n",
        "Summary".bold(),
        root.children.len(),
        files,
        root.struct_count(),
    ));
    out.push_str(&format!(
        "  Lines: {}  Methods: {}  Attributes: {}\n",
        root.lines, root.methods, root.attributes
    ));

    let mut ranked: Vec<&ObjectEntry> = doc.objects.iter().collect();
    ranked.sort_by(|a, b| {
        b.lines
            .cmp(&a.lines)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.name.cmp(&b.name))
    });

    out.push_str(&format!(
        "\n{} (top {} by lines)\n{}\n",
        "Buildings".bold(),
        top.min(ranked.len()),
        "-".repeat(40)
    ));
    for entry in ranked.into_iter().take(top) {
        let label = if entry.name.is_empty() {
            format!("{} {}", entry.path, "(functions & values)".dimmed())
        } else {
            format!("{}.{}", entry.path, entry.name.cyan())
        };
        out.push_str(&format!(
            "  {:>6} lines  {:>4} methods  {:>4} attributes  {}\n",
            entry.lines, entry.methods, entry.attributes, label
        ));
    }

    out.push('\n');
    out
}
