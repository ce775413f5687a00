use std::fmt::Write;

use crate::schema::{Cardinality, Column, Schema};

/// Writes the schema back as a Mermaid `erDiagram` that [`crate::parser`]
/// reads into an equivalent schema.
pub fn write(schema: &Schema) -> String {
    let mut out = String::from("erDiagram\n");

    if let Some(name) = &schema.current_schema {
        let _ = writeln!(out, "    %% schema {}", ident(name));
    }
    for table in schema.tables.iter().filter(|t| !t.labels.is_empty()) {
        let labels: Vec<String> = table.labels.iter().map(|l| ident(&l.name)).collect();
        let _ = writeln!(out, "    %% labels {}: {}", ident(&table.name), labels.join(", "));
    }

    for table in &schema.tables {
        if table.columns.is_empty() {
            let _ = writeln!(out, "    {} {{\n    }}", ident(&table.name));
            continue;
        }
        let _ = writeln!(out, "    {} {{", ident(&table.name));
        for column in &table.columns {
            let _ = writeln!(out, "        {}", attribute(column));
        }
        out.push_str("    }\n");
    }

    for r in &schema.relations {
        let _ = writeln!(
            out,
            "    {} {}--{} {} : {}",
            ident(&r.table),
            left_marker(r.cardinality),
            right_marker(r.parent_cardinality),
            ident(&r.parent_table),
            label(&r.def)
        );
    }

    out
}

fn attribute(column: &Column) -> String {
    let col_type = if column.col_type.is_empty() {
        "unknown"
    } else {
        column.col_type.as_str()
    };
    let mut line = format!("{} {}", col_type, ident(&column.name));
    if let Some(key) = &column.key {
        line.push(' ');
        line.push_str(key);
    }
    if let Some(comment) = &column.comment {
        let _ = write!(line, " \"{}\"", comment.replace('"', "#quot;"));
    }
    line
}

/// A label holding `"` cannot be quoted; the parser reads it unquoted up to
/// the end of the line.
fn label(def: &str) -> String {
    if def.contains('"') {
        def.to_string()
    } else {
        format!("\"{def}\"")
    }
}

fn ident(name: &str) -> String {
    let bare = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if bare {
        name.to_string()
    } else {
        format!("\"{name}\"")
    }
}

pub fn left_marker(card: Cardinality) -> &'static str {
    match card {
        Cardinality::ExactlyOne => "||",
        Cardinality::ZeroOrOne => "o|",
        Cardinality::OneOrMany => "}|",
        Cardinality::ZeroOrMany => "}o",
    }
}

pub fn right_marker(card: Cardinality) -> &'static str {
    match card {
        Cardinality::ExactlyOne => "||",
        Cardinality::ZeroOrOne => "|o",
        Cardinality::OneOrMany => "|{",
        Cardinality::ZeroOrMany => "o{",
    }
}
