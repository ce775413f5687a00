use std::collections::{HashMap, HashSet};

use crate::display_width::display_width;
use crate::error::LayoutError;
use crate::mermaid::{left_marker, right_marker};
use crate::schema::{Column, Schema};

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaLayout {
    pub nodes: Vec<TableLayout>,
    pub edges: Vec<RelationLayout>,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub name: String,
    /// Column rows drawn under the name, already formatted.
    pub rows: Vec<String>,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub center_y: usize,
}

/// Edge drawn from the parent table (left) to the child table (right).
#[derive(Debug, Clone, PartialEq)]
pub struct RelationLayout {
    pub from: String,
    pub to: String,
    pub label: String,
    pub from_marker: &'static str,
    pub to_marker: &'static str,
}

const MIN_GAP: usize = 8;
const MARKERS_WIDTH: usize = 8;

pub fn compute(schema: &Schema) -> Result<SchemaLayout, LayoutError> {
    if schema.tables.is_empty() {
        return Err(LayoutError::Empty);
    }

    let ranks = assign_ranks(schema);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let edges = edges(schema);

    let mut ranks_tables: Vec<Vec<TableLayout>> = vec![Vec::new(); max_rank + 1];
    for table in &schema.tables {
        ranks_tables[ranks[table.name.as_str()]].push(table_box(&table.name, &table.columns));
    }

    let mut nodes = Vec::new();
    let mut x = 0;
    for (rank, rank_tables) in ranks_tables.into_iter().enumerate() {
        let rank_max_width = rank_tables.iter().map(|t| t.width).max().unwrap_or(0);
        let mut y = 0;
        for mut node in rank_tables {
            node.x = x;
            node.y = y;
            node.center_y = y + 1;
            y += node.height + 1;
            nodes.push(node);
        }

        if rank < max_rank {
            let label_gap = edges
                .iter()
                .filter(|e| {
                    ranks.get(e.from.as_str()) == Some(&rank)
                        && ranks.get(e.to.as_str()) == Some(&(rank + 1))
                })
                .map(|e| display_width(&e.label) + MARKERS_WIDTH)
                .max()
                .unwrap_or(MIN_GAP)
                .max(MIN_GAP);
            x += rank_max_width + label_gap;
        }
    }

    Ok(finish(nodes, edges))
}

/// Like [`compute`], but stacks every table in one column when the ranked
/// drawing would be wider than `max_width`.
pub fn compute_with_max_width(
    schema: &Schema,
    max_width: usize,
) -> Result<SchemaLayout, LayoutError> {
    let layout = compute(schema)?;
    if layout.width <= max_width {
        return Ok(layout);
    }
    log::debug!(
        "layout width {} exceeds {}, stacking tables",
        layout.width,
        max_width
    );

    let mut nodes = Vec::new();
    let mut y = 0;
    for table in &schema.tables {
        let mut node = table_box(&table.name, &table.columns);
        node.y = y;
        node.center_y = y + 1;
        y += node.height + 1;
        nodes.push(node);
    }
    Ok(finish(nodes, layout.edges))
}

fn finish(nodes: Vec<TableLayout>, edges: Vec<RelationLayout>) -> SchemaLayout {
    let width = nodes.iter().map(|n| n.x + n.width).max().unwrap_or(0);
    let height = nodes.iter().map(|n| n.y + n.height).max().unwrap_or(0);
    SchemaLayout {
        nodes,
        edges,
        width,
        height,
    }
}

fn table_box(name: &str, columns: &[Column]) -> TableLayout {
    let rows: Vec<String> = columns.iter().map(column_row).collect();
    let inner = rows
        .iter()
        .map(|r| display_width(r))
        .chain(std::iter::once(display_width(name)))
        .max()
        .unwrap_or(0);
    let height = if rows.is_empty() { 3 } else { 4 + rows.len() };
    TableLayout {
        name: name.to_string(),
        rows,
        x: 0,
        y: 0,
        width: inner + 4,
        height,
        center_y: 1,
    }
}

fn column_row(column: &Column) -> String {
    let mut row = format!("{} {}", column.col_type, column.name);
    if let Some(key) = &column.key {
        row.push(' ');
        row.push_str(key);
    }
    row
}

fn edges(schema: &Schema) -> Vec<RelationLayout> {
    schema
        .relations
        .iter()
        .map(|r| RelationLayout {
            from: r.parent_table.clone(),
            to: r.table.clone(),
            label: if r.columns.is_empty() {
                r.def.clone()
            } else {
                r.columns.join(", ")
            },
            from_marker: left_marker(r.parent_cardinality),
            to_marker: right_marker(r.cardinality),
        })
        .collect()
}

/// Parents rank before their children. Cycles, including self references,
/// are cut where the walk re-enters a table it is still ranking.
fn assign_ranks(schema: &Schema) -> HashMap<&str, usize> {
    let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
    for table in &schema.tables {
        parents.entry(table.name.as_str()).or_default();
    }
    for r in &schema.relations {
        if r.table != r.parent_table {
            parents.entry(&r.table).or_default().push(&r.parent_table);
        }
    }

    let mut ranks: HashMap<&str, usize> = HashMap::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    for table in &schema.tables {
        compute_rank(&table.name, &parents, &mut ranks, &mut visiting);
    }
    ranks
}

fn compute_rank<'a>(
    id: &'a str,
    parents: &HashMap<&str, Vec<&'a str>>,
    ranks: &mut HashMap<&'a str, usize>,
    visiting: &mut HashSet<&'a str>,
) -> usize {
    if let Some(&r) = ranks.get(id) {
        return r;
    }
    if !visiting.insert(id) {
        return 0;
    }

    let mut rank = 0;
    for p in parents.get(id).cloned().unwrap_or_default() {
        if !visiting.contains(p) {
            rank = rank.max(compute_rank(p, parents, ranks, visiting) + 1);
        }
    }
    visiting.remove(id);
    ranks.insert(id, rank);
    rank
}
