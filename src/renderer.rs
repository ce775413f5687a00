use std::collections::HashMap;

use crate::display_width::{char_width, display_width};
use crate::layout::*;

/// Marks the cell covered by the right half of a wide character.
const WIDE_TAIL: char = '\0';

struct Grid {
    cells: Vec<Vec<char>>,
    width: usize,
    height: usize,
}

impl Grid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            width,
            height,
        }
    }

    fn set(&mut self, row: usize, col: usize, ch: char) {
        if row < self.height && col < self.width {
            self.cells[row][col] = ch;
        }
    }

    fn write_str(&mut self, row: usize, col: usize, s: &str) {
        let mut col = col;
        for ch in s.chars() {
            self.set(row, col, ch);
            for tail in 1..char_width(ch) {
                self.set(row, col + tail, WIDE_TAIL);
            }
            col += char_width(ch);
        }
    }

    fn to_string(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                let line: String = row.iter().filter(|&&c| c != WIDE_TAIL).collect();
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn render(layout: &SchemaLayout) -> String {
    let mut grid = Grid::new(layout.width, layout.height);

    let node_map: HashMap<&str, &TableLayout> = layout
        .nodes
        .iter()
        .map(|n| (n.name.as_str(), n))
        .collect();

    for node in &layout.nodes {
        draw_box(&mut grid, node);
    }

    let mut undrawn = Vec::new();
    for edge in &layout.edges {
        let endpoints = (node_map.get(edge.from.as_str()), node_map.get(edge.to.as_str()));
        let drawn = match endpoints {
            (Some(from), Some(to)) => draw_edge(&mut grid, &layout.nodes, from, to, edge),
            _ => false,
        };
        if !drawn {
            undrawn.push(edge);
        }
    }

    let mut output = grid.to_string();
    for edge in undrawn {
        output.push_str(&format!(
            "\n{} {}──{} {} : {}",
            edge.from, edge.from_marker, edge.to_marker, edge.to, edge.label
        ));
    }
    output.trim_end().to_string()
}

fn draw_box(grid: &mut Grid, node: &TableLayout) {
    let x = node.x;
    let y = node.y;
    let w = node.width;

    horizontal_border(grid, y, x, w, '┌', '┐');
    grid.set(y + 1, x, '│');
    grid.write_str(y + 1, x + 2, &node.name);
    grid.set(y + 1, x + w - 1, '│');

    if node.rows.is_empty() {
        horizontal_border(grid, y + 2, x, w, '└', '┘');
        return;
    }

    horizontal_border(grid, y + 2, x, w, '├', '┤');
    for (i, row) in node.rows.iter().enumerate() {
        let line = y + 3 + i;
        grid.set(line, x, '│');
        grid.write_str(line, x + 2, row);
        grid.set(line, x + w - 1, '│');
    }
    horizontal_border(grid, y + node.height - 1, x, w, '└', '┘');
}

fn horizontal_border(grid: &mut Grid, row: usize, x: usize, w: usize, left: char, right: char) {
    grid.set(row, x, left);
    for col in (x + 1)..(x + w - 1) {
        grid.set(row, col, '─');
    }
    grid.set(row, x + w - 1, right);
}

/// Draws a straight connector when `to` sits right of `from`, both boxes
/// share a row and no other box lies between them on it; returns whether it
/// did.
fn draw_edge(
    grid: &mut Grid,
    nodes: &[TableLayout],
    from: &TableLayout,
    to: &TableLayout,
    edge: &RelationLayout,
) -> bool {
    let from_right = from.x + from.width;
    let to_left = to.x;
    if to_left < from_right + 4 {
        return false;
    }

    let spans = |n: &TableLayout, row: usize| row > n.y && row + 1 < n.y + n.height;
    let row = if spans(to, from.center_y) {
        from.center_y
    } else if spans(from, to.center_y) {
        to.center_y
    } else {
        return false;
    };

    let blocked = nodes.iter().any(|n| {
        n.name != from.name
            && n.name != to.name
            && (n.y..n.y + n.height).contains(&row)
            && n.x < to_left
            && n.x + n.width > from_right
    });
    if blocked {
        return false;
    }

    grid.write_str(row, from_right, edge.from_marker);
    for col in (from_right + 2)..(to_left - 2) {
        grid.set(row, col, '─');
    }
    grid.write_str(row, to_left - 2, edge.to_marker);

    let inner = to_left - from_right - 4;
    let label_width = display_width(&edge.label);
    if inner > label_width {
        grid.write_str(row, from_right + 2 + (inner - label_width) / 2, &edge.label);
    }
    true
}
