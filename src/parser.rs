use std::collections::HashSet;

use winnow::ascii::{Caseless, line_ending, multispace0, space0, space1};
use winnow::combinator::{alt, delimited, eof, opt, preceded, repeat, separated, terminated};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::error::{ParseError, SchemaError};
use crate::schema::{Cardinality, Column, NewRelation, Schema, Table};

/// Reads a Mermaid `erDiagram` into a [`Schema`].
///
/// Relationship lines read `child <card>--<card> parent : label`. When the
/// label is a `FOREIGN KEY (..) REFERENCES parent(..)` definition the relation
/// is bound to those columns. Two comment directives are understood:
/// `%% schema <name>` and `%% labels <table>: <label>, ...`.
pub fn parse_schema(input: &str) -> Result<Schema, ParseError> {
    let mut rest = input;
    let lines = er_diagram(&mut rest).map_err(|_| {
        let context = rest.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
        let line = if context.chars().count() > 40 {
            format!("{}...", context.chars().take(40).collect::<String>())
        } else {
            context.to_string()
        };
        ParseError::Syntax { line }
    })?;
    build_schema(lines)
}

#[derive(Debug, Clone, PartialEq)]
enum ErLine {
    Relationship(RelationshipLine),
    EntityBlock(String, Vec<Column>),
    Schema(String),
    Labels(String, Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct RelationshipLine {
    child: String,
    parent: String,
    child_card: Cardinality,
    parent_card: Cardinality,
    label: String,
}

#[derive(Debug, Clone, PartialEq)]
struct ForeignKey {
    columns: Vec<String>,
    parent_columns: Vec<String>,
}

fn build_schema(lines: Vec<ErLine>) -> Result<Schema, ParseError> {
    let mut schema = Schema::new();
    let mut declared: HashSet<String> = HashSet::new();
    let mut relationships = Vec::new();
    let mut labels = Vec::new();

    for line in lines {
        match line {
            ErLine::Relationship(rel) => {
                add_entity(&mut schema, &rel.child)?;
                add_entity(&mut schema, &rel.parent)?;
                relationships.push(rel);
            }
            ErLine::EntityBlock(name, columns) => {
                if !declared.insert(name.clone()) {
                    return Err(SchemaError::DuplicateTable(name).into());
                }
                add_entity(&mut schema, &name)?;
                if let Some(table) = schema.find_table_mut(&name) {
                    table.columns = columns;
                }
            }
            ErLine::Schema(name) => schema.current_schema = Some(name),
            ErLine::Labels(table, names) => labels.push((table, names)),
        }
    }

    for rel in relationships {
        let mut new = NewRelation::between(&rel.child, &rel.parent);
        new.cardinality = rel.child_card;
        new.parent_cardinality = rel.parent_card;
        if let Ok(fk) = foreign_key.parse(rel.label.as_str()) {
            ensure_columns(&mut schema, &rel.child, &fk.columns);
            ensure_columns(&mut schema, &rel.parent, &fk.parent_columns);
            new.columns = fk.columns;
            new.parent_columns = fk.parent_columns;
        }
        new.def = rel.label;
        schema.add_relation(new)?;
    }

    for (table, names) in labels {
        let t = schema
            .find_table_mut(&table)
            .ok_or(SchemaError::TableNotFound(table))?;
        for name in &names {
            t.labels.insert(name);
        }
    }

    Ok(schema)
}

fn add_entity(schema: &mut Schema, name: &str) -> Result<(), ParseError> {
    if schema.find_table(name).is_none() {
        schema.add_table(Table::new(name))?;
    }
    Ok(())
}

fn ensure_columns(schema: &mut Schema, table: &str, columns: &[String]) {
    if let Some(t) = schema.find_table_mut(table) {
        for name in columns {
            if t.find_column(name).is_none() {
                t.columns.push(Column::new(name, "unknown"));
            }
        }
    }
}

fn er_diagram(input: &mut &str) -> winnow::Result<Vec<ErLine>> {
    multispace0.parse_next(input)?;
    "erDiagram".parse_next(input)?;
    space0.parse_next(input)?;
    alt((line_ending, eof)).parse_next(input)?;

    let lines: Vec<Option<ErLine>> = repeat(0.., er_line).parse_next(input)?;
    eof.parse_next(input)?;
    Ok(lines.into_iter().flatten().collect())
}

fn er_line(input: &mut &str) -> winnow::Result<Option<ErLine>> {
    alt((
        directive.map(Some),
        comment_line.map(|_| None),
        entity_block.map(|(name, columns)| Some(ErLine::EntityBlock(name, columns))),
        relationship_line.map(|r| Some(ErLine::Relationship(r))),
        blank_line.map(|_| None),
    ))
    .parse_next(input)
}

fn end_of_line(input: &mut &str) -> winnow::Result<()> {
    space0.parse_next(input)?;
    alt((line_ending.void(), eof.void())).parse_next(input)
}

fn blank_line(input: &mut &str) -> winnow::Result<()> {
    space0.parse_next(input)?;
    line_ending.parse_next(input)?;
    Ok(())
}

fn comment_line(input: &mut &str) -> winnow::Result<()> {
    space0.parse_next(input)?;
    "%%".parse_next(input)?;
    take_till(0.., ['\r', '\n']).parse_next(input)?;
    end_of_line(input)
}

fn directive(input: &mut &str) -> winnow::Result<ErLine> {
    space0.parse_next(input)?;
    "%%".parse_next(input)?;
    space0.parse_next(input)?;
    let line = alt((
        preceded(("schema", space1), identifier).map(ErLine::Schema),
        preceded(("labels", space1), labels_directive),
    ))
    .parse_next(input)?;
    end_of_line(input)?;
    Ok(line)
}

fn labels_directive(input: &mut &str) -> winnow::Result<ErLine> {
    let table = identifier.parse_next(input)?;
    (space0, ":", space0).parse_next(input)?;
    let names: Vec<String> =
        separated(1.., identifier, (space0, ",", space0)).parse_next(input)?;
    Ok(ErLine::Labels(table, names))
}

fn identifier(input: &mut &str) -> winnow::Result<String> {
    alt((
        quoted,
        take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .map(str::to_string),
    ))
    .parse_next(input)
}

fn quoted(input: &mut &str) -> winnow::Result<String> {
    delimited('"', take_till(0.., ['"', '\r', '\n']), '"')
        .map(str::to_string)
        .parse_next(input)
}

fn entity_block(input: &mut &str) -> winnow::Result<(String, Vec<Column>)> {
    space0.parse_next(input)?;
    let name = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    "{".parse_next(input)?;
    opt(line_ending).parse_next(input)?;

    let mut columns = Vec::new();
    loop {
        space0.parse_next(input)?;
        if input.starts_with('}') {
            "}".parse_next(input)?;
            end_of_line(input)?;
            break;
        }
        if input.is_empty() {
            return Err(winnow::error::ParserError::from_input(input));
        }
        if let Ok(()) = blank_line(input) {
            continue;
        }
        columns.push(attribute.parse_next(input)?);
    }

    Ok((name, columns))
}

fn attribute(input: &mut &str) -> winnow::Result<Column> {
    space0.parse_next(input)?;
    let col_type = take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')' | '[' | ']' | ',')
    })
    .parse_next(input)?;
    space1.parse_next(input)?;
    let name = identifier.parse_next(input)?;
    let key = opt(preceded(space1, keys)).parse_next(input)?;
    let comment = opt(preceded(space0, quoted))
        .parse_next(input)?
        .map(|c| c.replace("#quot;", "\""));
    end_of_line(input)?;

    Ok(Column {
        key,
        comment,
        ..Column::new(&name, col_type)
    })
}

fn keys(input: &mut &str) -> winnow::Result<String> {
    let keys: Vec<&str> =
        separated(1.., alt(("PK", "FK", "UK")), (space0, ",", space0)).parse_next(input)?;
    Ok(keys.join(","))
}

fn relationship_line(input: &mut &str) -> winnow::Result<RelationshipLine> {
    space0.parse_next(input)?;
    let child = identifier.parse_next(input)?;
    space1.parse_next(input)?;
    let (child_card, parent_card) = cardinality.parse_next(input)?;
    space1.parse_next(input)?;
    let parent = identifier.parse_next(input)?;
    (space0, ":", space0).parse_next(input)?;
    let label = alt((
        terminated(quoted, end_of_line),
        terminated(
            take_till(1.., ['\r', '\n']).map(|s: &str| s.trim_end().to_string()),
            end_of_line,
        ),
    ))
    .parse_next(input)?;

    Ok(RelationshipLine {
        child,
        parent,
        child_card,
        parent_card,
        label,
    })
}

fn cardinality(input: &mut &str) -> winnow::Result<(Cardinality, Cardinality)> {
    let marker = |c: char| c == '|' || c == 'o' || c == '{' || c == '}';
    let left: &str = take_while(1.., marker).parse_next(input)?;
    alt(("--", "..")).parse_next(input)?;
    let right: &str = take_while(1.., marker).parse_next(input)?;
    Ok((parse_left_cardinality(left), parse_right_cardinality(right)))
}

fn parse_left_cardinality(s: &str) -> Cardinality {
    match s {
        "||" => Cardinality::ExactlyOne,
        "o|" | "|o" => Cardinality::ZeroOrOne,
        "}|" => Cardinality::OneOrMany,
        "}o" => Cardinality::ZeroOrMany,
        _ => Cardinality::ExactlyOne,
    }
}

fn parse_right_cardinality(s: &str) -> Cardinality {
    match s {
        "||" => Cardinality::ExactlyOne,
        "|o" | "o|" => Cardinality::ZeroOrOne,
        "|{" => Cardinality::OneOrMany,
        "o{" => Cardinality::ZeroOrMany,
        _ => Cardinality::ExactlyOne,
    }
}

/// `FOREIGN KEY (a, b) REFERENCES parent(x, y)`; the parent name is not
/// checked against the relationship line.
fn foreign_key(input: &mut &str) -> winnow::Result<ForeignKey> {
    (space0, Caseless("FOREIGN"), space1, Caseless("KEY"), space0).parse_next(input)?;
    let columns = column_list.parse_next(input)?;
    (space1, Caseless("REFERENCES"), space1).parse_next(input)?;
    identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let parent_columns = column_list.parse_next(input)?;
    take_till(0.., ['\r', '\n']).parse_next(input)?;
    Ok(ForeignKey {
        columns,
        parent_columns,
    })
}

fn column_list(input: &mut &str) -> winnow::Result<Vec<String>> {
    delimited(
        ("(", space0),
        separated(1.., identifier, (space0, ",", space0)),
        (space0, ")"),
    )
    .parse_next(input)
}
