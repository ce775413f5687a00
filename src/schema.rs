use std::fmt;

use crate::error::SchemaError;

/// Stable handle of a relation inside its [`Schema`]. Ids are never reused,
/// so a column holding an id of a removed relation is detectably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub usize);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ExactlyOne,
    ZeroOrOne,
    OneOrMany,
    ZeroOrMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Adds a label unless one with the same name is already present.
    pub fn insert(&mut self, name: &str) {
        if !self.contains(name) {
            self.0.push(Label {
                name: name.to_string(),
            });
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|l| l.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub name: String,
    pub col_type: String,
    pub key: Option<String>,
    pub comment: Option<String>,
    /// Relations where this column is on the referenced (parent) side.
    pub child_relations: Vec<RelationId>,
    /// Relations where this column is on the referencing (child) side.
    pub parent_relations: Vec<RelationId>,
}

impl Column {
    pub fn new(name: &str, col_type: &str) -> Self {
        Self {
            name: name.to_string(),
            col_type: col_type.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub labels: Labels,
    pub columns: Vec<Column>,
    pub comment: Option<String>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.labels.insert(label);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn find_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

/// A foreign-key-like edge from a child `table` to a `parent_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: RelationId,
    pub table: String,
    pub columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub cardinality: Cardinality,
    pub parent_cardinality: Cardinality,
    pub def: String,
}

impl Relation {
    pub fn touches(&self, table: &str) -> bool {
        self.table == table || self.parent_table == table
    }
}

/// Input of [`Schema::add_relation`]; the schema assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelation {
    pub table: String,
    pub columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub cardinality: Cardinality,
    pub parent_cardinality: Cardinality,
    pub def: String,
}

impl NewRelation {
    /// A many-to-one relation between two tables with no column binding.
    pub fn between(table: &str, parent_table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            parent_table: parent_table.to_string(),
            parent_columns: Vec::new(),
            cardinality: Cardinality::ZeroOrMany,
            parent_cardinality: Cardinality::ExactlyOne,
            def: String::new(),
        }
    }

    /// Builds the relation from `FOREIGN KEY (..)` columns, setting `def`.
    pub fn foreign_key(
        table: &str,
        columns: &[&str],
        parent_table: &str,
        parent_columns: &[&str],
    ) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let parent_columns: Vec<String> = parent_columns.iter().map(|c| c.to_string()).collect();
        let def = format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            columns.join(", "),
            parent_table,
            parent_columns.join(", ")
        );
        Self {
            columns,
            parent_columns,
            def,
            ..Self::between(table, parent_table)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub current_schema: Option<String>,
    pub tables: Vec<Table>,
    pub relations: Vec<Relation>,
    next_relation_id: usize,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_schema(mut self, name: &str) -> Self {
        self.current_schema = Some(name.to_string());
        self
    }

    pub fn add_table(&mut self, table: Table) -> Result<(), SchemaError> {
        if self.find_table(&table.name).is_some() {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        self.tables.push(table);
        Ok(())
    }

    /// Registers a relation and its back-references on the bound columns.
    pub fn add_relation(&mut self, new: NewRelation) -> Result<RelationId, SchemaError> {
        let id = RelationId(self.next_relation_id);
        self.check_columns(&new.table, &new.columns)?;
        self.check_columns(&new.parent_table, &new.parent_columns)?;

        if let Some(child) = self.find_table_mut(&new.table) {
            for name in &new.columns {
                if let Some(column) = child.find_column_mut(name) {
                    column.parent_relations.push(id);
                }
            }
        }
        if let Some(parent) = self.find_table_mut(&new.parent_table) {
            for name in &new.parent_columns {
                if let Some(column) = parent.find_column_mut(name) {
                    column.child_relations.push(id);
                }
            }
        }

        self.next_relation_id += 1;
        self.relations.push(Relation {
            id,
            table: new.table,
            columns: new.columns,
            parent_table: new.parent_table,
            parent_columns: new.parent_columns,
            cardinality: new.cardinality,
            parent_cardinality: new.parent_cardinality,
            def: new.def,
        });
        Ok(id)
    }

    fn check_columns(&self, table: &str, columns: &[String]) -> Result<(), SchemaError> {
        let t = self
            .find_table(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))?;
        match columns.iter().find(|c| t.find_column(c).is_none()) {
            Some(missing) => Err(SchemaError::ColumnNotFound {
                table: table.to_string(),
                column: missing.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn find_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn find_relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn relations_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.touches(table))
    }

    /// Qualifies an unqualified table name with the current schema.
    pub fn normalize_table_name(&self, name: &str) -> String {
        match &self.current_schema {
            Some(schema) if !name.contains('.') => format!("{schema}.{name}"),
            _ => name.to_string(),
        }
    }

    pub fn normalize_table_names(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|n| self.normalize_table_name(n)).collect()
    }

    /// Verifies that relation endpoints exist and every column back-reference
    /// resolves to a relation of this schema.
    pub fn check_integrity(&self) -> Result<(), SchemaError> {
        for r in &self.relations {
            for name in [&r.table, &r.parent_table] {
                if self.find_table(name).is_none() {
                    return Err(SchemaError::TableNotFound(name.clone()));
                }
            }
        }
        for t in &self.tables {
            for c in &t.columns {
                let mut refs = c.child_relations.iter().chain(&c.parent_relations);
                if let Some(id) = refs.find(|id| self.find_relation(**id).is_none()) {
                    return Err(SchemaError::DanglingRelation {
                        table: t.name.clone(),
                        column: c.name.clone(),
                        id: *id,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Schema {
        let mut schema = Schema::new();
        schema
            .add_table(Table::new("users").with_columns(vec![Column::new("id", "bigint")]))
            .unwrap();
        schema
            .add_table(Table::new("orders").with_columns(vec![
                Column::new("id", "bigint"),
                Column::new("user_id", "bigint"),
            ]))
            .unwrap();
        schema
            .add_relation(NewRelation::foreign_key("orders", &["user_id"], "users", &["id"]))
            .unwrap();
        schema
    }

    #[test]
    fn add_relation_registers_back_references() {
        let schema = shop();
        let id = schema.relations[0].id;
        assert_eq!(schema.find_relation(id).unwrap().parent_table, "users");
        let orders = schema.find_table("orders").unwrap();
        assert_eq!(orders.find_column("user_id").unwrap().parent_relations, vec![id]);
        assert!(orders.find_column("id").unwrap().parent_relations.is_empty());
        let users = schema.find_table("users").unwrap();
        assert_eq!(users.find_column("id").unwrap().child_relations, vec![id]);
        assert_eq!(
            schema.relations[0].def,
            "FOREIGN KEY (user_id) REFERENCES users(id)"
        );
    }

    #[test]
    fn add_relation_rejects_unknown_column() {
        let mut schema = shop();
        let err = schema
            .add_relation(NewRelation::foreign_key("orders", &["nope"], "users", &["id"]))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::ColumnNotFound {
                table: "orders".into(),
                column: "nope".into()
            }
        );
    }

    #[test]
    fn add_relation_rejects_unknown_table() {
        let mut schema = shop();
        let err = schema
            .add_relation(NewRelation::between("orders", "ghost"))
            .unwrap_err();
        assert_eq!(err, SchemaError::TableNotFound("ghost".into()));
    }

    #[test]
    fn relation_ids_are_not_reused() {
        let mut schema = shop();
        let first = schema.relations[0].id;
        schema.relations.clear();
        let second = schema
            .add_relation(NewRelation::between("orders", "users"))
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let mut schema = shop();
        let err = schema.add_table(Table::new("users")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTable("users".into()));
    }

    #[test]
    fn normalize_qualifies_only_bare_names() {
        let schema = Schema::new().with_current_schema("public");
        let names = vec!["orders".to_string(), "audit.logs".to_string(), "user_*".to_string()];
        assert_eq!(
            schema.normalize_table_names(&names),
            vec!["public.orders", "audit.logs", "public.user_*"]
        );
        assert_eq!(Schema::new().normalize_table_name("orders"), "orders");
    }

    #[test]
    fn integrity_detects_dangling_back_reference() {
        let mut schema = shop();
        assert_eq!(schema.check_integrity(), Ok(()));
        schema.relations.clear();
        let err = schema.check_integrity().unwrap_err();
        assert!(matches!(err, SchemaError::DanglingRelation { .. }), "got: {err:?}");
    }

    #[test]
    fn labels_deduplicate() {
        let table = Table::new("t").with_label("core").with_label("core");
        assert_eq!(table.labels.iter().count(), 1);
        assert!(table.labels.contains("core"));
    }
}
