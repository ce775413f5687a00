use std::collections::{HashMap, HashSet};

use crate::error::{FilterError, SchemaError};
use crate::pattern::PatternSet;
use crate::schema::{RelationId, Schema, Table};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOption {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub include_labels: Vec<String>,
    /// Hops from a kept table within which dropped tables are preserved.
    pub distance: usize,
}

/// Partition of the schema's tables, both lists in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Keep,
    Drop,
}

struct Matchers {
    include: PatternSet,
    exclude: PatternSet,
    include_labels: PatternSet,
    /// No include pattern nor label pattern was given.
    include_all: bool,
}

impl Matchers {
    fn new(schema: &Schema, opt: &FilterOption) -> Result<Self, regex::Error> {
        let mut include = opt.include.clone();
        include.extend(schema.normalize_table_names(&opt.include));
        let mut exclude = opt.exclude.clone();
        exclude.extend(schema.normalize_table_names(&opt.exclude));
        let include = PatternSet::new(&include)?;
        let include_labels = PatternSet::new(&opt.include_labels)?;
        Ok(Self {
            include_all: include.is_empty() && include_labels.is_empty(),
            include,
            exclude: PatternSet::new(&exclude)?,
            include_labels,
        })
    }

    fn decide(&self, table: &Table) -> Decision {
        let included = self.include.best_match(&table.name);
        let excluded = self.exclude.best_match(&table.name);
        let labelled = table
            .labels
            .iter()
            .any(|l| self.include_labels.matches_any(&l.name));

        // First matching arm wins; a name match never falls through to labels.
        match included {
            Some(i) if excluded.is_some_and(|e| e > i) => Decision::Drop,
            Some(_) => Decision::Keep,
            None if labelled && excluded.is_some() => Decision::Drop,
            None if labelled => Decision::Keep,
            None if self.include_all && excluded.is_some() => Decision::Drop,
            None if self.include_all => Decision::Keep,
            None => Decision::Drop,
        }
    }
}

pub fn classify(schema: &Schema, opt: &FilterOption) -> Result<Classification, FilterError> {
    let matchers = Matchers::new(schema, opt)?;
    let mut classification = Classification::default();
    for table in &schema.tables {
        let decision = matchers.decide(table);
        log::debug!("table '{}' classified {:?}", table.name, decision);
        match decision {
            Decision::Keep => classification.kept.push(table.name.clone()),
            Decision::Drop => classification.dropped.push(table.name.clone()),
        }
    }
    Ok(classification)
}

/// Tables within `distance` hops of a kept table that are not kept themselves.
pub fn protected_tables(
    schema: &Schema,
    kept: &[String],
    distance: usize,
) -> Result<HashSet<String>, SchemaError> {
    let kept_set: HashSet<&str> = kept.iter().map(String::as_str).collect();
    let mut protected = HashSet::new();
    for name in kept {
        let (tables, _) = schema.collect_tables_and_relations(name, distance)?;
        protected.extend(tables.into_iter().filter(|t| !kept_set.contains(t.as_str())));
    }
    Ok(protected)
}

/// Removes `name` and every relation touching it, including the column
/// back-references. Removing an absent table is a no-op.
///
/// The schema is only mutated once every column reference has been
/// resolved, so an error leaves it untouched.
pub fn exclude_table(schema: &mut Schema, name: &str) -> Result<(), SchemaError> {
    let touching: HashMap<RelationId, bool> = schema
        .relations
        .iter()
        .map(|r| (r.id, r.touches(name)))
        .collect();

    for table in &schema.tables {
        for column in &table.columns {
            let mut refs = column.child_relations.iter().chain(&column.parent_relations);
            if let Some(id) = refs.find(|id| !touching.contains_key(*id)) {
                return Err(SchemaError::DanglingRelation {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    id: *id,
                });
            }
        }
    }

    let keep = |id: &RelationId| !touching.get(id).copied().unwrap_or(false);
    schema.tables.retain(|t| t.name != name);
    for table in &mut schema.tables {
        for column in &mut table.columns {
            column.child_relations.retain(keep);
            column.parent_relations.retain(keep);
        }
    }
    schema.relations.retain(|r| !r.touches(name));
    Ok(())
}

/// Drops every table the options do not select, except tables within
/// `opt.distance` hops of a selected one.
pub fn filter(schema: &mut Schema, opt: &FilterOption) -> Result<(), FilterError> {
    let Classification { kept, dropped } = classify(schema, opt)?;
    let protected = protected_tables(schema, &kept, opt.distance)?;

    let mut removed = 0;
    for name in dropped.iter().filter(|t| !protected.contains(*t)) {
        exclude_table(schema, name).map_err(|source| FilterError::Exclude {
            table: name.clone(),
            source,
        })?;
        log::debug!("excluded table '{name}'");
        removed += 1;
    }

    log::info!(
        "filter kept {} tables ({} protected by distance {}), removed {}",
        schema.tables.len(),
        protected.len(),
        opt.distance,
        removed
    );
    Ok(())
}

impl Schema {
    pub fn filter(&mut self, opt: &FilterOption) -> Result<(), FilterError> {
        filter(self, opt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, NewRelation};

    fn options(include: &[&str], exclude: &[&str], labels: &[&str]) -> FilterOption {
        FilterOption {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            include_labels: labels.iter().map(|s| s.to_string()).collect(),
            distance: 0,
        }
    }

    fn schema_of(tables: Vec<Table>) -> Schema {
        let mut schema = Schema::new();
        for t in tables {
            schema.add_table(t).unwrap();
        }
        schema
    }

    #[test]
    fn more_specific_exclude_beats_include() {
        let schema = schema_of(vec![Table::new("user_logs"), Table::new("user_profile")]);
        let c = classify(&schema, &options(&["user_*"], &["user_logs"], &[])).unwrap();
        assert_eq!(c.kept, vec!["user_profile"]);
        assert_eq!(c.dropped, vec!["user_logs"]);
    }

    #[test]
    fn equally_specific_exclude_loses_to_include() {
        let schema = schema_of(vec![Table::new("user_logs")]);
        let c = classify(&schema, &options(&["user_logs"], &["user_log*"], &[])).unwrap();
        assert_eq!(c.kept, vec!["user_logs"]);
        let c = classify(&schema, &options(&["user_logs"], &["user_logs"], &[])).unwrap();
        assert_eq!(c.kept, vec!["user_logs"]);
    }

    #[test]
    fn best_include_is_compared_not_first() {
        let schema = schema_of(vec![Table::new("user_logs")]);
        let opt = options(&["*", "user_logs"], &["user_*"], &[]);
        let c = classify(&schema, &opt).unwrap();
        assert_eq!(c.kept, vec!["user_logs"]);
    }

    #[test]
    fn any_exclude_beats_label() {
        let schema = schema_of(vec![
            Table::new("accounts_secret").with_label("public"),
            Table::new("accounts").with_label("public"),
        ]);
        let c = classify(&schema, &options(&[], &["*_secret"], &["public"])).unwrap();
        assert_eq!(c.kept, vec!["accounts"]);
        assert_eq!(c.dropped, vec!["accounts_secret"]);
    }

    #[test]
    fn name_branch_short_circuits_label_branch() {
        // include wins on specificity, so the exclude never reaches the label rule
        let schema = schema_of(vec![Table::new("billing_secret").with_label("public")]);
        let c = classify(
            &schema,
            &options(&["billing_secret"], &["*_secret"], &["public"]),
        )
        .unwrap();
        assert_eq!(c.kept, vec!["billing_secret"]);
    }

    #[test]
    fn label_patterns_use_wildcards() {
        let schema = schema_of(vec![
            Table::new("a").with_label("team-core"),
            Table::new("b").with_label("misc"),
        ]);
        let c = classify(&schema, &options(&[], &[], &["team-*"])).unwrap();
        assert_eq!(c.kept, vec!["a"]);
        assert_eq!(c.dropped, vec!["b"]);
    }

    #[test]
    fn no_positive_filter_keeps_all_but_excludes() {
        let schema = schema_of(vec![
            Table::new("users"),
            Table::new("audit_log"),
            Table::new("orders"),
        ]);
        let c = classify(&schema, &options(&[], &["audit_log"], &[])).unwrap();
        assert_eq!(c.kept, vec!["users", "orders"]);
        assert_eq!(c.dropped, vec!["audit_log"]);
    }

    #[test]
    fn unmatched_table_is_dropped_when_positive_filter_exists() {
        let schema = schema_of(vec![Table::new("users"), Table::new("orders")]);
        let c = classify(&schema, &options(&["users"], &[], &[])).unwrap();
        assert_eq!(c.dropped, vec!["orders"]);
        let c = classify(&schema, &options(&[], &[], &["core"])).unwrap();
        assert_eq!(c.dropped, vec!["users", "orders"]);
    }

    #[test]
    fn normalized_patterns_match_qualified_names() {
        let mut schema = schema_of(vec![
            Table::new("public.users"),
            Table::new("public.audit_log"),
        ]);
        schema.current_schema = Some("public".into());
        let c = classify(&schema, &options(&["users"], &[], &[])).unwrap();
        assert_eq!(c.kept, vec!["public.users"]);
        let c = classify(&schema, &options(&[], &["audit_log"], &[])).unwrap();
        assert_eq!(c.dropped, vec!["public.audit_log"]);
    }

    fn linked() -> Schema {
        let mut schema = schema_of(vec![
            Table::new("customers").with_columns(vec![Column::new("id", "int")]),
            Table::new("orders").with_columns(vec![
                Column::new("id", "int"),
                Column::new("customer_id", "int"),
            ]),
            Table::new("items").with_columns(vec![Column::new("order_id", "int")]),
        ]);
        schema
            .add_relation(NewRelation::foreign_key(
                "orders",
                &["customer_id"],
                "customers",
                &["id"],
            ))
            .unwrap();
        schema
            .add_relation(NewRelation::foreign_key("items", &["order_id"], "orders", &["id"]))
            .unwrap();
        schema
    }

    #[test]
    fn protected_excludes_kept_tables() {
        let schema = linked();
        let kept = vec!["orders".to_string(), "items".to_string()];
        let protected = protected_tables(&schema, &kept, 1).unwrap();
        assert_eq!(protected, HashSet::from(["customers".to_string()]));
        assert!(protected_tables(&schema, &kept, 0).unwrap().is_empty());
    }

    #[test]
    fn exclude_table_removes_relations_and_back_references() {
        let mut schema = linked();
        exclude_table(&mut schema, "orders").unwrap();
        assert_eq!(schema.table_names(), vec!["customers", "items"]);
        assert!(schema.relations.is_empty());
        let customers = schema.find_table("customers").unwrap();
        assert!(customers.columns[0].child_relations.is_empty());
        let items = schema.find_table("items").unwrap();
        assert!(items.columns[0].parent_relations.is_empty());
        assert_eq!(schema.check_integrity(), Ok(()));
    }

    #[test]
    fn exclude_absent_table_is_noop() {
        let mut schema = linked();
        let before = schema.clone();
        exclude_table(&mut schema, "ghost").unwrap();
        assert_eq!(schema, before);
    }

    #[test]
    fn exclude_order_does_not_matter() {
        let mut a = linked();
        exclude_table(&mut a, "customers").unwrap();
        exclude_table(&mut a, "items").unwrap();
        let mut b = linked();
        exclude_table(&mut b, "items").unwrap();
        exclude_table(&mut b, "customers").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dangling_reference_fails_without_mutation() {
        let mut schema = linked();
        schema.find_table_mut("items").unwrap().columns[0]
            .parent_relations
            .push(RelationId(99));
        let before = schema.clone();
        let err = exclude_table(&mut schema, "customers").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DanglingRelation {
                table: "items".into(),
                column: "order_id".into(),
                id: RelationId(99),
            }
        );
        assert_eq!(schema, before);
    }

    #[test]
    fn filter_wraps_exclude_error_with_table_name() {
        let mut schema = linked();
        schema.find_table_mut("items").unwrap().columns[0]
            .parent_relations
            .push(RelationId(42));
        let err = filter(&mut schema, &options(&["orders"], &[], &[])).unwrap_err();
        assert!(matches!(&err, FilterError::Exclude { table, .. } if table == "customers"));
        assert_eq!(err.to_string(), "failed to filter table 'customers'");
    }
}
