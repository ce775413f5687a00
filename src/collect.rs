use std::collections::{HashSet, VecDeque};

use crate::error::SchemaError;
use crate::schema::{RelationId, Schema};

impl Schema {
    /// Tables and relations reachable from `start` within `distance` hops,
    /// following relations in both directions. The start table comes first;
    /// both lists are in discovery order without duplicates.
    pub fn collect_tables_and_relations(
        &self,
        start: &str,
        distance: usize,
    ) -> Result<(Vec<String>, Vec<RelationId>), SchemaError> {
        if self.find_table(start).is_none() {
            return Err(SchemaError::TableNotFound(start.to_string()));
        }

        let mut tables = vec![start.to_string()];
        let mut relations = Vec::new();
        let mut seen_tables: HashSet<&str> = HashSet::from([start]);
        let mut seen_relations: HashSet<RelationId> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(start, 0)]);

        while let Some((name, depth)) = queue.pop_front() {
            if depth == distance {
                continue;
            }
            for r in self.relations_of(name) {
                if seen_relations.insert(r.id) {
                    relations.push(r.id);
                }
                let neighbours = [r.table.as_str(), r.parent_table.as_str()];
                for next in neighbours.into_iter().filter(|&n| n != name) {
                    if self.find_table(next).is_none() {
                        return Err(SchemaError::TableNotFound(next.to_string()));
                    }
                    if seen_tables.insert(next) {
                        tables.push(next.to_string());
                        queue.push_back((next, depth + 1));
                    }
                }
            }
        }

        Ok((tables, relations))
    }
}
