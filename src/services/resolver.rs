//! Get-or-create identity resolution for the code lookup tables.

use crate::schema;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupTable {
    Teacher,
    Room,
    Class,
    Subject,
}

impl LookupTable {
    pub fn name(self) -> &'static str {
        match self {
            LookupTable::Teacher => "teacher",
            LookupTable::Room => "room",
            LookupTable::Class => "class",
            LookupTable::Subject => "subject",
        }
    }
}

impl fmt::Display for LookupTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Select the id for `code`, inserting a row first when there is none.
macro_rules! find_or_insert {
    ($conn:expr, $table:ident, $code:expr) => {{
        use schema::$table::dsl as T;
        let existing = T::$table
            .filter(T::code.eq($code))
            .select(T::id)
            .first::<i32>($conn)
            .optional()?;
        match existing {
            Some(id) => id,
            None => diesel::insert_into(T::$table)
                .values(T::code.eq($code))
                .returning(T::id)
                .get_result::<i32>($conn)?,
        }
    }};
}

/// Maps `(table, code)` to a stable row id for the duration of one run.
///
/// The in-memory map is only a shortcut; the `UNIQUE(code)` constraint in the
/// store is what guarantees one row per code. The map must not outlive the
/// tables it caches, so build a fresh resolver after every schema reset.
#[derive(Debug, Default)]
pub struct EntityResolver {
    ids: HashMap<(LookupTable, String), i32>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `code` in `table`, created on first sight.
    ///
    /// Blank or missing codes resolve to `None` without touching the store.
    pub fn resolve(
        &mut self,
        conn: &mut SqliteConnection,
        table: LookupTable,
        code: Option<&str>,
    ) -> QueryResult<Option<i32>> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        if let Some(id) = self.ids.get(&(table, code.to_string())) {
            return Ok(Some(*id));
        }

        let id = conn.transaction(|conn| -> QueryResult<i32> {
            Ok(match table {
                LookupTable::Teacher => find_or_insert!(conn, teacher, code),
                LookupTable::Room => find_or_insert!(conn, room, code),
                LookupTable::Class => find_or_insert!(conn, class, code),
                LookupTable::Subject => find_or_insert!(conn, subject, code),
            })
        })?;
        debug!("Resolver: {} {:?} -> {}", table, code, id);
        self.ids.insert((table, code.to_string()), id);
        Ok(Some(id))
    }

    /// Number of distinct codes seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::derived::reset_derived_schema;
    use crate::db::models::CodeRow;
    use crate::test_support::memory_connection;

    fn codes(conn: &mut SqliteConnection) -> Vec<CodeRow> {
        schema::teacher::table
            .select((schema::teacher::id, schema::teacher::code))
            .order(schema::teacher::id)
            .load(conn)
            .unwrap()
    }

    #[test]
    fn same_code_same_id_single_row() {
        let mut conn = memory_connection();
        reset_derived_schema(&mut conn).unwrap();
        let mut resolver = EntityResolver::new();

        let first = resolver.resolve(&mut conn, LookupTable::Teacher, Some("HEMA")).unwrap();
        let second = resolver.resolve(&mut conn, LookupTable::Teacher, Some(" HEMA ")).unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(codes(&mut conn), vec![CodeRow { id: first.unwrap(), code: "HEMA".into() }]);
    }

    #[test]
    fn fresh_resolver_reuses_existing_rows() {
        let mut conn = memory_connection();
        reset_derived_schema(&mut conn).unwrap();

        let a = EntityResolver::new()
            .resolve(&mut conn, LookupTable::Room, Some("A302"))
            .unwrap();
        let b = EntityResolver::new()
            .resolve(&mut conn, LookupTable::Room, Some("A302"))
            .unwrap();
        assert_eq!(a, b);
        let count: i64 = schema::room::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn blank_codes_resolve_to_nothing() {
        let mut conn = memory_connection();
        reset_derived_schema(&mut conn).unwrap();
        let mut resolver = EntityResolver::new();

        assert_eq!(resolver.resolve(&mut conn, LookupTable::Class, None).unwrap(), None);
        assert_eq!(resolver.resolve(&mut conn, LookupTable::Class, Some("   ")).unwrap(), None);
        assert!(resolver.is_empty());
        let count: i64 = schema::class::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn codes_are_case_preserving_and_per_table() {
        let mut conn = memory_connection();
        reset_derived_schema(&mut conn).unwrap();
        let mut resolver = EntityResolver::new();

        let upper = resolver.resolve(&mut conn, LookupTable::Teacher, Some("KEIL")).unwrap();
        let lower = resolver.resolve(&mut conn, LookupTable::Teacher, Some("keil")).unwrap();
        let room = resolver.resolve(&mut conn, LookupTable::Room, Some("KEIL")).unwrap();
        assert_ne!(upper, lower);
        assert_eq!(room, Some(1));
        assert_eq!(resolver.len(), 3);
    }
}
