//! Logical SQL dumps of a SQLite database.
//!
//! Output shape, per table:
//!
//! ```text
//! DROP TABLE IF EXISTS `name`;
//! CREATE TABLE ...;
//! INSERT INTO `name` (`col`, ...) VALUES (...);   -- one line per row, full dumps only
//! CREATE INDEX ...;                              -- indexes and triggers, if any
//! ```
//!
//! The whole dump is bracketed by `SET FOREIGN_KEY_CHECKS=0;` and
//! `SET FOREIGN_KEY_CHECKS=1;`. SQLite does not understand those lines;
//! [`prepare_for_replay`] strips them before a restore.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::fmt::Write as _;

pub const FK_OFF: &str = "SET FOREIGN_KEY_CHECKS=0;";
pub const FK_ON: &str = "SET FOREIGN_KEY_CHECKS=1;";

/// Result of dumping a set of tables.
#[derive(Debug, Clone)]
pub struct Dump {
    pub sql: String,
    pub tables: usize,
    pub rows: usize,
}

/// User tables in name order, restricted to `allow` when it is non-empty.
pub fn list_tables(conn: &Connection, allow: &[String]) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let all: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    if allow.is_empty() {
        return Ok(all);
    }

    for wanted in allow {
        if !all.contains(wanted) {
            tracing::warn!(table = %wanted, "allow-listed table does not exist, skipping");
        }
    }
    Ok(all.into_iter().filter(|t| allow.contains(t)).collect())
}

/// Dump `tables`, schema always, rows only when `with_data` is set.
pub fn dump_tables(conn: &Connection, tables: &[String], with_data: bool) -> rusqlite::Result<Dump> {
    let mut sql = String::new();
    let mut rows = 0;

    let _ = writeln!(sql, "-- newsdesk SQL dump");
    let _ = writeln!(sql, "-- Generated: {}", crate::db::now_rfc3339());
    let _ = writeln!(sql, "-- Tables: {}", tables.len());
    sql.push('\n');
    sql.push_str(FK_OFF);
    sql.push_str("\n\n");

    for table in tables {
        let create: String = conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;

        let _ = writeln!(sql, "-- Table `{}`", table);
        let _ = writeln!(sql, "DROP TABLE IF EXISTS {};", quote_ident(table));
        let _ = writeln!(sql, "{};", create.trim_end_matches(';'));

        if with_data {
            rows += dump_rows(conn, table, &mut sql)?;
        }

        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master
             WHERE tbl_name = ?1 AND type IN ('index', 'trigger') AND sql IS NOT NULL
             ORDER BY type, name",
        )?;
        let extras: Vec<String> = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        for extra in extras {
            let _ = writeln!(sql, "{};", extra.trim_end_matches(';'));
        }
        sql.push('\n');
    }

    sql.push_str(FK_ON);
    sql.push('\n');

    Ok(Dump {
        sql,
        tables: tables.len(),
        rows,
    })
}

fn dump_rows(conn: &Connection, table: &str, out: &mut String) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
    let columns = stmt
        .column_names()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let width = stmt.column_count();

    let mut rows = stmt.query([])?;
    let mut count = 0;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(sql_literal(row.get_ref(i)?));
        }
        let _ = writeln!(
            out,
            "INSERT INTO {} ({}) VALUES ({});",
            quote_ident(table),
            columns,
            values.join(", ")
        );
        count += 1;
    }
    Ok(count)
}

/// Backtick-quoted identifier.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render one value as a SQL literal.
pub fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) if f.is_nan() => "NULL".to_string(),
        ValueRef::Real(f) if f.is_infinite() => {
            let literal = if f > 0.0 { "9e999" } else { "-9e999" };
            literal.to_string()
        }
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(bytes) => quote_text(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => format!("X'{}'", hex::encode(bytes)),
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Turn a dump into a script SQLite can execute.
pub fn prepare_for_replay(sql: &str) -> String {
    sql.lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed != FK_OFF && trimmed != FK_ON
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of tables a dump recreates.
pub fn count_tables(sql: &str) -> usize {
    sql.lines()
        .filter(|line| line.starts_with("DROP TABLE IF EXISTS "))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, avatar BLOB);
             CREATE INDEX idx_users_name ON users(name);
             CREATE TABLE empty (id INTEGER);
             INSERT INTO users VALUES (1, 'O''Brien', 1.5, X'00ff');
             INSERT INTO users VALUES (2, NULL, NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(sql_literal(ValueRef::Null), "NULL");
        assert_eq!(sql_literal(ValueRef::Integer(-42)), "-42");
        assert_eq!(sql_literal(ValueRef::Real(1.5)), "1.5");
        assert_eq!(sql_literal(ValueRef::Real(2.0)), "2.0");
        assert_eq!(sql_literal(ValueRef::Text(b"it's")), "'it''s'");
        assert_eq!(sql_literal(ValueRef::Blob(&[0xde, 0xad])), "X'dead'");
    }

    #[test]
    fn identifiers_are_backtick_quoted() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn full_dump_has_schema_and_rows_per_table() {
        let conn = sample();
        let tables = list_tables(&conn, &[]).unwrap();
        assert_eq!(tables, vec!["empty", "users"]);

        let dump = dump_tables(&conn, &tables, true).unwrap();
        assert_eq!(dump.tables, 2);
        assert_eq!(dump.rows, 2);

        let lines: Vec<&str> = dump.sql.lines().collect();
        let first_stmt = lines.iter().find(|l| !l.starts_with("--") && !l.is_empty());
        assert_eq!(first_stmt, Some(&FK_OFF));
        assert_eq!(lines.last(), Some(&FK_ON));
        assert_eq!(count_tables(&dump.sql), 2);
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("CREATE TABLE")).count(),
            2
        );
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("INSERT INTO")).count(),
            2
        );
        assert!(dump.sql.contains("'O''Brien'"));
        assert!(dump.sql.contains("X'00ff'"));
        assert!(dump.sql.contains("CREATE INDEX idx_users_name"));
    }

    #[test]
    fn structure_dump_has_no_rows() {
        let conn = sample();
        let tables = list_tables(&conn, &[]).unwrap();
        let dump = dump_tables(&conn, &tables, false).unwrap();
        assert_eq!(dump.rows, 0);
        assert!(!dump.sql.contains("INSERT INTO"));
        assert_eq!(count_tables(&dump.sql), 2);
    }

    #[test]
    fn allow_list_restricts_tables() {
        let conn = sample();
        let tables = list_tables(&conn, &["users".into(), "missing".into()]).unwrap();
        assert_eq!(tables, vec!["users"]);
    }

    #[test]
    fn replayed_dump_recreates_data() {
        let source = sample();
        let tables = list_tables(&source, &[]).unwrap();
        let dump = dump_tables(&source, &tables, true).unwrap();

        let target = Connection::open_in_memory().unwrap();
        target.execute_batch("CREATE TABLE users (id INTEGER)").unwrap();
        target.execute_batch(&prepare_for_replay(&dump.sql)).unwrap();

        let (name, avatar): (String, Vec<u8>) = target
            .query_row("SELECT name, avatar FROM users WHERE id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "O'Brien");
        assert_eq!(avatar, vec![0x00, 0xff]);
        let count: i64 = target
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
