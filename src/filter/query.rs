//! Filter-to-SQL compiler for the `logs` table layout.
//!
//! Every fetch is "N rows after/before a row id, honouring the filter":
//!
//! ```text
//! SELECT <columns> FROM <table>
//!   [WHERE id </> anchor AND level_num <= L AND facility_num = F
//!          AND (host = 'a' OR host LIKE 'b%') AND host <> 'c' ...]
//!   ORDER BY id ASC|DESC LIMIT n
//! ```
//!
//! Host and program filters are whitespace-separated terms. A trailing `*`
//! makes a prefix match, a leading `!` negates. Include terms are OR-ed inside
//! parentheses; each exclude term is AND-ed on its own.

use super::state::FilterState;

/// Columns selected by every query, in row-decoding order.
pub const COLUMNS: &str = "id, facility_num, level_num, host, datetime, program, pid, message";

/// Default log table name.
pub const DEFAULT_TABLE: &str = "logs";

/// Table names are spliced into SQL unquoted, so only `[A-Za-z_][A-Za-z0-9_]*`
/// is accepted.
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text form of the `datetime` column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compiles a [`FilterState`] plus a pagination anchor into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCompiler {
    filter: FilterState,
    table: String,
}

impl QueryCompiler {
    #[must_use]
    pub fn new(filter: FilterState, table: impl Into<String>) -> Self {
        Self {
            filter,
            table: table.into(),
        }
    }

    /// The filter this compiler was built from.
    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Page query anchored (exclusively) at `anchor`.
    pub fn fetch_query(&self, anchor: Option<i64>, descending: bool, count: usize) -> String {
        let mut parts = vec![format!("SELECT {COLUMNS}"), format!("FROM {}", self.table)];
        let conditions = self.conditions(anchor, descending);
        if !conditions.is_empty() {
            parts.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        parts.push(format!(
            "ORDER BY id {}",
            if descending { "DESC" } else { "ASC" }
        ));
        parts.push(format!("LIMIT {count}"));
        parts.join(" ")
    }

    /// First row at or after the configured start date; `None` without one.
    pub fn datetime_query(&self) -> Option<String> {
        let start = self.filter.start_date()?;
        Some(format!(
            "SELECT {COLUMNS} FROM {} WHERE datetime >= {} ORDER BY datetime ASC LIMIT 1",
            self.table,
            quote(&start.format(DATETIME_FORMAT).to_string()),
        ))
    }

    fn conditions(&self, anchor: Option<i64>, descending: bool) -> Vec<String> {
        let mut conds = Vec::new();
        if let Some(anchor) = anchor {
            let op = if descending { '<' } else { '>' };
            conds.push(format!("id {op} {anchor}"));
        }
        if let Some(level) = self.filter.explicit_level() {
            conds.push(format!("level_num <= {level}"));
        }
        if let Some(facility) = self.filter.facility() {
            conds.push(format!("facility_num = {facility}"));
        }
        if let Some(cond) = self.filter.host().and_then(|h| string_condition("host", h)) {
            conds.push(cond);
        }
        if let Some(cond) = self
            .filter
            .program()
            .and_then(|p| string_condition("program", p))
        {
            conds.push(cond);
        }
        conds
    }
}

/// Condition for a whitespace-separated term list; `None` if it has no terms.
pub fn string_condition(column: &str, terms: &str) -> Option<String> {
    let (exclude, include): (Vec<&str>, Vec<&str>) =
        terms.split_whitespace().partition(|t| t.starts_with('!'));

    let mut parts = Vec::with_capacity(exclude.len() + 1);
    if !include.is_empty() {
        let any = include
            .iter()
            .map(|term| term_condition(column, term))
            .collect::<Vec<_>>()
            .join(" OR ");
        parts.push(format!("({any})"));
    }
    parts.extend(exclude.iter().map(|term| term_condition(column, term)));

    (!parts.is_empty()).then(|| parts.join(" AND "))
}

fn term_condition(column: &str, term: &str) -> String {
    let (value, prefix) = match term.strip_suffix('*') {
        Some(stem) if !stem.is_empty() => (stem, true),
        _ => (term, false),
    };
    let (value, negated) = match value.strip_prefix('!') {
        Some(rest) if !rest.is_empty() => (rest, true),
        _ => (value, false),
    };

    match (prefix, negated) {
        (false, false) => format!("{column} = {}", quote(value)),
        (false, true) => format!("{column} <> {}", quote(value)),
        (true, false) => format!("{column} LIKE {}", quote(&format!("{value}%"))),
        (true, true) => format!("{column} NOT LIKE {}", quote(&format!("{value}%"))),
    }
}

/// Single-quoted SQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const SELECT: &str = "SELECT id, facility_num, level_num, host, datetime, program, pid, message FROM logs";

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("logs"));
        assert!(is_plain_identifier("_syslog_2024"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("9lives"));
        assert!(!is_plain_identifier("logs; DROP TABLE logs"));
        assert!(!is_plain_identifier("logs x"));
    }

    fn compiler(filter: FilterState) -> QueryCompiler {
        QueryCompiler::new(filter, DEFAULT_TABLE)
    }

    #[test]
    fn query_without_anchor() {
        let sql = compiler(FilterState::new()).fetch_query(None, true, 10);
        assert_eq!(sql, format!("{SELECT} ORDER BY id DESC LIMIT 10"));
    }

    #[test]
    fn query_with_different_limit() {
        let sql = compiler(FilterState::new()).fetch_query(None, true, 1);
        assert_eq!(sql, format!("{SELECT} ORDER BY id DESC LIMIT 1"));
    }

    #[test]
    fn query_with_anchor_descending() {
        let sql = compiler(FilterState::new()).fetch_query(Some(100), true, 10);
        assert_eq!(sql, format!("{SELECT} WHERE id < 100 ORDER BY id DESC LIMIT 10"));
    }

    #[test]
    fn query_with_anchor_ascending() {
        let sql = compiler(FilterState::new()).fetch_query(Some(100), false, 10);
        assert_eq!(sql, format!("{SELECT} WHERE id > 100 ORDER BY id ASC LIMIT 10"));
    }

    #[test]
    fn query_with_level_filter() {
        let mut filter = FilterState::new();
        filter.set_level(3);
        let sql = compiler(filter).fetch_query(Some(100), true, 10);
        assert_eq!(
            sql,
            format!("{SELECT} WHERE id < 100 AND level_num <= 3 ORDER BY id DESC LIMIT 10")
        );
    }

    #[test]
    fn query_with_facility_filter() {
        let mut filter = FilterState::new();
        filter.set_facility(Some(4)).unwrap();
        let sql = compiler(filter).fetch_query(None, false, 5);
        assert_eq!(
            sql,
            format!("{SELECT} WHERE facility_num = 4 ORDER BY id ASC LIMIT 5")
        );
    }

    #[test]
    fn program_include_group_precedes_excludes() {
        let mut filter = FilterState::new();
        filter.set_program("!sshd s*");
        let sql = compiler(filter).fetch_query(Some(100), true, 10);
        assert_eq!(
            sql,
            format!(
                "{SELECT} WHERE id < 100 AND (program LIKE 's%') AND program <> 'sshd' \
                 ORDER BY id DESC LIMIT 10"
            )
        );
    }

    #[test]
    fn host_and_program_clauses_in_order() {
        let mut filter = FilterState::new();
        filter.set_level(6);
        filter.set_facility(Some(0)).unwrap();
        filter.set_host("web1  db*");
        filter.set_program("!cron*");
        let sql = compiler(filter).fetch_query(None, true, 3);
        assert_eq!(
            sql,
            format!(
                "{SELECT} WHERE level_num <= 6 AND facility_num = 0 \
                 AND (host = 'web1' OR host LIKE 'db%') AND program NOT LIKE 'cron%' \
                 ORDER BY id DESC LIMIT 3"
            )
        );
    }

    #[test]
    fn lone_wildcard_and_bang_match_literally() {
        assert_eq!(string_condition("host", "*").unwrap(), "(host = '*')");
        assert_eq!(string_condition("host", "!").unwrap(), "host = '!'");
    }

    #[test]
    fn blank_terms_produce_no_condition() {
        assert_eq!(string_condition("host", "   "), None);
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(
            string_condition("program", "o'brien").unwrap(),
            "(program = 'o''brien')"
        );
    }

    #[test]
    fn datetime_query_requires_start_date() {
        assert_eq!(compiler(FilterState::new()).datetime_query(), None);

        let mut filter = FilterState::new();
        filter.set_start_date(
            NaiveDate::from_ymd_opt(2024, 2, 29).and_then(|d| d.and_hms_opt(8, 5, 0)),
        );
        assert_eq!(
            compiler(filter).datetime_query().unwrap(),
            format!(
                "{SELECT} WHERE datetime >= '2024-02-29 08:05:00' ORDER BY datetime ASC LIMIT 1"
            )
        );
    }

    #[test]
    fn custom_table_name() {
        let sql = QueryCompiler::new(FilterState::new(), "syslog").fetch_query(None, true, 2);
        assert!(sql.contains("FROM syslog ORDER BY"));
    }
}
