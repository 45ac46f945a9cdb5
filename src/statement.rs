//! Statement construction.
//!
//! Statements always carry their values as bound parameters. Literal SQL
//! text (values inlined) is only produced for dump files, via
//! [`Statement::render_literal`].

use smallvec::SmallVec;

use crate::driver::Dialect;
use crate::error::{HelperError, Result};
use crate::value::{Fields, SqlValue};

/// Inline parameter storage; most inserts touch a handful of columns.
pub type Params = SmallVec<[SqlValue; 8]>;

/// SQL text with `?` placeholders plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: impl IntoIterator<Item = SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Caller-built SQL with no parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    /// `INSERT INTO table(c1,c2) VALUES (?,?)`
    pub fn insert(dialect: Dialect, table: &str, fields: &Fields) -> Result<Self> {
        Self::insert_with(dialect, "INSERT INTO", table, fields)
    }

    /// `INSERT IGNORE INTO table(c1,c2) VALUES (?,?)`, MySQL only.
    pub fn insert_ignore(table: &str, fields: &Fields) -> Result<Self> {
        Self::insert_with(Dialect::MySql, "INSERT IGNORE INTO", table, fields)
    }

    /// Insert that updates every given column when the row already exists.
    ///
    /// The values are bound twice: once for the insert, once for the update.
    pub fn upsert(dialect: Dialect, table: &str, fields: &Fields) -> Result<Self> {
        let mut stmt = Self::insert(dialect, table, fields)?;

        stmt.sql.push_str(dialect.upsert_clause());
        let assignments: Vec<String> = fields
            .keys()
            .map(|key| format!("{}=?", quote_identifier(dialect, key)))
            .collect();
        stmt.sql.push_str(&assignments.join(","));

        stmt.params.extend(fields.values().cloned());
        Ok(stmt)
    }

    fn insert_with(dialect: Dialect, verb: &str, table: &str, fields: &Fields) -> Result<Self> {
        check_identifier(table)?;
        if fields.is_empty() {
            return Err(HelperError::InvalidStatement(format!(
                "no columns given for insert into {}",
                table
            )));
        }
        for key in fields.keys() {
            check_identifier(key)?;
        }

        let keys: Vec<String> = fields
            .keys()
            .map(|key| quote_identifier(dialect, key))
            .collect();
        let placeholders = vec!["?"; fields.len()].join(",");
        let sql = format!(
            "{} {}({}) VALUES ({})",
            verb,
            quote_identifier(dialect, table),
            keys.join(","),
            placeholders
        );

        Ok(Self {
            sql,
            params: fields.values().cloned().collect(),
        })
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[inline]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Params) {
        (self.sql, self.params)
    }

    /// Inline every parameter as a MySQL literal, terminated by `;`.
    ///
    /// Placeholders inside quoted strings or identifiers are left alone.
    pub fn render_literal(&self) -> Result<String> {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for ch in self.sql.chars() {
            match quote {
                Some(q) => {
                    out.push(ch);
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' && q != '`' {
                        escaped = true;
                    } else if ch == q {
                        quote = None;
                    }
                }
                None => match ch {
                    '\'' | '"' | '`' => {
                        quote = Some(ch);
                        out.push(ch);
                    }
                    '?' => {
                        let value = params.next().ok_or_else(|| {
                            HelperError::InvalidStatement(format!(
                                "more placeholders than the {} parameters given",
                                self.params.len()
                            ))
                        })?;
                        out.push_str(&literal(value)?);
                    }
                    _ => out.push(ch),
                },
            }
        }

        if params.next().is_some() {
            return Err(HelperError::InvalidStatement(format!(
                "fewer placeholders than the {} parameters given",
                self.params.len()
            )));
        }

        let trimmed = out.trim_end();
        if !trimmed.ends_with(';') {
            let len = trimmed.len();
            out.truncate(len);
            out.push(';');
        }
        Ok(out)
    }

    /// First 100 characters of the SQL text, for log lines.
    pub(crate) fn preview(&self) -> String {
        self.sql.chars().take(100).collect()
    }
}

/// Table and column names are interpolated into SQL text, so only plain
/// identifiers (optionally `schema.table`) are accepted.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(HelperError::InvalidStatement(format!(
            "invalid identifier: {:?}",
            name
        )))
    }
}

/// Quote the segments of a checked identifier that would not parse bare:
/// reserved words and names starting with a digit or `$`.
pub(crate) fn quote_identifier(dialect: Dialect, name: &str) -> String {
    let quote = dialect.identifier_quote();
    name.split('.')
        .map(|part| {
            if needs_quoting(part) {
                format!("{quote}{part}{quote}")
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn needs_quoting(part: &str) -> bool {
    let starts_odd = part
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '$');
    starts_odd
        || RESERVED_WORDS
            .binary_search(&part.to_ascii_uppercase().as_str())
            .is_ok()
}

/// MySQL reserved words plus SQLite keywords. Sorted for binary search.
const RESERVED_WORDS: &[&str] = &[
    "ABORT", "ACCESSIBLE", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ANALYZE", "AND", "AS",
    "ASC", "ASENSITIVE", "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BIGINT",
    "BINARY", "BLOB", "BOTH", "BY", "CALL", "CASCADE", "CASE", "CAST", "CHANGE", "CHAR",
    "CHARACTER", "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONDITION", "CONFLICT", "CONSTRAINT",
    "CONTINUE", "CONVERT", "CREATE", "CROSS", "CUBE", "CUME_DIST", "CURRENT", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE", "DATABASES",
    "DAY_HOUR", "DAY_MICROSECOND", "DAY_MINUTE", "DAY_SECOND", "DEC", "DECIMAL", "DECLARE",
    "DEFAULT", "DEFERRABLE", "DEFERRED", "DELAYED", "DELETE", "DENSE_RANK", "DESC", "DESCRIBE",
    "DETACH", "DETERMINISTIC", "DISTINCT", "DISTINCTROW", "DIV", "DO", "DOUBLE", "DROP", "DUAL",
    "EACH", "ELSE", "ELSEIF", "EMPTY", "ENCLOSED", "END", "ESCAPE", "ESCAPED", "EXCEPT",
    "EXCLUSIVE", "EXISTS", "EXIT", "EXPLAIN", "FAIL", "FALSE", "FETCH", "FILTER",
    "FIRST_VALUE", "FLOAT", "FLOAT4", "FLOAT8", "FOR", "FORCE", "FOREIGN", "FROM", "FULL",
    "FULLTEXT", "FUNCTION", "GENERATED", "GET", "GLOB", "GRANT", "GROUP", "GROUPING", "GROUPS",
    "HAVING", "HIGH_PRIORITY", "HOUR_MICROSECOND", "HOUR_MINUTE", "HOUR_SECOND", "IF", "IGNORE",
    "IMMEDIATE", "IN", "INDEX", "INDEXED", "INFILE", "INITIALLY", "INNER", "INOUT",
    "INSENSITIVE", "INSERT", "INSTEAD", "INT", "INT1", "INT2", "INT3", "INT4", "INT8",
    "INTEGER", "INTERSECT", "INTERVAL", "INTO", "IO_AFTER_GTIDS", "IO_BEFORE_GTIDS", "IS",
    "ISNULL", "ITERATE", "JOIN", "JSON_TABLE", "KEY", "KEYS", "KILL", "LAG", "LAST_VALUE",
    "LATERAL", "LEAD", "LEADING", "LEAVE", "LEFT", "LIKE", "LIMIT", "LINEAR", "LINES", "LOAD",
    "LOCALTIME", "LOCALTIMESTAMP", "LOCK", "LONG", "LONGBLOB", "LONGTEXT", "LOOP",
    "LOW_PRIORITY", "MASTER_BIND", "MASTER_SSL_VERIFY_SERVER_CERT", "MATCH", "MAXVALUE",
    "MEDIUMBLOB", "MEDIUMINT", "MEDIUMTEXT", "MIDDLEINT", "MINUTE_MICROSECOND",
    "MINUTE_SECOND", "MOD", "MODIFIES", "NATURAL", "NO", "NOT", "NOTHING", "NOTNULL",
    "NO_WRITE_TO_BINLOG", "NTH_VALUE", "NTILE", "NULL", "NULLS", "NUMERIC", "OF", "OFFSET",
    "ON", "OPTIMIZE", "OPTIMIZER_COSTS", "OPTION", "OPTIONALLY", "OR", "ORDER", "OUT",
    "OUTER", "OUTFILE", "OVER", "PARTITION", "PERCENT_RANK", "PLAN", "PRAGMA", "PRECISION",
    "PRIMARY", "PROCEDURE", "PURGE", "QUERY", "RAISE", "RANGE", "RANK", "READ", "READS",
    "READ_WRITE", "REAL", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME",
    "REPEAT", "REPLACE", "REQUIRE", "RESIGNAL", "RESTRICT", "RETURN", "RETURNING", "REVOKE",
    "RIGHT", "RLIKE", "ROLLBACK", "ROW", "ROWS", "ROW_NUMBER", "SAVEPOINT", "SCHEMA",
    "SCHEMAS", "SECOND_MICROSECOND", "SELECT", "SENSITIVE", "SEPARATOR", "SET", "SHOW",
    "SIGNAL", "SMALLINT", "SPATIAL", "SPECIFIC", "SQL", "SQLEXCEPTION", "SQLSTATE",
    "SQLWARNING", "SQL_BIG_RESULT", "SQL_CALC_FOUND_ROWS", "SQL_SMALL_RESULT", "SSL",
    "STARTING", "STORED", "STRAIGHT_JOIN", "SYSTEM", "TABLE", "TEMP", "TEMPORARY",
    "TERMINATED", "THEN", "TINYBLOB", "TINYINT", "TINYTEXT", "TO", "TRAILING", "TRANSACTION",
    "TRIGGER", "TRUE", "UNDO", "UNION", "UNIQUE", "UNLOCK", "UNSIGNED", "UPDATE", "USAGE",
    "USE", "USING", "UTC_DATE", "UTC_TIME", "UTC_TIMESTAMP", "VACUUM", "VALUES", "VARBINARY",
    "VARCHAR", "VARCHARACTER", "VARYING", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WHILE",
    "WINDOW", "WITH", "WITHOUT", "WRITE", "XOR", "YEAR_MONTH", "ZEROFILL",
];

/// Escape a string for inclusion between single quotes, the way the MySQL
/// client library does.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}

/// Render a value as a MySQL literal.
pub fn literal(value: &SqlValue) -> Result<String> {
    let text = match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::UInt(u) => u.to_string(),
        SqlValue::Float(f) if f.is_finite() => f.to_string(),
        SqlValue::Float(f) => {
            return Err(HelperError::InvalidStatement(format!(
                "{} has no SQL literal",
                f
            )))
        }
        SqlValue::Text(s) => format!("'{}'", escape_string(s)),
        SqlValue::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("X'{}'", hex)
        }
        SqlValue::Json(v) => format!("'{}'", escape_string(&v.to_string())),
        SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn test_insert_users() {
        let stmt =
            Statement::insert(Dialect::MySql, "users", &fields! { "id" => 1, "name" => "Bob" })
                .unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO users(id,name) VALUES (?,?)");
        assert_eq!(
            stmt.params(),
            &[SqlValue::Int(1), SqlValue::Text("Bob".to_string())]
        );
    }

    #[test]
    fn test_insert_placeholders_follow_field_order() {
        let fields = fields! { "z" => 1, "a" => 2.5, "m" => "x", "b" => None::<i32> };
        let stmt = Statement::insert(Dialect::MySql, "t", &fields).unwrap();

        assert_eq!(stmt.sql().matches('?').count(), fields.len());
        assert_eq!(stmt.sql(), "INSERT INTO t(z,a,m,b) VALUES (?,?,?,?)");
        let expected: Vec<SqlValue> = fields.values().cloned().collect();
        assert_eq!(stmt.params(), expected.as_slice());
    }

    #[test]
    fn test_insert_rejects_empty_fields() {
        let err = Statement::insert(Dialect::MySql, "users", &fields! {}).unwrap_err();
        assert!(matches!(err, HelperError::InvalidStatement(_)));
    }

    #[test]
    fn test_insert_rejects_bad_identifiers() {
        let insert = |table: &str, fields: &Fields| Statement::insert(Dialect::MySql, table, fields);
        assert!(insert("users; DROP TABLE x", &fields! { "a" => 1 }).is_err());
        assert!(insert("users", &fields! { "a) VALUES (1); --" => 1 }).is_err());
        assert!(insert("../etc", &fields! { "a" => 1 }).is_err());
        assert!(insert("shop.users", &fields! { "a" => 1 }).is_ok());
    }

    #[test]
    fn test_reserved_words_sorted() {
        assert!(RESERVED_WORDS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_reserved_identifiers_are_quoted_per_dialect() {
        let fields = fields! { "order" => 1, "key" => "a", "name" => "b" };

        let stmt = Statement::upsert(Dialect::MySql, "shop.group", &fields).unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO shop.`group`(`order`,`key`,name) VALUES (?,?,?) \
             ON DUPLICATE KEY UPDATE `order`=?,`key`=?,name=?"
        );

        let stmt = Statement::insert(Dialect::Sqlite, "t", &fields).unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t(\"order\",\"key\",name) VALUES (?,?,?)"
        );

        assert_eq!(quote_identifier(Dialect::MySql, "2024_sales"), "`2024_sales`");
        assert_eq!(quote_identifier(Dialect::MySql, "Select"), "`Select`");
        assert_eq!(quote_identifier(Dialect::MySql, "users"), "users");
    }

    #[test]
    fn test_quoted_identifiers_survive_literal_rendering() {
        let stmt = Statement::insert_ignore("t", &fields! { "desc" => "what?" }).unwrap();
        assert_eq!(
            stmt.render_literal().unwrap(),
            "INSERT IGNORE INTO t(`desc`) VALUES ('what?');"
        );
    }

    #[test]
    fn test_insert_ignore() {
        let stmt = Statement::insert_ignore("users", &fields! { "id" => 1 }).unwrap();
        assert_eq!(stmt.sql(), "INSERT IGNORE INTO users(id) VALUES (?)");
    }

    #[test]
    fn test_upsert_mysql_binds_values_twice() {
        let stmt = Statement::upsert(
            Dialect::MySql,
            "users",
            &fields! { "id" => 1, "name" => "Bob" },
        )
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO users(id,name) VALUES (?,?) ON DUPLICATE KEY UPDATE id=?,name=?"
        );
        assert_eq!(stmt.params().len(), 4);
        assert_eq!(stmt.params()[2], SqlValue::Int(1));
        assert_eq!(stmt.params()[3], SqlValue::Text("Bob".to_string()));
    }

    #[test]
    fn test_upsert_sqlite() {
        let stmt = Statement::upsert(Dialect::Sqlite, "kv", &fields! { "k" => "a", "v" => 1 })
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO kv(k,v) VALUES (?,?) ON CONFLICT DO UPDATE SET k=?,v=?"
        );
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("O'Brien"), "O\\'Brien");
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("line\nbreak\r"), "line\\nbreak\\r");
        assert_eq!(escape_string("nul\0ctl\x1a"), "nul\\0ctl\\Z");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
    }

    #[test]
    fn test_upsert_literal_quotes_strings_only() {
        let stmt = Statement::upsert(
            Dialect::MySql,
            "people",
            &fields! { "name" => "O'Brien", "age" => 42, "score" => 9.5 },
        )
        .unwrap();

        assert_eq!(
            stmt.render_literal().unwrap(),
            "INSERT INTO people(name,age,score) VALUES ('O\\'Brien',42,9.5) \
             ON DUPLICATE KEY UPDATE name='O\\'Brien',age=42,score=9.5;"
        );
    }

    #[test]
    fn test_literal_other_types() {
        assert_eq!(literal(&SqlValue::Null).unwrap(), "NULL");
        assert_eq!(literal(&SqlValue::Bool(true)).unwrap(), "1");
        assert_eq!(literal(&SqlValue::Bytes(vec![0xde, 0xad])).unwrap(), "X'dead'");
        assert_eq!(
            literal(&SqlValue::Json(serde_json::json!({"k": "v"}))).unwrap(),
            "'{\\\"k\\\":\\\"v\\\"}'"
        );
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(literal(&SqlValue::Date(date)).unwrap(), "'2024-03-09'");
        assert_eq!(
            literal(&SqlValue::DateTime(date.and_hms_opt(8, 5, 0).unwrap())).unwrap(),
            "'2024-03-09 08:05:00'"
        );
        assert!(literal(&SqlValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_render_literal_skips_quoted_placeholders() {
        let stmt = Statement::new(
            "SELECT * FROM t WHERE a = ? AND b = 'what?' AND `c?` = ?",
            [SqlValue::Int(1), SqlValue::Text("x".into())],
        );
        assert_eq!(
            stmt.render_literal().unwrap(),
            "SELECT * FROM t WHERE a = 1 AND b = 'what?' AND `c?` = 'x';"
        );
    }

    #[test]
    fn test_render_literal_parameter_mismatch() {
        let too_few = Statement::new("UPDATE t SET a = ?, b = ?", [SqlValue::Int(1)]);
        assert!(too_few.render_literal().is_err());

        let too_many = Statement::new("UPDATE t SET a = ?", [SqlValue::Int(1), SqlValue::Int(2)]);
        assert!(too_many.render_literal().is_err());
    }

    #[test]
    fn test_raw_statement_keeps_existing_semicolon() {
        let stmt = Statement::raw("UPDATE t SET a = 1;");
        assert_eq!(stmt.render_literal().unwrap(), "UPDATE t SET a = 1;");
        assert!(stmt.params().is_empty());
    }
}
