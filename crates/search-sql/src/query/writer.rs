//! Serialisation of clause objects into SQL text.

use crate::config::SqlDialect;
use crate::error::{SearchError, SearchResult};
use crate::types::{Page, SqlParam, SqlQuery};

use super::clause::{Join, JoinKind, OrderKey, Predicate, SelectStatement, Source, Statement};

/// Counts `?` placeholders outside quoted literals and identifiers.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            // A doubled quote closes and reopens, which leaves the state unchanged.
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

/// Renders a string as a SQL literal, doubling embedded quotes.
pub fn encode_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Writes a [`Statement`] as text, collecting binds in placeholder order.
///
/// Every fragment's placeholders are checked against its binds as it is
/// written, and the finished text is checked as a whole.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: SqlDialect,
    sql: String,
    binds: Vec<SqlParam>,
}

impl SqlWriter {
    /// Creates an empty writer.
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(512),
            binds: Vec::new(),
        }
    }

    /// Serialises a whole statement.
    pub fn write(dialect: SqlDialect, statement: &Statement) -> SearchResult<SqlQuery> {
        let mut writer = Self::new(dialect);
        writer.statement(statement)?;
        writer.finish()
    }

    /// Consumes the writer, checking the statement-level placeholder count.
    pub fn finish(self) -> SearchResult<SqlQuery> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.binds.len() {
            return Err(SearchError::BindMismatch {
                context: "statement".to_string(),
                placeholders,
                binds: self.binds.len(),
            });
        }
        Ok(SqlQuery::new(self.sql, self.binds))
    }

    /// Appends a statement.
    pub fn statement(&mut self, statement: &Statement) -> SearchResult<()> {
        match statement {
            Statement::Select(select) => self.select(select),
            Statement::UnionAll(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(" UNION ALL ");
                    }
                    self.statement(branch)?;
                }
                Ok(())
            }
        }
    }

    fn select(&mut self, select: &SelectStatement) -> SearchResult<()> {
        self.sql.push_str("SELECT ");
        if select.distinct {
            self.sql.push_str("DISTINCT ");
        }
        self.sql.push_str(&select.columns.join(", "));
        self.sql.push_str(" FROM ");
        self.source(&select.from)?;

        for join in &select.joins {
            self.join(join)?;
        }

        for (i, predicate) in select.filter.iter().enumerate() {
            self.sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            self.predicate(predicate)?;
        }

        if !select.group_by.is_empty() {
            self.sql.push_str(" GROUP BY ");
            self.sql.push_str(&select.group_by.join(", "));
        }

        for (i, key) in select.order_by.iter().enumerate() {
            self.sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            self.order_key(key);
        }

        if let Some(page) = select.page {
            self.page(page);
        }
        Ok(())
    }

    fn source(&mut self, source: &Source) -> SearchResult<()> {
        match source {
            Source::Table { name, alias } => {
                self.sql.push_str(name);
                self.sql.push(' ');
                self.sql.push_str(alias);
            }
            Source::Subquery { statement, alias } => {
                self.sql.push('(');
                self.statement(statement)?;
                self.sql.push_str(") ");
                self.sql.push_str(alias);
            }
        }
        Ok(())
    }

    fn join(&mut self, join: &Join) -> SearchResult<()> {
        self.sql.push_str(match join.kind {
            JoinKind::Inner => " JOIN ",
            JoinKind::LeftOuter => " LEFT OUTER JOIN ",
        });
        self.source(&join.source)?;
        self.sql.push_str(" ON ");
        self.fragment("join condition", &join.on, &[])
    }

    fn predicate(&mut self, predicate: &Predicate) -> SearchResult<()> {
        match predicate {
            Predicate::Fragment {
                context,
                sql,
                binds,
            } => {
                self.sql.push('(');
                self.fragment(context, sql, binds)?;
                self.sql.push(')');
            }
            Predicate::InSubquery { expr, statement } => {
                self.sql.push('(');
                self.fragment("subquery operand", expr, &[])?;
                self.sql.push_str(" IN (");
                self.statement(statement)?;
                self.sql.push_str("))");
            }
        }
        Ok(())
    }

    fn fragment(&mut self, context: &str, sql: &str, binds: &[SqlParam]) -> SearchResult<()> {
        let placeholders = count_placeholders(sql);
        if placeholders != binds.len() {
            return Err(SearchError::BindMismatch {
                context: context.to_string(),
                placeholders,
                binds: binds.len(),
            });
        }
        self.sql.push_str(sql);
        self.binds.extend_from_slice(binds);
        Ok(())
    }

    fn order_key(&mut self, key: &OrderKey) {
        self.sql.push_str(&key.expr);
        self.sql.push(' ');
        self.sql.push_str(key.direction.keyword());
        if key.nulls_last {
            self.sql.push_str(" NULLS LAST");
        }
    }

    fn page(&mut self, page: Page) {
        let clause = match self.dialect {
            SqlDialect::Standard => format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                page.offset, page.size
            ),
            SqlDialect::Sqlite => format!(" LIMIT {} OFFSET {}", page.size, page.offset),
        };
        self.sql.push_str(&clause);
    }
}
