//! Clause objects that compiled statements are assembled from.
//!
//! Aggregators build a [`Statement`] tree; [`SqlWriter`](super::SqlWriter)
//! turns it into text in one pass.

use crate::types::{Page, QuerySegment, SortDirection, SqlParam};

/// A complete statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A single SELECT.
    Select(Box<SelectStatement>),
    /// Branches combined with `UNION ALL`, in order.
    UnionAll(Vec<Statement>),
}

impl From<SelectStatement> for Statement {
    fn from(select: SelectStatement) -> Self {
        Statement::Select(Box::new(select))
    }
}

/// Something a SELECT reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A table with an alias, e.g. `Patient_RESOURCES R`.
    Table {
        /// Table name.
        name: String,
        /// Alias.
        alias: String,
    },
    /// A parenthesised statement with an alias.
    Subquery {
        /// The nested statement.
        statement: Box<Statement>,
        /// Alias.
        alias: String,
    },
}

impl Source {
    /// Creates a table source.
    pub fn table(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// Creates a subquery source.
    pub fn subquery(statement: impl Into<Statement>, alias: impl Into<String>) -> Self {
        Source::Subquery {
            statement: Box::new(statement.into()),
            alias: alias.into(),
        }
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `JOIN`
    Inner,
    /// `LEFT OUTER JOIN`
    LeftOuter,
}

/// A join against another table. Join conditions never carry binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join flavour.
    pub kind: JoinKind,
    /// Joined table or subquery.
    pub source: Source,
    /// The ON condition.
    pub on: String,
}

impl Join {
    /// Creates an inner join.
    pub fn inner(source: Source, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::Inner,
            source,
            on: on.into(),
        }
    }

    /// Creates a left outer join.
    pub fn left_outer(source: Source, on: impl Into<String>) -> Self {
        Self {
            kind: JoinKind::LeftOuter,
            source,
            on: on.into(),
        }
    }
}

/// One conjunct of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Predicate text with its own binds.
    Fragment {
        /// Where the fragment came from, used in bind-mismatch errors.
        context: String,
        /// Text with `?` placeholders.
        sql: String,
        /// Binds for the placeholders in `sql`.
        binds: Vec<SqlParam>,
    },
    /// `<expr> IN (<statement>)`
    InSubquery {
        /// Left-hand expression, no placeholders.
        expr: String,
        /// The nested statement.
        statement: Box<Statement>,
    },
}

impl Predicate {
    /// A predicate without binds.
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Fragment {
            context: "predicate".to_string(),
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// A predicate carrying binds.
    pub fn with_binds(context: impl Into<String>, sql: impl Into<String>, binds: Vec<SqlParam>) -> Self {
        Predicate::Fragment {
            context: context.into(),
            sql: sql.into(),
            binds,
        }
    }

    /// A predicate taken from a query segment.
    pub fn segment(context: impl Into<String>, segment: &QuerySegment) -> Self {
        Self::with_binds(context, segment.predicate(), segment.binds().to_vec())
    }

    /// `expr IN (statement)`
    pub fn in_subquery(expr: impl Into<String>, statement: impl Into<Statement>) -> Self {
        Predicate::InSubquery {
            expr: expr.into(),
            statement: Box::new(statement.into()),
        }
    }
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    /// The ordered expression.
    pub expr: String,
    /// Direction.
    pub direction: SortDirection,
    /// Whether to append `NULLS LAST`.
    pub nulls_last: bool,
}

impl OrderKey {
    /// Ascending key.
    pub fn asc(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            direction: SortDirection::Ascending,
            nulls_last: false,
        }
    }

    /// Key in `direction` with nulls placed last.
    pub fn nulls_last(expr: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            expr: expr.into(),
            direction,
            nulls_last: true,
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Projected expressions.
    pub columns: Vec<String>,
    /// Whether to emit `SELECT DISTINCT`.
    pub distinct: bool,
    /// Primary source.
    pub from: Source,
    /// Joins, in order.
    pub joins: Vec<Join>,
    /// WHERE conjuncts, ANDed in order.
    pub filter: Vec<Predicate>,
    /// GROUP BY expressions.
    pub group_by: Vec<String>,
    /// ORDER BY keys.
    pub order_by: Vec<OrderKey>,
    /// Pagination window.
    pub page: Option<Page>,
}

impl SelectStatement {
    /// Creates `SELECT <columns> FROM <from>`.
    pub fn new<I, S>(columns: I, from: Source) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            distinct: false,
            from,
            joins: Vec::new(),
            filter: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            page: None,
        }
    }

    /// Marks the projection DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Appends a join.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Appends a WHERE conjunct.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    /// Appends an ORDER BY key.
    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order_by.push(key);
        self
    }

    /// Sets the pagination window.
    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}
