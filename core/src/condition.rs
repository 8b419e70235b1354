//! Structured query conditions.
//!
//! [`Condition`] accumulates predicates, grouping, ordering, a result window
//! and an optional projection through a chained builder, then renders them
//! into a SQL fragment with `?` placeholders and a parallel parameter list.
//! Caller-supplied values never appear in the rendered text; field names are
//! validated as identifiers and quoted.
//!
//! # Examples
//!
//! ```
//! use recordstore_core::{Condition, Value};
//!
//! let condition = Condition::new()
//!     .and_eq("status", "open")
//!     .and_gte("priority", 2)
//!     .or_group(|group| group.and_null("owner").and_like("title", "%urgent%"))
//!     .desc("priority")
//!     .asc("created_at")
//!     .page(2, 20);
//!
//! let fragment = condition.render().unwrap();
//! assert_eq!(
//!     fragment.sql,
//!     "WHERE \"status\" = ? AND \"priority\" >= ? OR (\"owner\" IS NULL AND \"title\" LIKE ?) \
//!      ORDER BY \"priority\" DESC, \"created_at\" ASC LIMIT ? OFFSET ?"
//! );
//! assert_eq!(
//!     fragment.params,
//!     vec![
//!         Value::from("open"),
//!         Value::from(2),
//!         Value::from("%urgent%"),
//!         Value::from(20),
//!         Value::from(20),
//!     ]
//! );
//! ```
//!
//! # Connector semantics
//!
//! Clauses render left to right with their connector and no implicit
//! parentheses, so SQL precedence applies (`AND` binds tighter than `OR`).
//! Use [`and_group`](Condition::and_group) / [`or_group`](Condition::or_group)
//! for explicit nesting.

use serde::{Deserialize, Serialize};

use crate::Value;
use crate::validate::{ValidationError, validate_identifier};

/// Logical connector joining a clause to the clauses before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Connector {
    fn sql(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Null checks take no value.
    None,
    /// A single bound value.
    Single(Value),
    /// A value set for `IN` / `NOT IN`.
    Set(Vec<Value>),
}

/// One element of a condition's filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// `field <op> operand`.
    Predicate {
        /// Connector to the preceding clause.
        connector: Connector,
        /// Column name.
        field: String,
        /// Comparison operator.
        operator: Operator,
        /// Bound value(s).
        operand: Operand,
    },
    /// Parenthesized sub-expression.
    Group {
        /// Connector to the preceding clause.
        connector: Connector,
        /// Nested clauses.
        clauses: Vec<Clause>,
    },
}

impl Clause {
    fn connector(&self) -> Connector {
        match self {
            Clause::Predicate { connector, .. } | Clause::Group { connector, .. } => *connector,
        }
    }
}

/// Result window.
///
/// The two forms are interchangeable; setting either replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    /// Explicit `LIMIT count OFFSET offset`.
    Range {
        /// Maximum number of rows.
        limit: u64,
        /// Rows to skip.
        offset: u64,
    },
    /// 1-based page of `size` rows.
    Page {
        /// Page number, starting at 1.
        number: u64,
        /// Rows per page.
        size: u64,
    },
}

impl Window {
    /// Converts the window to `(limit, offset)`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPage`] for page number 0.
    ///
    /// ```
    /// use recordstore_core::Window;
    ///
    /// let page = Window::Page { number: 3, size: 10 };
    /// assert_eq!(page.to_range().unwrap(), (10, 20));
    /// ```
    pub fn to_range(self) -> Result<(u64, u64), ValidationError> {
        match self {
            Window::Range { limit, offset } => Ok((limit, offset)),
            Window::Page { number: 0, .. } => Err(ValidationError::InvalidPage),
            Window::Page { number, size } => Ok((size, (number - 1).saturating_mul(size))),
        }
    }
}

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    /// SQL text using `?` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<Value>,
}

impl SqlFragment {
    /// Returns `true` if no SQL was produced.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Composable filter, grouping, ordering, window and projection.
///
/// Built by chaining; every `and_*`/`or_*` call appends one clause, ordering
/// calls accumulate, and the remaining settings keep the last value given.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Condition {
    clauses: Vec<Clause>,
    group_by: Option<String>,
    ordering: Vec<(String, Direction)>,
    window: Option<Window>,
    projection: Option<Vec<String>>,
}

impl Condition {
    /// Creates an empty condition, which matches every row.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        connector: Connector,
        field: impl Into<String>,
        operator: Operator,
        operand: Operand,
    ) -> Self {
        self.clauses.push(Clause::Predicate {
            connector,
            field: field.into(),
            operator,
            operand,
        });
        self
    }

    fn push_where(
        self,
        connector: Connector,
        field: impl Into<String>,
        operator: Operator,
        value: Value,
    ) -> Self {
        let operand = match operator {
            Operator::IsNull | Operator::IsNotNull => Operand::None,
            Operator::In | Operator::NotIn => Operand::Set(vec![value]),
            _ => Operand::Single(value),
        };
        self.push(connector, field, operator, operand)
    }

    fn push_group(mut self, connector: Connector, build: impl FnOnce(Condition) -> Condition) -> Self {
        let group = build(Condition::new());
        self.clauses.push(Clause::Group {
            connector,
            clauses: group.clauses,
        });
        self
    }

    /// `AND field <operator> value`. For `IN`/`NOT IN` the value is a
    /// one-element set; for null checks it is ignored.
    pub fn and_where(self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.push_where(Connector::And, field, operator, value.into())
    }

    /// `OR field <operator> value`.
    pub fn or_where(self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.push_where(Connector::Or, field, operator, value.into())
    }

    /// `AND field = value`
    pub fn and_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Eq, Operand::Single(value.into()))
    }

    /// `AND field <> value`
    pub fn and_ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Ne, Operand::Single(value.into()))
    }

    /// `AND field > value`
    pub fn and_gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Gt, Operand::Single(value.into()))
    }

    /// `AND field >= value`
    pub fn and_gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Gte, Operand::Single(value.into()))
    }

    /// `AND field < value`
    pub fn and_lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Lt, Operand::Single(value.into()))
    }

    /// `AND field <= value`
    pub fn and_lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Lte, Operand::Single(value.into()))
    }

    /// `AND field LIKE pattern`
    pub fn and_like(self, field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::Like, Operand::Single(pattern.into()))
    }

    /// `AND field NOT LIKE pattern`
    pub fn and_not_like(self, field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.push(Connector::And, field, Operator::NotLike, Operand::Single(pattern.into()))
    }

    /// `AND field IN (values)`. An empty set matches no rows.
    pub fn and_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.push(Connector::And, field, Operator::In, Operand::Set(set))
    }

    /// `AND field NOT IN (values)`. An empty set matches every row.
    pub fn and_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.push(Connector::And, field, Operator::NotIn, Operand::Set(set))
    }

    /// `AND field IS NULL`
    pub fn and_null(self, field: impl Into<String>) -> Self {
        self.push(Connector::And, field, Operator::IsNull, Operand::None)
    }

    /// `AND field IS NOT NULL`
    pub fn and_not_null(self, field: impl Into<String>) -> Self {
        self.push(Connector::And, field, Operator::IsNotNull, Operand::None)
    }

    /// `OR field = value`
    pub fn or_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Eq, Operand::Single(value.into()))
    }

    /// `OR field <> value`
    pub fn or_ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Ne, Operand::Single(value.into()))
    }

    /// `OR field > value`
    pub fn or_gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Gt, Operand::Single(value.into()))
    }

    /// `OR field >= value`
    pub fn or_gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Gte, Operand::Single(value.into()))
    }

    /// `OR field < value`
    pub fn or_lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Lt, Operand::Single(value.into()))
    }

    /// `OR field <= value`
    pub fn or_lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Lte, Operand::Single(value.into()))
    }

    /// `OR field LIKE pattern`
    pub fn or_like(self, field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::Like, Operand::Single(pattern.into()))
    }

    /// `OR field NOT LIKE pattern`
    pub fn or_not_like(self, field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.push(Connector::Or, field, Operator::NotLike, Operand::Single(pattern.into()))
    }

    /// `OR field IN (values)`
    pub fn or_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.push(Connector::Or, field, Operator::In, Operand::Set(set))
    }

    /// `OR field NOT IN (values)`
    pub fn or_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.push(Connector::Or, field, Operator::NotIn, Operand::Set(set))
    }

    /// `OR field IS NULL`
    pub fn or_null(self, field: impl Into<String>) -> Self {
        self.push(Connector::Or, field, Operator::IsNull, Operand::None)
    }

    /// `OR field IS NOT NULL`
    pub fn or_not_null(self, field: impl Into<String>) -> Self {
        self.push(Connector::Or, field, Operator::IsNotNull, Operand::None)
    }

    /// `AND ( ... )`. Only the predicates of the built group are used; its
    /// ordering, window and projection are ignored. Empty groups render to
    /// nothing.
    pub fn and_group(self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.push_group(Connector::And, build)
    }

    /// `OR ( ... )`
    pub fn or_group(self, build: impl FnOnce(Condition) -> Condition) -> Self {
        self.push_group(Connector::Or, build)
    }

    /// Groups results by `field`, replacing any earlier grouping.
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    /// Appends an ascending sort key.
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.ordering.push((field.into(), Direction::Asc));
        self
    }

    /// Appends a descending sort key.
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.ordering.push((field.into(), Direction::Desc));
        self
    }

    /// Limits the result to `count` rows after skipping `offset`. Replaces
    /// any page setting.
    pub fn limit(mut self, count: u64, offset: u64) -> Self {
        self.window = Some(Window::Range {
            limit: count,
            offset,
        });
        self
    }

    /// Selects the 1-based page `page_num` of `show_num` rows. Replaces any
    /// limit setting.
    pub fn page(mut self, page_num: u64, show_num: u64) -> Self {
        self.window = Some(Window::Page {
            number: page_num,
            size: show_num,
        });
        self
    }

    /// Restricts the returned columns. An empty list means all columns.
    pub fn selects<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.projection = if fields.is_empty() { None } else { Some(fields) };
        self
    }

    /// Accumulated clauses.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Explicit projection, if any.
    pub fn projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }

    /// Current window, if any.
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Returns `true` if a limit or page is set.
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// Returns `true` if any sort key is set.
    pub fn is_ordered(&self) -> bool {
        !self.ordering.is_empty()
    }

    /// Returns `true` if the condition has no clauses.
    pub fn is_unfiltered(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the select list: quoted projection columns, or `*`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] for a bad field name.
    pub fn select_list(&self) -> Result<String, ValidationError> {
        match &self.projection {
            None => Ok("*".to_string()),
            Some(fields) => {
                let mut quoted = Vec::with_capacity(fields.len());
                for field in fields {
                    quoted.push(quote_field(field)?);
                }
                Ok(quoted.join(", "))
            }
        }
    }

    /// Renders only the filter expression, without the `WHERE` keyword.
    ///
    /// Returns an empty fragment for an unfiltered condition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] for a bad field name.
    pub fn render_filter(&self) -> Result<SqlFragment, ValidationError> {
        let mut fragment = SqlFragment::default();
        render_clauses(&self.clauses, &mut fragment)?;
        Ok(fragment)
    }

    /// Renders `WHERE`, `GROUP BY`, `ORDER BY` and `LIMIT`/`OFFSET`, each
    /// present only when set.
    ///
    /// Pure: rendering the same condition twice yields identical output.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an invalid field name or page 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use recordstore_core::Condition;
    ///
    /// let by_page = Condition::new().page(2, 10).render().unwrap();
    /// let by_limit = Condition::new().limit(10, 10).render().unwrap();
    /// assert_eq!(by_page, by_limit);
    /// ```
    pub fn render(&self) -> Result<SqlFragment, ValidationError> {
        let filter = self.render_filter()?;
        let mut parts: Vec<String> = Vec::new();
        let mut params = filter.params;

        if !filter.sql.is_empty() {
            parts.push(format!("WHERE {}", filter.sql));
        }

        if let Some(field) = &self.group_by {
            parts.push(format!("GROUP BY {}", quote_field(field)?));
        }

        if !self.ordering.is_empty() {
            let mut keys = Vec::with_capacity(self.ordering.len());
            for (field, direction) in &self.ordering {
                keys.push(format!("{} {}", quote_field(field)?, direction.sql()));
            }
            parts.push(format!("ORDER BY {}", keys.join(", ")));
        }

        if let Some(window) = self.window {
            let (limit, offset) = window.to_range()?;
            parts.push("LIMIT ? OFFSET ?".to_string());
            params.push(Value::Integer(clamp_to_i64(limit)));
            params.push(Value::Integer(clamp_to_i64(offset)));
        }

        Ok(SqlFragment {
            sql: parts.join(" "),
            params,
        })
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Validates and double-quotes a field name.
fn quote_field(field: &str) -> Result<String, ValidationError> {
    validate_identifier(field)?;
    Ok(format!("\"{field}\""))
}

fn render_clauses(clauses: &[Clause], out: &mut SqlFragment) -> Result<(), ValidationError> {
    for clause in clauses {
        let mut piece = SqlFragment::default();
        match clause {
            Clause::Predicate {
                field,
                operator,
                operand,
                ..
            } => render_predicate(field, *operator, operand, &mut piece)?,
            Clause::Group { clauses, .. } => {
                render_clauses(clauses, &mut piece)?;
                if piece.is_empty() {
                    continue;
                }
                piece.sql = format!("({})", piece.sql);
            }
        }

        if !out.sql.is_empty() {
            out.sql.push(' ');
            out.sql.push_str(clause.connector().sql());
            out.sql.push(' ');
        }
        out.sql.push_str(&piece.sql);
        out.params.extend(piece.params);
    }
    Ok(())
}

fn render_predicate(
    field: &str,
    operator: Operator,
    operand: &Operand,
    out: &mut SqlFragment,
) -> Result<(), ValidationError> {
    let column = quote_field(field)?;
    match (operator, operand) {
        (Operator::IsNull | Operator::IsNotNull, _) => {
            out.sql = format!("{column} {}", operator.sql());
        }
        (Operator::In, Operand::Set(values)) if values.is_empty() => {
            out.sql = "0 = 1".to_string();
        }
        (Operator::NotIn, Operand::Set(values)) if values.is_empty() => {
            out.sql = "1 = 1".to_string();
        }
        (Operator::In | Operator::NotIn, Operand::Set(values)) => {
            let placeholders = vec!["?"; values.len()].join(", ");
            out.sql = format!("{column} {} ({placeholders})", operator.sql());
            out.params.extend(values.iter().cloned());
        }
        (Operator::In | Operator::NotIn, Operand::Single(value)) => {
            out.sql = format!("{column} {} (?)", operator.sql());
            out.params.push(value.clone());
        }
        (_, Operand::Single(value)) => {
            out.sql = format!("{column} {} ?", operator.sql());
            out.params.push(value.clone());
        }
        (_, Operand::Set(values)) => {
            // A comparison against a set compares against its first element.
            out.sql = format!("{column} {} ?", operator.sql());
            out.params.push(values.first().cloned().unwrap_or_default());
        }
        (_, Operand::None) => {
            out.sql = format!("{column} {} ?", operator.sql());
            out.params.push(Value::Null);
        }
    }
    Ok(())
}
