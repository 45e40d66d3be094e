//! Where-clause evaluation for the in-memory table.
//!
//! Clauses are parsed as SQL expressions and compiled into a small condition
//! tree: `AND`, `OR`, `NOT`, parentheses, comparisons (`=`, `<>`, `!=`, `<`,
//! `<=`, `>`, `>=`), `IS [NOT] NULL` and `[NOT] IN (...)`. Operands are
//! attribute names, numbers, single-quoted strings or `NULL`.
//!
//! Evaluation uses SQL three-valued logic. A comparison involving a missing
//! attribute, a null, or mismatched kinds is unknown, and a row is selected
//! only when the whole clause is true.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use geobridge_core::FieldValue;
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_sql(op: &BinaryOperator) -> anyhow::Result<Self> {
        Ok(match op {
            BinaryOperator::Eq => Self::Eq,
            BinaryOperator::NotEq => Self::Ne,
            BinaryOperator::Lt => Self::Lt,
            BinaryOperator::LtEq => Self::Le,
            BinaryOperator::Gt => Self::Gt,
            BinaryOperator::GtEq => Self::Ge,
            other => bail!("unsupported operator `{other}`"),
        })
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Number(f64),
    Text(String),
    Null,
}

/// An operand after attribute lookup. `None` stands for SQL null.
#[derive(Debug, Clone, Copy)]
enum Resolved<'a> {
    Number(f64),
    Text(&'a str),
}

impl Operand {
    fn resolve<'a>(&'a self, attributes: &'a BTreeMap<String, FieldValue>) -> Option<Resolved<'a>> {
        match self {
            Self::Field(name) => {
                let value = attributes.get(name)?;
                value
                    .as_f64()
                    .map(Resolved::Number)
                    .or_else(|| value.as_text().map(Resolved::Text))
            }
            Self::Number(n) => Some(Resolved::Number(*n)),
            Self::Text(s) => Some(Resolved::Text(s)),
            Self::Null => None,
        }
    }
}

fn compare(left: Option<Resolved<'_>>, right: Option<Resolved<'_>>) -> Option<Ordering> {
    match (left?, right?) {
        (Resolved::Number(a), Resolved::Number(b)) => a.partial_cmp(&b),
        (Resolved::Text(a), Resolved::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    InList {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
}

impl Condition {
    fn compile(expr: &Expr) -> anyhow::Result<Self> {
        match expr {
            Expr::Nested(inner) => Self::compile(inner),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Ok(Self::And(
                    Box::new(Self::compile(left)?),
                    Box::new(Self::compile(right)?),
                )),
                BinaryOperator::Or => Ok(Self::Or(
                    Box::new(Self::compile(left)?),
                    Box::new(Self::compile(right)?),
                )),
                _ => Ok(Self::Compare {
                    left: compile_operand(left)?,
                    op: CompareOp::from_sql(op)?,
                    right: compile_operand(right)?,
                }),
            },
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Ok(Self::Not(Box::new(Self::compile(expr)?))),
            Expr::IsNull(inner) => Ok(Self::IsNull {
                operand: compile_operand(inner)?,
                negated: false,
            }),
            Expr::IsNotNull(inner) => Ok(Self::IsNull {
                operand: compile_operand(inner)?,
                negated: true,
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => Ok(Self::InList {
                operand: compile_operand(expr)?,
                list: list.iter().map(compile_operand).collect::<anyhow::Result<_>>()?,
                negated: *negated,
            }),
            other => bail!("expected a condition, found `{other}`"),
        }
    }

    fn eval(&self, attributes: &BTreeMap<String, FieldValue>) -> Option<bool> {
        match self {
            Self::And(left, right) => match (left.eval(attributes), right.eval(attributes)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Self::Or(left, right) => match (left.eval(attributes), right.eval(attributes)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Self::Not(inner) => inner.eval(attributes).map(|b| !b),
            Self::Compare { left, op, right } => {
                compare(left.resolve(attributes), right.resolve(attributes)).map(|o| op.holds(o))
            }
            Self::IsNull { operand, negated } => {
                let is_null = match operand {
                    Operand::Field(name) => attributes.get(name).is_none_or(FieldValue::is_null),
                    Operand::Null => true,
                    Operand::Number(_) | Operand::Text(_) => false,
                };
                Some(is_null != *negated)
            }
            Self::InList {
                operand,
                list,
                negated,
            } => {
                let value = operand.resolve(attributes);
                let mut unknown = false;
                for item in list {
                    match compare(value, item.resolve(attributes)) {
                        Some(Ordering::Equal) => return Some(!negated),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(*negated)
                }
            }
        }
    }
}

fn compile_operand(expr: &Expr) -> anyhow::Result<Operand> {
    match expr {
        Expr::Nested(inner) => compile_operand(inner),
        Expr::Identifier(ident) => Ok(Operand::Field(ident.value.clone())),
        Expr::Value(v) => match &v.value {
            Value::Number(n, _) => n
                .parse::<f64>()
                .map(Operand::Number)
                .map_err(|_| anyhow!("invalid number `{n}`")),
            Value::SingleQuotedString(s) => Ok(Operand::Text(s.clone())),
            Value::Null => Ok(Operand::Null),
            other => bail!("unsupported literal `{other}`"),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match compile_operand(expr)? {
            Operand::Number(n) => Ok(Operand::Number(-n)),
            _ => bail!("cannot negate `{expr}`"),
        },
        other => bail!("unsupported operand `{other}`"),
    }
}

/// Parsed filter. An empty clause matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    condition: Option<Condition>,
}

impl WhereClause {
    /// # Errors
    ///
    /// Returns an error if the clause is not a single SQL expression or uses
    /// syntax outside the supported subset.
    pub fn parse(clause: &str) -> anyhow::Result<Self> {
        if clause.trim().is_empty() {
            return Ok(Self::default());
        }
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(clause)
            .with_context(|| format!("cannot tokenize `{clause}`"))?;
        let expr = parser
            .parse_expr()
            .with_context(|| format!("cannot parse `{clause}`"))?;
        parser
            .expect_token(&Token::EOF)
            .with_context(|| format!("trailing input in `{clause}`"))?;
        Ok(Self {
            condition: Some(Condition::compile(&expr)?),
        })
    }

    /// Parse an optional clause; `None` matches every row.
    ///
    /// # Errors
    ///
    /// See [`WhereClause::parse`].
    pub fn parse_optional(clause: Option<&str>) -> anyhow::Result<Self> {
        clause.map_or_else(|| Ok(Self::default()), Self::parse)
    }

    #[must_use]
    pub fn matches(&self, attributes: &BTreeMap<String, FieldValue>) -> bool {
        self.condition
            .as_ref()
            .is_none_or(|c| c.eval(attributes) == Some(true))
    }
}
