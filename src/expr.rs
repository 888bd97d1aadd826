//! Metric-name extraction from PromQL expressions
//!
//! Every rule expression is parsed into a PromQL syntax tree and walked; the
//! name of each vector selector (bare, inside a range selector, aggregation,
//! binary operation, function call or subquery) is collected.
//!
//! Parse failures are reported per expression so a single broken rule does
//! not hide the metrics referenced by every other rule.

use crate::error::{AnalysisError, Result};
use promql_parser::parser::{self, Expr};
use promql_parser::util::{walk_expr, ExprVisitor};
use std::collections::BTreeSet;
use std::convert::Infallible;

/// Metrics referenced by a batch of expressions plus the expressions that failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Union of all metric names found
    pub metrics: BTreeSet<String>,
    /// One `MalformedExpression` per expression that did not parse
    pub failures: Vec<AnalysisError>,
}

impl Extraction {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collects vector selector names while walking the syntax tree
#[derive(Default)]
struct SelectorNames {
    names: BTreeSet<String>,
}

impl SelectorNames {
    fn record(&mut self, name: Option<&String>) {
        // `{__name__=~"..."}` style selectors have no static name
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.names.insert(name.clone());
        }
    }
}

impl ExprVisitor for SelectorNames {
    type Error = Infallible;

    fn pre_visit(&mut self, expr: &Expr) -> std::result::Result<bool, Self::Error> {
        match expr {
            Expr::VectorSelector(vs) => self.record(vs.name.as_ref()),
            Expr::MatrixSelector(ms) => self.record(ms.vs.name.as_ref()),
            _ => {}
        }
        Ok(true)
    }
}

/// Extract the deduplicated set of metric names used by one expression
///
/// # Errors
/// Returns `AnalysisError::MalformedExpression` carrying the offending text
/// when the expression is not valid PromQL.
///
/// # Example
/// ```
/// use promsource::expr::extract_metrics;
///
/// let metrics = extract_metrics(r#"max_over_time(foo{job=~"a|b"}[5m]) == 0"#).unwrap();
/// assert_eq!(metrics.into_iter().collect::<Vec<_>>(), vec!["foo".to_string()]);
/// ```
pub fn extract_metrics(expression: &str) -> Result<BTreeSet<String>> {
    let cleaned = strip_comments(expression);
    let ast = parser::parse(&cleaned).map_err(|reason| AnalysisError::MalformedExpression {
        expression: expression.trim().to_string(),
        reason: reason.to_string(),
    })?;

    let mut visitor = SelectorNames::default();
    match walk_expr(&mut visitor, &ast) {
        Ok(_) => Ok(visitor.names),
        Err(never) => match never {},
    }
}

/// Extract metrics from every expression, collecting failures instead of stopping
pub fn extract_all<I, S>(expressions: I) -> Extraction
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut extraction = Extraction::default();
    for expression in expressions {
        match extract_metrics(expression.as_ref()) {
            Ok(metrics) => extraction.metrics.extend(metrics),
            Err(err) => {
                tracing::debug!("skipping expression: {}", err);
                extraction.failures.push(err);
            }
        }
    }
    extraction
}

/// Split a plain-text expressions file into expressions
///
/// Expressions are separated by one or more blank lines; a single expression
/// may span several lines.
pub fn split_expression_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Remove `#` line comments that are not inside a string literal
fn strip_comments(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;

    for c in expression.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }
        match quote {
            Some(q) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' && q != '`' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '#' => in_comment = true,
                '"' | '\'' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
        }
    }
    out
}
