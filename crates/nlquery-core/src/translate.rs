//! Heuristic translation of natural-language questions into SQL.
//!
//! There is no grammar. A question is lower-cased, split on whitespace, and
//! matched against an ordered chain of intent rules. The first rule whose
//! trigger fires decides the outcome: it either produces a statement or the
//! question is [`Translation::NotApplicable`]. Later rules are never tried
//! once a trigger has fired, even when that rule finds no fitting table or
//! column; the question then goes to document search. Table and column names come
//! from the live [`SchemaCatalog`], so the same rules adapt to any schema
//! whose names carry the expected vocabulary.
//!
//! # Rules (priority order)
//!
//! | Intent | Trigger | Statement |
//! |--------|---------|-----------|
//! | count | `how many`, `count`, `number of` | `SELECT COUNT(*) AS count FROM t LIMIT 1` |
//! | average | `average` and `salary` | `AVG(salary)`, grouped by department when asked |
//! | list | `list`, `show me`, `who`, `employee(s)` | first 8 columns, optional `over <n>[k]` filter |
//!
//! Only `SELECT` statements are ever produced.

use regex::Regex;
use std::sync::OnceLock;

use crate::catalog::{SchemaCatalog, TableInfo};

/// Substrings that mark a table as the primary entity table.
const DOMAIN_HINTS: &[&str] = &["emp", "staff", "person", "people"];
const SALARY_HINTS: &[&str] = &["salary", "comp", "pay", "rate"];
const DEPARTMENT_HINTS: &[&str] = &["dept", "department", "division"];

const LIST_COLUMNS: usize = 8;
const ROW_LIMIT: usize = 100;

/// Outcome of translating one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Mapped(String),
    NotApplicable,
}

impl Translation {
    pub fn sql(&self) -> Option<&str> {
        match self {
            Translation::Mapped(sql) => Some(sql),
            Translation::NotApplicable => None,
        }
    }
}

/// A question prepared for rule evaluation.
struct Question {
    text: String,
    tokens: Vec<String>,
}

impl Question {
    fn new(raw: &str) -> Self {
        let text = raw.to_lowercase();
        let tokens = text.split_whitespace().map(str::to_string).collect();
        Self { text, tokens }
    }

    fn mentions_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.text.contains(p))
    }
}

/// One intent: a trigger and the statement it generates.
struct Rule {
    name: &'static str,
    triggers: fn(&Question) -> bool,
    generate: fn(&Question, &SchemaCatalog) -> Option<String>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "count",
        triggers: asks_count,
        generate: count_statement,
    },
    Rule {
        name: "average",
        triggers: asks_average_salary,
        generate: average_statement,
    },
    Rule {
        name: "list",
        triggers: asks_listing,
        generate: list_statement,
    },
];

fn asks_count(q: &Question) -> bool {
    q.mentions_any(&["how many", "count", "number of"])
}

fn asks_average_salary(q: &Question) -> bool {
    q.text.contains("average") && q.text.contains("salary")
}

fn asks_listing(q: &Question) -> bool {
    q.mentions_any(&["list", "show me", "who", "employees", "employee"])
}

/// Translate `question` into a statement against `catalog`.
///
/// Pure: the result depends only on the two arguments.
pub fn translate(question: &str, catalog: &SchemaCatalog) -> Translation {
    let q = Question::new(question);
    let Some(rule) = RULES.iter().find(|r| (r.triggers)(&q)) else {
        return Translation::NotApplicable;
    };
    match (rule.generate)(&q, catalog) {
        Some(sql) => {
            tracing::debug!(intent = rule.name, %sql, "question mapped to sql");
            Translation::Mapped(sql)
        }
        None => {
            tracing::debug!(intent = rule.name, "intent matched but schema has no fit");
            Translation::NotApplicable
        }
    }
}

/// Resolve the table a question is about.
///
/// Returns the first table (in catalog order) whose lower-cased name
/// contains any question token; failing that, the first table whose name
/// contains a domain hint.
pub fn find_table<'a>(catalog: &'a SchemaCatalog, tokens: &[String]) -> Option<&'a str> {
    let by_token = catalog.tables.keys().find(|name| {
        let low = name.to_lowercase();
        tokens.iter().any(|t| low.contains(t.as_str()))
    });
    by_token
        .or_else(|| {
            catalog.tables.keys().find(|name| {
                let low = name.to_lowercase();
                DOMAIN_HINTS.iter().any(|h| low.contains(h))
            })
        })
        .map(String::as_str)
}

fn resolve<'a>(q: &Question, catalog: &'a SchemaCatalog) -> Option<(&'a str, &'a TableInfo)> {
    let name = find_table(catalog, &q.tokens)?;
    catalog.table(name).map(|info| (name, info))
}

fn count_statement(q: &Question, catalog: &SchemaCatalog) -> Option<String> {
    let (table, _) = resolve(q, catalog)?;
    Some(format!("SELECT COUNT(*) AS count FROM {} LIMIT 1", table))
}

fn average_statement(q: &Question, catalog: &SchemaCatalog) -> Option<String> {
    let (table, info) = resolve(q, catalog)?;
    let salary = info.find_column(SALARY_HINTS)?;

    let wants_grouping = q.text.contains("by") && q.text.contains("department");
    if wants_grouping {
        if let Some(dept) = info.find_column(DEPARTMENT_HINTS) {
            return Some(format!(
                "SELECT {dept} AS department, AVG({salary}) AS average_salary FROM {table} GROUP BY {dept} LIMIT {ROW_LIMIT}"
            ));
        }
    }
    Some(format!(
        "SELECT AVG({salary}) AS average_salary FROM {table} LIMIT 1"
    ))
}

fn list_statement(q: &Question, catalog: &SchemaCatalog) -> Option<String> {
    let (table, info) = resolve(q, catalog)?;

    let selection = if info.columns.is_empty() {
        "*".to_string()
    } else {
        info.columns
            .iter()
            .take(LIST_COLUMNS)
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let filter = threshold(&q.text).and_then(|n| {
        info.find_column(SALARY_HINTS)
            .map(|col| format!(" WHERE {} >= {}", col, n))
    });

    Some(format!(
        "SELECT {} FROM {}{} LIMIT {}",
        selection,
        table,
        filter.unwrap_or_default(),
        ROW_LIMIT
    ))
}

/// Parse an `over <number>[k]` threshold from a lower-cased question.
fn threshold(text: &str) -> Option<u64> {
    static OVER: OnceLock<Regex> = OnceLock::new();
    let re = OVER.get_or_init(|| Regex::new(r"over\s+(\d+)(k?)").expect("valid threshold regex"));
    let caps = re.captures(text)?;
    let n: u64 = caps[1].parse().ok()?;
    if caps[2].is_empty() {
        Some(n)
    } else {
        n.checked_mul(1000)
    }
}
