use std::fmt;

/// Parsed locator candidate: a chain of location steps from the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorPath {
    pub steps: Vec<LocationStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `/name`
    Child,
    /// `//name`
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationStep {
    pub axis: Axis,
    /// `None` for `*`.
    pub name: Option<String>,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `@name`
    Attribute(String),
    /// `text()`
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `[3]`, 1-based among the step's matches under one parent.
    Position(usize),
    /// `last()`
    Last,
    Exists(Operand),
    Equals(Operand, String),
    NotEquals(Operand, String),
    Contains(Operand, String),
    StartsWith(Operand, String),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

/// Locator for a node picked out at runtime (indexing, matching, iteration).
pub fn node_locator(tag: &str, id: usize) -> String {
    format!("//{}[@id='{}']", tag, id)
}

/// Quotes `value` as an XPath literal, choosing the quote it does not contain.
pub fn quote_literal(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attribute(name) => write!(f, "@{}", name),
            Operand::Text => write!(f, "text()"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Position(n) => write!(f, "{}", n),
            Predicate::Last => write!(f, "last()"),
            Predicate::Exists(op) => write!(f, "{}", op),
            Predicate::Equals(op, v) => write!(f, "{}={}", op, quote_literal(v)),
            Predicate::NotEquals(op, v) => write!(f, "{}!={}", op, quote_literal(v)),
            Predicate::Contains(op, v) => write!(f, "contains({}, {})", op, quote_literal(v)),
            Predicate::StartsWith(op, v) => {
                write!(f, "starts-with({}, {})", op, quote_literal(v))
            }
            Predicate::Not(inner) => write!(f, "not({})", inner),
            Predicate::And(a, b) => write!(f, "({} and {})", a, b),
            Predicate::Or(a, b) => write!(f, "({} or {})", a, b),
        }
    }
}

impl fmt::Display for LocatorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step.axis {
                Axis::Child => write!(f, "/")?,
                Axis::Descendant => write!(f, "//")?,
            }
            write!(f, "{}", step.name.as_deref().unwrap_or("*"))?;
            for predicate in &step.predicates {
                write!(f, "[{}]", predicate)?;
            }
        }
        Ok(())
    }
}
