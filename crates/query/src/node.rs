//! Query predicate trees
//!
//! A [`Query`] names the base it scans and an optional root
//! [`QueryNode`]. Interior nodes are NOT / AND / OR; leaves are
//! [`DataNode`]s comparing one field of the object with a literal.
//!
//! # Examples
//!
//! ```
//! use dirstore_core::{BaseId, FieldId};
//! use dirstore_query::{Comparator, DataNode, FieldSelector, Query, QueryNode};
//!
//! let name_is_alice = DataNode::new(FieldSelector::Id(FieldId(100)), Comparator::NoCaseEquals, "alice");
//! let has_notes = DataNode::new(FieldSelector::Name("Notes".into()), Comparator::Defined, "");
//!
//! let query = Query::new(
//!     BaseId(3),
//!     QueryNode::data(name_is_alice).and(QueryNode::data(has_notes).not()),
//! );
//! assert_eq!(query.to_string(), "3: (and (~= #100 \"alice\") (not (defined Notes)))");
//! ```

use dirstore_core::{BaseId, FieldId, Value};
use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// How a data node compares a field value with its literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Equal
    Equals,
    /// Field value less than literal
    Less,
    /// Field value less than or equal to literal
    LessEq,
    /// Field value greater than literal
    Greater,
    /// Field value greater than or equal to literal
    GreaterEq,
    /// Strings equal ignoring case
    NoCaseEquals,
    /// Field value starts with literal
    StartsWith,
    /// Field value ends with literal
    EndsWith,
    /// Field is defined; the literal is ignored
    Defined,
    /// Field value matches the literal as a regular expression
    Matches,
    /// Case-insensitive regular expression match
    NoCaseMatches,
}

impl Comparator {
    /// Operator symbol used when printing queries
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equals => "=",
            Comparator::Less => "<",
            Comparator::LessEq => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEq => ">=",
            Comparator::NoCaseEquals => "~=",
            Comparator::StartsWith => "starts",
            Comparator::EndsWith => "ends",
            Comparator::Defined => "defined",
            Comparator::Matches => "matches",
            Comparator::NoCaseMatches => "~matches",
        }
    }

    /// Whether the comparator is one of the ordering comparisons
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Comparator::Equals
                | Comparator::Less
                | Comparator::LessEq
                | Comparator::Greater
                | Comparator::GreaterEq
        )
    }

    /// Whether the comparator is a regular expression match
    pub fn is_regex(&self) -> bool {
        matches!(self, Comparator::Matches | Comparator::NoCaseMatches)
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// How a data node treats a vector field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArrayOp {
    /// Scalar comparison; the field must not be a vector
    #[default]
    None,
    /// Some element satisfies the comparator
    Contains,
    /// Vector length equals the integer literal
    LengthEq,
    /// Vector length is greater than the integer literal
    LengthGreater,
    /// Vector length is less than or equal to the integer literal
    LengthLessEq,
}

impl ArrayOp {
    /// Whether this is one of the length tests
    pub fn is_length(&self) -> bool {
        matches!(
            self,
            ArrayOp::LengthEq | ArrayOp::LengthGreater | ArrayOp::LengthLessEq
        )
    }
}

/// Which part of the object a data node examines
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSelector {
    /// A field by id
    Id(FieldId),
    /// A field by name, resolved through the object's base
    Name(String),
    /// The object's label
    Label,
    /// The object's own Invid
    Invid,
}

impl std::fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSelector::Id(id) => write!(f, "{}", id),
            FieldSelector::Name(name) => write!(f, "{}", name),
            FieldSelector::Label => write!(f, "label"),
            FieldSelector::Invid => write!(f, "invid"),
        }
    }
}

/// A leaf comparison
///
/// Regular expressions are compiled on first use and cached on the node,
/// since the same node is evaluated once per object scanned.
#[derive(Debug, Clone)]
pub struct DataNode {
    /// Field under test
    pub selector: FieldSelector,
    /// Comparison to apply
    pub comparator: Comparator,
    /// Vector handling
    pub array_op: ArrayOp,
    /// Literal compared against
    pub value: Value,
    regex: OnceCell<Option<Regex>>,
}

impl DataNode {
    /// Create a scalar comparison
    pub fn new(selector: FieldSelector, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            selector,
            comparator,
            array_op: ArrayOp::None,
            value: value.into(),
            regex: OnceCell::new(),
        }
    }

    /// Match when some element of the vector field satisfies the comparator
    pub fn contains(selector: FieldSelector, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self::new(selector, comparator, value).with_array_op(ArrayOp::Contains)
    }

    /// Compare the length of a vector field
    pub fn length(selector: FieldSelector, op: ArrayOp, len: i32) -> Self {
        Self::new(selector, Comparator::Equals, len).with_array_op(op)
    }

    /// Set the array operator
    pub fn with_array_op(mut self, op: ArrayOp) -> Self {
        self.array_op = op;
        self
    }

    /// The compiled regular expression, or `None` if the comparator is not
    /// a regex match or the pattern is invalid
    pub fn regex(&self) -> Option<&Regex> {
        self.regex
            .get_or_init(|| {
                let pattern = self.value.as_str()?;
                let insensitive = match self.comparator {
                    Comparator::Matches => false,
                    Comparator::NoCaseMatches => true,
                    _ => return None,
                };
                match RegexBuilder::new(pattern).case_insensitive(insensitive).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        debug!(pattern, error = %e, "Query regex failed to compile");
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl PartialEq for DataNode {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector
            && self.comparator == other.comparator
            && self.array_op == other.array_op
            && self.value == other.value
    }
}

impl Eq for DataNode {}

impl std::fmt::Display for DataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let literal = match &self.value {
            Value::String(s) => format!("{:?}", s),
            other => other.to_string(),
        };
        match (self.array_op, self.comparator) {
            (ArrayOp::LengthEq, _) => write!(f, "(len= {} {})", self.selector, literal),
            (ArrayOp::LengthGreater, _) => write!(f, "(len> {} {})", self.selector, literal),
            (ArrayOp::LengthLessEq, _) => write!(f, "(len<= {} {})", self.selector, literal),
            (_, Comparator::Defined) => write!(f, "(defined {})", self.selector),
            (ArrayOp::Contains, c) => {
                write!(f, "(contains ({} {} {}))", c, self.selector, literal)
            }
            (ArrayOp::None, c) => write!(f, "({} {} {})", c, self.selector, literal),
        }
    }
}

/// A node of a predicate tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// Negation
    Not(Box<QueryNode>),
    /// Both children match
    And(Box<QueryNode>, Box<QueryNode>),
    /// Either child matches
    Or(Box<QueryNode>, Box<QueryNode>),
    /// Leaf comparison
    Data(DataNode),
}

impl QueryNode {
    /// Leaf node
    pub fn data(node: DataNode) -> Self {
        QueryNode::Data(node)
    }

    /// `self AND other`
    pub fn and(self, other: QueryNode) -> Self {
        QueryNode::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: QueryNode) -> Self {
        QueryNode::Or(Box::new(self), Box::new(other))
    }

    /// `NOT self`
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        QueryNode::Not(Box::new(self))
    }

    /// Visit every leaf in left-to-right order
    pub fn leaves(&self) -> Vec<&DataNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                QueryNode::Not(child) => stack.push(child),
                QueryNode::And(l, r) | QueryNode::Or(l, r) => {
                    stack.push(r);
                    stack.push(l);
                }
                QueryNode::Data(d) => out.push(d),
            }
        }
        out
    }
}

impl std::fmt::Display for QueryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryNode::Not(child) => write!(f, "(not {})", child),
            QueryNode::And(l, r) => write!(f, "(and {} {})", l, r),
            QueryNode::Or(l, r) => write!(f, "(or {} {})", l, r),
            QueryNode::Data(d) => write!(f, "{}", d),
        }
    }
}

/// A predicate over the objects of one base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Base whose objects the query is meant for
    pub base: BaseId,
    /// Predicate; `None` matches every object
    pub root: Option<QueryNode>,
}

impl Query {
    /// Query with a predicate
    pub fn new(base: BaseId, root: QueryNode) -> Self {
        Self {
            base,
            root: Some(root),
        }
    }

    /// Query matching every object of `base`
    pub fn all(base: BaseId) -> Self {
        Self { base, root: None }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{}: {}", self.base, root),
            None => write!(f, "{}: (all)", self.base),
        }
    }
}
