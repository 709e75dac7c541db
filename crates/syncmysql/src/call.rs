//! Results of stored procedure calls.

use syncmysql_driver::ResultSet;

/// What a `CALL` produced.
///
/// MySQL ends every `CALL` with a status packet; it is not reported as a
/// result set of its own when the procedure also returned rows.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// At most one result set (a procedure without SELECTs yields its status).
    Single(ResultSet),
    /// Two or more result sets, in the order the procedure produced them.
    Multiple(Vec<ResultSet>),
}

impl CallResult {
    pub(crate) fn from_sets(mut sets: Vec<ResultSet>) -> Self {
        if sets.len() > 1 && sets.last().is_some_and(|set| !set.has_columns()) {
            sets.pop();
        }
        if sets.len() > 1 {
            CallResult::Multiple(sets)
        } else {
            CallResult::Single(sets.pop().unwrap_or_default())
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, CallResult::Multiple(_))
    }

    /// Number of result sets.
    pub fn len(&self) -> usize {
        match self {
            CallResult::Single(_) => 1,
            CallResult::Multiple(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first result set.
    pub fn first(&self) -> Option<&ResultSet> {
        match self {
            CallResult::Single(set) => Some(set),
            CallResult::Multiple(sets) => sets.first(),
        }
    }

    /// Every result set as a list, whichever variant this is.
    pub fn into_sets(self) -> Vec<ResultSet> {
        match self {
            CallResult::Single(set) => vec![set],
            CallResult::Multiple(sets) => sets,
        }
    }

    /// `Single` as an array of row objects, `Multiple` as an array of those.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CallResult::Single(set) => set.to_json(),
            CallResult::Multiple(sets) => {
                serde_json::Value::Array(sets.iter().map(ResultSet::to_json).collect())
            }
        }
    }
}
