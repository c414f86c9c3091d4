use std::fmt;
use std::sync::Arc;

use crate::value::AbstractValue;

use super::{Qualifier, QualifierHierarchy};

/// A qualifier together with the hierarchy it belongs to.
#[derive(Clone)]
pub struct QualifierValue {
    hierarchy: Arc<QualifierHierarchy>,
    qualifier: Qualifier,
}

impl QualifierValue {
    pub fn new(hierarchy: &Arc<QualifierHierarchy>, qualifier: Qualifier) -> Self {
        Self {
            hierarchy: Arc::clone(hierarchy),
            qualifier,
        }
    }

    pub fn by_name(hierarchy: &Arc<QualifierHierarchy>, name: &str) -> Option<Self> {
        hierarchy.qualifier(name).map(|q| Self::new(hierarchy, q))
    }

    pub fn top(hierarchy: &Arc<QualifierHierarchy>) -> Self {
        Self::new(hierarchy, hierarchy.top())
    }

    pub fn bottom(hierarchy: &Arc<QualifierHierarchy>) -> Self {
        Self::new(hierarchy, hierarchy.bottom())
    }

    pub fn qualifier(&self) -> Qualifier {
        self.qualifier
    }

    pub fn name(&self) -> &str {
        self.hierarchy.name(self.qualifier)
    }

    pub fn hierarchy(&self) -> &Arc<QualifierHierarchy> {
        &self.hierarchy
    }

    pub fn is_top(&self) -> bool {
        self.qualifier == self.hierarchy.top()
    }

    pub fn is_bottom(&self) -> bool {
        self.qualifier == self.hierarchy.bottom()
    }

    pub fn is_subtype_of(&self, other: &Self) -> bool {
        self.hierarchy.is_subtype(self.qualifier, other.qualifier)
    }

    /// Meet: the most specific value below both.
    pub fn greatest_lower_bound(&self, other: &Self) -> Self {
        Self::new(&self.hierarchy, self.hierarchy.greatest_lower_bound(self.qualifier, other.qualifier))
    }
}

impl PartialEq for QualifierValue {
    fn eq(&self, other: &Self) -> bool {
        self.qualifier == other.qualifier
            && (Arc::ptr_eq(&self.hierarchy, &other.hierarchy) || self.hierarchy == other.hierarchy)
    }
}

impl Eq for QualifierValue {}

impl AbstractValue for QualifierValue {
    fn least_upper_bound(&self, other: &Self) -> Self {
        Self::new(&self.hierarchy, self.hierarchy.least_upper_bound(self.qualifier, other.qualifier))
    }
}

impl fmt::Debug for QualifierValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifierValue({})", self.name())
    }
}

impl fmt::Display for QualifierValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qualifier::HierarchyConfig;
    use crate::value::tests::check_join_laws;
    use test_log::test;

    #[test]
    fn test_join_and_meet() {
        let h = Arc::new(
            HierarchyConfig::new("Unknown", "Bottom")
                .qualifier("Tainted")
                .qualifier("Untainted")
                .subtype("Tainted", "Unknown")
                .subtype("Untainted", "Unknown")
                .subtype("Bottom", "Tainted")
                .subtype("Bottom", "Untainted")
                .build()
                .unwrap(),
        );
        let all: Vec<QualifierValue> = h.qualifiers().map(|q| QualifierValue::new(&h, q)).collect();
        check_join_laws(&all);

        let tainted = QualifierValue::by_name(&h, "Tainted").unwrap();
        let untainted = QualifierValue::by_name(&h, "Untainted").unwrap();
        assert!(tainted.least_upper_bound(&untainted).is_top());
        assert!(tainted.greatest_lower_bound(&untainted).is_bottom());
        assert!(QualifierValue::bottom(&h).is_subtype_of(&tainted));
        assert_eq!(tainted.to_string(), "@Tainted");
        assert_eq!(format!("{:?}", untainted), "QualifierValue(Untainted)");
    }
}
