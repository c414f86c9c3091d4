use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::error::HierarchyError;

/// Handle of a qualifier inside its [`QualifierHierarchy`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Qualifier(u32);

impl Qualifier {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Declaration of a qualifier lattice: its qualifiers, the top and bottom
/// qualifier, and the direct subtype edges `(sub, super)`.
#[derive(Debug, Clone, Default)]
pub struct HierarchyConfig {
    pub qualifiers: Vec<String>,
    pub top: String,
    pub bottom: String,
    pub subtypes: Vec<(String, String)>,
}

impl HierarchyConfig {
    /// A declaration holding only `top` and `bottom`.
    pub fn new(top: &str, bottom: &str) -> Self {
        let mut qualifiers = vec![top.to_string()];
        if bottom != top {
            qualifiers.push(bottom.to_string());
        }
        Self {
            qualifiers,
            top: top.to_string(),
            bottom: bottom.to_string(),
            subtypes: Vec::new(),
        }
    }

    pub fn qualifier(mut self, name: &str) -> Self {
        self.qualifiers.push(name.to_string());
        self
    }

    /// Declares `sub <: sup`.
    pub fn subtype(mut self, sub: &str, sup: &str) -> Self {
        self.subtypes.push((sub.to_string(), sup.to_string()));
        self
    }

    pub fn build(self) -> Result<QualifierHierarchy, HierarchyError> {
        QualifierHierarchy::new(self)
    }
}

/// A validated qualifier lattice.
///
/// Subtyping is the reflexive-transitive closure of the declared edges. Every
/// pair of qualifiers has a unique least upper bound and greatest lower bound;
/// both are tabulated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierHierarchy {
    names: Vec<String>,
    by_name: HashMap<String, Qualifier>,
    top: Qualifier,
    bottom: Qualifier,
    /// `below[a][b]` iff `a <: b`.
    below: Vec<Vec<bool>>,
    lub: Vec<Vec<Qualifier>>,
    glb: Vec<Vec<Qualifier>>,
}

impl QualifierHierarchy {
    pub fn new(config: HierarchyConfig) -> Result<Self, HierarchyError> {
        let mut by_name = HashMap::new();
        for (i, name) in config.qualifiers.iter().enumerate() {
            if by_name.insert(name.clone(), Qualifier(i as u32)).is_some() {
                return Err(HierarchyError::DuplicateQualifier(name.clone()));
            }
        }
        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| HierarchyError::UnknownQualifier(name.to_string()))
        };
        let top = lookup(&config.top)?;
        let bottom = lookup(&config.bottom)?;

        let n = config.qualifiers.len();
        let mut below = vec![vec![false; n]; n];
        for (i, row) in below.iter_mut().enumerate() {
            row[i] = true;
        }
        for (sub, sup) in &config.subtypes {
            let (sub, sup) = (lookup(sub)?, lookup(sup)?);
            if sub == sup {
                return Err(HierarchyError::Cycle(config.qualifiers[sub.index()].clone()));
            }
            below[sub.index()][sup.index()] = true;
        }

        // Transitive closure.
        for k in 0..n {
            for i in 0..n {
                if below[i][k] {
                    for j in 0..n {
                        if below[k][j] {
                            below[i][j] = true;
                        }
                    }
                }
            }
        }

        for a in 0..n {
            for b in (a + 1)..n {
                if below[a][b] && below[b][a] {
                    return Err(HierarchyError::Cycle(config.qualifiers[a].clone()));
                }
            }
        }
        for (q, name) in config.qualifiers.iter().enumerate() {
            if !below[q][top.index()] {
                return Err(HierarchyError::NotBelowTop {
                    qualifier: name.clone(),
                    top: config.top.clone(),
                });
            }
        }
        for (q, name) in config.qualifiers.iter().enumerate() {
            if !below[bottom.index()][q] {
                return Err(HierarchyError::NotAboveBottom {
                    qualifier: name.clone(),
                    bottom: config.bottom.clone(),
                });
            }
        }

        let mut lub = vec![vec![top; n]; n];
        let mut glb = vec![vec![bottom; n]; n];
        for a in 0..n {
            for b in 0..n {
                let upper: Vec<usize> = (0..n).filter(|&c| below[a][c] && below[b][c]).collect();
                lub[a][b] = least(&below, &upper).ok_or_else(|| {
                    HierarchyError::NoUniqueLub(config.qualifiers[a].clone(), config.qualifiers[b].clone())
                })?;
                let lower: Vec<usize> = (0..n).filter(|&c| below[c][a] && below[c][b]).collect();
                glb[a][b] = greatest(&below, &lower).ok_or_else(|| {
                    HierarchyError::NoUniqueGlb(config.qualifiers[a].clone(), config.qualifiers[b].clone())
                })?;
            }
        }

        debug!(
            "Qualifier hierarchy with {} qualifiers, top {}, bottom {}",
            n, config.top, config.bottom
        );

        Ok(Self {
            names: config.qualifiers,
            by_name,
            top,
            bottom,
            below,
            lub,
            glb,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn top(&self) -> Qualifier {
        self.top
    }

    pub fn bottom(&self) -> Qualifier {
        self.bottom
    }

    pub fn qualifier(&self, name: &str) -> Option<Qualifier> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, qualifier: Qualifier) -> &str {
        &self.names[qualifier.index()]
    }

    pub fn qualifiers(&self) -> impl Iterator<Item = Qualifier> {
        (0..self.names.len() as u32).map(Qualifier)
    }

    /// Whether `sub <: sup`.
    pub fn is_subtype(&self, sub: Qualifier, sup: Qualifier) -> bool {
        self.below[sub.index()][sup.index()]
    }

    pub fn least_upper_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        self.lub[a.index()][b.index()]
    }

    pub fn greatest_lower_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        self.glb[a.index()][b.index()]
    }
}

/// The element of `candidates` below all others, if there is exactly one.
fn least(below: &[Vec<bool>], candidates: &[usize]) -> Option<Qualifier> {
    candidates
        .iter()
        .copied()
        .find(|&c| candidates.iter().all(|&d| below[c][d]))
        .map(|c| Qualifier(c as u32))
}

fn greatest(below: &[Vec<bool>], candidates: &[usize]) -> Option<Qualifier> {
    candidates
        .iter()
        .copied()
        .find(|&c| candidates.iter().all(|&d| below[d][c]))
        .map(|c| Qualifier(c as u32))
}
