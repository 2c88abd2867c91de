/*
 * Copyright (C) 2023 Asim Ihsan
 * SPDX-License-Identifier: AGPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU Affero General Public License as published by the Free
 * Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
 * PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>
 */

#![warn(missing_docs)]

//! Bayesian networks over boolean variables.
//!
//! A network is built from named states, each holding either a prior or a conditional probability
//! table, then baked into an immutable [`BakedNetwork`] that answers posterior queries by exact
//! inference by enumeration.
//!
//! See:
//! -  Chapter 13: Probabilistic Reasoning, section 13.2 and 13.3.1 (Inference by enumeration)

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

/// Floating point type used for all probabilities.
pub type Float = f64;

/// Fast non-cryptographic hash map.
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Observed values, keyed by state name.
pub type Evidence = HashMap<String, bool>;

/// Maximum number of unobserved states a single query will enumerate over. The joint has
/// `2^hidden` assignments, so this bounds the work of one query.
pub const MAX_HIDDEN_NODES: usize = 24;

/// Maximum number of parents of a single conditional probability table.
pub const MAX_PARENTS: usize = 16;

const NORMALIZATION_TOLERANCE: Float = 1e-9;

/// Bayesian network error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    /// Probability is not a finite number in [0, 1].
    #[error("probability out of range: {0}")]
    ProbabilityOutOfRange(Float),

    /// Conditional probability table has too many parents to enumerate.
    #[error("too many parents: {0}")]
    TooManyParents(usize),

    /// A table row has the wrong number of parent values.
    #[error("row has {actual} parent values, expected {expected}")]
    WrongRowArity {
        /// Number of parents of the table.
        expected: usize,
        /// Number of parent values in the row.
        actual: usize,
    },

    /// The same assignment appears twice in a table.
    #[error("duplicate row: parents {parents:?}, value {value}")]
    DuplicateRow {
        /// Parent values of the repeated row.
        parents: Vec<bool>,
        /// Child value of the repeated row.
        value: bool,
    },

    /// A table does not cover every assignment.
    #[error("table needs {expected} rows, got {actual}")]
    WrongRowCount {
        /// `2^(parents + 1)`.
        expected: usize,
        /// Rows supplied.
        actual: usize,
    },

    /// The two rows for one parent assignment do not sum to one.
    #[error("rows for parents {parents:?} sum to {sum}, not 1")]
    NotNormalized {
        /// Parent values.
        parents: Vec<bool>,
        /// Sum of P(true) and P(false).
        sum: Float,
    },

    /// Two states share a name.
    #[error("duplicate state: {0}")]
    DuplicateState(String),

    /// Key does not belong to this network.
    #[error("unknown node: {0:?}")]
    UnknownNode(NodeKey),

    /// Edge was already added.
    #[error("duplicate edge: {parent} -> {child}")]
    DuplicateEdge {
        /// Name of the parent state.
        parent: String,
        /// Name of the child state.
        child: String,
    },

    /// A state with a prior distribution was given parents.
    #[error("state {0} has a prior distribution but has parents")]
    PriorWithParents(String),

    /// A conditional state has a different number of parents than its table.
    #[error("state {state} has {actual} parents, its table expects {expected}")]
    ParentCountMismatch {
        /// Name of the state.
        state: String,
        /// Parents expected by the table.
        expected: usize,
        /// Parents connected by edges.
        actual: usize,
    },

    /// The edges form a cycle.
    #[error("network contains a cycle")]
    Cycle,

    /// Evidence names a state that is not in the network.
    #[error("evidence for unknown state: {0}")]
    UnknownEvidence(String),

    /// Evidence has probability zero under the network.
    #[error("evidence is impossible under the network")]
    ImpossibleEvidence,

    /// Too many unobserved states to enumerate.
    #[error("too many unobserved states: {hidden}")]
    TooManyHiddenNodes {
        /// Number of unobserved states.
        hidden: usize,
    },
}

fn check_probability(probability: Float) -> Result<Float, NetworkError> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(NetworkError::ProbabilityOutOfRange(probability))
    }
}

/// Distribution of a boolean variable with no parents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiscreteDistributionFields")]
pub struct DiscreteDistribution {
    p_true: Float,
}

impl DiscreteDistribution {
    /// Create a distribution where `P(true) = p_true`.
    pub fn new(p_true: Float) -> Result<Self, NetworkError> {
        Ok(Self {
            p_true: check_probability(p_true)?,
        })
    }

    /// P(true).
    pub fn p_true(&self) -> Float {
        self.p_true
    }

    /// P(value).
    pub fn probability(&self, value: bool) -> Float {
        if value {
            self.p_true
        } else {
            1.0 - self.p_true
        }
    }
}

// Deserialized form of DiscreteDistribution, checked by DiscreteDistribution::new.
#[derive(Deserialize)]
struct DiscreteDistributionFields {
    p_true: Float,
}

impl TryFrom<DiscreteDistributionFields> for DiscreteDistribution {
    type Error = NetworkError;

    fn try_from(fields: DiscreteDistributionFields) -> Result<Self, Self::Error> {
        DiscreteDistribution::new(fields.p_true)
    }
}

/// Conditional probability table for a boolean variable with boolean parents.
///
/// Stored densely: the row for parents `p_0 .. p_{n-1}` and child value `v` lives at the index
/// whose binary representation is `p_0 p_1 .. p_{n-1} v`, i.e. the first parent is the most
/// significant bit and the child the least significant. Enumerating indices `0..2^(n+1)` gives
/// the rows in binary counting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConditionalProbabilityTableFields")]
pub struct ConditionalProbabilityTable {
    parents: usize,
    probabilities: Vec<Float>,
}

impl ConditionalProbabilityTable {
    /// Create a table from `(parent values, child value, probability)` rows. Every one of the
    /// `2^(parents + 1)` assignments must appear exactly once, and for each parent assignment the
    /// two child rows must sum to one.
    pub fn new(parents: usize, rows: Vec<(Vec<bool>, bool, Float)>) -> Result<Self, NetworkError> {
        if parents > MAX_PARENTS {
            return Err(NetworkError::TooManyParents(parents));
        }
        let expected = 1usize << (parents + 1);
        if rows.len() != expected {
            return Err(NetworkError::WrongRowCount {
                expected,
                actual: rows.len(),
            });
        }

        let mut probabilities: Vec<Option<Float>> = vec![None; expected];
        for (parent_values, value, probability) in rows {
            if parent_values.len() != parents {
                return Err(NetworkError::WrongRowArity {
                    expected: parents,
                    actual: parent_values.len(),
                });
            }
            let probability = check_probability(probability)?;
            let index = row_index(&parent_values, value);
            if probabilities[index].is_some() {
                return Err(NetworkError::DuplicateRow {
                    parents: parent_values,
                    value,
                });
            }
            probabilities[index] = Some(probability);
        }

        // every slot is filled: row count matched and no slot was written twice
        let probabilities: Vec<Float> = probabilities.into_iter().flatten().collect();
        Self::from_probabilities(parents, probabilities)
    }

    /// Create a table from probabilities already in binary counting order, one per row. Checked
    /// the same way as [`ConditionalProbabilityTable::new`].
    pub fn from_probabilities(
        parents: usize,
        probabilities: Vec<Float>,
    ) -> Result<Self, NetworkError> {
        if parents > MAX_PARENTS {
            return Err(NetworkError::TooManyParents(parents));
        }
        let expected = 1usize << (parents + 1);
        if probabilities.len() != expected {
            return Err(NetworkError::WrongRowCount {
                expected,
                actual: probabilities.len(),
            });
        }
        for probability in &probabilities {
            check_probability(*probability)?;
        }

        for assignment in 0..(1usize << parents) {
            let sum = probabilities[assignment << 1] + probabilities[(assignment << 1) | 1];
            if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
                return Err(NetworkError::NotNormalized {
                    parents: bits(assignment, parents),
                    sum,
                });
            }
        }

        Ok(Self {
            parents,
            probabilities,
        })
    }

    /// Number of parents the table is conditioned on.
    pub fn parents(&self) -> usize {
        self.parents
    }

    /// P(value | parent_values).
    ///
    /// Panics if `parent_values` does not have one entry per parent.
    pub fn probability(&self, parent_values: &[bool], value: bool) -> Float {
        assert_eq!(parent_values.len(), self.parents, "wrong number of parents");
        self.probabilities[row_index(parent_values, value)]
    }

    /// All rows in binary counting order.
    pub fn rows(&self) -> Vec<(Vec<bool>, bool, Float)> {
        self.probabilities
            .iter()
            .enumerate()
            .map(|(index, probability)| {
                (bits(index >> 1, self.parents), index & 1 == 1, *probability)
            })
            .collect()
    }
}

// Deserialized form of ConditionalProbabilityTable, checked by from_probabilities.
#[derive(Deserialize)]
struct ConditionalProbabilityTableFields {
    parents: usize,
    probabilities: Vec<Float>,
}

impl TryFrom<ConditionalProbabilityTableFields> for ConditionalProbabilityTable {
    type Error = NetworkError;

    fn try_from(fields: ConditionalProbabilityTableFields) -> Result<Self, Self::Error> {
        ConditionalProbabilityTable::from_probabilities(fields.parents, fields.probabilities)
    }
}

fn row_index(parent_values: &[bool], value: bool) -> usize {
    let parents = parent_values
        .iter()
        .fold(0usize, |acc, &bit| (acc << 1) | usize::from(bit));
    (parents << 1) | usize::from(value)
}

/// Most significant bit first, `width` bits.
fn bits(value: usize, width: usize) -> Vec<bool> {
    (0..width)
        .rev()
        .map(|shift| (value >> shift) & 1 == 1)
        .collect()
}

/// Distribution attached to a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// No parents.
    Prior(DiscreteDistribution),

    /// Conditioned on the state's parents, in the order the edges were added.
    Conditional(ConditionalProbabilityTable),
}

impl From<DiscreteDistribution> for Distribution {
    fn from(distribution: DiscreteDistribution) -> Self {
        Distribution::Prior(distribution)
    }
}

impl From<ConditionalProbabilityTable> for Distribution {
    fn from(table: ConditionalProbabilityTable) -> Self {
        Distribution::Conditional(table)
    }
}

/// A named random variable in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// State name, unique within a network.
    pub name: String,

    /// Distribution of the variable.
    pub distribution: Distribution,
}

impl Node {
    /// Create a new node.
    pub fn new(name: impl Into<String>, distribution: impl Into<Distribution>) -> Self {
        Self {
            name: name.into(),
            distribution: distribution.into(),
        }
    }
}

new_key_type! {
    /// Handle to a node of a network.
    pub struct NodeKey;
}

/// A Bayesian network under construction.
#[derive(Debug, Clone)]
pub struct BayesianNetwork {
    name: String,
    nodes: SlotMap<NodeKey, Node>,
    parents: SecondaryMap<NodeKey, Vec<NodeKey>>,
    insertion_order: Vec<NodeKey>,
    names: HashMap<String, NodeKey>,
}

impl BayesianNetwork {
    /// Create an empty network.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: SlotMap::with_key(),
            parents: SecondaryMap::new(),
            insertion_order: Vec::new(),
            names: HashMap::default(),
        }
    }

    /// Network name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a state. Names must be unique.
    pub fn add_state(&mut self, node: Node) -> Result<NodeKey, NetworkError> {
        if self.names.contains_key(&node.name) {
            return Err(NetworkError::DuplicateState(node.name));
        }
        let name = node.name.clone();
        let key = self.nodes.insert(node);
        self.parents.insert(key, Vec::new());
        self.insertion_order.push(key);
        self.names.insert(name, key);
        Ok(key)
    }

    /// Add an edge from `parent` to `child`. The order in which a child's edges are added is the
    /// order of the parent columns in its conditional probability table.
    pub fn add_edge(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), NetworkError> {
        let parent_name = self
            .nodes
            .get(parent)
            .ok_or(NetworkError::UnknownNode(parent))?
            .name
            .clone();
        let child_name = self
            .nodes
            .get(child)
            .ok_or(NetworkError::UnknownNode(child))?
            .name
            .clone();
        let child_parents = self
            .parents
            .get_mut(child)
            .ok_or(NetworkError::UnknownNode(child))?;
        if child_parents.contains(&parent) {
            return Err(NetworkError::DuplicateEdge {
                parent: parent_name,
                child: child_name,
            });
        }
        child_parents.push(parent);
        Ok(())
    }

    /// Validate the structure and freeze the network for inference.
    pub fn bake(self) -> Result<BakedNetwork, NetworkError> {
        for &key in &self.insertion_order {
            let node = &self.nodes[key];
            let parent_count = self.parents[key].len();
            match &node.distribution {
                Distribution::Prior(_) if parent_count > 0 => {
                    return Err(NetworkError::PriorWithParents(node.name.clone()));
                }
                Distribution::Conditional(table) if table.parents() != parent_count => {
                    return Err(NetworkError::ParentCountMismatch {
                        state: node.name.clone(),
                        expected: table.parents(),
                        actual: parent_count,
                    });
                }
                _ => {}
            }
        }

        let index_of: SecondaryMap<NodeKey, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(index, key)| (*key, index))
            .collect();
        let topological_order = self.topological_order(&index_of)?;

        let factors = topological_order
            .iter()
            .map(|&index| {
                let key = self.insertion_order[index];
                Factor {
                    index,
                    parents: self.parents[key].iter().map(|p| index_of[*p]).collect(),
                    distribution: self.nodes[key].distribution.clone(),
                }
            })
            .collect();

        let states = self
            .insertion_order
            .iter()
            .map(|key| self.nodes[*key].name.clone())
            .collect();

        tracing::trace!(network = %self.name, states = self.insertion_order.len(), "baked network");

        Ok(BakedNetwork {
            name: self.name,
            states,
            factors,
            names: self
                .names
                .into_iter()
                .map(|(name, key)| (name, index_of[key]))
                .collect(),
        })
    }

    // Kahn's algorithm. Ties are broken by insertion order so the result is deterministic.
    fn topological_order(
        &self,
        index_of: &SecondaryMap<NodeKey, usize>,
    ) -> Result<Vec<usize>, NetworkError> {
        let count = self.insertion_order.len();
        let mut in_degree = vec![0usize; count];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (child, &key) in self.insertion_order.iter().enumerate() {
            for parent in &self.parents[key] {
                in_degree[child] += 1;
                children[index_of[*parent]].push(child);
            }
        }

        let mut ready: Vec<usize> = (0..count).filter(|i| in_degree[*i] == 0).rev().collect();
        let mut order = Vec::with_capacity(count);
        while let Some(index) = ready.pop() {
            order.push(index);
            for &child in &children[index] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(child);
                }
            }
        }

        if order.len() == count {
            Ok(order)
        } else {
            Err(NetworkError::Cycle)
        }
    }
}

#[derive(Debug, Clone)]
struct Factor {
    index: usize,
    parents: Vec<usize>,
    distribution: Distribution,
}

impl Factor {
    fn probability(&self, values: &[bool], parent_values: &mut Vec<bool>) -> Float {
        let value = values[self.index];
        match &self.distribution {
            Distribution::Prior(prior) => prior.probability(value),
            Distribution::Conditional(table) => {
                parent_values.clear();
                parent_values.extend(self.parents.iter().map(|p| values[*p]));
                table.probability(parent_values, value)
            }
        }
    }
}

/// Result of a query for a single state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Posterior {
    /// The state was given as evidence.
    Observed(bool),

    /// Posterior distribution of an unobserved state.
    Distribution(DiscreteDistribution),
}

impl Posterior {
    /// P(true | evidence). Observed states are certain.
    pub fn p_true(&self) -> Float {
        match self {
            Posterior::Observed(true) => 1.0,
            Posterior::Observed(false) => 0.0,
            Posterior::Distribution(distribution) => distribution.p_true(),
        }
    }
}

/// A validated, acyclic network that answers posterior queries.
#[derive(Debug, Clone)]
pub struct BakedNetwork {
    name: String,
    states: Vec<String>,
    factors: Vec<Factor>,
    names: HashMap<String, usize>,
}

impl BakedNetwork {
    /// Network name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State names in insertion order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Posterior of every state given the evidence, in insertion order.
    ///
    /// Enumerates every assignment of the unobserved states, weighs it by the product of all
    /// factors, and normalizes by the probability of the evidence.
    pub fn predict_proba(&self, evidence: &Evidence) -> Result<Vec<Posterior>, NetworkError> {
        let mut values = vec![false; self.states.len()];
        let mut observed = vec![false; self.states.len()];
        for (name, value) in evidence {
            let index = *self
                .names
                .get(name)
                .ok_or_else(|| NetworkError::UnknownEvidence(name.clone()))?;
            values[index] = *value;
            observed[index] = true;
        }

        let hidden: Vec<usize> = (0..self.states.len()).filter(|i| !observed[*i]).collect();
        if hidden.len() > MAX_HIDDEN_NODES {
            return Err(NetworkError::TooManyHiddenNodes {
                hidden: hidden.len(),
            });
        }

        let mut evidence_probability: Float = 0.0;
        let mut true_mass = vec![0.0; self.states.len()];
        let mut parent_values = Vec::new();
        for assignment in 0u64..(1u64 << hidden.len()) {
            for (bit, &index) in hidden.iter().enumerate() {
                values[index] = (assignment >> bit) & 1 == 1;
            }

            let mut weight: Float = 1.0;
            for factor in &self.factors {
                weight *= factor.probability(&values, &mut parent_values);
                if weight == 0.0 {
                    break;
                }
            }
            if weight == 0.0 {
                continue;
            }

            evidence_probability += weight;
            for &index in &hidden {
                if values[index] {
                    true_mass[index] += weight;
                }
            }
        }

        tracing::trace!(
            network = %self.name,
            hidden = hidden.len(),
            evidence_probability,
            "enumerated joint"
        );

        if evidence_probability <= 0.0 {
            return Err(NetworkError::ImpossibleEvidence);
        }

        (0..self.states.len())
            .map(|index| {
                if observed[index] {
                    Ok(Posterior::Observed(values[index]))
                } else {
                    let p_true = (true_mass[index] / evidence_probability).clamp(0.0, 1.0);
                    Ok(Posterior::Distribution(DiscreteDistribution::new(p_true)?))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    use super::*;

    fn prior(p_true: Float) -> DiscreteDistribution {
        DiscreteDistribution::new(p_true).unwrap()
    }

    // P(true | parents) given as a function, expanded into both child rows.
    fn table(parents: usize, p_true: impl Fn(&[bool]) -> Float) -> ConditionalProbabilityTable {
        let rows = (0..(1usize << parents))
            .flat_map(|assignment| {
                let parent_values = bits(assignment, parents);
                let p = p_true(&parent_values);
                vec![
                    (parent_values.clone(), false, 1.0 - p),
                    (parent_values, true, p),
                ]
            })
            .collect();
        ConditionalProbabilityTable::new(parents, rows).unwrap()
    }

    fn evidence(pairs: &[(&str, bool)]) -> Evidence {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    // Burglary network, Figure 13.2 page 431.
    fn burglary_network() -> BakedNetwork {
        let mut network = BayesianNetwork::new("burglary");
        let burglary = network
            .add_state(Node::new("Burglary", prior(0.001)))
            .unwrap();
        let earthquake = network
            .add_state(Node::new("Earthquake", prior(0.002)))
            .unwrap();
        let alarm = network
            .add_state(Node::new(
                "Alarm",
                table(2, |p| match (p[0], p[1]) {
                    (true, true) => 0.95,
                    (true, false) => 0.94,
                    (false, true) => 0.29,
                    (false, false) => 0.001,
                }),
            ))
            .unwrap();
        let john = network
            .add_state(Node::new(
                "JohnCalls",
                table(1, |p| if p[0] { 0.90 } else { 0.05 }),
            ))
            .unwrap();
        let mary = network
            .add_state(Node::new(
                "MaryCalls",
                table(1, |p| if p[0] { 0.70 } else { 0.01 }),
            ))
            .unwrap();
        network.add_edge(burglary, alarm).unwrap();
        network.add_edge(earthquake, alarm).unwrap();
        network.add_edge(alarm, john).unwrap();
        network.add_edge(alarm, mary).unwrap();
        network.bake().unwrap()
    }

    #[test]
    fn test_prior_rejects_out_of_range() {
        assert_eq!(
            DiscreteDistribution::new(1.5),
            Err(NetworkError::ProbabilityOutOfRange(1.5))
        );
        assert!(DiscreteDistribution::new(-0.1).is_err());
        assert!(DiscreteDistribution::new(Float::NAN).is_err());
        assert!(DiscreteDistribution::new(0.0).is_ok());
        assert!(DiscreteDistribution::new(1.0).is_ok());
    }

    #[test]
    fn test_table_rows_in_binary_counting_order() {
        let cpt = table(1, |p| if p[0] { 0.9 } else { 0.2 });
        let rows = cpt.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].0, vec![false]);
        assert!(!rows[0].1);
        assert_abs_diff_eq!(rows[0].2, 0.8, epsilon = 1e-12);
        assert_eq!(rows[3].0, vec![true]);
        assert!(rows[3].1);
        assert_abs_diff_eq!(rows[3].2, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_table_rejects_missing_rows() {
        let result = ConditionalProbabilityTable::new(1, vec![(vec![false], false, 1.0)]);
        assert_eq!(
            result,
            Err(NetworkError::WrongRowCount {
                expected: 4,
                actual: 1
            })
        );
    }

    #[test]
    fn test_table_rejects_duplicate_rows() {
        let result = ConditionalProbabilityTable::new(
            0,
            vec![(vec![], true, 0.5), (vec![], true, 0.5)],
        );
        assert_eq!(
            result,
            Err(NetworkError::DuplicateRow {
                parents: vec![],
                value: true
            })
        );
    }

    #[test]
    fn test_table_rejects_rows_not_summing_to_one() {
        let result = ConditionalProbabilityTable::new(
            1,
            vec![
                (vec![false], false, 1.0),
                (vec![false], true, 0.0),
                (vec![true], false, 0.5),
                (vec![true], true, 0.4),
            ],
        );
        assert!(matches!(
            result,
            Err(NetworkError::NotNormalized { ref parents, .. }) if parents == &vec![true]
        ));
    }

    #[test]
    fn test_table_rejects_wrong_arity() {
        let result = ConditionalProbabilityTable::new(
            1,
            vec![
                (vec![false, false], false, 1.0),
                (vec![false], true, 0.0),
                (vec![true], false, 0.0),
                (vec![true], true, 1.0),
            ],
        );
        assert_eq!(
            result,
            Err(NetworkError::WrongRowArity {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let mut network = BayesianNetwork::new("dup");
        network.add_state(Node::new("a", prior(0.5))).unwrap();
        assert_eq!(
            network.add_state(Node::new("a", prior(0.5))),
            Err(NetworkError::DuplicateState("a".to_string()))
        );
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let mut network = BayesianNetwork::new("dup-edge");
        let a = network.add_state(Node::new("a", prior(0.5))).unwrap();
        let b = network
            .add_state(Node::new("b", table(1, |p| if p[0] { 1.0 } else { 0.0 })))
            .unwrap();
        network.add_edge(a, b).unwrap();
        assert!(matches!(
            network.add_edge(a, b),
            Err(NetworkError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn test_bake_rejects_parent_count_mismatch() {
        let mut network = BayesianNetwork::new("mismatch");
        network.add_state(Node::new("a", prior(0.5))).unwrap();
        network
            .add_state(Node::new("b", table(1, |p| if p[0] { 1.0 } else { 0.0 })))
            .unwrap();
        assert_eq!(
            network.bake().unwrap_err(),
            NetworkError::ParentCountMismatch {
                state: "b".to_string(),
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_bake_rejects_prior_with_parents() {
        let mut network = BayesianNetwork::new("prior-with-parents");
        let a = network.add_state(Node::new("a", prior(0.5))).unwrap();
        let b = network.add_state(Node::new("b", prior(0.5))).unwrap();
        network.add_edge(a, b).unwrap();
        assert_eq!(
            network.bake().unwrap_err(),
            NetworkError::PriorWithParents("b".to_string())
        );
    }

    #[test]
    fn test_bake_rejects_cycle() {
        let mut network = BayesianNetwork::new("cycle");
        let a = network
            .add_state(Node::new("a", table(1, |p| if p[0] { 0.9 } else { 0.1 })))
            .unwrap();
        let b = network
            .add_state(Node::new("b", table(1, |p| if p[0] { 0.9 } else { 0.1 })))
            .unwrap();
        network.add_edge(a, b).unwrap();
        network.add_edge(b, a).unwrap();
        assert_eq!(network.bake().unwrap_err(), NetworkError::Cycle);
    }

    #[test]
    fn test_states_in_insertion_order() {
        let network = burglary_network();
        assert_eq!(
            network.states(),
            ["Burglary", "Earthquake", "Alarm", "JohnCalls", "MaryCalls"]
        );
    }

    #[test]
    fn test_no_evidence_returns_priors() {
        let network = burglary_network();
        let posteriors = network.predict_proba(&Evidence::default()).unwrap();
        assert_abs_diff_eq!(posteriors[0].p_true(), 0.001, epsilon = 1e-12);
        assert_abs_diff_eq!(posteriors[1].p_true(), 0.002, epsilon = 1e-12);
    }

    // Page 435: P(Burglary | JohnCalls = true, MaryCalls = true) is about 0.284.
    #[test]
    fn test_burglary_given_both_calls() {
        let network = burglary_network();
        let posteriors = network
            .predict_proba(&evidence(&[("JohnCalls", true), ("MaryCalls", true)]))
            .unwrap();
        assert_abs_diff_eq!(posteriors[0].p_true(), 0.284, epsilon = 0.001);
        assert_abs_diff_eq!(posteriors[1].p_true(), 0.176, epsilon = 0.001);
        assert_eq!(posteriors[3], Posterior::Observed(true));
        assert_eq!(posteriors[4], Posterior::Observed(true));
    }

    #[test]
    fn test_unknown_evidence_rejected() {
        let network = burglary_network();
        assert_eq!(
            network.predict_proba(&evidence(&[("Wumpus", true)])),
            Err(NetworkError::UnknownEvidence("Wumpus".to_string()))
        );
    }

    #[test]
    fn test_impossible_evidence_rejected() {
        let mut network = BayesianNetwork::new("impossible");
        let a = network.add_state(Node::new("a", prior(0.5))).unwrap();
        let b = network
            .add_state(Node::new("b", table(1, |p| if p[0] { 1.0 } else { 0.0 })))
            .unwrap();
        network.add_edge(a, b).unwrap();
        let network = network.bake().unwrap();
        assert_eq!(
            network.predict_proba(&evidence(&[("a", false), ("b", true)])),
            Err(NetworkError::ImpossibleEvidence)
        );
    }

    #[test]
    fn test_too_many_hidden_nodes_rejected() {
        let mut network = BayesianNetwork::new("wide");
        for i in 0..(MAX_HIDDEN_NODES + 1) {
            network
                .add_state(Node::new(format!("n{}", i), prior(0.5)))
                .unwrap();
        }
        let network = network.bake().unwrap();
        assert_eq!(
            network.predict_proba(&Evidence::default()),
            Err(NetworkError::TooManyHiddenNodes {
                hidden: MAX_HIDDEN_NODES + 1
            })
        );
    }

    #[test]
    fn test_deserialized_prior_is_checked() {
        let parsed: DiscreteDistribution = serde_json::from_str(r#"{"p_true": 0.25}"#).unwrap();
        assert_eq!(parsed, prior(0.25));
        assert!(serde_json::from_str::<DiscreteDistribution>(r#"{"p_true": 7.5}"#).is_err());
    }

    #[test]
    fn test_deserialized_table_is_checked() {
        let cpt = table(1, |p| if p[0] { 0.9 } else { 0.2 });
        let json = serde_json::to_string(&cpt).unwrap();
        let parsed: ConditionalProbabilityTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cpt);

        for bad in [
            r#"{"parents": 1, "probabilities": []}"#,
            r#"{"parents": 0, "probabilities": [0.5, 0.6]}"#,
            r#"{"parents": 0, "probabilities": [-1.0, 2.0]}"#,
            r#"{"parents": 40, "probabilities": []}"#,
        ] {
            assert!(
                serde_json::from_str::<ConditionalProbabilityTable>(bad).is_err(),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_table_from_probabilities_matches_rows() {
        let cpt = table(2, |p| if p[0] || p[1] { 0.7 } else { 0.1 });
        let probabilities: Vec<Float> = cpt.rows().into_iter().map(|row| row.2).collect();
        assert_eq!(
            ConditionalProbabilityTable::from_probabilities(2, probabilities).unwrap(),
            cpt
        );
        assert_eq!(
            ConditionalProbabilityTable::from_probabilities(1, vec![]),
            Err(NetworkError::WrongRowCount {
                expected: 4,
                actual: 0
            })
        );
    }

    proptest! {
        // Bayes' rule for a single parent and child, checked against the closed form.
        #[test]
        fn test_single_edge_matches_bayes_rule(
            p_parent in 0.01..0.99f64,
            p_child_given_true in 0.01..0.99f64,
            p_child_given_false in 0.01..0.99f64,
        ) {
            let mut network = BayesianNetwork::new("pair");
            let parent = network.add_state(Node::new("parent", prior(p_parent))).unwrap();
            let child = network
                .add_state(Node::new(
                    "child",
                    table(1, |p| if p[0] { p_child_given_true } else { p_child_given_false }),
                ))
                .unwrap();
            network.add_edge(parent, child).unwrap();
            let network = network.bake().unwrap();

            let posteriors = network.predict_proba(&evidence(&[("child", true)])).unwrap();
            let expected = p_parent * p_child_given_true
                / (p_parent * p_child_given_true + (1.0 - p_parent) * p_child_given_false);
            assert_abs_diff_eq!(posteriors[0].p_true(), expected, epsilon = 1e-9);
            assert!((0.0..=1.0).contains(&posteriors[0].p_true()));

            let again = network.predict_proba(&evidence(&[("child", true)])).unwrap();
            prop_assert_eq!(posteriors, again);
        }
    }
}
