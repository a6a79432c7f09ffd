//! Multiplexing: the per-message tree of layout levels.
//!
//! The root level holds every signal without a selector. Each selector
//! signal owns one child level per selector value; a child level holds
//! the signals wired to that selector whose id set contains the value.

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::layout::Formats;
use crate::types::signal::Signal;

/// One level of the multiplexing tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Codec {
    /// Indices (into the message's signal list) present at this level.
    pub(crate) signals: Vec<usize>,
    pub(crate) formats: Formats,
    /// Selector name → selector value → child level.
    pub(crate) multiplexers: BTreeMap<String, BTreeMap<i64, Codec>>,
}

impl Codec {
    /// Builds the tree for a frame of `length` bytes.
    pub(crate) fn build(signals: &[Signal], length: usize) -> Codec {
        Self::build_level(signals, &[], None, length)
    }

    /// `path` holds the selectors above this level, innermost last.
    fn build_level(
        signals: &[Signal],
        path: &[&str],
        selector_value: Option<i64>,
        length: usize,
    ) -> Codec {
        let selector = path.last().copied();
        let level: Vec<usize> = signals
            .iter()
            .enumerate()
            .filter(|(_, s)| s.multiplexer_signal.as_deref() == selector)
            .filter(|(_, s)| match selector_value {
                None => true,
                Some(id) => s
                    .multiplexer_ids
                    .as_ref()
                    .is_some_and(|ids| ids.contains(&id)),
            })
            .map(|(idx, _)| idx)
            .collect();

        let mut multiplexers: BTreeMap<String, BTreeMap<i64, Codec>> = BTreeMap::new();
        for &idx in &level {
            let sig = &signals[idx];
            if !sig.is_multiplexer {
                continue;
            }
            if path.contains(&sig.name.as_str()) {
                log::warn!("selector '{}' selects itself, its branches are ignored", sig.name);
                continue;
            }
            let mut child_path: Vec<&str> = path.to_vec();
            child_path.push(sig.name.as_str());
            let mut ids: BTreeSet<i64> = signals
                .iter()
                .filter(|s| s.multiplexer_signal.as_deref() == Some(sig.name.as_str()))
                .flat_map(|s| s.multiplexer_ids.iter().flatten().copied())
                .collect();
            if let Some(choices) = &sig.choices {
                ids.extend(choices.keys().copied());
            }
            let children: BTreeMap<i64, Codec> = ids
                .into_iter()
                .map(|id| {
                    (
                        id,
                        Self::build_level(signals, &child_path, Some(id), length),
                    )
                })
                .collect();
            multiplexers.insert(sig.name.clone(), children);
        }

        Codec {
            formats: Formats::build(signals, &level, length),
            signals: level,
            multiplexers,
        }
    }

    /// Sawtooth bit painting along every branch of the tree.
    ///
    /// Returns `(signal, overflow)` for the first collision found: overflow
    /// marks a signal reaching past the frame, otherwise two signals of one
    /// branch share a bit.
    pub(crate) fn find_collision<'a>(
        &self,
        signals: &'a [Signal],
        length: usize,
    ) -> Option<(&'a Signal, bool)> {
        self.paint(signals, vec![false; length.saturating_mul(8)])
    }

    fn paint<'a>(&self, signals: &'a [Signal], mut taken: Vec<bool>) -> Option<(&'a Signal, bool)> {
        for &idx in &self.signals {
            let sig = &signals[idx];
            for bit in sig.sawtooth_bits() {
                match taken.get_mut(bit as usize) {
                    None => return Some((sig, true)),
                    Some(slot) if *slot => return Some((sig, false)),
                    Some(slot) => *slot = true,
                }
            }
        }
        self.multiplexers
            .values()
            .flat_map(|children| children.values())
            .find_map(|child| child.paint(signals, taken.clone()))
    }

    /// Multiplexing structure as nested names.
    pub(crate) fn tree(&self, signals: &[Signal]) -> Vec<SignalTree> {
        self.signals
            .iter()
            .map(|&idx| {
                let name = &signals[idx].name;
                match self.multiplexers.get(name) {
                    Some(children) => SignalTree::Multiplexer {
                        name: name.clone(),
                        branches: children
                            .iter()
                            .map(|(id, child)| (*id, child.tree(signals)))
                            .collect(),
                    },
                    None => SignalTree::Signal(name.clone()),
                }
            })
            .collect()
    }
}

/// Nested view of a message's multiplexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalTree {
    /// A plain signal.
    Signal(String),
    /// A selector and, per selector value, the signals it enables.
    Multiplexer {
        name: String,
        branches: BTreeMap<i64, Vec<SignalTree>>,
    },
}

impl SignalTree {
    pub fn name(&self) -> &str {
        match self {
            SignalTree::Signal(name) | SignalTree::Multiplexer { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(name: &str, start: u32, selector: &str, ids: &[i64]) -> Signal {
        let mut sig = Signal::new(name, start, 8);
        sig.multiplexer_signal = Some(selector.to_string());
        sig.multiplexer_ids = Some(ids.to_vec());
        sig
    }

    fn mux_signals() -> Vec<Signal> {
        let mut m = Signal::new("M", 0, 8);
        m.is_multiplexer = true;
        vec![
            m,
            selected("A", 8, "M", &[0]),
            selected("B", 8, "M", &[1, 2]),
            Signal::new("Common", 24, 8),
        ]
    }

    #[test]
    fn test_tree_levels() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 4);
        assert_eq!(codec.signals, vec![0, 3]);
        let children = &codec.multiplexers["M"];
        assert_eq!(children.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(children[&0].signals, vec![1]);
        assert_eq!(children[&2].signals, vec![2]);
    }

    #[test]
    fn test_branches_may_share_bits() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 4);
        assert!(codec.find_collision(&signals, 4).is_none());
    }

    #[test]
    fn test_collisions() {
        let signals = vec![Signal::new("A", 0, 8), Signal::new("B", 4, 8)];
        let codec = Codec::build(&signals, 2);
        let (sig, overflow) = codec.find_collision(&signals, 2).unwrap();
        assert_eq!(sig.name, "B");
        assert!(!overflow);

        let signals = vec![Signal::new("Wide", 8, 16)];
        let codec = Codec::build(&signals, 2);
        assert_eq!(codec.find_collision(&signals, 2).map(|(_, o)| o), Some(true));
    }

    #[test]
    fn test_selector_named_like_its_selector() {
        let mut outer = Signal::new("S", 0, 4);
        outer.is_multiplexer = true;
        let mut inner = selected("S", 4, "S", &[1]);
        inner.is_multiplexer = true;
        let signals = vec![outer, inner];
        let codec = Codec::build(&signals, 1);
        let branch = &codec.multiplexers["S"][&1];
        assert_eq!(branch.signals, vec![1]);
        assert!(branch.multiplexers.is_empty());
    }

    #[test]
    fn test_choice_keys_add_empty_branches() {
        let mut signals = mux_signals();
        signals[0].choices = Some([(5, "Idle".to_string())].into());
        let codec = Codec::build(&signals, 4);
        assert!(codec.multiplexers["M"][&5].signals.is_empty());
    }

    #[test]
    fn test_signal_tree() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 4);
        let tree = codec.tree(&signals);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1], SignalTree::Signal("Common".into()));
        let SignalTree::Multiplexer { name, branches } = &tree[0] else {
            panic!("expected multiplexer");
        };
        assert_eq!(name, "M");
        assert_eq!(branches[&1], vec![SignalTree::Signal("B".into())]);
    }
}
