// Transition table with explicit superstate lookup
//
// Edges are keyed by (state, trigger). A state without its own edge for a
// trigger inherits the edge of its parent, walking up until the root.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::controller::types::{ControllerState, Trigger};

#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: BTreeMap<(ControllerState, Trigger), ControllerState>,
    parents: HashMap<ControllerState, ControllerState>,
    initial_substates: HashMap<ControllerState, ControllerState>,
}

/// States left and entered when an edge is taken, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPath {
    pub exits: Vec<ControllerState>,
    pub entries: Vec<ControllerState>,
    pub destination: ControllerState,
}

static CONTROLLER_TABLE: LazyLock<TransitionTable> = LazyLock::new(|| {
    use ControllerState::*;
    use Trigger::*;

    TransitionTable::builder()
        .substate(On, Preheating)
        .substate(On, Idle)
        .substate(On, Brewing)
        .substate(On, MilkFrothing)
        .substate(On, Cleaning)
        .initial(On, Idle)
        .permit(Off, TurnOn, On)
        .permit(Idle, StartPreheating, Preheating)
        .permit(Preheating, PreheatingComplete, Idle)
        .permit(Idle, StartBrewing, Brewing)
        .permit(Brewing, BrewingComplete, Idle)
        .permit(Brewing, CancelBrewing, Idle)
        .permit(Idle, StartMilkFrothing, MilkFrothing)
        .permit(MilkFrothing, MilkFrothingComplete, Idle)
        .permit(Idle, StartCleaning, Cleaning)
        .permit(Cleaning, CleaningComplete, Idle)
        .build()
});

impl TransitionTable {
    pub fn builder() -> TransitionTableBuilder {
        TransitionTableBuilder::default()
    }

    /// The appliance's authoritative table.
    pub fn controller() -> &'static TransitionTable {
        &CONTROLLER_TABLE
    }

    pub fn parent_of(&self, state: ControllerState) -> Option<ControllerState> {
        self.parents.get(&state).copied()
    }

    pub fn initial_substate(&self, state: ControllerState) -> Option<ControllerState> {
        self.initial_substates.get(&state).copied()
    }

    pub fn is_composite(&self, state: ControllerState) -> bool {
        self.initial_substates.contains_key(&state)
    }

    pub fn substates_of(&self, state: ControllerState) -> Vec<ControllerState> {
        let mut children: Vec<_> = self
            .parents
            .iter()
            .filter(|(_, parent)| **parent == state)
            .map(|(child, _)| *child)
            .collect();
        children.sort();
        children
    }

    /// The state itself followed by its superstates, innermost first.
    pub fn ancestry(&self, state: ControllerState) -> Vec<ControllerState> {
        let mut chain = vec![state];
        let mut current = state;
        while let Some(parent) = self.parent_of(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Follows initial substates down to a leaf.
    pub fn settle(&self, state: ControllerState) -> ControllerState {
        let mut current = state;
        while let Some(initial) = self.initial_substate(current) {
            if initial == current {
                break;
            }
            current = initial;
        }
        current
    }

    /// Declared target for `trigger` in `state` or the nearest superstate.
    pub fn target(&self, state: ControllerState, trigger: Trigger) -> Option<ControllerState> {
        self.ancestry(state)
            .into_iter()
            .find_map(|candidate| self.edges.get(&(candidate, trigger)).copied())
    }

    /// Resolves a trigger into the exits and entries to perform, if legal.
    pub fn resolve(&self, source: ControllerState, trigger: Trigger) -> Option<TransitionPath> {
        let target = self.target(source, trigger)?;
        let destination = self.settle(target);

        let source_chain = self.ancestry(source);
        let destination_chain = self.ancestry(destination);

        let common = if source == destination {
            self.parent_of(source)
        } else {
            source_chain
                .iter()
                .copied()
                .find(|state| destination_chain.contains(state))
        };

        let exits = source_chain
            .iter()
            .copied()
            .take_while(|state| Some(*state) != common)
            .collect();
        let mut entries: Vec<_> = destination_chain
            .iter()
            .copied()
            .take_while(|state| Some(*state) != common)
            .collect();
        entries.reverse();

        Some(TransitionPath {
            exits,
            entries,
            destination,
        })
    }

    /// Triggers legal from `state`, including those inherited from superstates.
    pub fn permitted_triggers(&self, state: ControllerState) -> BTreeSet<Trigger> {
        let chain = self.ancestry(state);
        self.edges
            .keys()
            .filter(|(from, _)| chain.contains(from))
            .map(|(_, trigger)| *trigger)
            .collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = (ControllerState, Trigger, ControllerState)> + '_ {
        self.edges
            .iter()
            .map(|((from, trigger), to)| (*from, *trigger, *to))
    }
}

#[derive(Debug, Default)]
pub struct TransitionTableBuilder {
    table: TransitionTable,
}

impl TransitionTableBuilder {
    pub fn permit(mut self, from: ControllerState, trigger: Trigger, to: ControllerState) -> Self {
        self.table.edges.insert((from, trigger), to);
        self
    }

    pub fn substate(mut self, parent: ControllerState, child: ControllerState) -> Self {
        self.table.parents.insert(child, parent);
        self
    }

    pub fn initial(mut self, composite: ControllerState, substate: ControllerState) -> Self {
        self.table.initial_substates.insert(composite, substate);
        self
    }

    pub fn build(self) -> TransitionTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;
    use Trigger::*;

    #[test]
    fn test_turn_on_settles_in_idle() {
        let table = TransitionTable::controller();
        let path = table.resolve(Off, TurnOn).unwrap();
        assert_eq!(path.destination, Idle);
        assert_eq!(path.exits, vec![Off]);
        assert_eq!(path.entries, vec![On, Idle]);
    }

    #[test]
    fn test_sibling_transition_stays_inside_on() {
        let table = TransitionTable::controller();
        let path = table.resolve(Brewing, CancelBrewing).unwrap();
        assert_eq!(path.exits, vec![Brewing]);
        assert_eq!(path.entries, vec![Idle]);
        assert_eq!(path.destination, Idle);
    }

    #[test]
    fn test_idle_permits_exactly_the_four_start_triggers() {
        let permitted = TransitionTable::controller().permitted_triggers(Idle);
        let expected: BTreeSet<_> = [StartPreheating, StartBrewing, StartCleaning, StartMilkFrothing]
            .into_iter()
            .collect();
        assert_eq!(permitted, expected);
    }

    #[test]
    fn test_unlisted_pairs_are_rejected() {
        let table = TransitionTable::controller();
        let legal: BTreeSet<_> = table.edges().map(|(from, trigger, _)| (from, trigger)).collect();
        for state in ControllerState::ALL {
            for trigger in Trigger::ALL {
                let inherited = table
                    .ancestry(state)
                    .iter()
                    .any(|candidate| legal.contains(&(*candidate, trigger)));
                assert_eq!(table.resolve(state, trigger).is_some(), inherited, "{state} {trigger}");
            }
        }
        assert!(table.resolve(Idle, TurnOff).is_none());
        assert!(table.resolve(Off, StartBrewing).is_none());
    }

    #[test]
    fn test_substates_inherit_superstate_edges() {
        let table = TransitionTable::builder()
            .substate(On, Idle)
            .substate(On, Brewing)
            .initial(On, Idle)
            .permit(Off, TurnOn, On)
            .permit(On, TurnOff, Off)
            .permit(Idle, StartBrewing, Brewing)
            .build();

        let path = table.resolve(Brewing, TurnOff).unwrap();
        assert_eq!(path.exits, vec![Brewing, On]);
        assert_eq!(path.entries, vec![Off]);
        assert!(table.permitted_triggers(Idle).contains(&TurnOff));
        assert!(!table.permitted_triggers(Off).contains(&TurnOff));
    }

    #[test]
    fn test_own_edge_overrides_superstate_edge() {
        let table = TransitionTable::builder()
            .substate(On, Idle)
            .substate(On, Cleaning)
            .initial(On, Idle)
            .permit(On, TurnOff, Off)
            .permit(Cleaning, TurnOff, Idle)
            .build();

        assert_eq!(table.target(Cleaning, TurnOff), Some(Idle));
        assert_eq!(table.target(Idle, TurnOff), Some(Off));
    }

    #[test]
    fn test_hierarchy_queries() {
        let table = TransitionTable::controller();
        assert_eq!(table.parent_of(Brewing), Some(On));
        assert_eq!(table.parent_of(Off), None);
        assert!(table.is_composite(On));
        assert!(!table.is_composite(Idle));
        assert_eq!(table.settle(On), Idle);
        assert_eq!(
            table.substates_of(On),
            vec![Preheating, Idle, Brewing, MilkFrothing, Cleaning]
        );
    }
}
