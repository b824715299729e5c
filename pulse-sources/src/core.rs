use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    NotStarted,
    Started,
    Stopped,
}

impl SourceState {
    fn to_u8(self) -> u8 {
        match self {
            SourceState::NotStarted => 0,
            SourceState::Started => 1,
            SourceState::Stopped => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => SourceState::Started,
            2 => SourceState::Stopped,
            _ => SourceState::NotStarted,
        }
    }
}

/// Run-state flag shared by the built-in sources.
#[derive(Debug)]
pub struct RunState(AtomicU8);

impl RunState {
    pub fn new() -> Self {
        Self(AtomicU8::new(SourceState::NotStarted.to_u8()))
    }

    pub fn get(&self) -> SourceState {
        SourceState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SourceState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Returns `false` if the state already was `Started`.
    pub fn start(&self) -> bool {
        let prev = self.0.swap(SourceState::Started.to_u8(), Ordering::AcqRel);
        prev != SourceState::Started.to_u8()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Addressable origin of metric values.
///
/// Implementations are shared between the coordinator and the pool tasks of a
/// round, so every method takes `&self` and the run-state lives behind
/// interior mutability. `start` on a started source must succeed, the round
/// calls it whenever `state` is not `Started`.
#[async_trait]
pub trait MetricSource: Debug + Send + Sync + 'static {
    fn address(&self) -> &Address;

    fn state(&self) -> SourceState;

    async fn start(&self) -> Result<(), Error>;

    async fn stop(&self) -> Result<(), Error>;

    /// Values for `definitions`, all bound to this source's address.
    /// Definitions the source knows nothing about are skipped.
    async fn query(&self, definitions: &[MetricDefinition]) -> Result<Vec<Property>, Error>;

    fn is_started(&self) -> bool {
        self.state() == SourceState::Started
    }
}

/// Common precondition of `query` for the built-in sources.
pub(crate) fn check_query(
    address: &Address,
    state: SourceState,
    definitions: &[MetricDefinition],
) -> Result<(), Error> {
    if state != SourceState::Started {
        return Err(Error::source_not_started(address));
    }
    match definitions.iter().find(|d| d.address() != address) {
        Some(def) => Err(Error::misbound_definition(address, def.address())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_transitions() {
        let state = RunState::new();
        assert_eq!(state.get(), SourceState::NotStarted);
        assert!(state.start());
        assert!(!state.start());
        state.set(SourceState::Stopped);
        assert_eq!(state.get(), SourceState::Stopped);
        assert!(state.start());
    }

    #[test]
    fn test_check_query_rejects_foreign_definition() {
        let address = Address::from("mem://a");
        let defs = [
            MetricDefinition::new("temp", "mem://a"),
            MetricDefinition::new("temp", "mem://b"),
        ];
        assert!(check_query(&address, SourceState::Started, &defs[..1]).is_ok());
        let err = check_query(&address, SourceState::Started, &defs).unwrap_err();
        assert!(matches!(
            err.kind(),
            pulse_common::error::Kind::MisboundDefinition { .. }
        ));
        let err = check_query(&address, SourceState::Stopped, &defs[..1]).unwrap_err();
        assert!(matches!(
            err.kind(),
            pulse_common::error::Kind::SourceNotStarted(_)
        ));
    }
}
