use log::info;
use statig::blocking::IntoStateMachineExt as _;

use super::machine::{DispatchContext, LinkApplyStatus, LinkMachine};
use super::state::{LinkEvent, LinkState};

#[derive(Clone, Copy, Debug)]
pub(crate) struct LinkTransition {
    pub(crate) before: LinkState,
    pub(crate) after: LinkState,
    pub(super) status: LinkApplyStatus,
}

impl LinkTransition {
    pub(crate) fn changed(self) -> bool {
        matches!(self.status, LinkApplyStatus::Applied)
    }
}

pub(crate) struct LinkStateEngine {
    machine: statig::blocking::StateMachine<LinkMachine>,
}

impl LinkStateEngine {
    pub(crate) fn new() -> Self {
        Self {
            machine: LinkMachine::new().state_machine(),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.machine.inner().state
    }

    pub(crate) fn apply(&mut self, event: LinkEvent, at_ms: u64) -> LinkTransition {
        let before = self.state();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        let after = self.state();
        let transition = LinkTransition {
            before,
            after,
            status: context.status,
        };
        if transition.changed() {
            emit_link_event(before, after, event, at_ms);
        }
        transition
    }
}

fn emit_link_event(from: LinkState, to: LinkState, trigger: LinkEvent, at_ms: u64) {
    info!(
        "LINK_EVENT {{\"from\":\"{}\",\"to\":\"{}\",\"trigger\":\"{}\",\"at_ms\":{}}}",
        from.as_str(),
        to.as_str(),
        trigger.as_str(),
        at_ms
    );
}
