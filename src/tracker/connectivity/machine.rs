use statig::prelude::*;

use super::state::{LinkEvent, LinkState, SubLink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LinkApplyStatus {
    Applied,
    Unchanged,
    Ignored,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct LinkMachine {
    pub(super) state: LinkState,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: LinkApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: LinkApplyStatus::Unchanged,
        }
    }
}

impl LinkMachine {
    pub(super) fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
        }
    }

    fn enter(&mut self, context: &mut DispatchContext, next: LinkState) {
        context.status = if self.state == next {
            LinkApplyStatus::Unchanged
        } else {
            LinkApplyStatus::Applied
        };
        self.state = next;
    }
}

#[state_machine(initial = "State::disconnected()")]
impl LinkMachine {
    #[state]
    fn disconnected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Up(SubLink::Network) => {
                self.enter(context, LinkState::NetworkUp);
                Transition(State::network_up())
            }
            LinkEvent::BudgetExhausted => {
                self.enter(context, LinkState::Degraded);
                Transition(State::degraded())
            }
            LinkEvent::Lost(_) | LinkEvent::Reset => {
                self.enter(context, LinkState::Disconnected);
                Handled
            }
            _ => {
                context.status = LinkApplyStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn network_up(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Up(SubLink::Network) => {
                context.status = LinkApplyStatus::Unchanged;
                Handled
            }
            LinkEvent::Up(SubLink::Positioning) => {
                self.enter(context, LinkState::PositioningUp);
                Transition(State::positioning_up())
            }
            LinkEvent::Lost(SubLink::Network) | LinkEvent::Reset => {
                self.enter(context, LinkState::Disconnected);
                Transition(State::disconnected())
            }
            LinkEvent::BudgetExhausted => {
                self.enter(context, LinkState::Degraded);
                Transition(State::degraded())
            }
            _ => {
                context.status = LinkApplyStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn positioning_up(
        &mut self,
        context: &mut DispatchContext,
        event: &LinkEvent,
    ) -> Outcome<State> {
        match event {
            LinkEvent::Up(SubLink::Messaging) => {
                self.enter(context, LinkState::Ready);
                Transition(State::ready())
            }
            LinkEvent::Lost(SubLink::Network) | LinkEvent::Reset => {
                self.enter(context, LinkState::Disconnected);
                Transition(State::disconnected())
            }
            LinkEvent::Lost(SubLink::Positioning) => {
                self.enter(context, LinkState::NetworkUp);
                Transition(State::network_up())
            }
            LinkEvent::BudgetExhausted => {
                self.enter(context, LinkState::Degraded);
                Transition(State::degraded())
            }
            _ => {
                context.status = LinkApplyStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn ready(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Lost(SubLink::Network) | LinkEvent::Reset => {
                self.enter(context, LinkState::Disconnected);
                Transition(State::disconnected())
            }
            LinkEvent::Lost(SubLink::Positioning) => {
                self.enter(context, LinkState::NetworkUp);
                Transition(State::network_up())
            }
            LinkEvent::Lost(SubLink::Messaging) => {
                self.enter(context, LinkState::PositioningUp);
                Transition(State::positioning_up())
            }
            LinkEvent::BudgetExhausted => {
                self.enter(context, LinkState::Degraded);
                Transition(State::degraded())
            }
            LinkEvent::Up(_) => {
                context.status = LinkApplyStatus::Unchanged;
                Handled
            }
        }
    }

    /// Terminal for the session; only a new boot (or an explicit reset)
    /// leaves it.
    #[state]
    fn degraded(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Reset => {
                self.enter(context, LinkState::Disconnected);
                Transition(State::disconnected())
            }
            _ => {
                context.status = LinkApplyStatus::Ignored;
                Handled
            }
        }
    }
}
