use crate::session::{Presenter, UserCommand};

use super::frontend::ScrollAction;

/// UI state machine driven by the runtime loop. The session reports back
/// through the [`Presenter`] half.
pub trait RuntimeMode: Presenter {
    /// Turns submitted text into a command, or `None` when it was rejected.
    fn on_user_input(&mut self, input: String) -> Option<UserCommand>;
    /// Ctrl+C while no request is running.
    fn on_idle_interrupt(&mut self);
    fn on_scroll(&mut self, _action: ScrollAction) {}
    fn on_tick(&mut self) {}
    fn quit_requested(&self) -> bool;
}
