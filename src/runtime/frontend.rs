use super::mode::RuntimeMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAction {
    LineUp,
    LineDown,
    PageUp(usize),
    PageDown(usize),
    Home,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserInputEvent {
    Text(String),
    /// Ctrl+C: cancels a running request, or arms quit when idle.
    Interrupt,
    Scroll(ScrollAction),
}

pub trait FrontendAdapter<M: RuntimeMode> {
    fn poll_user_input(&mut self, mode: &M) -> Option<UserInputEvent>;
    fn render(&mut self, mode: &M);
    fn should_quit(&self) -> bool;
}
