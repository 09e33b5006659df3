use tokio::sync::mpsc;

use super::{frontend::FrontendAdapter, frontend::UserInputEvent, mode::RuntimeMode};
use crate::job::JobEvent;
use crate::session::{Control, Session};

pub struct Runtime<M: RuntimeMode> {
    pub mode: M,
    pub session: Session,
    events_rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl<M: RuntimeMode> Runtime<M> {
    pub fn new(mode: M, session: Session, events_rx: mpsc::UnboundedReceiver<JobEvent>) -> Self {
        Self {
            mode,
            session,
            events_rx,
        }
    }

    /// Applies every job event received so far. Returns how many were handled.
    pub async fn drain_job_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.session.handle_event(event, &mut self.mode).await;
            handled += 1;
        }
        handled
    }

    /// Handles one frontend event. Returns `false` once the user asked to quit.
    pub async fn handle_input(&mut self, event: UserInputEvent) -> bool {
        match event {
            UserInputEvent::Text(text) => {
                let Some(command) = self.mode.on_user_input(text) else {
                    return true;
                };
                self.session.execute(command, &mut self.mode).await == Control::Continue
            }
            UserInputEvent::Interrupt => {
                if self.session.is_busy() {
                    self.session.cancel(&mut self.mode);
                } else {
                    self.mode.on_idle_interrupt();
                }
                true
            }
            UserInputEvent::Scroll(action) => {
                self.mode.on_scroll(action);
                true
            }
        }
    }

    pub async fn run<F: FrontendAdapter<M>>(&mut self, frontend: &mut F) {
        loop {
            self.drain_job_events().await;
            self.mode.on_tick();
            frontend.render(&self.mode);

            if frontend.should_quit() || self.mode.quit_requested() {
                break;
            }

            if let Some(event) = frontend.poll_user_input(&self.mode) {
                if !self.handle_input(event).await {
                    break;
                }
            }
            tokio::task::yield_now().await;
        }

        if self.session.is_busy() {
            self.session.cancel(&mut self.mode);
        }
        tracing::info!("runtime loop finished");
    }
}
