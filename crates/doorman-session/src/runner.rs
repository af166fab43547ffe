//! Async driver for the session.
//!
//! One loop iteration: wait briefly for a key and apply it, drain the
//! inbox without blocking, pause. Timeouts observed outside an entry
//! state are stale leftovers from a deadline whose cancel raced its
//! expiry; they are logged and dropped.

use doorman_core::{
    Result,
    constants::{SESSION_KEY_WAIT, SESSION_LOOP_PAUSE, TIMEOUT_HOLD},
};
use doorman_keypad::KeyEvents;
use doorman_panel::{DisplayHandle, LedHandle};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    deadline::{DeadlineService, SessionEvent, SessionEventKind, SessionInbox},
    session::{Effect, Session},
};

/// Wires the session core to the keypad and the panels.
#[derive(Debug)]
pub struct SessionRunner {
    session: Session,
    keys: KeyEvents,
    deadlines: DeadlineService,
    inbox: SessionInbox,
    leds: LedHandle,
    display: DisplayHandle,
}

impl SessionRunner {
    pub fn new(
        session: Session,
        keys: KeyEvents,
        leds: LedHandle,
        display: DisplayHandle,
    ) -> Self {
        let (deadlines, inbox) = DeadlineService::new();
        Self {
            session,
            keys,
            deadlines,
            inbox,
            leds,
            display,
        }
    }

    /// Run until a panel goes away.
    pub async fn run(mut self) -> Result<()> {
        info!("access control session started");
        let ready = self.session.reset();
        self.dispatch(ready)?;

        loop {
            if let Some(event) = self.keys.next(SESSION_KEY_WAIT).await {
                let effects = self.session.handle_key(event.key);
                self.dispatch(effects)?;
            }

            while let Some(event) = self.inbox.try_next() {
                self.handle_event(event).await?;
            }

            sleep(SESSION_LOOP_PAUSE).await;
        }
    }

    /// Apply one inbox event against the current session state.
    async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event.kind {
            SessionEventKind::Timeout => {
                if !self.session.state().is_entering() {
                    debug!(state = %self.session.state(), "stale timeout dropped");
                    return Ok(());
                }
                let notice = self.session.timeout_effects();
                self.dispatch(notice)?;
                // Keys pressed during the notice queue up and are
                // handled against the fresh idle state.
                sleep(TIMEOUT_HOLD).await;
                let reset = self.session.reset();
                self.dispatch(reset)?;
            }
            SessionEventKind::Reset => {
                let reset = self.session.reset();
                self.dispatch(reset)?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Led(command) => self.leds.send(command)?,
                Effect::LedTimed(command, hold) => self.leds.send_timed(command, Some(hold))?,
                Effect::Show(message) => self.display.show(message)?,
                Effect::ShowFor(message, hold) => self.display.show_for(message, hold)?,
                Effect::Arm(kind) => self.deadlines.arm(kind),
                Effect::CancelDeadline => self.deadlines.cancel(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use doorman_core::Key;
    use doorman_keypad::{DecoderConfig, KeypadDecoder, MockMatrix};
    use doorman_panel::{DisplayHandle, DisplayPanel, LedPanel};
    use doorman_store::CredentialStore;
    use tokio::time::{Duration, Instant};

    use super::*;
    use crate::session::DenialPolicy;
    use crate::state::SessionState;

    fn runner() -> (SessionRunner, DisplayHandle) {
        let (matrix, _keypad) = MockMatrix::new();
        let (_decoder, keys, _probe) = KeypadDecoder::new(matrix, DecoderConfig::default());
        let (led_panel, leds) = LedPanel::new();
        tokio::spawn(led_panel.run());
        let (display_panel, display) = DisplayPanel::new();
        tokio::spawn(display_panel.run());

        let session = Session::new(CredentialStore::seeded(), DenialPolicy::default());
        let runner = SessionRunner::new(session, keys, leds, display.clone());
        (runner, display)
    }

    fn type_keys(runner: &mut SessionRunner, keys: &str) {
        for c in keys.chars() {
            let effects = runner.session.handle_key(Key::from_char(c).unwrap());
            runner.dispatch(effects).unwrap();
        }
    }

    fn timeout_event() -> SessionEvent {
        SessionEvent {
            kind: SessionEventKind::Timeout,
            at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_landing_after_the_verdict_is_dropped() {
        let (mut runner, display) = runner();
        let ready = runner.session.reset();
        runner.dispatch(ready).unwrap();

        // The entry deadline's event can already sit in the inbox when the
        // final '#' cancels it. The late event must not disturb the verdict.
        type_keys(&mut runner, "123456#1234#");
        assert_eq!(runner.session.state(), SessionState::AccessGranted);

        runner.handle_event(timeout_event()).await.unwrap();

        assert_eq!(runner.session.state(), SessionState::AccessGranted);
        assert_eq!(runner.session.entered_id(), "123456");
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snap = display.snapshot();
        assert!(snap.lines[0].starts_with("BIENVENIDO"), "{snap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_landing_in_the_change_menu_is_dropped() {
        let (mut runner, _display) = runner();
        let ready = runner.session.reset();
        runner.dispatch(ready).unwrap();

        type_keys(&mut runner, "*");
        assert_eq!(runner.session.state(), SessionState::ChangePasswordMenu);

        runner.handle_event(timeout_event()).await.unwrap();
        assert_eq!(runner.session.state(), SessionState::ChangePasswordMenu);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reset_is_an_idempotent_reset() {
        let (mut runner, display) = runner();
        let ready = runner.session.reset();
        runner.dispatch(ready).unwrap();

        runner
            .handle_event(SessionEvent {
                kind: SessionEventKind::Reset,
                at: Instant::now(),
            })
            .await
            .unwrap();

        assert_eq!(runner.session.state(), SessionState::Idle);
        assert_eq!(runner.session.entered_id(), "");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(display.snapshot().standby);
    }

    #[tokio::test(start_paused = true)]
    async fn live_timeout_still_runs_the_notice() {
        let (mut runner, display) = runner();
        let ready = runner.session.reset();
        runner.dispatch(ready).unwrap();

        type_keys(&mut runner, "123");
        assert_eq!(runner.session.state(), SessionState::EnteringId);

        runner.handle_event(timeout_event()).await.unwrap();

        assert_eq!(runner.session.state(), SessionState::Idle);
        assert_eq!(runner.session.entered_id(), "");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(display.snapshot().standby);
    }
}
