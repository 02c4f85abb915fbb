//! Keyboard-driven screens that POST hands control to.

use kdisplay::TextDisplay;
use khal::PortIo;
use khal::keyboard::{KeyCode, KeyDecoder};
use khal::pic::Irq;

use crate::about;
use crate::boot::{ActionUi, SystemFacts};
use crate::nvram::NvramStore;
use crate::setup::{MenuEvent, SetupMenu, SetupView};
use crate::substrate::Substrate;
use crate::time::TickSource;

/// Reads keys from the substrate's scancode ring and draws onto a
/// [`TextDisplay`]. Interrupts must be enabled while it runs.
pub struct ConsoleUi<'a, 'h, P> {
    substrate: &'a Substrate<'h, P>,
    clock: &'a dyn TickSource,
    display: &'a dyn TextDisplay,
    decoder: KeyDecoder,
}

impl<'a, 'h, P: PortIo> ConsoleUi<'a, 'h, P> {
    pub fn new(
        substrate: &'a Substrate<'h, P>,
        clock: &'a dyn TickSource,
        display: &'a dyn TextDisplay,
    ) -> Self {
        Self {
            substrate,
            clock,
            display,
            decoder: KeyDecoder::new(),
        }
    }

    /// Block until a key goes down.
    fn next_key(&mut self) -> KeyCode {
        loop {
            match self.substrate.pop() {
                Some(scancode) => {
                    if let Some(key) = self.decoder.key_down(scancode) {
                        return key;
                    }
                }
                None => self.clock.relax(),
            }
        }
    }

    fn about_until_escape(&mut self) {
        about::draw(self.display);
        while self.next_key() != KeyCode::Escape {}
    }
}

impl<P: PortIo, Q: PortIo> ActionUi<Q> for ConsoleUi<'_, '_, P> {
    fn run_settings(&mut self, facts: &SystemFacts, store: &mut NvramStore<Q>) {
        self.substrate.clear();
        let view = SetupView::new(self.display, facts, store.identity());
        let mut menu = SetupMenu::new(facts.drive.is_some());
        loop {
            view.render(&menu, store.blob());
            let key = self.next_key();
            match menu.handle(key, store.blob_mut()) {
                MenuEvent::Stay => {}
                MenuEvent::Save => {
                    self.substrate.masked(Irq::all(), || store.save());
                    log::info!("[setup] settings saved");
                }
                MenuEvent::OpenAbout => self.about_until_escape(),
                MenuEvent::Exit => break,
            }
        }
        log::debug!("[setup] leaving, modified={}", menu.modified());
    }

    fn show_info(&mut self, _facts: &SystemFacts) {
        self.substrate.clear();
        self.about_until_escape();
    }
}
