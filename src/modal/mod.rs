//! Owner of the single visible dialog. Opening replaces any live dialog
//! outright, and every rebuild bumps a generation counter so controls from a
//! replaced or re-rendered dialog can never fire into the new one.

/// Entry/exit transition lengths in seconds. Entry is fire-and-forget:
/// content is addressable the moment `open` returns.
pub const ENTER_SECS: f32 = 0.3;
pub const EXIT_SECS: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Entering(f32),
    Settled,
    Exiting(f32),
}

/// The one live dialog: its content payload and generation token.
struct ModalHandle<C> {
    content: C,
    generation: u64,
}

pub struct ModalController<C> {
    slot: Option<ModalHandle<C>>,
    phase: Phase,
    next_generation: u64,
}

impl<C> Default for ModalController<C> {
    fn default() -> Self {
        Self {
            slot: None,
            phase: Phase::Settled,
            next_generation: 0,
        }
    }
}

impl<C> ModalController<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `content` as the only dialog, tearing down any live one first
    /// (immediately, not after an exit transition). Returns the generation
    /// token controls must present to be heard.
    pub fn open(&mut self, content: C) -> u64 {
        self.slot = None;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slot = Some(ModalHandle {
            content,
            generation,
        });
        self.phase = Phase::Entering(0.0);
        generation
    }

    /// Rebuild the open dialog's content wholesale. The generation bumps so
    /// that anything still bound to the prior content goes quiet; this is
    /// the only sanctioned way to update a dialog in place.
    pub fn refresh(&mut self, content: C) -> Option<u64> {
        let handle = self.slot.as_mut()?;
        let generation = self.next_generation;
        self.next_generation += 1;
        handle.content = content;
        handle.generation = generation;
        Some(generation)
    }

    /// Begin the exit transition; the dialog detaches when it completes.
    /// Calling this with nothing open is a no-op.
    pub fn close(&mut self) {
        if self.slot.is_some() && !matches!(self.phase, Phase::Exiting(_)) {
            self.phase = Phase::Exiting(0.0);
        }
    }

    /// Advance transitions by `dt` seconds. Detaches the dialog once its
    /// exit completes.
    pub fn tick(&mut self, dt: f32) {
        match self.phase {
            Phase::Entering(t) => {
                let t = t + dt;
                self.phase = if t >= ENTER_SECS {
                    Phase::Settled
                } else {
                    Phase::Entering(t)
                };
            }
            Phase::Exiting(t) => {
                let t = t + dt;
                if t >= EXIT_SECS {
                    self.slot = None;
                    self.phase = Phase::Settled;
                } else {
                    self.phase = Phase::Exiting(t);
                }
            }
            Phase::Settled => {}
        }
    }

    /// Whether a control event stamped with `generation` may still fire.
    /// False for replaced or refreshed dialogs and during the exit
    /// transition.
    pub fn accepts(&self, generation: u64) -> bool {
        if matches!(self.phase, Phase::Exiting(_)) {
            return false;
        }
        self.slot
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_some()
    }

    pub fn generation(&self) -> Option<u64> {
        self.slot.as_ref().map(|handle| handle.generation)
    }

    pub fn content(&self) -> Option<&C> {
        self.slot.as_ref().map(|handle| &handle.content)
    }

    pub fn content_mut(&mut self) -> Option<&mut C> {
        self.slot.as_mut().map(|handle| &mut handle.content)
    }

    /// Render opacity for the current transition state.
    pub fn opacity(&self) -> f32 {
        if self.slot.is_none() {
            return 0.0;
        }
        match self.phase {
            Phase::Entering(t) => (t / ENTER_SECS).clamp(0.0, 1.0),
            Phase::Settled => 1.0,
            Phase::Exiting(t) => 1.0 - (t / EXIT_SECS).clamp(0.0, 1.0),
        }
    }

    pub fn animating(&self) -> bool {
        self.slot.is_some() && !matches!(self.phase, Phase::Settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_addressable_immediately_after_open() {
        let mut modal = ModalController::new();
        modal.open("hello");
        // Entry transition has not ticked at all yet.
        assert_eq!(modal.content(), Some(&"hello"));
        assert!(modal.is_open());
        assert!(modal.animating());
    }

    #[test]
    fn opening_over_an_open_modal_replaces_it() {
        let mut modal = ModalController::new();
        let gen_a = modal.open("a");
        let gen_b = modal.open("b");
        assert_eq!(modal.content(), Some(&"b"));
        // The first dialog is gone and its controls are dead.
        assert!(!modal.accepts(gen_a));
        assert!(modal.accepts(gen_b));
    }

    #[test]
    fn close_detaches_only_after_exit_transition() {
        let mut modal = ModalController::new();
        modal.open("a");
        modal.tick(ENTER_SECS);
        modal.close();
        assert!(modal.is_open());
        modal.tick(EXIT_SECS / 2.0);
        assert!(modal.is_open());
        modal.tick(EXIT_SECS);
        assert!(!modal.is_open());
    }

    #[test]
    fn controls_stop_firing_the_moment_exit_begins() {
        let mut modal = ModalController::new();
        let generation = modal.open("a");
        modal.tick(ENTER_SECS);
        assert!(modal.accepts(generation));
        modal.close();
        assert!(!modal.accepts(generation));
    }

    #[test]
    fn close_when_nothing_open_is_a_no_op() {
        let mut modal: ModalController<&str> = ModalController::new();
        modal.close();
        modal.tick(1.0);
        assert!(!modal.is_open());
        assert_eq!(modal.opacity(), 0.0);
    }

    #[test]
    fn refresh_bumps_generation_and_silences_old_bindings() {
        let mut modal = ModalController::new();
        let old = modal.open(vec!["x", "y"]);
        let new = modal.refresh(vec!["x"]).expect("modal is open");
        assert_ne!(old, new);
        assert!(!modal.accepts(old));
        assert!(modal.accepts(new));
        assert_eq!(modal.content(), Some(&vec!["x"]));
    }

    #[test]
    fn refresh_on_closed_controller_returns_none() {
        let mut modal: ModalController<&str> = ModalController::new();
        assert!(modal.refresh("x").is_none());
    }

    #[test]
    fn opening_during_exit_replaces_immediately() {
        let mut modal = ModalController::new();
        let gen_a = modal.open("a");
        modal.tick(ENTER_SECS);
        modal.close();
        let gen_b = modal.open("b");
        assert!(!modal.accepts(gen_a));
        assert!(modal.accepts(gen_b));
        // The replacement plays a fresh entry, not the interrupted exit.
        modal.tick(ENTER_SECS);
        assert!(modal.is_open());
        assert_eq!(modal.opacity(), 1.0);
    }

    #[test]
    fn opacity_tracks_the_entry_and_exit_curves() {
        let mut modal = ModalController::new();
        modal.open("a");
        assert_eq!(modal.opacity(), 0.0);
        modal.tick(ENTER_SECS / 2.0);
        assert!(modal.opacity() > 0.0 && modal.opacity() < 1.0);
        modal.tick(ENTER_SECS);
        assert_eq!(modal.opacity(), 1.0);
        modal.close();
        modal.tick(EXIT_SECS / 2.0);
        assert!(modal.opacity() < 1.0);
    }
}
