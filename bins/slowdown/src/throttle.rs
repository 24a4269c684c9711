use nix::sys::signal::Signal;

/// Pause/resume state for one target process.
///
/// Every tick rolls a number in `[0, 1)`. A roll below the pause chance
/// keeps the target stopped for that tick, anything else lets it run.
/// Signals are only sent when the state has to change.
#[derive(Debug)]
pub struct Throttle {
    pause_chance: f64,
    paused: bool,
}

impl Throttle {
    pub fn new(pause_percent: u8) -> Self {
        Self {
            pause_chance: f64::from(pause_percent.min(100)) / 100.0,
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn transition(&self, roll: f64) -> Option<Signal> {
        match (self.paused, roll < self.pause_chance) {
            (false, true) => Some(Signal::SIGTSTP),
            (true, false) => Some(Signal::SIGCONT),
            _ => None,
        }
    }

    /// One tick. Returns the signal that was delivered, if any.
    /// The state only flips once `send` succeeds.
    pub fn tick<E>(&mut self, roll: f64, send: impl FnOnce(Signal) -> Result<(), E>) -> Result<Option<Signal>, E> {
        let Some(signal) = self.transition(roll) else {
            return Ok(None);
        };
        send(signal)?;
        self.paused = signal == Signal::SIGTSTP;
        Ok(Some(signal))
    }

    /// Lets the target run again if it is currently stopped.
    pub fn release<E>(&mut self, send: impl FnOnce(Signal) -> Result<(), E>) -> Result<(), E> {
        if self.paused {
            send(Signal::SIGCONT)?;
            self.paused = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(_: Signal) -> Result<(), ()> {
        Ok(())
    }

    #[test]
    fn zero_percent_never_pauses() {
        let mut t = Throttle::new(0);
        for roll in [0.0, 0.3, 0.99] {
            assert_eq!(t.tick(roll, ok), Ok(None));
        }
        assert!(!t.is_paused());
    }

    #[test]
    fn full_percent_pauses_once_and_stays() {
        let mut t = Throttle::new(100);
        assert_eq!(t.tick(0.99, ok), Ok(Some(Signal::SIGTSTP)));
        assert_eq!(t.tick(0.5, ok), Ok(None));
        assert!(t.is_paused());
    }

    #[test]
    fn signals_only_on_state_change() {
        let mut t = Throttle::new(50);
        let mut sent = Vec::new();
        for roll in [0.1, 0.2, 0.7, 0.9, 0.4] {
            t.tick(roll, |s| {
                sent.push(s);
                Ok::<(), ()>(())
            })
            .unwrap();
        }
        assert_eq!(sent, vec![Signal::SIGTSTP, Signal::SIGCONT, Signal::SIGTSTP]);
        assert!(t.is_paused());
    }

    #[test]
    fn failed_delivery_keeps_state() {
        let mut t = Throttle::new(50);
        assert_eq!(t.tick(0.1, |_| Err("EPERM")), Err("EPERM"));
        assert!(!t.is_paused());
        // next tick tries again
        assert_eq!(t.tick(0.1, ok), Ok(Some(Signal::SIGTSTP)));
    }

    #[test]
    fn release_resumes_only_a_paused_target() {
        let mut t = Throttle::new(50);
        t.release(|_| -> Result<(), ()> { panic!("running target must not be signalled") })
            .unwrap();

        t.tick(0.0, ok).unwrap();
        let mut sent = None;
        t.release(|s| {
            sent = Some(s);
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(sent, Some(Signal::SIGCONT));
        assert!(!t.is_paused());
    }

    #[test]
    fn percent_above_hundred_is_capped() {
        let mut t = Throttle::new(250);
        assert_eq!(t.tick(0.999, ok), Ok(Some(Signal::SIGTSTP)));
    }
}
