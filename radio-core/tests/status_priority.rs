use radio_core::status::{Severity, StatusCode, StatusRegister, catalog};

/// Small deterministic generator so the sequences are reproducible.
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 >> 8
    }

    fn below(&mut self, bound: u32) -> u32 {
        self.next() % bound
    }
}

fn expected_active(shadow: &[Option<StatusCode>; 4]) -> Option<StatusCode> {
    shadow.iter().rev().find_map(|slot| *slot)
}

#[test]
fn active_level_tracks_highest_occupied_slot() {
    let mut rng = Lcg(0x5eed);
    let mut register = StatusRegister::new();
    let mut shadow: [Option<StatusCode>; 4] = [None; 4];

    for _ in 0..2_000 {
        let level = Severity::ALL[rng.below(4) as usize];
        let before = register.active();
        match rng.below(4) {
            0 => {
                register.clear(level);
                shadow[level.index()] = None;
            }
            1 => {
                register.clear_all_up_to(level);
                for slot in &mut shadow[..=level.index()] {
                    *slot = None;
                }
            }
            _ => {
                let code = u8::try_from(rng.below(100)).unwrap();
                let status = StatusCode::from_level_code(level, code).unwrap();
                let changed = register.set(status);
                shadow[level.index()] = Some(status);
                assert_eq!(changed, before != expected_active(&shadow));
            }
        }

        let expected = expected_active(&shadow);
        assert_eq!(register.active(), expected);
        assert_eq!(register.active_level(), expected.map(StatusCode::level));
    }
}

#[test]
fn lower_priority_write_never_changes_active_code() {
    let mut register = StatusRegister::new();
    let error = StatusCode::steady(Severity::Error, 3);
    register.set(error);

    for level in [Severity::Info, Severity::Success, Severity::Warning] {
        assert!(!register.set(StatusCode::steady(level, 5)));
        assert!(!register.set(StatusCode::blinking(level, 5)));
        assert_eq!(register.active(), Some(error));
    }
}

#[test]
fn clearing_active_level_reveals_next_highest() {
    let mut register = StatusRegister::new();
    register.set(catalog::IDLE);
    register.set(catalog::RECONNECTING);
    register.set(catalog::NETWORK_LOST);

    assert!(register.clear(Severity::Error));
    assert_eq!(register.active(), Some(catalog::RECONNECTING));
    assert!(register.clear(Severity::Warning));
    assert_eq!(register.active(), Some(catalog::IDLE));
    assert!(register.clear(Severity::Info));
    assert_eq!(register.active(), None);
    assert!(!register.clear(Severity::Info));
}

#[test]
fn blink_boundary_holds_for_every_level() {
    for level in Severity::ALL {
        let steady = StatusCode::from_level_code(level, 49).unwrap();
        let blinking = StatusCode::from_level_code(level, 50).unwrap();
        assert!(!steady.is_blinking(), "{level} 49 must be steady");
        assert!(blinking.is_blinking(), "{level} 50 must blink");
        assert_eq!(steady.level_code(), 49);
        assert_eq!(blinking.level_code(), 50);
    }
}

#[test]
fn second_identical_write_is_silent() {
    let mut register = StatusRegister::new();
    for status in [catalog::BUFFERING, catalog::PLAYING, catalog::NETWORK_SETUP] {
        register.set(status);
        let snapshot = register.clone();
        assert!(!register.set(status));
        assert_eq!(register, snapshot);
    }
}

#[test]
fn forced_write_clears_up_to_floor_only() {
    let mut register = StatusRegister::new();
    register.set(catalog::PLAYING);
    register.set(catalog::RECONNECTING);

    assert!(!register.set_forced(catalog::BUFFERING, Severity::Success));
    assert_eq!(register.slot(Severity::Success), None);
    assert_eq!(register.active(), Some(catalog::RECONNECTING));

    assert!(register.set_forced(catalog::BUFFERING, Severity::Error));
    assert_eq!(register.active(), Some(catalog::BUFFERING));
}
