// Integration test: parameter change tracking as seen by a cache

use proptest::prelude::*;
use rtsynth::{ParamBase, ParamsUpdate};

proptest! {
    /// Any burst of changes between two checks reads as exactly one update
    #[test]
    fn burst_collapses_to_one_update(bursts in prop::collection::vec(0usize..50, 1..20)) {
        let mut params = ParamBase::new();
        let mut update = ParamsUpdate::new(&params);
        for burst in bursts {
            for _ in 0..burst {
                params.params_changed();
            }
            prop_assert_eq!(update.check_updated(&params), burst > 0);
            prop_assert!(!update.check_updated(&params));
        }
    }
}

#[test]
fn test_independent_consumers() {
    let mut params = ParamBase::new();
    let mut wavetable = ParamsUpdate::new(&params);
    let mut filter = ParamsUpdate::new(&params);

    params.params_changed();
    assert!(wavetable.check_updated(&params));

    // the filter cache has not looked yet
    params.params_changed();
    assert!(filter.check_updated(&params));
    assert!(wavetable.check_updated(&params));
    assert!(!filter.check_updated(&params));
}

#[test]
fn test_forced_update_and_rebinding() {
    let first = ParamBase::new();
    let second = ParamBase::new();
    let mut update = ParamsUpdate::new(&first);
    update.force_update();
    assert!(update.check_updated(&first));
    assert!(!update.check_updated(&first));

    update.change_params(&second);
    assert!(update.is_bound_to(&second));
    assert!(update.check_updated(&second));

    // rebinding to the same group changes nothing
    update.change_params(&second);
    assert!(!update.check_updated(&second));
}

#[test]
fn test_check_consumes_version() {
    let mut params = ParamBase::new();
    let mut update = ParamsUpdate::new(&params);
    for _ in 0..3 {
        params.params_changed();
    }
    update.check_updated(&params);
    assert_eq!(params.updated_at(), 3);
    assert!(!update.check_updated(&params));
}
