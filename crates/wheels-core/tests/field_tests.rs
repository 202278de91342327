// Threshold field behavior: falloff, max-combination, radius bounds, pointer
// suppression and observer notification.

use glam::Vec2;
use instant::Instant;
use std::cell::RefCell;
use std::rc::Rc;
use wheels_core::*;

fn ready_field() -> ThresholdField {
    let mut field = ThresholdField::default();
    field.set_audio_ready(true);
    field.set_mouse_output_enabled(false);
    field
}

#[test]
fn influence_is_non_increasing_with_distance() {
    for radius in [10.0_f32, 15.0, 60.0, 125.0] {
        let mut prev = influence(0.0, radius);
        assert_eq!(prev, 1.0);
        for step in 1..=300 {
            let d = step as f32 * 0.5;
            let v = influence(d, radius);
            let expected = if d <= radius { 1.0 - d / radius } else { 0.0 };
            assert!((v - expected).abs() < 1e-6, "d={d} r={radius}");
            assert!(v <= prev, "influence rose at d={d} r={radius}");
            prev = v;
        }
    }
}

#[test]
fn single_threshold_scenario() {
    let mut field = ready_field();
    field.add_threshold(Vec2::new(100.0, 100.0));
    assert_eq!(field.influence_at(Vec2::new(100.0, 100.0)), 1.0);
    assert_eq!(field.influence_at(Vec2::new(115.0, 100.0)), 0.0);
    let mid = field.influence_at(Vec2::new(107.0, 100.0));
    assert!((mid - (1.0 - 7.0 / 15.0)).abs() < 1e-5, "got {mid}");
}

#[test]
fn overlapping_thresholds_take_the_max() {
    let mut field = ready_field();
    field.add_threshold(Vec2::new(0.0, 0.0));
    field.add_threshold(Vec2::new(12.0, 0.0));
    let ids: Vec<u32> = field.thresholds().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);

    // 4 px from the first marker, 8 px from the second.
    let near = 1.0 - 4.0 / 15.0;
    let far = 1.0 - 8.0 / 15.0;
    let v = field.influence_at(Vec2::new(4.0, 0.0));
    assert!((v - near).abs() < 1e-5, "got {v}");
    assert!(v < (near + far).min(1.0));
}

#[test]
fn pointer_and_marker_do_not_stack() {
    let mut field = ThresholdField::default();
    field.set_audio_ready(true);
    field.add_threshold(Vec2::new(100.0, 100.0));
    // Outside the fresh marker's zone, so the pointer is live again.
    field.pointer_moved(Vec2::new(120.0, 100.0));

    let marker = 1.0 - 12.0 / 15.0;
    let pointer = 1.0 - 8.0 / 15.0;
    let v = field.influence_at(Vec2::new(112.0, 100.0));
    assert!((v - pointer).abs() < 1e-5, "got {v}");
    assert!(v < marker + pointer);
}

#[test]
fn radius_is_clamped_to_bounds() {
    let mut field = ThresholdField::default();
    assert_eq!(field.radius(), 15.0);
    field.set_radius(200.0);
    assert_eq!(field.radius(), 125.0);
    field.set_radius(0.0);
    assert_eq!(field.radius(), 10.0);
    field.adjust_radius(constants::THRESHOLD_RADIUS_STEP);
    assert_eq!(field.radius(), 15.0);
}

#[test]
fn nothing_is_heard_before_audio_is_ready() {
    let mut field = ThresholdField::default();
    assert_eq!(
        field.handle_primary_click(Vec2::ZERO, false),
        ClickOutcome::Ignored
    );
    field.add_threshold(Vec2::ZERO);
    assert_eq!(field.influence_at(Vec2::ZERO), 0.0);
    field.set_audio_ready(true);
    assert_eq!(field.influence_at(Vec2::ZERO), 1.0);
}

#[test]
fn remove_near_picks_nearest_covering_marker() {
    let mut field = ready_field();
    field.add_threshold(Vec2::new(0.0, 0.0));
    field.add_threshold(Vec2::new(20.0, 0.0));
    field.add_threshold(Vec2::new(200.0, 0.0));

    assert_eq!(field.remove_near(Vec2::new(100.0, 0.0)), None);
    let removed = field.remove_near(Vec2::new(12.0, 0.0)).unwrap();
    assert_eq!(removed.id, 2);
    assert_eq!(field.thresholds().len(), 2);
}

#[test]
fn remove_near_breaks_ties_by_creation_order() {
    let mut field = ready_field();
    field.add_threshold(Vec2::new(-5.0, 0.0));
    field.add_threshold(Vec2::new(5.0, 0.0));
    assert_eq!(field.remove_near(Vec2::ZERO).map(|t| t.id), Some(1));
}

#[test]
fn shift_click_removes_and_plain_click_adds() {
    let mut field = ready_field();
    assert_eq!(
        field.handle_primary_click(Vec2::new(50.0, 50.0), false),
        ClickOutcome::Added(1)
    );
    assert_eq!(
        field.handle_primary_click(Vec2::new(500.0, 50.0), true),
        ClickOutcome::Missed
    );
    assert!(matches!(
        field.handle_primary_click(Vec2::new(52.0, 50.0), true),
        ClickOutcome::Removed(t) if t.id == 1
    ));
    assert!(field.thresholds().is_empty());
}

#[test]
fn placed_marker_suppresses_pointer_until_it_leaves() {
    let mut field = ThresholdField::default();
    field.set_audio_ready(true);
    let origin = Vec2::new(100.0, 100.0);

    field.pointer_moved(origin);
    field.add_threshold(origin);
    assert_eq!(field.influence_at(origin), 1.0);

    // Still inside the new marker: the pointer contributes nothing.
    field.pointer_moved(origin + Vec2::new(10.0, 0.0));
    assert!(field.pointer().suppression.is_some());
    let probe = origin + Vec2::new(20.0, 0.0);
    assert_eq!(field.influence_at(probe), 0.0);

    // Outside it: suppression clears and the pointer is heard again.
    field.pointer_moved(origin + Vec2::new(16.0, 0.0));
    assert!(field.pointer().suppression.is_none());
    let v = field.influence_at(probe);
    assert!((v - (1.0 - 4.0 / 15.0)).abs() < 1e-4, "got {v}");
}

#[test]
fn muted_pointer_is_not_a_threshold() {
    let mut field = ThresholdField::default();
    field.set_audio_ready(true);
    field.pointer_moved(Vec2::ZERO);
    assert_eq!(field.influence_at(Vec2::ZERO), 1.0);
    field.toggle_mouse_output();
    assert_eq!(field.influence_at(Vec2::ZERO), 0.0);
    field.pointer_left();
    field.toggle_mouse_output();
    assert_eq!(field.influence_at(Vec2::ZERO), 0.0);
}

#[test]
fn pointer_fade_decays_with_capped_steps() {
    let mut field = ThresholdField::default();
    field.set_audio_ready(true);
    field.pointer_moved(Vec2::ZERO);
    let t0 = Instant::now();
    field.influence_at_time(Vec2::ZERO, t0);
    assert_eq!(field.pointer().fade, 1.0);

    field.pointer_left();
    field.influence_at_time(Vec2::ZERO, t0 + std::time::Duration::from_millis(100));
    assert!((field.pointer().fade - 0.75).abs() < 1e-4);
    // A long stall only counts as 0.2 s.
    field.influence_at_time(Vec2::ZERO, t0 + std::time::Duration::from_secs(10));
    assert!((field.pointer().fade - 0.25).abs() < 1e-4);
}

#[test]
fn connector_probe_reports_max_along_curve() {
    let mut field = ready_field();
    field.add_threshold(Vec2::new(100.0, 0.0));
    let curve = QuadraticCurve {
        start: Vec2::new(0.0, 0.0),
        control: Vec2::new(100.0, 0.0),
        end: Vec2::new(200.0, 0.0),
    };
    let v = field.max_influence_over(curve.samples(32));
    assert_eq!(v, 1.0);
    let far = QuadraticCurve::connector(Vec2::new(0.0, 500.0), Vec2::new(200.0, 500.0), 0.0);
    assert_eq!(field.max_influence_over(far.samples(32)), 0.0);
}

#[test]
fn observers_see_clamped_changes_only() {
    let field = SharedField::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    field.on_radius_change(|_| anyhow::bail!("widget gone"));
    let sink = seen.clone();
    let id = field.on_radius_change(move |r| {
        sink.borrow_mut().push(*r);
        Ok(())
    });

    field.set_radius(300.0);
    field.set_radius(125.0);
    field.set_radius(40.0);
    assert_eq!(*seen.borrow(), vec![125.0, 40.0]);

    assert!(field.remove_radius_observer(id));
    field.set_radius(50.0);
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn mouse_output_observers_fire_on_toggle() {
    let field = SharedField::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    field.on_mouse_output_change(move |on| {
        sink.borrow_mut().push(*on);
        Ok(())
    });
    field.set_mouse_output_enabled(true);
    field.toggle_mouse_output();
    field.toggle_mouse_output();
    assert_eq!(*seen.borrow(), vec![false, true]);
}

#[test]
fn removing_a_radius_observer_leaves_mouse_output_observers() {
    let field = SharedField::default();
    let radius_calls = Rc::new(RefCell::new(0));
    let toggles = Rc::new(RefCell::new(0));
    let sink = radius_calls.clone();
    let radius_id = field.on_radius_change(move |_| {
        *sink.borrow_mut() += 1;
        Ok(())
    });
    let sink = toggles.clone();
    let toggle_id = field.on_mouse_output_change(move |_| {
        *sink.borrow_mut() += 1;
        Ok(())
    });

    assert!(field.remove_radius_observer(radius_id));
    assert!(!field.remove_radius_observer(radius_id));
    field.set_radius(60.0);
    field.toggle_mouse_output();
    assert_eq!(*radius_calls.borrow(), 0);
    assert_eq!(*toggles.borrow(), 1);

    assert!(field.remove_mouse_output_observer(toggle_id));
    field.toggle_mouse_output();
    assert_eq!(*toggles.borrow(), 1);
}

#[test]
fn observers_can_read_the_field_back() {
    let field = SharedField::default();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (reader, sink) = (field.clone(), seen.clone());
    field.on_radius_change(move |_| {
        sink.borrow_mut().push(reader.borrow().radius());
        Ok(())
    });
    let (reader, sink) = (field.clone(), seen.clone());
    field.on_mouse_output_change(move |_| {
        let enabled = reader.borrow().is_mouse_output_enabled();
        sink.borrow_mut().push(if enabled { 1.0 } else { 0.0 });
        Ok(())
    });

    field.set_radius(40.0);
    field.adjust_radius(constants::THRESHOLD_RADIUS_STEP);
    field.toggle_mouse_output();
    assert_eq!(*seen.borrow(), vec![40.0, 45.0, 0.0]);
}

#[test]
fn change_made_inside_an_observer_is_applied_once() {
    let field = SharedField::default();
    let calls = Rc::new(RefCell::new(0));

    let (writer, count) = (field.clone(), calls.clone());
    field.on_radius_change(move |r| {
        *count.borrow_mut() += 1;
        if *r < 100.0 {
            writer.set_radius(100.0);
        }
        Ok(())
    });

    field.set_radius(20.0);
    assert_eq!(field.borrow().radius(), 100.0);
    assert_eq!(*calls.borrow(), 1);
}
