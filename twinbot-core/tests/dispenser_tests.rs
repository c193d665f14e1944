mod common;

use std::panic::{self, AssertUnwindSafe};

use common::{FakeLink, RecordingDelay, ScriptedColor, ScriptedRange, SharedPin};
use embedded_hal::digital::ErrorKind;
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTrans};
use twinbot_core::utils::{
    config::DispenserConfig,
    connection::{SerialLink, Source},
    controllers::{calibrate, CycleOutcome, DeviceError, Dispenser, Hcsr04, Phase, PumpBank, Tcs3200},
    math::color::{CalibrationProfile, ColorSample, Reference},
};

type TestDispenser = Dispenser<ScriptedRange, ScriptedColor, SharedPin, RecordingDelay, FakeLink>;

fn drinks_profile() -> CalibrationProfile {
    CalibrationProfile::new(
        ColorSample::new(5, 90, 90),
        ColorSample::new(90, 5, 5),
        ColorSample::new(40, 40, 10),
    )
}

struct Rig {
    dispenser: TestDispenser,
    range: ScriptedRange,
    color: ScriptedColor,
    pumps: [SharedPin; 3],
    delay: RecordingDelay,
    console: FakeLink,
}

fn rig(
    range: ScriptedRange,
    color: ScriptedColor,
    config: Option<DispenserConfig>,
) -> Rig {
    let pumps: [SharedPin; 3] = Default::default();
    let delay = RecordingDelay::default();
    let console = FakeLink::default();
    let dispenser = Dispenser::new(
        drinks_profile(),
        range.clone(),
        color.clone(),
        PumpBank::new(pumps.clone()).unwrap(),
        delay.clone(),
        SerialLink::new(console.clone(), Source::Console),
        config,
    );
    for p in &pumps {
        p.clear_history();
    }
    Rig {
        dispenser,
        range,
        color,
        pumps,
        delay,
        console,
    }
}

#[test]
fn test_calibration_captures_three_references_in_order() {
    let console = FakeLink::default();
    console.push(b"abc");
    let mut link = SerialLink::new(console.clone(), Source::Console);
    let mut sensor = ScriptedColor::samples([
        ColorSample::new(5, 90, 90),
        ColorSample::new(90, 5, 5),
        ColorSample::new(40, 40, 10),
    ]);

    let profile = calibrate(&mut link, &mut sensor).unwrap();
    assert_eq!(profile, drinks_profile());
    assert_eq!(sensor.reads(), 3);
    assert_eq!(console.pending(), 0);

    assert_eq!(
        console.lines(),
        [
            "Starting calibration...",
            "Place black object (Coca-Cola) and press any key...",
            "Black (Coca-Cola) calibrated.",
            "Place white object (Sprite) and press any key...",
            "White (Sprite) calibrated.",
            "Place orange object (Mirinda) and press any key...",
            "Orange (Mirinda) calibrated.",
            "Calibration complete!",
            "Calibration Values:",
            "Black (Coca-Cola): R=5, G=90, B=90",
            "White (Sprite): R=90, G=5, B=5",
            "Orange (Mirinda): R=40, G=40, B=10",
        ]
    );
}

#[test]
fn test_calibration_repeats_a_step_without_a_reading() {
    let console = FakeLink::default();
    console.push(b"1234");
    let mut link = SerialLink::new(console.clone(), Source::Console);
    let mut sensor = ScriptedColor::new([
        Ok(Some(ColorSample::new(5, 90, 90))),
        Ok(None),
        Ok(Some(ColorSample::new(90, 5, 5))),
        Ok(Some(ColorSample::new(40, 40, 10))),
    ]);

    let profile = calibrate(&mut link, &mut sensor).unwrap();
    assert_eq!(profile, drinks_profile());
    assert_eq!(sensor.reads(), 4);

    let lines = console.lines();
    let white_prompts = lines
        .iter()
        .filter(|l| l.starts_with("Place white object"))
        .count();
    assert_eq!(white_prompts, 2);
    assert!(lines.iter().any(|l| l == "No color reading, try again."));
}

#[test]
fn test_calibration_waits_for_a_keypress_before_sampling() {
    let console = FakeLink::default();
    console.push(b"k");
    let mut link = SerialLink::new(console.clone(), Source::Console);
    let mut sensor = ScriptedColor::samples([ColorSample::new(1, 2, 3); 3]);

    // the fake link reports end of input once drained
    assert_eq!(calibrate(&mut link, &mut sensor), Err(DeviceError::LinkClosed));
    assert_eq!(sensor.reads(), 1);
}

#[test]
fn test_dispenser_calibrate_builds_from_procedure() {
    let console = FakeLink::default();
    console.push(b"...");
    let color = ScriptedColor::samples([
        ColorSample::new(5, 90, 90),
        ColorSample::new(90, 5, 5),
        ColorSample::new(40, 40, 10),
    ]);
    let pumps: [SharedPin; 3] = Default::default();

    let dispenser: TestDispenser = Dispenser::calibrate(
        ScriptedRange::default(),
        color,
        PumpBank::new(pumps).unwrap(),
        RecordingDelay::default(),
        SerialLink::new(console, Source::Console),
        None,
    )
    .unwrap();
    assert_eq!(dispenser.profile(), &drinks_profile());
    assert_eq!(dispenser.phase(), Phase::Idle);
}

#[test]
fn test_far_object_is_ignored() {
    let mut r = rig(ScriptedRange::new([Ok(Some(15))]), ScriptedColor::default(), None);

    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoObject);
    assert_eq!(r.color.reads(), 0);
    assert_eq!(r.console.lines(), ["Distance: 15 cm", "No Glass Detected"]);
    assert!(r.pumps.iter().all(|p| p.history().is_empty()));
    assert_eq!(r.delay.ms_calls(), [100]);
}

#[test]
fn test_near_black_glass_gets_coca_cola() {
    let mut r = rig(
        ScriptedRange::new([Ok(Some(5))]),
        ScriptedColor::samples([ColorSample::new(10, 80, 80)]),
        None,
    );

    assert_eq!(r.dispenser.cycle(), CycleOutcome::Dispensed(Reference::Black));
    assert_eq!(r.dispenser.phase(), Phase::Idle);
    assert_eq!(
        r.console.lines(),
        [
            "Distance: 5 cm",
            "Glass Detected",
            "Raw Data - Red: 10, Green: 80, Blue: 80",
            "Detected: Black (Coca-Cola)",
        ]
    );

    // active-low relay: pulled low to run, back high after
    assert_eq!(r.pumps[0].history(), [false, true]);
    assert!(r.pumps[1].history().is_empty());
    assert!(r.pumps[2].history().is_empty());
    assert!(r.pumps.iter().all(SharedPin::is_high));

    // pump run, then the cycle pause
    assert_eq!(r.delay.ms_calls(), [3000, 100]);
}

#[test]
fn test_each_reference_maps_to_its_pump() {
    let cases = [
        (ColorSample::new(10, 80, 80), Reference::Black, 0),
        (ColorSample::new(85, 10, 0), Reference::White, 1),
        (ColorSample::new(42, 38, 12), Reference::Orange, 2),
    ];
    for (sample, reference, pump) in cases {
        let mut r = rig(
            ScriptedRange::new([Ok(Some(3))]),
            ScriptedColor::samples([sample]),
            None,
        );
        assert_eq!(r.dispenser.cycle(), CycleOutcome::Dispensed(reference));
        for (i, pin) in r.pumps.iter().enumerate() {
            let expected: &[bool] = if i == pump { &[false, true] } else { &[] };
            assert_eq!(pin.history(), expected, "{reference:?} pump {i}");
        }
    }
}

#[test]
fn test_threshold_is_strict() {
    let mut r = rig(
        ScriptedRange::new([Ok(Some(10)), Ok(Some(9))]),
        ScriptedColor::samples([ColorSample::new(90, 5, 5)]),
        None,
    );
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoObject);
    assert_eq!(r.color.reads(), 0);
    assert_eq!(r.dispenser.cycle(), CycleOutcome::Dispensed(Reference::White));
}

#[test]
fn test_missing_or_faulty_echo_means_no_object() {
    let mut r = rig(
        ScriptedRange::new([Ok(None), Err(DeviceError::Pin(ErrorKind::Other))]),
        ScriptedColor::samples([ColorSample::new(10, 80, 80); 2]),
        None,
    );
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoObject);
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoObject);
    assert_eq!(r.color.reads(), 0);
    assert_eq!(r.range.reads(), 2);
    assert!(r.console.lines().iter().all(|l| l != "Glass Detected"));
}

#[test]
fn test_missing_color_reading_skips_dispense() {
    let mut r = rig(
        ScriptedRange::new([Ok(Some(4)), Ok(Some(4))]),
        ScriptedColor::new([Ok(None), Err(DeviceError::Pin(ErrorKind::Other))]),
        None,
    );
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoReading);
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoReading);
    assert!(r.pumps.iter().all(|p| p.history().is_empty()));
    assert_eq!(r.delay.ms_calls(), [100, 100]);
}

#[test]
fn test_config_overrides_threshold_and_timing() {
    let config = DispenserConfig {
        distance_threshold_cm: 20,
        dispense_ms: 1500,
        cycle_pause_ms: 5,
        ..DispenserConfig::default()
    };
    let mut r = rig(
        ScriptedRange::new([Ok(Some(15))]),
        ScriptedColor::samples([ColorSample::new(40, 40, 10)]),
        Some(config),
    );
    assert_eq!(r.dispenser.cycle(), CycleOutcome::Dispensed(Reference::Orange));
    assert_eq!(r.delay.ms_calls(), [1500, 5]);
}

#[test]
fn test_relay_fault_ends_the_cycle_only() {
    let mut r = rig(
        ScriptedRange::new([Ok(Some(2)), Ok(Some(30))]),
        ScriptedColor::samples([ColorSample::new(90, 5, 5)]),
        None,
    );
    r.pumps[1].fail_writes(true);
    assert_eq!(
        r.dispenser.cycle(),
        CycleOutcome::Faulted(DeviceError::Pin(ErrorKind::Other))
    );
    assert!(!r.dispenser.pumps().any_running());

    r.pumps[1].fail_writes(false);
    assert_eq!(r.dispenser.cycle(), CycleOutcome::NoObject);
}

#[test]
fn test_relay_released_when_dispense_unwinds() {
    let mut r = rig(ScriptedRange::default(), ScriptedColor::default(), None);
    r.delay.panic_at(3000);

    let result = panic::catch_unwind(AssertUnwindSafe(|| r.dispenser.dispense(Reference::White)));
    assert!(result.is_err());

    assert_eq!(r.pumps[1].history(), [false, true]);
    assert!(r.pumps[1].is_high());
    assert!(!r.dispenser.pumps().any_running());
}

#[test]
fn test_defaults_match_the_boards() {
    let c = DispenserConfig::default();
    assert_eq!(c.distance_threshold_cm, 10);
    assert_eq!(c.dispense_ms, 3000);
    assert_eq!(c.cycle_pause_ms, 100);
    assert_eq!(c.baud_rate, 9600);
}

/// OUT transactions for one LOW pulse of `width` µs at 1 µs steps.
fn low_pulse(width: usize) -> Vec<PinTrans> {
    let mut t = vec![PinTrans::get(State::High)];
    t.extend(vec![PinTrans::get(State::Low); width + 1]);
    t.push(PinTrans::get(State::High));
    t
}

#[test]
fn test_sensor_drivers_feed_a_full_cycle() {
    let config = DispenserConfig::default();
    let delay = RecordingDelay::default();

    // 300 µs round trip is 5 cm
    let mut trig = PinMock::new(&[
        PinTrans::set(State::Low),
        PinTrans::set(State::High),
        PinTrans::set(State::Low),
    ]);
    let mut echo_exp = vec![PinTrans::get(State::Low)];
    echo_exp.extend(vec![PinTrans::get(State::High); 301]);
    echo_exp.push(PinTrans::get(State::Low));
    let mut echo = PinMock::new(&echo_exp);
    let range = Hcsr04::new(trig.clone(), echo.clone(), delay.clone(), config.echo_timing());

    let mut s0 = PinMock::new(&[PinTrans::set(State::High)]);
    let mut s1 = PinMock::new(&[PinTrans::set(State::Low)]);
    let mut s2 = PinMock::new(&[
        PinTrans::set(State::Low),
        PinTrans::set(State::High),
        PinTrans::set(State::Low),
    ]);
    let mut s3 = PinMock::new(&[
        PinTrans::set(State::Low),
        PinTrans::set(State::High),
        PinTrans::set(State::High),
    ]);
    let mut out_exp = low_pulse(10);
    out_exp.extend(low_pulse(80));
    out_exp.extend(low_pulse(80));
    let mut out = PinMock::new(&out_exp);
    let color = Tcs3200::new(
        s0.clone(),
        s1.clone(),
        s2.clone(),
        s3.clone(),
        out.clone(),
        delay.clone(),
        config.color_timing(),
    )
    .unwrap();

    let pumps: [SharedPin; 3] = Default::default();
    let console = FakeLink::default();
    let mut dispenser = Dispenser::new(
        drinks_profile(),
        range,
        color,
        PumpBank::new(pumps.clone()).unwrap(),
        delay.clone(),
        SerialLink::new(console.clone(), Source::Console),
        Some(config),
    );

    assert_eq!(dispenser.cycle(), CycleOutcome::Dispensed(Reference::Black));
    assert_eq!(
        console.lines(),
        [
            "Distance: 5 cm",
            "Glass Detected",
            "Raw Data - Red: 10, Green: 80, Blue: 80",
            "Detected: Black (Coca-Cola)",
        ]
    );
    assert_eq!(pumps[0].history(), [true, false, true]);
    assert_eq!(delay.ms_calls(), [3000, 100]);

    for pin in [&mut trig, &mut echo, &mut s0, &mut s1, &mut s2, &mut s3, &mut out] {
        pin.done();
    }
}

#[test]
fn test_failed_release_is_retried_when_the_guard_drops() {
    let pins: [SharedPin; 3] = Default::default();
    let mut bank = PumpBank::new(pins.clone()).unwrap();
    {
        let guard = bank.open(Reference::Orange).unwrap();
        pins[2].fail_next_writes(1);
        assert_eq!(guard.close(), Err(DeviceError::Pin(ErrorKind::Other)));
    }
    // initial release, pump on, then the second release attempt
    assert_eq!(pins[2].history(), [true, false, true]);
    assert!(pins[2].is_high());
    assert!(!bank.any_running());
}
