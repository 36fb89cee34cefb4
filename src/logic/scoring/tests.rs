use super::*;
use crate::logic::config::ScoringConfig;

fn cfg() -> ScoringConfig {
    ScoringConfig::default()
}

fn signals(cpu: f64, mem: f64, disk: f64, net: f64) -> Signals {
    Signals {
        cpu_percent: cpu,
        memory_percent: mem,
        disk_kb_per_sec: disk,
        net_ops_per_sec: net,
        startup: false,
        suspicious: false,
    }
}

#[test]
fn test_updater_in_temp_scores_37() {
    let config = cfg();
    let suspicious = is_suspicious_path(r"C:\Temp\upd.exe", &config);
    assert!(suspicious);

    let s = signals(1.0, 0.3, 0.0, 0.0).with_startup(true).with_suspicious(suspicious);
    let result = evaluate(&s, &EnvContext::default(), &config, ListStatus::Neutral).unwrap();

    assert_eq!(result.value, 37);
    assert_eq!(result.tier, Tier::Informational);
}

#[test]
fn test_score_monotonic_in_each_signal() {
    let config = cfg();
    let env = EnvContext::default();
    let steps = [0.0, 0.5, 3.0, 10.0, 25.0, 60.0, 200.0];

    for axis in 0..4 {
        let mut last = 0u8;
        for &v in &steps {
            let mut s = signals(1.0, 1.0, 1.0, 1.0);
            match axis {
                0 => s.cpu_percent = v,
                1 => s.memory_percent = v,
                2 => s.disk_kb_per_sec = v,
                _ => s.net_ops_per_sec = v,
            }
            let value = score(&s, &env, &config);
            assert!(value >= last, "axis {} value {} dropped to {}", axis, v, value);
            last = value;
        }
    }
}

#[test]
fn test_score_always_clamped() {
    let config = cfg();
    let env = EnvContext::default().with_fullscreen(true);

    let huge = signals(1e9, 1e9, 1e9, 1e9).with_startup(true).with_suspicious(true);
    assert_eq!(score(&huge, &env, &config), 100);

    let negative = signals(-50.0, -1.0, 0.0, 0.0);
    assert_eq!(score(&negative, &env, &config), 0);

    let nan = signals(f64::NAN, 0.0, 0.0, 0.0);
    assert!(score(&nan, &EnvContext::default(), &config) <= 100);
}

#[test]
fn test_deny_list_forces_actionable() {
    let config = cfg();
    let idle = signals(0.0, 0.0, 0.0, 0.0);
    let result = evaluate(&idle, &EnvContext::default(), &config, ListStatus::Denied).unwrap();
    assert_eq!(result.value, 0);
    assert_eq!(result.tier, Tier::Actionable);
}

#[test]
fn test_allow_list_skips_subject() {
    let config = cfg();
    let hot = signals(100.0, 100.0, 100.0, 100.0);
    assert!(evaluate(&hot, &EnvContext::default(), &config, ListStatus::Allowed).is_none());
}

#[test]
fn test_context_modifiers() {
    let config = cfg();
    let s = signals(10.0, 0.0, 0.0, 0.0); // base 20

    let low_battery = EnvContext::default().with_battery(15.0, false);
    assert_eq!(score(&s, &low_battery, &config), 30);

    let plugged = EnvContext::default().with_battery(15.0, true);
    assert_eq!(score(&s, &plugged, &config), 20);

    let low_disk = EnvContext::default().with_disk_free(5.0);
    assert_eq!(score(&s, &low_disk, &config), 30);

    let fullscreen = EnvContext::default().with_fullscreen(true);
    assert_eq!(score(&s, &fullscreen, &config), 5);

    // Above the ceiling the penalty does not apply
    let busy = signals(40.0, 0.0, 0.0, 0.0);
    assert_eq!(score(&busy, &fullscreen, &config), 80);
}

#[test]
fn test_threshold_is_inclusive() {
    assert_eq!(tier_for(60, false, 60), Tier::Actionable);
    assert_eq!(tier_for(59, false, 60), Tier::Informational);
}

#[test]
fn test_suspicious_service() {
    let config = cfg();
    assert!(is_suspicious_service("UnknownUpdater", r"C:\Windows\svc.exe", &config));
    assert!(is_suspicious_service("Helper", r"C:\Users\a\AppData\Local\helper.exe", &config));
    assert!(!is_suspicious_service("Spooler", r"C:\Windows\System32\spoolsv.exe", &config));
}
