// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn window(duration_secs: i64, reboot: RebootSetting) -> MaintenanceWindow {
    MaintenanceWindow::new(1_000_000, Iso8601Duration::from_seconds(duration_secs), reboot)
}

#[parameterized(
    before_start = { 900_000, 60 },
    at_start = { 1_000_000, 60 },
    halfway = { 1_000_000 + 30 * 60, 30 },
    at_end = { 1_000_000 + 60 * 60, 0 },
    past_end = { 1_000_000 + 90 * 60, 0 },
)]
fn remaining_minutes_never_negative(now: i64, expected: i64) {
    let w = window(60 * 60, RebootSetting::IfRequired);
    assert_eq!(w.remaining_minutes(now), expected);
}

#[test]
fn used_percent_is_bounded_0_to_100() {
    let w = window(60 * 60, RebootSetting::IfRequired);
    assert_eq!(w.used_percent(1_000_000), 0);
    assert_eq!(w.used_percent(1_000_000 + 30 * 60), 50);
    assert_eq!(w.used_percent(1_000_000 + 120 * 60), 100);
}

#[test]
fn install_time_available_adds_reboot_buffer_unless_never() {
    let w = window(60 * 60, RebootSetting::IfRequired);
    // cutoff = 5*3 + 15 = 30; 31 remaining minutes clears it, 30 does not.
    assert!(w.is_package_install_time_available(31, 3));
    assert!(!w.is_package_install_time_available(30, 3));

    let w_never = window(60 * 60, RebootSetting::Never);
    // cutoff = 5*3 = 15 with no reboot buffer.
    assert!(w_never.is_package_install_time_available(16, 3));
    assert!(!w_never.is_package_install_time_available(15, 3));
}

#[test]
fn reboot_start_contract_respects_setting_and_pending() {
    let never = window(60 * 60, RebootSetting::Never);
    assert!(!never.start_if_required_and_time_available(60, true));

    let if_required = window(60 * 60, RebootSetting::IfRequired);
    assert!(!if_required.start_if_required_and_time_available(60, false));
    assert!(if_required.start_if_required_and_time_available(60, true));
    assert!(!if_required.start_if_required_and_time_available(5, true));

    let always = window(60 * 60, RebootSetting::Always);
    assert!(always.start_if_required_and_time_available(60, false));
    assert!(!always.start_if_required_and_time_available(5, false));
}

#[test]
fn parses_rfc3339_start_time() {
    let w = MaintenanceWindow::from_iso_start("2026-07-28T00:00:00Z", Iso8601Duration::from_seconds(3600), RebootSetting::Never).unwrap();
    assert_eq!(w.remaining_minutes(w.start_epoch_secs), 60);
}
