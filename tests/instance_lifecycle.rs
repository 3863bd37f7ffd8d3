// Integration test: instance registry limits and lifecycle, headless
//
// Every instance runs on the null audio client, so nothing here needs a
// sound card or a MIDI port.

mod common;

use common::{LogCapture, headless_config};
use ringbuf::traits::Consumer;
use rtsynth::messaging::channels::{NotificationSink, create_notification_channel};
use rtsynth::messaging::controls::{main, part, section};
use rtsynth::messaging::notification::{NotificationCategory, NotificationLevel};
use rtsynth::{CommandBlock, InstanceError, InstanceManager, LifecycleState, MAX_INSTANCES};
use std::time::Duration;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn test_limit_refuses_extra_instance_and_primary_keeps_running() {
    let (tx, mut rx) = create_notification_channel(64);
    let manager = InstanceManager::new(headless_config(), NotificationSink::new(tx));
    let primary = manager.boot_primary().unwrap();
    manager.duty_cycle(|_| {});

    for _ in 1..MAX_INSTANCES {
        manager.request_new_instance(None).unwrap();
    }
    assert_eq!(manager.count(), MAX_INSTANCES);
    let expected: Vec<u32> = (0..MAX_INSTANCES as u32).collect();
    assert_eq!(manager.ids(), expected);

    let logs = LogCapture::default();
    let refused = logs.capture(|| manager.request_new_instance(None));
    assert_eq!(refused, Err(InstanceError::LimitReached));
    assert!(logs.contents().contains("Can't start instance"));
    assert_eq!(manager.count(), MAX_INSTANCES);

    let mut limit_notified = false;
    while let Some(notification) = rx.try_pop() {
        if notification.level == NotificationLevel::Error
            && notification.category == NotificationCategory::Instance
        {
            limit_notified = true;
        }
    }
    assert!(limit_notified);

    // the primary still answers
    let mut pumped = Vec::new();
    manager.duty_cycle(|instance| pumped.push(instance.id()));
    assert!(pumped.contains(&0));
    let reply = primary
        .with_cli(|cli| {
            cli.send(CommandBlock::write(part::VOLUME, 0, 64.0)).unwrap();
            cli.wait_reply(REPLY_TIMEOUT)
        })
        .flatten()
        .unwrap();
    assert_eq!(reply.value, 64.0);

    manager.perform_shutdown_actions();
    assert_eq!(primary.state(), LifecycleState::Defunct);
}

#[test]
fn test_start_and_stop_through_main_controls() {
    let (tx, _rx) = create_notification_channel(64);
    let manager = InstanceManager::new(headless_config(), NotificationSink::new(tx));
    let primary = manager.boot_primary().unwrap();
    manager.duty_cycle(|_| {});

    let send = |block: CommandBlock| {
        primary
            .with_cli(|cli| {
                cli.send(block).unwrap();
                cli.wait_reply(REPLY_TIMEOUT)
            })
            .flatten()
            .unwrap()
    };

    // 0 = lowest free id
    let reply = send(CommandBlock::write(main::START_INSTANCE, section::MAIN, 0.0));
    assert!(!reply.has_error());
    manager.duty_cycle(|_| {}); // registered and booted
    manager.duty_cycle(|_| {}); // running
    let started = manager.get(1).unwrap();
    assert_eq!(started.state(), LifecycleState::Running);

    let reply = send(CommandBlock::write(main::STOP_INSTANCE, section::MAIN, 1.0));
    assert!(!reply.has_error());
    manager.duty_cycle(|_| {}); // stop signalled
    manager.duty_cycle(|_| {}); // closed and reclaimed
    assert!(manager.get(1).is_none());
    assert_eq!(started.state(), LifecycleState::Defunct);

    // the primary cannot be stopped this way: 0 is out of range
    let reply = send(CommandBlock::write(main::STOP_INSTANCE, section::MAIN, 0.0));
    assert_eq!(reply.value, 1.0);
    manager.duty_cycle(|_| {});
    manager.duty_cycle(|_| {});
    assert!(manager.is_running());

    let config = manager.perform_shutdown_actions();
    assert_eq!(config.active_instances, 1);
}

#[test]
fn test_secondary_engines_are_independent() {
    let (tx, _rx) = create_notification_channel(64);
    let manager = InstanceManager::new(headless_config(), NotificationSink::new(tx));
    let primary = manager.boot_primary().unwrap();
    let id = manager.request_new_instance(Some(9)).unwrap();
    manager.duty_cycle(|_| {});
    manager.duty_cycle(|_| {});
    let secondary = manager.get(id).unwrap();
    assert!(secondary.is_running());

    let write = |instance: &rtsynth::instance::Instance, value: f32| {
        instance
            .with_cli(|cli| {
                cli.send(CommandBlock::write(part::PANNING, 0, value)).unwrap();
                cli.wait_reply(REPLY_TIMEOUT)
            })
            .flatten()
            .unwrap()
    };
    write(&primary, 10.0);
    write(&secondary, 100.0);

    let read = |instance: &rtsynth::instance::Instance| {
        instance
            .with_cli(|cli| {
                cli.send(CommandBlock::read(part::PANNING, 0)).unwrap();
                cli.wait_reply(REPLY_TIMEOUT)
            })
            .flatten()
            .unwrap()
            .value
    };
    assert_eq!(read(&primary), 10.0);
    assert_eq!(read(&secondary), 100.0);

    let config = manager.perform_shutdown_actions();
    assert_eq!(config.active_instances, 1 | 1 << 9);
}

#[test]
fn test_lost_notifications_are_reported() {
    // room for the primary's "running" notice only
    let (tx, mut rx) = create_notification_channel(1);
    let manager = InstanceManager::new(headless_config(), NotificationSink::new(tx));
    manager.boot_primary().unwrap();
    manager.duty_cycle(|_| {});

    manager.request_new_instance(None).unwrap();
    manager.request_new_instance(None).unwrap();
    let logs = LogCapture::default();
    logs.capture(|| {
        for _ in 0..4 {
            manager.duty_cycle(|_| {});
        }
    });
    assert!(logs.contents().contains("Notification channel full"));
    assert!(rx.try_pop().is_some());

    manager.perform_shutdown_actions();
}
