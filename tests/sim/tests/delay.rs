// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test of tick-based delays

use kestrel::{Completion, Kernel, KernelConfig, TaskConfig, TaskState, wait};
use kestrel_tests_sim::Recorder;

#[test]
fn delay_wakes_after_exact_tick_count() {
    let kernel: Kernel<()> = Kernel::new(KernelConfig::default());
    let times = Recorder::<u64, 4>::leaked();

    let mut started = false;
    let task = kernel
        .spawn(TaskConfig::default(), move |cx| {
            if !started {
                times.push(cx.current_time());
                started = true;
            }
            wait!(cx.delay(100));
            times.push(cx.current_time());
            Completion::Exit
        })
        .unwrap();

    kernel.run_for(10);
    let start = times.events()[0];
    while kernel.current_time() < start + 99 {
        kernel.tick();
        assert_eq!(kernel.task_state(task), Ok(TaskState::Blocked));
    }
    kernel.tick();
    assert_eq!(kernel.current_time(), start + 100);
    assert_eq!(kernel.task_state(task), Ok(TaskState::Ready));

    kernel.run_tick();
    assert_eq!(times.events(), [start, start + 100]);
}

#[test]
fn delay_until_does_not_drift() {
    let kernel: Kernel<()> = Kernel::new(KernelConfig::default());
    let times = Recorder::<u64, 8>::leaked();

    let mut last_wake = 0;
    let mut busy = 0;
    kernel
        .spawn(TaskConfig::default(), move |cx| {
            // Work spanning a few ticks must not shift the period
            if busy > 0 {
                busy -= 1;
                return Completion::Continue;
            }
            wait!(cx.delay_until(&mut last_wake, 10));
            times.push(cx.current_time());
            busy = 3;
            if times.len() == 3 {
                Completion::Exit
            } else {
                Completion::Continue
            }
        })
        .unwrap();

    kernel.run_for(40);

    assert_eq!(times.events(), [10, 20, 30]);
}

#[test]
fn zero_delay_does_not_block() {
    let kernel: Kernel<()> = Kernel::new(KernelConfig::default());
    let runs = Recorder::<u64, 4>::leaked();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            wait!(cx.delay(0));
            runs.push(cx.current_time());
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(runs.events(), [0]);
}

#[test]
fn idle_and_running_ticks_are_counted() {
    let kernel: Kernel<()> = Kernel::new(KernelConfig::default());
    let mut woke = false;
    kernel
        .spawn(TaskConfig::default(), move |cx| {
            if !woke {
                wait!(cx.delay(3));
                woke = true;
            }
            Completion::Continue
        })
        .unwrap();

    kernel.run_for(5);

    let stats = kernel.runtime_stats();
    assert_eq!(stats.now, 5);
    assert_eq!(stats.idle_ticks, 3);
    assert_eq!(kernel.list_tasks()[0].run_ticks, 2);
}
