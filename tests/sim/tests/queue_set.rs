// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test of waiting on several queues and semaphores at once

use kestrel::{
    Completion, Error, Kernel, KernelConfig, QueueSetMember, TaskConfig, TaskState, Timeout, wait,
};
use kestrel_tests_sim::Recorder;

#[test]
fn pending_select_returns_the_first_ready_member() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(3).unwrap();
    let button = kernel.create_binary().unwrap();
    let set = kernel.create_set(4).unwrap();
    kernel.add_member(set, queue).unwrap();
    kernel.add_member(set, button).unwrap();
    let selected = Recorder::<QueueSetMember, 8>::leaked();

    let selector = kernel
        .spawn(TaskConfig::default().with_priority(2), move |cx| {
            let member = wait!(cx.select(set, Timeout::Forever)).unwrap();
            selected.push(member);
            cx.yield_now()
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(kernel.task_state(selector), Ok(TaskState::Blocked));

    kernel.give_from_interrupt(button);
    kernel.try_send(queue, 1).unwrap();
    kernel.run_tick();

    assert_eq!(selected.events()[0], QueueSetMember::Semaphore(button));

    kernel.run_tick();
    assert_eq!(
        selected.events(),
        [QueueSetMember::Semaphore(button), QueueSetMember::Queue(queue)]
    );
}

#[test]
fn tokens_follow_readiness_order() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let first = kernel.create_queue(2).unwrap();
    let second = kernel.create_queue(2).unwrap();
    let sem = kernel.create_counting(2, 0).unwrap();
    let set = kernel.create_set(6).unwrap();
    let members: [QueueSetMember; 3] = [first.into(), second.into(), sem.into()];
    for member in members {
        kernel.add_member(set, member).unwrap();
    }
    let selected = Recorder::<QueueSetMember, 8>::leaked();

    kernel.try_send(second, 10).unwrap();
    kernel.give_from_interrupt(sem);
    kernel.try_send(first, 20).unwrap();
    kernel.try_send(second, 30).unwrap();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            while let Ok(member) = wait!(cx.select(set, Timeout::NonBlocking)) {
                selected.push(member);
                match member {
                    QueueSetMember::Queue(queue) => {
                        cx.kernel().try_receive(queue).unwrap();
                    }
                    QueueSetMember::Semaphore(sem) => {
                        wait!(cx.take(sem, Timeout::NonBlocking)).unwrap();
                    }
                }
            }
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(
        selected.events(),
        [
            QueueSetMember::Queue(second),
            QueueSetMember::Semaphore(sem),
            QueueSetMember::Queue(first),
            QueueSetMember::Queue(second),
        ]
    );
}

#[test]
fn drained_member_is_not_selected() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(2).unwrap();
    let set = kernel.create_set(2).unwrap();
    kernel.add_member(set, queue).unwrap();
    let results = Recorder::<Result<QueueSetMember, Error>, 4>::leaked();

    kernel.try_send(queue, 1).unwrap();
    kernel.try_send(queue, 2).unwrap();
    // Drained behind the set's back
    kernel.try_receive(queue).unwrap();
    kernel.try_receive(queue).unwrap();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            results.push(wait!(cx.select(set, Timeout::NonBlocking)));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(results.events(), [Err(Error::TimedOut)]);
}

#[test]
fn existing_items_are_visible_after_add() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(3).unwrap();
    kernel.try_send(queue, 1).unwrap();
    kernel.try_send(queue, 2).unwrap();

    let set = kernel.create_set(3).unwrap();
    kernel.add_member(set, queue).unwrap();
    let count = Recorder::<usize, 4>::leaked();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            let mut n = 0;
            while wait!(cx.select(set, Timeout::NonBlocking)).is_ok() {
                cx.kernel().try_receive(queue).unwrap();
                n += 1;
            }
            count.push(n);
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(count.events(), [2]);
}

#[test]
fn adding_a_non_empty_member_wakes_a_pending_select() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(3).unwrap();
    let set = kernel.create_set(3).unwrap();
    let selected = Recorder::<Result<QueueSetMember, Error>, 4>::leaked();

    let selector = kernel
        .spawn(TaskConfig::default(), move |cx| {
            selected.push(wait!(cx.select(set, Timeout::Forever)));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(kernel.task_state(selector), Ok(TaskState::Blocked));

    kernel.try_send(queue, 7).unwrap();
    kernel.try_send(queue, 8).unwrap();
    kernel.add_member(set, queue).unwrap();
    assert_eq!(kernel.task_state(selector), Ok(TaskState::Ready));

    kernel.run_for(5);
    assert_eq!(selected.events(), [Ok(QueueSetMember::Queue(queue))]);

    // The second item is still announced by a token
    kernel
        .spawn(TaskConfig::default(), move |cx| {
            selected.push(wait!(cx.select(set, Timeout::NonBlocking)));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(
        selected.events(),
        [
            Ok(QueueSetMember::Queue(queue)),
            Ok(QueueSetMember::Queue(queue))
        ]
    );
    assert_eq!(kernel.queue_depth(queue), Ok((2, 1)));
}

#[test]
fn select_times_out() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let sem = kernel.create_binary().unwrap();
    let set = kernel.create_set(1).unwrap();
    kernel.add_member(set, sem).unwrap();
    let results = Recorder::<(u64, Result<QueueSetMember, Error>), 4>::leaked();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            let result = wait!(cx.select(set, Timeout::Ticks(4)));
            results.push((cx.current_time(), result));
            Completion::Exit
        })
        .unwrap();
    kernel.run_for(6);

    assert_eq!(results.events(), [(4, Err(Error::TimedOut))]);
}

#[test]
fn registration_errors() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(3).unwrap();
    let sem = kernel.create_binary().unwrap();
    let set = kernel.create_set(3).unwrap();
    let other = kernel.create_set(8).unwrap();

    kernel.add_member(set, queue).unwrap();
    assert_eq!(kernel.add_member(set, queue), Err(Error::AlreadyMember));
    assert_eq!(kernel.add_member(other, queue), Err(Error::AlreadyMember));
    assert_eq!(kernel.add_member(set, sem), Err(Error::AlreadyFull));
    assert!(kernel.add_member(other, sem).is_ok());
}

#[test]
fn only_empty_members_can_be_removed() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(2).unwrap();
    let set = kernel.create_set(2).unwrap();
    let other = kernel.create_set(2).unwrap();
    kernel.add_member(set, queue).unwrap();

    kernel.try_send(queue, 1).unwrap();
    assert_eq!(kernel.remove_member(set, queue), Err(Error::NotEmpty));

    kernel.try_receive(queue).unwrap();
    assert_eq!(kernel.remove_member(other, queue), Err(Error::NotFound));
    kernel.remove_member(set, queue).unwrap();
    kernel.add_member(other, queue).unwrap();
}
