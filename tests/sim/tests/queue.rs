// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test of bounded message queues

use kestrel::{
    Completion, Error, Kernel, KernelConfig, MAX_QUEUE_LEN, TaskConfig, TaskState, Timeout, wait,
};
use kestrel_tests_sim::Recorder;

#[test]
fn full_queue_rejects_non_blocking_send() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(5).unwrap();
    let results = Recorder::<Result<(), Error>, 8>::leaked();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            for msg in 0..5 {
                results.push(wait!(cx.send(queue, msg, Timeout::NonBlocking)));
            }
            results.push(wait!(cx.send(queue, 5, Timeout::Ticks(0))));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    let mut expected = vec![Ok(()); 5];
    expected.push(Err(Error::TimedOut));
    assert_eq!(results.events(), expected);
    assert_eq!(kernel.queue_depth(queue), Ok((5, 0)));
    assert_eq!(kernel.try_send(queue, 6), Err(Error::Overflow));
}

#[test]
fn messages_come_out_in_send_order() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(4).unwrap();
    for msg in [3, 1, 4, 1] {
        kernel.try_send(queue, msg).unwrap();
    }
    assert_eq!(kernel.peek_depth(queue), Ok((4, 0)));

    let received: Vec<u32> = (0..4).map(|_| kernel.try_receive(queue).unwrap()).collect();
    assert_eq!(received, [3, 1, 4, 1]);
    assert_eq!(kernel.try_receive(queue), Err(Error::TimedOut));
    assert_eq!(kernel.queue_depth(queue), Ok((0, 4)));
}

#[test]
fn send_hands_message_to_waiting_receiver() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(2).unwrap();
    let received = Recorder::<(u64, u32), 4>::leaked();

    let receiver = kernel
        .spawn(TaskConfig::default().with_priority(2), move |cx| {
            let msg = wait!(cx.receive(queue, Timeout::Forever)).unwrap();
            received.push((cx.current_time(), msg));
            Completion::Exit
        })
        .unwrap();
    kernel.run_for(3);
    assert_eq!(kernel.task_state(receiver), Ok(TaskState::Blocked));

    kernel
        .spawn(TaskConfig::default().with_priority(1), move |cx| {
            wait!(cx.send(queue, 42, Timeout::Forever)).unwrap();
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(received.events(), [(3, 42)]);
    assert_eq!(kernel.queue_depth(queue), Ok((0, 2)));
}

#[test]
fn blocked_sender_refills_the_freed_slot() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(1).unwrap();
    let results = Recorder::<Result<(), Error>, 4>::leaked();
    kernel.try_send(queue, 1).unwrap();

    let sender = kernel
        .spawn(TaskConfig::default().with_priority(2), move |cx| {
            results.push(wait!(cx.send(queue, 2, Timeout::Forever)));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(kernel.task_state(sender), Ok(TaskState::Blocked));

    assert_eq!(kernel.try_receive(queue), Ok(1));
    assert_eq!(kernel.queue_depth(queue), Ok((1, 0)));
    assert_eq!(kernel.task_state(sender), Ok(TaskState::Ready));

    kernel.run_tick();
    assert_eq!(results.events(), [Ok(())]);
    assert_eq!(kernel.try_receive(queue), Ok(2));
}

#[test]
fn receive_times_out_on_empty_queue() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(1).unwrap();
    let results = Recorder::<(u64, Result<u32, Error>), 4>::leaked();

    kernel
        .spawn(TaskConfig::default(), move |cx| {
            let result = wait!(cx.receive(queue, Timeout::Ticks(3)));
            results.push((cx.current_time(), result));
            Completion::Exit
        })
        .unwrap();
    kernel.run_for(5);

    assert_eq!(results.events(), [(3, Err(Error::TimedOut))]);
}

#[test]
fn send_times_out_on_full_queue() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(1).unwrap();
    let results = Recorder::<(u64, Result<(), Error>), 4>::leaked();
    kernel.try_send(queue, 1).unwrap();

    let sender = kernel
        .spawn(TaskConfig::default(), move |cx| {
            let result = wait!(cx.send(queue, 2, Timeout::Ticks(3)));
            results.push((cx.current_time(), result));
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(kernel.task_state(sender), Ok(TaskState::Blocked));

    kernel.run_for(4);
    assert_eq!(results.events(), [(3, Err(Error::TimedOut))]);

    // The timed-out message never reaches the queue
    assert_eq!(kernel.queue_depth(queue), Ok((1, 0)));
    assert_eq!(kernel.try_receive(queue), Ok(1));
    assert_eq!(kernel.try_receive(queue), Err(Error::TimedOut));
}

#[test]
fn deleting_a_blocked_sender_drops_its_message() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(1).unwrap();
    kernel.try_send(queue, 1).unwrap();

    let sender = kernel
        .spawn(TaskConfig::default(), move |cx| {
            wait!(cx.send(queue, 2, Timeout::Forever)).unwrap();
            Completion::Exit
        })
        .unwrap();
    kernel.run_tick();
    assert_eq!(kernel.task_state(sender), Ok(TaskState::Blocked));
    kernel.delete(sender).unwrap();

    assert_eq!(kernel.try_receive(queue), Ok(1));
    assert_eq!(kernel.queue_depth(queue), Ok((0, 1)));
    assert_eq!(kernel.try_receive(queue), Err(Error::TimedOut));

    kernel.try_send(queue, 3).unwrap();
    assert_eq!(kernel.queue_depth(queue), Ok((1, 0)));
    assert_eq!(kernel.try_send(queue, 4), Err(Error::Overflow));
}

#[test]
fn send_from_interrupt_reports_higher_priority_wakeup() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    let queue = kernel.create_queue(1).unwrap();
    let received = Recorder::<u32, 4>::leaked();

    kernel
        .spawn(TaskConfig::default().with_priority(1), |_| Completion::Continue)
        .unwrap();
    kernel
        .spawn(TaskConfig::default().with_priority(3), move |cx| {
            let msg = wait!(cx.receive(queue, Timeout::Forever)).unwrap();
            received.push(msg);
            Completion::Continue
        })
        .unwrap();
    kernel.run_tick();

    assert_eq!(kernel.send_from_interrupt(queue, 7), Ok(true));
    assert!(kernel.take_yield_pending());

    // Nobody waits any more, so the next message is buffered
    assert_eq!(kernel.send_from_interrupt(queue, 8), Ok(false));
    assert_eq!(kernel.send_from_interrupt(queue, 9), Err(Error::Overflow));

    // The receiver preempts without advancing time
    kernel.poll();
    assert_eq!(received.events(), [7]);
    assert_eq!(kernel.current_time(), 1);

    kernel.run_for(2);
    assert_eq!(received.events(), [7, 8]);
}

#[test]
fn creation_limits() {
    let kernel: Kernel<u32> = Kernel::new(KernelConfig::default());
    assert_eq!(kernel.create_queue(0), Err(Error::ResourceExhausted));
    assert_eq!(
        kernel.create_queue(MAX_QUEUE_LEN + 1),
        Err(Error::ResourceExhausted)
    );
    assert!(kernel.create_queue(MAX_QUEUE_LEN).is_ok());
}
