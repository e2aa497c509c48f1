//! Queue-set demo: a consumer waits on a queue and a button semaphore at once.
//! A producer task feeds the queue, a "button" interrupt thread gives the semaphore.

use std::time::Duration;

use kestrel::{
    Completion, Kernel, KernelConfig, QueueSetMember, TaskConfig, Timeout, wait,
};
use kestrel_hosted::spawn_interrupt_source;
use kestrel_utils::{Delay, OutputBank};
use log::{LevelFilter, info};
use static_cell::StaticCell;

static KERNEL: StaticCell<Kernel<u32>> = StaticCell::new();
static LEDS: OutputBank<2> = OutputBank::new();

fn main() {
    kestrel_hosted::logger::init(LevelFilter::Info).unwrap();

    let (kernel, mut port) = kestrel_hosted::init(KernelConfig::default().with_tick_freq(100));
    let kernel: &'static Kernel<u32> = KERNEL.init(kernel);

    let queue = kernel.create_queue(3).unwrap();
    let button = kernel.create_binary().unwrap();
    let set = kernel.create_set(4).unwrap();
    kernel.add_member(set, queue).unwrap();
    kernel.add_member(set, button).unwrap();

    let delay = Delay::new(kernel);
    let mut counter = 0;
    let mut sending = false;
    kernel
        .spawn(
            TaskConfig::default().with_name("producer").with_priority(1),
            move |cx| {
                // A parked call must be re-issued first when the task runs again
                if !sending {
                    wait!(delay.delay_ms(cx, 200));
                    counter += 1;
                    sending = true;
                }
                let _ = wait!(cx.send(queue, counter, Timeout::Forever));
                sending = false;
                Completion::Yield
            },
        )
        .unwrap();

    let line = port.interrupt_line();
    kernel
        .spawn(
            TaskConfig::default().with_name("consumer").with_priority(2),
            move |cx| {
                let Ok(member) = wait!(cx.select(set, Timeout::Forever)) else {
                    return Completion::Continue;
                };
                match member {
                    QueueSetMember::Queue(queue) => {
                        if let Ok(value) = cx.kernel().try_receive(queue) {
                            info!("Received {}", value);
                            LEDS.set_output(0, value % 2 == 1);
                        }
                    }
                    QueueSetMember::Semaphore(button) => {
                        if wait!(cx.take(button, Timeout::NonBlocking)).is_ok() {
                            info!("Button pressed");
                            LEDS.set_output(1, true);
                            line.shutdown();
                            return Completion::Exit;
                        }
                    }
                }
                Completion::Yield
            },
        )
        .unwrap();

    spawn_interrupt_source(
        kernel,
        port.interrupt_line(),
        Duration::from_millis(1500),
        Some(1),
        move |kernel| {
            kernel.give_from_interrupt(button);
        },
    );

    kernel.start(&mut port);

    for task in kernel.list_tasks() {
        info!(
            "{} priority={} state={} headroom={}",
            task.name,
            task.priority,
            task.state.as_str(),
            task.stack_headroom
        );
    }
    info!("Stats: {:?}", kernel.runtime_stats());
}
