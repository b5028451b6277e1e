/*!
# FlowGate Core

Core library for FlowGate, a bounded-concurrency task dispatcher written in Rust.

Callers submit work and the dispatcher guarantees that at most N tasks
execute at the same time, queuing the rest until a slot frees up:

- Task definitions for blocking closures and futures
- A FIFO queue for tasks waiting on a slot
- Capacity tracking against a fixed ceiling
- A dispatcher with a background scheduler loop woken on every completion
- Layered configuration and point-in-time statistics

```no_run
use flowgate_core::{BoundedDispatcher, Dispatcher};

# async fn run() -> flowgate_core::Result<()> {
let dispatcher = BoundedDispatcher::new(4)?;
for i in 0..16 {
    dispatcher.submit_fn(move || println!("task {i}"))?;
}
dispatcher.wait_idle().await;
# Ok(())
# }
```
*/

pub mod capacity;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod stats;
pub mod task;

pub use error::{FlowGateError, Result};

pub use capacity::CapacityTracker;
pub use config::DispatcherConfig;
pub use dispatcher::{BoundedDispatcher, Dispatcher};
pub use queue::TaskQueue;
pub use stats::DispatcherStats;
/// Re-export core types for convenience
pub use task::Task;
