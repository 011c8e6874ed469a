//! The event-dispatch microkernel: a fixed-capacity task registry, a
//! bounded event queue, an internal-action slab and the flash-backed app
//! loader, tied together by [`dispatch::Dispatcher`].

pub mod apps;
pub mod dispatch;
pub mod ports;
pub mod queue;
pub mod slab;
pub mod subscriptions;
pub mod task;
pub mod tagged_ptr;

pub use apps::{AppHdr, AppHdrMarker, AppIdQuery, MgmtStatus};
pub use dispatch::{AppEventFreeData, Dispatcher, RetentionSlot, EVT_APP_FREE_EVT_DATA};
pub use ports::{AppRuntime, FlashPort};
pub use queue::EVT_NO_FIRST_USER_EVENT;
pub use tagged_ptr::TaggedFreeInfo;
pub use task::{PlatformInfo, Task, TaskRegistry};
