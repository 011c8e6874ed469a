//! The single, non-reentrant dispatch loop: drains the event queue and
//! either runs an internal-action handler or broadcasts to subscribers.

use super::apps::AppHdr;
use super::ports::AppRuntime;
use super::queue::{EVENT_TYPE_BIT_DISCARDABLE, EVT_NO_FIRST_USER_EVENT, EventQueue};
use super::slab::{InternalAction, Slab};
use super::tagged_ptr::TaggedFreeInfo;
use super::task::{PlatformInfo, TaskRegistry};

pub const EVT_SUBSCRIBE_TO_EVT: u32 = 0;
pub const EVT_UNSUBSCRIBE_TO_EVT: u32 = 1;
pub const EVT_DEFERRED_CALLBACK: u32 = 2;
pub const EVT_PRIVATE_EVT: u32 = 3;

/// Delivered directly via [`AppRuntime::handle`] (never enqueued or
/// subscribed to) to tell an owning app its event data should be freed.
pub const EVT_APP_FREE_EVT_DATA: u32 = u32::MAX - 1;

/// Payload passed to [`AppRuntime::handle`] alongside
/// [`EVT_APP_FREE_EVT_DATA`].
#[derive(Debug, Clone, Copy)]
pub struct AppEventFreeData {
    pub evt_type: u32,
    pub data: *mut u8,
}

/// A handler's access to the current event's retention slot. Calling
/// [`RetentionSlot::retain`] takes ownership of the free-info, preventing
/// the dispatch loop from applying it automatically; the caller must
/// later release it with [`Dispatcher::free_retained_event`]. Private
/// events are delivered with a slot that always yields `None`, making
/// them unretainable.
pub struct RetentionSlot<'a> {
    free_info: &'a mut Option<TaggedFreeInfo>,
}

impl RetentionSlot<'_> {
    pub fn retain(&mut self) -> Option<TaggedFreeInfo> {
        self.free_info.take()
    }
}

fn apply_free_info<R: AppRuntime>(
    registry: &mut TaskRegistry,
    runtime: &mut R,
    evt_type: u32,
    data: *mut u8,
    free_info: TaggedFreeInfo,
) {
    if free_info.is_none() {
        return;
    }
    if let Some(f) = free_info.as_free_fn() {
        f(data);
        return;
    }
    let Some(tid) = free_info.as_tid() else {
        return;
    };
    let Some(task) = registry.find_by_tid_mut(tid) else {
        log::error!("failed to find app {tid} to free event data");
        return;
    };
    let mut fd = AppEventFreeData { evt_type, data };
    let fd_ptr = core::ptr::from_mut(&mut fd).cast::<u8>();
    let mut unretainable = None;
    let mut slot = RetentionSlot {
        free_info: &mut unretainable,
    };
    runtime.handle(
        &task.app_header,
        &mut task.platform_info,
        EVT_APP_FREE_EVT_DATA,
        fd_ptr,
        &mut slot,
    );
}

/// The composition object: task registry, event queue, internal-action
/// slab and the current-event retention slot, plus the app runtime port.
/// Constructed once at boot and never destroyed.
pub struct Dispatcher<R: AppRuntime> {
    pub registry: TaskRegistry,
    queue: EventQueue,
    slab: Slab,
    current_event_free_info: Option<TaggedFreeInfo>,
    pub runtime: R,
}

impl<R: AppRuntime> Dispatcher<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            registry: TaskRegistry::new(),
            queue: EventQueue::new(),
            slab: Slab::new(),
            current_event_free_info: None,
            runtime,
        }
    }

    /// Enqueue a user event. `data`'s ownership passes to the queue on
    /// success.
    pub fn enqueue(&self, evt_type: u32, data: *mut u8, free_info: TaggedFreeInfo, urgent: bool) -> bool {
        debug_assert!(
            evt_type >= EVT_NO_FIRST_USER_EVENT,
            "use subscribe/unsubscribe/defer/enqueue_private_evt for internal actions"
        );
        self.queue.enqueue(evt_type, data, free_info, urgent)
    }

    /// Enqueue a user event, freeing `data` via `free_info`'s free
    /// function immediately if the enqueue fails. Only meaningful when
    /// `free_info` is the function-pointer variant.
    pub fn enqueue_or_free(&self, evt_type: u32, data: *mut u8, free_info: TaggedFreeInfo, urgent: bool) -> bool {
        let ok = self.enqueue(evt_type, data, free_info, urgent);
        if !ok {
            if let Some(f) = free_info.as_free_fn() {
                f(data);
            }
        }
        ok
    }

    /// Enqueue a user event whose data is freed by delivering
    /// `EVT_APP_FREE_EVT_DATA` to `owner_tid` when no one retains it.
    pub fn enqueue_as_app(&self, evt_type: u32, data: *mut u8, owner_tid: u32, urgent: bool) -> bool {
        self.enqueue(evt_type, data, TaggedFreeInfo::from_tid(owner_tid), urgent)
    }

    /// Request that `tid` subscribe to `evt_type`. Processed only once
    /// the dispatch loop drains this request.
    pub fn subscribe(&self, tid: u32, evt_type: u32) -> bool {
        self.enqueue_internal_action(
            InternalAction::Subscribe { tid, evt_type },
            EVT_SUBSCRIBE_TO_EVT,
        )
    }

    /// Request that `tid` unsubscribe from `evt_type`.
    pub fn unsubscribe(&self, tid: u32, evt_type: u32) -> bool {
        self.enqueue_internal_action(
            InternalAction::Unsubscribe { tid, evt_type },
            EVT_UNSUBSCRIBE_TO_EVT,
        )
    }

    /// Request `func(cookie)` run synchronously inside the dispatch loop.
    pub fn defer(&self, func: fn(*mut u8), cookie: *mut u8, urgent: bool) -> bool {
        self.enqueue_internal_action_urgent(
            InternalAction::DeferredCallback { func, cookie },
            EVT_DEFERRED_CALLBACK,
            urgent,
        )
    }

    /// Request a directed delivery of `evt_type`/`data` to `to_tid`.
    /// Never retainable by the recipient.
    pub fn enqueue_private_evt(
        &self,
        to_tid: u32,
        evt_type: u32,
        data: *mut u8,
        free_info: TaggedFreeInfo,
        urgent: bool,
    ) -> bool {
        self.enqueue_internal_action_urgent(
            InternalAction::PrivateEvent {
                evt_type,
                data,
                free_info,
                to_tid,
            },
            EVT_PRIVATE_EVT,
            urgent,
        )
    }

    /// As [`Dispatcher::enqueue_private_evt`], freeing via an
    /// `EVT_APP_FREE_EVT_DATA` callback to `owner_tid`.
    pub fn enqueue_private_evt_as_app(
        &self,
        to_tid: u32,
        evt_type: u32,
        data: *mut u8,
        owner_tid: u32,
        urgent: bool,
    ) -> bool {
        self.enqueue_private_evt(to_tid, evt_type, data, TaggedFreeInfo::from_tid(owner_tid), urgent)
    }

    fn enqueue_internal_action(&self, action: InternalAction, evt_type: u32) -> bool {
        self.enqueue_internal_action_urgent(action, evt_type, false)
    }

    fn enqueue_internal_action_urgent(&self, action: InternalAction, evt_type: u32, urgent: bool) -> bool {
        let Some(idx) = self.slab.allocate(action) else {
            log::warn!("internal action slab exhausted");
            return false;
        };
        let data = Slab::index_to_data(idx);
        if !self.queue.enqueue(evt_type, data, TaggedFreeInfo::NONE, urgent) {
            self.slab.take(idx);
            return false;
        }
        true
    }

    /// Dequeue and process one event. Returns `false` if the queue was
    /// empty and `blocking` was false.
    pub fn run_once(&mut self, blocking: bool) -> bool {
        let Some(event) = self.queue.dequeue(blocking) else {
            return false;
        };
        self.current_event_free_info = Some(event.free_info);

        if event.evt_type < EVT_NO_FIRST_USER_EVENT {
            self.handle_internal_action(event.data);
        } else {
            self.broadcast(event.evt_type, event.data);
        }

        if let Some(free_info) = self.current_event_free_info.take() {
            apply_free_info(&mut self.registry, &mut self.runtime, event.evt_type, event.data, free_info);
        }
        true
    }

    /// Release an event previously taken via [`RetentionSlot::retain`].
    pub fn free_retained_event(&mut self, evt_type: u32, data: *mut u8, free_info: TaggedFreeInfo) {
        apply_free_info(&mut self.registry, &mut self.runtime, evt_type, data, free_info);
    }

    fn handle_internal_action(&mut self, data: *mut u8) {
        let idx = Slab::data_to_index(data);
        let Some(action) = self.slab.take(idx) else {
            log::error!("internal action slab index {idx} not found");
            return;
        };
        match action {
            InternalAction::Subscribe { tid, evt_type } => {
                if let Some(task) = self.registry.find_by_tid_mut(tid) {
                    task.subscribed_events.subscribe(evt_type);
                }
            }
            InternalAction::Unsubscribe { tid, evt_type } => {
                if let Some(task) = self.registry.find_by_tid_mut(tid) {
                    task.subscribed_events.unsubscribe(evt_type);
                }
            }
            InternalAction::DeferredCallback { func, cookie } => {
                func(cookie);
            }
            InternalAction::PrivateEvent {
                evt_type,
                data,
                free_info,
                to_tid,
            } => {
                if let Some(task) = self.registry.find_by_tid_mut(to_tid) {
                    let mut unretainable = None;
                    let mut slot = RetentionSlot {
                        free_info: &mut unretainable,
                    };
                    self.runtime.handle(&task.app_header, &mut task.platform_info, evt_type, data, &mut slot);
                }
                apply_free_info(&mut self.registry, &mut self.runtime, evt_type, data, free_info);
            }
        }
    }

    fn broadcast(&mut self, evt_type: u32, data: *mut u8) {
        let raw_type = evt_type & !EVENT_TYPE_BIT_DISCARDABLE;
        let tids: Vec<u32> = self.registry.iter().map(|t| t.tid).collect();
        for tid in tids {
            let Some(task) = self.registry.find_by_tid_mut(tid) else {
                continue;
            };
            if !task.subscribed_events.contains(raw_type) {
                continue;
            }
            let mut slot = RetentionSlot {
                free_info: &mut self.current_event_free_info,
            };
            self.runtime.handle(&task.app_header, &mut task.platform_info, raw_type, data, &mut slot);
        }
    }
}
