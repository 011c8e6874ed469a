//! Fixed-capacity table of live apps with unique task ids.

use heapless::Vec as FixedVec;

use super::apps::AppHdr;
use super::subscriptions::SubscriptionList;

/// Maximum number of simultaneously live tasks.
pub const MAX_TASKS: usize = 16;

/// Lowest tid ever handed out by [`TaskRegistry::allocate_tid`].
pub const FIRST_VALID_TID: u32 = 1;

/// Highest tid ever handed out by [`TaskRegistry::allocate_tid`].
pub const LAST_VALID_TID: u32 = 0x7FFF_FFFF;

/// Opaque per-app state handed back by the (external) loader. Never
/// interpreted by the kernel; carried so `stop_task`/`app_end` can return
/// it to the loader for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo(pub *mut u8);

/// One running app.
#[derive(Debug, Clone)]
pub struct Task {
    /// Non-zero, unique among live tasks.
    pub tid: u32,
    pub app_header: AppHdr,
    pub platform_info: PlatformInfo,
    pub subscribed_events: SubscriptionList,
}

impl Task {
    #[must_use]
    pub fn new(tid: u32, app_header: AppHdr, platform_info: PlatformInfo) -> Self {
        debug_assert_ne!(tid, 0, "tid 0 denotes an empty slot");
        Self {
            tid,
            app_header,
            platform_info,
            subscribed_events: SubscriptionList::new(),
        }
    }
}

/// Fixed-capacity task table, at most [`MAX_TASKS`] live tasks.
pub struct TaskRegistry {
    tasks: FixedVec<Task, MAX_TASKS>,
    next_tid: u32,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: FixedVec::new(),
            next_tid: FIRST_VALID_TID.wrapping_sub(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tasks.len() == MAX_TASKS
    }

    #[must_use]
    pub fn iter(&self) -> core::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    #[must_use]
    pub fn find_by_tid(&self, tid: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.tid == tid)
    }

    #[must_use]
    pub fn find_by_tid_mut(&mut self, tid: u32) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.tid == tid)
    }

    #[must_use]
    pub fn find_by_app_id(&self, app_id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.app_header.app_id == app_id)
    }

    #[must_use]
    pub fn tid_for_app_id(&self, app_id: u64) -> Option<u32> {
        self.find_by_app_id(app_id).map(|t| t.tid)
    }

    #[must_use]
    pub fn app_info_by_index(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// The next id in a monotonically advancing counter restricted to
    /// `[FIRST_VALID_TID, LAST_VALID_TID]`, wrapping and skipping any
    /// value already live.
    pub fn allocate_tid(&mut self) -> u32 {
        loop {
            self.next_tid = self.next_tid.wrapping_add(1);
            if self.next_tid > LAST_VALID_TID || self.next_tid < FIRST_VALID_TID {
                self.next_tid = FIRST_VALID_TID;
            }
            if self.find_by_tid(self.next_tid).is_none() {
                return self.next_tid;
            }
        }
    }

    /// Insert `task`. Fails (returning the task back) if the registry is
    /// at [`MAX_TASKS`] capacity; the caller must treat this as "app not
    /// started" and release platform resources.
    pub fn insert(&mut self, task: Task) -> Result<(), Task> {
        self.tasks.push(task)
    }

    /// Remove the task with this tid via swap-with-last. Does not
    /// preserve order. Returns the removed task, if found.
    pub fn remove(&mut self, tid: u32) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.tid == tid)?;
        Some(self.tasks.swap_remove(pos))
    }
}
