//! Small effect runtime shared by every page behavior.
//!
//! Each behavior is a [`Machine`]: a plain state struct whose `update` turns a
//! message into effects. Effects either describe a DOM change (handed to a
//! [`View`]) or schedule a follow-up message. In the browser the scheduler is
//! backed by `gloo_timers`; tests drive the same machines with
//! [`testing::ManualRuntime`] and a virtual clock.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;

pub trait Machine {
    type Msg: 'static;
    type Patch;

    fn update(&mut self, msg: Self::Msg, fx: &mut Effects<Self::Msg, Self::Patch>);
}

/// Rendering port. Implementations own the DOM handles for one behavior.
pub trait View<P> {
    fn render(&self, patch: P);
}

pub enum Effect<M, P> {
    Render(P),
    Schedule { delay_ms: u32, generation: u64, msg: M },
    /// Cancel every pending task stamped with a generation lower than `before`.
    Invalidate { before: u64 },
}

pub struct Effects<M, P> {
    queue: Vec<Effect<M, P>>,
}

impl<M, P> Effects<M, P> {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub fn render(&mut self, patch: P) {
        self.queue.push(Effect::Render(patch));
    }

    pub fn schedule(&mut self, delay_ms: u32, generation: u64, msg: M) {
        self.queue.push(Effect::Schedule { delay_ms, generation, msg });
    }

    pub fn invalidate(&mut self, before: u64) {
        self.queue.push(Effect::Invalidate { before });
    }
}

impl<M, P> Default for Effects<M, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, P> IntoIterator for Effects<M, P> {
    type Item = Effect<M, P>;
    type IntoIter = std::vec::IntoIter<Effect<M, P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.queue.into_iter()
    }
}

/// Pending tasks keyed by id and stamped with their generation. `H` is the
/// handle that keeps a task alive (a `Timeout` in the browser).
pub struct TaskList<H> {
    tasks: Vec<(u64, u64, H)>,
    next_id: u64,
}

impl<H> TaskList<H> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: u64, generation: u64, handle: H) {
        self.tasks.push((id, generation, handle));
    }

    /// Removes a fired task and hands its handle back to the caller.
    pub fn take(&mut self, id: u64) -> Option<H> {
        let index = self.tasks.iter().position(|(task, _, _)| *task == id)?;
        Some(self.tasks.remove(index).2)
    }

    /// Drops every task older than `before`; returns how many went.
    pub fn invalidate(&mut self, before: u64) -> usize {
        let len = self.tasks.len();
        self.tasks.retain(|(_, generation, _)| *generation >= before);
        len - self.tasks.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<H> Default for TaskList<H> {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner<M, V> {
    machine: RefCell<M>,
    view: V,
    pending: RefCell<TaskList<Timeout>>,
}

/// Browser runtime: owns the machine, its view and its pending timers.
pub struct Runtime<M, V> {
    inner: Rc<Inner<M, V>>,
}

impl<M, V> Clone for Runtime<M, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M, V> Runtime<M, V>
where
    M: Machine + 'static,
    V: View<M::Patch> + 'static,
{
    pub fn new(machine: M, view: V) -> Self {
        Self {
            inner: Rc::new(Inner {
                machine: RefCell::new(machine),
                view,
                pending: RefCell::new(TaskList::new()),
            }),
        }
    }

    pub fn view(&self) -> &V {
        &self.inner.view
    }

    pub fn dispatch(&self, msg: M::Msg) {
        let mut fx = Effects::new();
        self.inner.machine.borrow_mut().update(msg, &mut fx);

        for effect in fx {
            match effect {
                Effect::Render(patch) => self.inner.view.render(patch),
                Effect::Schedule {
                    delay_ms,
                    generation,
                    msg,
                } => self.schedule(delay_ms, generation, msg),
                Effect::Invalidate { before } => {
                    // dropping a Timeout clears it
                    let stale = self.inner.pending.borrow_mut().invalidate(before);
                    if stale > 0 {
                        log::debug!("cancelling {} stale task(s)", stale);
                    }
                }
            }
        }
    }

    fn schedule(&self, delay_ms: u32, generation: u64, msg: M::Msg) {
        let id = self.inner.pending.borrow_mut().next_id();

        let runtime = self.clone();
        let timeout = Timeout::new(delay_ms, move || {
            // wasm-bindgen defers freeing a closure dropped while it runs, so
            // the handle can go out of scope after dispatch.
            let _fired = runtime.inner.pending.borrow_mut().take(id);
            runtime.dispatch(msg);
        });

        self.inner.pending.borrow_mut().insert(id, generation, timeout);
    }
}

#[cfg(test)]
pub mod testing {
    use super::{Effect, Effects, Machine};

    struct Queued<M> {
        due: u64,
        seq: u64,
        generation: u64,
        msg: M,
    }

    /// Virtual-clock runtime used by unit tests.
    pub struct ManualRuntime<M: Machine> {
        pub machine: M,
        now: u64,
        seq: u64,
        queue: Vec<Queued<M::Msg>>,
        rendered: Vec<(u64, M::Patch)>,
    }

    impl<M: Machine> ManualRuntime<M> {
        pub fn new(machine: M) -> Self {
            Self {
                machine,
                now: 0,
                seq: 0,
                queue: Vec::new(),
                rendered: Vec::new(),
            }
        }

        pub fn now(&self) -> u64 {
            self.now
        }

        pub fn pending(&self) -> usize {
            self.queue.len()
        }

        pub fn dispatch(&mut self, msg: M::Msg) {
            let mut fx = Effects::new();
            self.machine.update(msg, &mut fx);
            for effect in fx {
                match effect {
                    Effect::Render(patch) => self.rendered.push((self.now, patch)),
                    Effect::Schedule {
                        delay_ms,
                        generation,
                        msg,
                    } => {
                        self.queue.push(Queued {
                            due: self.now + u64::from(delay_ms),
                            seq: self.seq,
                            generation,
                            msg,
                        });
                        self.seq += 1;
                    }
                    Effect::Invalidate { before } => {
                        self.queue.retain(|q| q.generation >= before);
                    }
                }
            }
        }

        /// Runs every task due up to and including `now + ms`, in due order.
        pub fn advance(&mut self, ms: u64) {
            let target = self.now + ms;
            loop {
                let next = self
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, q)| q.due <= target)
                    .min_by_key(|(_, q)| (q.due, q.seq))
                    .map(|(index, _)| index);
                let Some(index) = next else { break };
                let task = self.queue.remove(index);
                self.now = task.due;
                self.dispatch(task.msg);
            }
            self.now = target;
        }

        pub fn take_rendered(&mut self) -> Vec<(u64, M::Patch)> {
            std::mem::take(&mut self.rendered)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::TaskList;

    struct Handle(Rc<Cell<usize>>);

    impl Drop for Handle {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn fired_task_is_released_not_kept() {
        let dropped = Rc::new(Cell::new(0));
        let mut tasks = TaskList::new();
        for generation in [1, 1, 1] {
            let id = tasks.next_id();
            tasks.insert(id, generation, Handle(dropped.clone()));
        }

        let fired = tasks.take(1);
        assert!(fired.is_some());
        assert_eq!(tasks.len(), 2);
        drop(fired);
        assert_eq!(dropped.get(), 1);
        assert!(tasks.take(1).is_none());
    }

    #[test]
    fn invalidate_drops_only_older_generations() {
        let dropped = Rc::new(Cell::new(0));
        let mut tasks = TaskList::new();
        for generation in [1, 2, 2, 3] {
            let id = tasks.next_id();
            tasks.insert(id, generation, Handle(dropped.clone()));
        }

        assert_eq!(tasks.invalidate(3), 3);
        assert_eq!(dropped.get(), 3);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.invalidate(3), 0);
    }

    #[test]
    fn all_tasks_fire_once_then_the_list_is_empty() {
        let mut tasks: TaskList<()> = TaskList::new();
        let ids: Vec<u64> = (0..4)
            .map(|_| {
                let id = tasks.next_id();
                tasks.insert(id, 0, ());
                id
            })
            .collect();
        for id in ids {
            assert!(tasks.take(id).is_some());
        }
        assert!(tasks.is_empty());
    }
}
