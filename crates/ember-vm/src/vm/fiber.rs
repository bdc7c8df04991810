//! Fiber scheduling
//!
//! Switching is a take/put on the heap slot: the running fiber's body is
//! moved out of its `ObjData::Fiber` slot into [`Running`] and moved back
//! when it yields, finishes or is preempted. A fiber that hands control to
//! another is `Waiting` and is resumed when that fiber leaves.

use crate::error::VmError;
use crate::events::Event;
use crate::object::{FiberKind, FiberState, ObjData, ObjFiber};
use crate::value::{ObjRef, Value};
use crate::vm::{CallFrame, Running, Stack, VM};
use std::time::Duration;
use tracing::debug;

impl VM {
    /// Allocate a fiber whose stack is `[function, args...]` with one frame
    pub(crate) fn new_fiber(
        &mut self,
        kind: FiberKind,
        function: ObjRef,
        args: &[Value],
        module: Option<ObjRef>,
    ) -> Result<ObjRef, VmError> {
        let (chunk, scope) = {
            let f = self.heap.function(function)?;
            (f.chunk.clone(), f.module)
        };

        let mut fiber = ObjFiber::new(kind, Stack::new(self.config.stack_slots()));
        fiber.stack.push(Value::object(function))?;
        for arg in args {
            fiber.stack.push(*arg)?;
        }
        fiber.frames.push(CallFrame::new(function, chunk, 0, scope));
        fiber.module = module;

        Ok(self.heap.alloc(ObjData::Fiber(Some(Box::new(fiber)))))
    }

    pub(crate) fn fiber_state(&self, id: ObjRef) -> Option<FiberState> {
        if let Some(running) = &self.running {
            if running.id == id {
                return Some(running.fiber.state);
            }
        }
        match &self.heap.get(id).ok()?.data {
            ObjData::Fiber(Some(body)) => Some(body.state),
            _ => None,
        }
    }

    /// Take a parked fiber's body out of the heap and make it current
    fn enter(&mut self, id: ObjRef) -> Result<(), VmError> {
        let mut fiber = self
            .heap
            .mutate(id, |obj| match &mut obj.data {
                ObjData::Fiber(body) => body.take(),
                _ => None,
            })?
            .ok_or_else(|| VmError::Runtime("fiber cannot be resumed".into()))?;

        fiber.state = FiberState::Running;
        let accounted = fiber.footprint();
        self.heap.reallocate(0, accounted);
        self.running = Some(Running {
            id,
            fiber,
            accounted,
        });
        Ok(())
    }

    /// Park the running fiber back in its heap slot
    fn leave(&mut self, state: FiberState) -> Result<(), VmError> {
        let Some(Running {
            id,
            mut fiber,
            accounted,
        }) = self.running.take()
        else {
            return Ok(());
        };

        fiber.state = state;
        if state == FiberState::Done {
            fiber.stack.truncate(0);
            fiber.frames.clear();
        }
        self.heap.reallocate(accounted, 0);
        self.heap.mutate(id, move |obj| {
            if let ObjData::Fiber(slot) = &mut obj.data {
                *slot = Some(fiber);
            }
        })
    }

    /// Switch to `target`, leaving the current fiber (if any) waiting on it
    pub(crate) fn resume_fiber(&mut self, target: ObjRef) -> Result<(), VmError> {
        match self.fiber_state(target) {
            Some(FiberState::Ready | FiberState::Suspended) => {}
            state => {
                debug!(fiber = ?target, ?state, "fiber is not resumable, ignoring");
                return Ok(());
            }
        }

        let current = self.running.as_ref().map(|running| running.id);
        if current.is_some() {
            self.leave(FiberState::Waiting)?;
        }
        self.enter(target)?;
        self.fiber_mut()?.caller = current;
        Ok(())
    }

    /// Leave the running fiber in `state` and wake its caller if it is waiting
    fn return_to_caller(&mut self, state: FiberState) -> Result<(), VmError> {
        let caller = self
            .running
            .as_ref()
            .and_then(|running| running.fiber.caller);
        self.leave(state)?;

        if let Some(caller) = caller {
            if self.fiber_state(caller) == Some(FiberState::Waiting) {
                self.enter(caller)?;
            }
        }
        Ok(())
    }

    /// Suspend the running fiber until `delay` has passed
    pub(crate) fn park_running(&mut self, delay: Duration) -> Result<(), VmError> {
        let id = self.running_id()?;
        self.timers.start(delay, id);
        debug!(fiber = ?id, ?delay, "fiber parked on timer");
        self.return_to_caller(FiberState::Suspended)
    }

    /// The running fiber returned from its outermost frame
    pub(crate) fn finish_running(&mut self) -> Result<(), VmError> {
        let (id, kind, module) = {
            let running = self.running.as_ref().ok_or_else(|| {
                VmError::Runtime("no fiber is running".into())
            })?;
            (running.id, running.fiber.kind, running.fiber.module)
        };

        if kind == FiberKind::Module {
            if let Some(module) = module {
                self.complete_module(module)?;
            }
        }
        if self.root_fiber == Some(id) {
            self.root_fiber = None;
        }
        debug!(fiber = ?id, ?kind, "fiber finished");
        self.return_to_caller(FiberState::Done)
    }

    /// Replace the call region of an async function with nil and queue a fiber for it
    pub(crate) fn spawn_async(&mut self, function: ObjRef, argc: usize) -> Result<(), VmError> {
        let current = self.running_id()?;
        let stack = &mut self.fiber_mut()?.stack;
        let args = stack.top_slice(argc)?;
        let base = stack.len() - argc - 1;
        stack.truncate(base);
        stack.push(Value::NIL)?;

        let spawned = self.new_fiber(FiberKind::Async, function, &args, None)?;
        self.heap.mutate(spawned, |obj| {
            if let ObjData::Fiber(Some(body)) = &mut obj.data {
                body.caller = Some(current);
            }
        })?;
        self.ready.push_back(spawned);
        debug!(fiber = ?spawned, "spawned async fiber");
        Ok(())
    }

    /// Start the oldest ready fiber; `false` if there was none
    pub(crate) fn start_next_ready(&mut self) -> Result<bool, VmError> {
        while let Some(fiber) = self.ready.pop_front() {
            if self.fiber_state(fiber) == Some(FiberState::Ready) {
                self.resume_fiber(fiber)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn handle_event(&mut self, event: Event) -> Result<(), VmError> {
        match event {
            Event::ResumeFiber(fiber) => {
                debug!(?fiber, "timer fired");
                self.resume_fiber(fiber)
            }
            Event::CollectGarbage => {
                self.collect_garbage();
                Ok(())
            }
        }
    }
}
