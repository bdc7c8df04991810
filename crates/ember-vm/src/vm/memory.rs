//! Root set and collection entry points

use crate::heap::GcStats;
use crate::value::ObjRef;
use crate::vm::VM;

impl VM {
    /// Collect now, tracing from every VM root
    pub fn collect_garbage(&mut self) -> GcStats {
        self.sync_running_footprint();
        let roots = self.roots();
        self.heap.collect(roots)
    }

    /// Collect if the heap crossed its threshold (or on every safe point under stress)
    pub(crate) fn maybe_collect(&mut self) {
        self.sync_running_footprint();
        if self.config.gc_stress || self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Report the running fiber's current size to the heap
    pub(crate) fn sync_running_footprint(&mut self) {
        if let Some(running) = &mut self.running {
            let size = running.fiber.footprint();
            if size != running.accounted {
                self.heap.reallocate(running.accounted, size);
                running.accounted = size;
            }
        }
    }

    fn roots(&self) -> Vec<ObjRef> {
        let mut roots = Vec::new();

        if let Some(running) = &self.running {
            roots.push(running.id);
            roots.extend(running.fiber.caller);
            roots.extend(running.fiber.module);
            for v in running.fiber.stack.values() {
                roots.extend(v.as_object());
            }
            for frame in &running.fiber.frames {
                roots.push(frame.function);
                roots.extend(frame.scope);
            }
        }

        roots.extend(self.root_fiber);
        roots.extend(self.ready.iter().copied());
        roots.extend(self.events.fibers());
        roots.extend(self.timers.fibers());
        roots.extend(self.module_stack.iter().copied());

        for table in [&self.globals, &self.modules] {
            for (key, v) in table {
                roots.push(*key);
                roots.extend(v.as_object());
            }
        }
        roots.extend(self.intrinsics.roots());
        roots
    }
}
