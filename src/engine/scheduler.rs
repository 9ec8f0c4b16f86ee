use crate::synth::voice::VoiceId;

/// A deferred removal from the Active Voice Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupTask {
    pub voice: VoiceId,
    pub due: u64,
}

/// Deferred cleanup keyed by voice identity.
///
/// Tasks are never cancelled. A task whose voice has since been replaced
/// simply finds nothing to remove.
pub struct Scheduler {
    tasks: Vec<CleanupTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Vec::with_capacity(capacity),
        }
    }

    pub fn enqueue(&mut self, voice: VoiceId, due: u64) {
        self.tasks.push(CleanupTask { voice, due });
    }

    /// Run every task due at or before `now`, in due order.
    pub fn tick(&mut self, now: u64, mut run: impl FnMut(VoiceId)) {
        if self.tasks.iter().all(|task| task.due > now) {
            return;
        }

        let mut due: Vec<CleanupTask> = Vec::new();
        self.tasks.retain(|task| {
            if task.due <= now {
                due.push(*task);
                false
            } else {
                true
            }
        });

        due.sort_by_key(|task| task.due);
        for task in due {
            run(task.voice);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_only_due_tasks() {
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(VoiceId::new(1), 100);
        scheduler.enqueue(VoiceId::new(2), 300);

        let mut ran = Vec::new();
        scheduler.tick(150, |id| ran.push(id));

        assert_eq!(ran, vec![VoiceId::new(1)]);

        scheduler.tick(299, |id| ran.push(id));
        assert_eq!(ran.len(), 1);
        scheduler.tick(300, |id| ran.push(id));
        assert_eq!(ran, vec![VoiceId::new(1), VoiceId::new(2)]);
    }

    #[test]
    fn due_tasks_run_in_due_order_and_once() {
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(VoiceId::new(2), 200);
        scheduler.enqueue(VoiceId::new(1), 100);

        let mut ran = Vec::new();
        scheduler.tick(1_000, |id| ran.push(id));
        scheduler.tick(2_000, |id| ran.push(id));

        assert_eq!(ran, vec![VoiceId::new(1), VoiceId::new(2)]);
    }

    #[test]
    fn task_due_exactly_now_runs() {
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(VoiceId::new(1), 500);

        let mut count = 0;
        scheduler.tick(499, |_| count += 1);
        assert_eq!(count, 0);
        scheduler.tick(500, |_| count += 1);
        assert_eq!(count, 1);
    }
}
