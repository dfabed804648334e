//! Cycle collecting garbage collector.
//!
//! Reference counting ([`CountPtr`]) frees acyclic garbage eagerly. The
//! [`GarbageCollector`] exists to reclaim cycles, which are routine in a
//! dataflow graph (every connected `Input` and `Output` point at each other).
//!
//! # Algorithm
//!
//! Objects register with a collector when they are created. On [`run`]:
//!
//! 1. Every live registration is upgraded. Dead ones are pruned.
//! 2. Each object reports its owned children through [`Tracer`]. Children
//!    are counted as incoming internal references.
//! 3. An object whose strong count exceeds its internal references is held
//!    from outside the object graph and is a root.
//! 4. Everything reachable from a root is marked.
//! 5. Unmarked objects get [`Collectable::gc_clear`], which breaks their
//!    outgoing edges, and are destroyed when the last temporary handle drops.
//!
//! Worker threads hold a [`MutatorGuard`] while they touch the object graph.
//! `run` waits for all guards to be released before counting, so the count
//! snapshot and the trace see the same graph.
//!
//! [`run`]: GarbageCollector::run

mod ptr;

pub use ptr::{CountPtr, WeakPtr};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, Weak};

/// An object that can take part in a reference cycle.
///
/// Both methods are called with the world stopped. A panic in either is a
/// broken contract and aborts the process.
pub trait Collectable: Send + Sync + 'static {
    /// Report every [`CountPtr`] this object owns, once per pointer.
    fn gc_children(&self, tracer: &mut Tracer);

    /// Drop every owned [`CountPtr`]. Called only on unreachable objects.
    fn gc_clear(&self);
}

/// Collects the outgoing edges reported by one object.
#[derive(Debug, Default)]
pub struct Tracer {
    edges: Vec<usize>,
}

impl Tracer {
    pub fn edge<T: ?Sized>(&mut self, child: &CountPtr<T>) {
        self.edges.push(CountPtr::addr(child));
    }

    pub fn edge_opt<T: ?Sized>(&mut self, child: Option<&CountPtr<T>>) {
        if let Some(child) = child {
            self.edge(child);
        }
    }
}

/// Result of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Live registered objects at the start of the run.
    pub tracked: usize,
    /// Objects held from outside the tracked graph.
    pub roots: usize,
    /// Unreachable objects cleared in this run.
    pub collected: usize,
}

/// Held by a thread while it may mutate the object graph.
pub struct MutatorGuard<'a> {
    _guard: RwLockReadGuard<'a, ()>,
}

/// Registry of collectable objects plus the stop-the-world lock.
pub struct GarbageCollector {
    registry: Mutex<Vec<Weak<dyn Collectable>>>,
    pause: RwLock<()>,
    last: Mutex<CollectStats>,
}

impl GarbageCollector {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Vec::new()),
            pause: RwLock::new(()),
            last: Mutex::new(CollectStats::default()),
        }
    }

    /// Allocate `value` and register it for cycle collection.
    pub fn track<T: Collectable>(&self, value: T) -> CountPtr<T> {
        let ptr = CountPtr::new(value);
        self.register(&ptr);
        ptr
    }

    /// Register an already allocated object.
    pub fn register<T: Collectable>(&self, ptr: &CountPtr<T>) {
        let strong: Arc<dyn Collectable> = ptr.0.clone();
        let weak = Arc::downgrade(&strong);
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(weak);
    }

    /// Enter a mutator section. Collection waits until the guard drops.
    pub fn enter(&self) -> MutatorGuard<'_> {
        MutatorGuard {
            _guard: self.pause.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Number of registrations whose object is still alive.
    pub fn tracked(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Statistics of the most recent run.
    pub fn stats(&self) -> CollectStats {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one full collection.
    pub fn run(&self) -> CollectStats {
        let _world = self.pause.write().unwrap_or_else(PoisonError::into_inner);

        let objects: Vec<Arc<dyn Collectable>> = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let mut live = Vec::with_capacity(registry.len());
            registry.retain(|weak| match weak.upgrade() {
                Some(strong) => {
                    live.push(strong);
                    true
                }
                None => false,
            });
            live
        };

        let index: HashMap<usize, usize> = objects
            .iter()
            .enumerate()
            .map(|(i, obj)| (Arc::as_ptr(obj) as *const () as usize, i))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); objects.len()];
        let mut incoming = vec![0usize; objects.len()];
        for (i, obj) in objects.iter().enumerate() {
            let mut tracer = Tracer::default();
            contract("gc_children", || obj.gc_children(&mut tracer));
            for addr in tracer.edges {
                if let Some(&j) = index.get(&addr) {
                    incoming[j] += 1;
                    children[i].push(j);
                }
            }
        }

        let mut marked = vec![false; objects.len()];
        let mut worklist: Vec<usize> = Vec::new();
        let mut roots = 0;
        for (i, obj) in objects.iter().enumerate() {
            // One strong reference is the temporary held in `objects`.
            let external = Arc::strong_count(obj).saturating_sub(1 + incoming[i]);
            if external > 0 {
                roots += 1;
                marked[i] = true;
                worklist.push(i);
            }
        }
        while let Some(i) = worklist.pop() {
            for &j in &children[i] {
                if !marked[j] {
                    marked[j] = true;
                    worklist.push(j);
                }
            }
        }

        let mut collected = 0;
        for (obj, _) in objects.iter().zip(&marked).filter(|(_, m)| !**m) {
            contract("gc_clear", || obj.gc_clear());
            collected += 1;
        }

        let stats = CollectStats {
            tracked: objects.len(),
            roots,
            collected,
        };
        drop(objects);

        tracing::debug!(
            "GC run: {} tracked, {} roots, {} collected",
            stats.tracked,
            stats.roots,
            stats.collected
        );
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = stats;
        stats
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn contract(what: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!("Collectable::{} panicked; object graph is corrupt", what);
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Link {
        next: Mutex<Option<CountPtr<Link>>>,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for Link {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl Collectable for Link {
        fn gc_children(&self, tracer: &mut Tracer) {
            tracer.edge_opt(self.next.lock().unwrap().as_ref());
        }

        fn gc_clear(&self) {
            let next = self.next.lock().unwrap().take();
            drop(next);
        }
    }

    fn link(gc: &GarbageCollector) -> (CountPtr<Link>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let ptr = gc.track(Link {
            next: Mutex::new(None),
            dropped: dropped.clone(),
        });
        (ptr, dropped)
    }

    fn ring(gc: &GarbageCollector, n: usize) -> (Vec<CountPtr<Link>>, Vec<Arc<AtomicBool>>) {
        let (links, flags): (Vec<_>, Vec<_>) = (0..n).map(|_| link(gc)).unzip();
        for i in 0..n {
            *links[i].next.lock().unwrap() = Some(links[(i + 1) % n].clone());
        }
        (links, flags)
    }

    #[test]
    fn test_ring_is_collected() {
        let gc = GarbageCollector::new();
        let (links, flags) = ring(&gc, 5);
        drop(links);
        assert!(flags.iter().all(|f| !f.load(Ordering::SeqCst)));

        let stats = gc.run();
        assert_eq!(stats.collected, 5);
        assert_eq!(stats.roots, 0);
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
        assert_eq!(gc.tracked(), 0);
    }

    #[test]
    fn test_rooted_ring_survives() {
        let gc = GarbageCollector::new();
        let (mut links, flags) = ring(&gc, 3);
        let keep = links.remove(0);
        drop(links);

        let stats = gc.run();
        assert_eq!(stats.collected, 0);
        assert_eq!(stats.roots, 1);
        assert!(flags.iter().all(|f| !f.load(Ordering::SeqCst)));

        drop(keep);
        gc.run();
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }

    #[test]
    fn test_sub_ring_held_by_root() {
        let gc = GarbageCollector::new();
        let (root, root_dropped) = link(&gc);
        let (sub, flags) = ring(&gc, 2);
        *root.next.lock().unwrap() = Some(sub[0].clone());
        drop(sub);

        gc.run();
        assert!(flags.iter().all(|f| !f.load(Ordering::SeqCst)));

        let released = root.next.lock().unwrap().take();
        drop(released);
        gc.run();
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
        assert!(!root_dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_acyclic_garbage_is_freed_eagerly() {
        let gc = GarbageCollector::new();
        let (a, a_dropped) = link(&gc);
        let (b, b_dropped) = link(&gc);
        *a.next.lock().unwrap() = Some(b);
        drop(a);
        assert!(a_dropped.load(Ordering::SeqCst));
        assert!(b_dropped.load(Ordering::SeqCst));
        assert_eq!(gc.run().tracked, 0);
    }

    #[test]
    fn test_untracked_object_is_ignored() {
        let gc = GarbageCollector::new();
        let dropped = Arc::new(AtomicBool::new(false));
        let a = CountPtr::new(Link {
            next: Mutex::new(None),
            dropped: dropped.clone(),
        });
        *a.next.lock().unwrap() = Some(a.clone());
        drop(a);

        assert_eq!(gc.run().tracked, 0);
        // A self-cycle outside any collector leaks by construction.
        assert!(!dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_waits_for_mutators() {
        let gc = Arc::new(GarbageCollector::new());
        let guard = gc.enter();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let collector = {
            let gc = gc.clone();
            std::thread::spawn(move || {
                let stats = gc.run();
                tx.send(stats).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        collector.join().unwrap();
        assert_eq!(gc.stats(), CollectStats::default());
    }
}
