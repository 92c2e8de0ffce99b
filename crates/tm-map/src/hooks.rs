use crate::cell::{CellLabel, DartLabel};
use crate::error::{Error, Result};
use crate::map::PlanarMap;

/// Observer of map modifications.
///
/// Pre-operation callbacks may veto by returning `false`; the operation
/// then aborts with `HookVetoed` before any mutation, and later hooks of
/// the same pre-phase are not invoked. Post-operation callbacks run after
/// all mutations and cache updates. Observers see the map read-only and
/// must not call back into its operations.
#[allow(unused_variables)]
pub trait MapHook {
    /// A node is about to be removed (standalone isolated-node removal,
    /// or the merged node of `merge_edges`).
    fn remove_node(&mut self, map: &PlanarMap, node: CellLabel) -> bool {
        true
    }

    fn pre_merge_edges(&mut self, map: &PlanarMap, dart: DartLabel) -> bool {
        true
    }

    fn post_merge_edges(&mut self, map: &PlanarMap, survivor: CellLabel) {}

    fn pre_remove_bridge(&mut self, map: &PlanarMap, dart: DartLabel) -> bool {
        true
    }

    fn post_remove_bridge(&mut self, map: &PlanarMap, survivor: CellLabel) {}

    fn pre_merge_faces(&mut self, map: &PlanarMap, dart: DartLabel) -> bool {
        true
    }

    fn post_merge_faces(&mut self, map: &PlanarMap, survivor: CellLabel) {}

    /// Pixels reclaimed from an edge rasterization were assigned to
    /// `face`.
    fn associate_pixels(&mut self, map: &PlanarMap, face: CellLabel, pixels: &[(usize, usize)]) {}
}

impl PlanarMap {
    /// Registers an observer; observers are called in registration order.
    pub fn add_hook(&mut self, hook: Box<dyn MapHook>) {
        self.hooks.push(hook);
    }

    pub fn clear_hooks(&mut self) {
        self.hooks.clear();
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn fire_pre<F>(&mut self, op: &'static str, mut pre: F) -> Result<()>
    where
        F: FnMut(&mut dyn MapHook, &PlanarMap) -> bool,
    {
        if self.hooks.is_empty() {
            return Ok(());
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        let mut vetoed = false;
        for hook in hooks.iter_mut() {
            if !pre(hook.as_mut(), self) {
                vetoed = true;
                break;
            }
        }
        self.hooks = hooks;
        if vetoed { Err(Error::HookVetoed { op }) } else { Ok(()) }
    }

    pub(crate) fn fire_post<F>(&mut self, mut post: F)
    where
        F: FnMut(&mut dyn MapHook, &PlanarMap),
    {
        if self.hooks.is_empty() {
            return;
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        for hook in hooks.iter_mut() {
            post(hook.as_mut(), self);
        }
        self.hooks = hooks;
    }

    /// Runs the remove-node hooks. With `honor_veto`, stops at the first
    /// `false` and reports it; otherwise all observers are notified and
    /// the removal proceeds regardless.
    pub(crate) fn notify_remove_node(&mut self, node: CellLabel, honor_veto: bool) -> bool {
        if self.hooks.is_empty() {
            return true;
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        let mut allowed = true;
        for hook in hooks.iter_mut() {
            if !hook.remove_node(self, node) {
                allowed = false;
                if honor_veto {
                    break;
                }
            }
        }
        self.hooks = hooks;
        allowed || !honor_veto
    }

    /// Books reclaimed raster pixels onto `face` and notifies observers.
    pub(crate) fn associate_pixels(&mut self, face: CellLabel, pixels: &[(usize, usize)]) {
        if let Some(f) = self.face_mut(face) {
            f.pixel_area += pixels.len() as i64;
        }
        self.fire_post(|hook, map| hook.associate_pixels(map, face, pixels));
    }
}
