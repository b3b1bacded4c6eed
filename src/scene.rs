//! Contract onto the compositor's scene graph: a stream of damage.

use std::sync::Arc;

use smithay::utils::{Physical, Rectangle};

/// Observer callbacks for scene content changes.
///
/// Either callback may be invoked on the scene's own context; receivers
/// re-dispatch onto the wayland context before touching protocol state.
pub struct SceneChangeNotification {
    scene_changed: Box<dyn Fn() + Send + Sync>,
    damaged: Box<dyn Fn(i32, Rectangle<i32, Physical>) + Send + Sync>,
}

impl SceneChangeNotification {
    pub fn new(
        scene_changed: impl Fn() + Send + Sync + 'static,
        damaged: impl Fn(i32, Rectangle<i32, Physical>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            scene_changed: Box::new(scene_changed),
            damaged: Box::new(damaged),
        }
    }

    /// The scene changed without a meaningful damage rectangle; consumers
    /// treat everything as damaged.
    pub fn scene_changed(&self) {
        (self.scene_changed)()
    }

    /// A rectangle of `layer` took damage, in global coordinates.
    pub fn damaged(&self, layer: i32, damage: Rectangle<i32, Physical>) {
        (self.damaged)(layer, damage)
    }
}

/// The scene, as far as screencopy cares: something observers can be hung
/// onto.
pub trait SurfaceStack: Send + Sync {
    fn add_observer(&self, observer: Arc<SceneChangeNotification>);
    fn remove_observer(&self, observer: &Arc<SceneChangeNotification>);
}
