// scene/graph.rs
// The scene-graph abstraction the lifecycle logic owns. The rendering
// collaborator mirrors these entities into its own object model; everything
// here is renderer-independent and drives attach/detach, ancestor lookup and
// visibility checks.

use hecs::{Entity, World};

use crate::cache::CachedBlob;
use crate::descriptor::InteractionSpec;
use crate::pipeline::MediaHandle;
use crate::scene::mixer::MixerId;
use crate::scene::Transform;

// ============================================================================
// Components
// ============================================================================

/// Lookup name (the descriptor id for asset roots).
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Local transform (position, rotation, scale).
#[derive(Debug, Clone, Copy)]
pub struct TransformComponent(pub Transform);

#[derive(Debug, Clone, Copy)]
pub struct Visible(pub bool);

impl Default for Visible {
    fn default() -> Self {
        Self(true)
    }
}

/// Parent entity reference.
#[derive(Debug, Clone, Copy)]
pub struct Parent(pub Entity);

/// List of children entities.
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<Entity>);

/// Marks an anchor root. Its transform follows the tracked physical target
/// and is driven by the tracking collaborator.
#[derive(Debug, Clone, Copy)]
pub struct AnchorRoot;

/// Planar render surface (decoded image or video frame target), sized in
/// scene units with the aspect ratio already applied.
#[derive(Clone, Debug)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
    pub opacity: f32,
    pub source: SurfaceSource,
}

#[derive(Clone, Debug)]
pub enum SurfaceSource {
    Image(CachedBlob),
    Video(CachedBlob),
}

/// Playback state handle for a video or audio carrier.
#[derive(Clone)]
pub struct Media(pub MediaHandle);

/// Interaction metadata; presence makes the subtree clickable.
#[derive(Debug, Clone)]
pub struct Interaction(pub InteractionSpec);

/// Reference to the animation mixer bound to this asset.
#[derive(Debug, Clone, Copy)]
pub struct MixerRef(pub MixerId);

/// Oversized, invisible-to-render surface used only for ray testing, placed
/// slightly in front of its owner so imprecise geometry still catches clicks.
#[derive(Debug, Clone, Copy)]
pub struct HitProxy {
    pub width: f32,
    pub height: f32,
}

// ============================================================================
// Graph
// ============================================================================

pub struct SceneGraph {
    pub world: World,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            world: World::new(),
        }
    }

    pub fn spawn_anchor(&mut self, name: impl Into<String>) -> Entity {
        self.world.spawn((
            AnchorRoot,
            Name::new(name),
            TransformComponent(Transform::IDENTITY),
            Visible(true),
            Children::default(),
        ))
    }

    /// Attach `child` under `parent`, maintaining both link directions.
    pub fn attach(&mut self, parent: Entity, child: Entity) {
        let _ = self.world.insert_one(child, Parent(parent));
        let pushed = match self.world.get::<&mut Children>(parent) {
            Ok(mut children) => {
                children.0.push(child);
                true
            }
            Err(_) => false,
        };
        if !pushed {
            let _ = self.world.insert_one(parent, Children(vec![child]));
        }
    }

    /// Remove `child` from its parent's child list and drop its parent link.
    pub fn detach(&mut self, child: Entity) {
        let parent = match self.world.remove_one::<Parent>(child) {
            Ok(Parent(parent)) => parent,
            Err(_) => return,
        };
        if let Ok(mut children) = self.world.get::<&mut Children>(parent) {
            children.0.retain(|&c| c != child);
        }
    }

    /// Despawn `root` and every entity below it.
    pub fn despawn_subtree(&mut self, root: Entity) {
        self.detach(root);
        let mut stack = vec![root];
        let mut doomed = Vec::new();
        while let Some(entity) = stack.pop() {
            if let Ok(children) = self.world.get::<&Children>(entity) {
                stack.extend(children.0.iter().copied());
            }
            doomed.push(entity);
        }
        for entity in doomed {
            let _ = self.world.despawn(entity);
        }
    }

    /// The ownership chain starting at `entity` itself and walking parent
    /// links up to the root.
    pub fn ancestors(&self, entity: Entity) -> Ancestors<'_> {
        Ancestors {
            world: &self.world,
            next: Some(entity),
        }
    }

    /// True when `entity` and every ancestor up to the root are visible.
    /// Entities without a `Visible` component count as visible.
    pub fn subtree_visible(&self, entity: Entity) -> bool {
        self.ancestors(entity).all(|e| {
            self.world
                .get::<&Visible>(e)
                .map(|visible| visible.0)
                .unwrap_or(true)
        })
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) {
        let _ = self.world.insert_one(entity, Visible(visible));
    }

    pub fn name(&self, entity: Entity) -> Option<String> {
        self.world.get::<&Name>(entity).ok().map(|n| n.0.clone())
    }

    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<&Children>(entity)
            .map(|c| c.0.clone())
            .unwrap_or_default()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Ancestors<'w> {
    world: &'w World,
    next: Option<Entity>,
}

impl Iterator for Ancestors<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next?;
        self.next = self
            .world
            .get::<&Parent>(current)
            .ok()
            .map(|parent| parent.0);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_walk_to_the_root() {
        let mut graph = SceneGraph::new();
        let anchor = graph.spawn_anchor("anchor-0");
        let mid = graph.world.spawn((Name::new("mid"), Visible(true)));
        let leaf = graph.world.spawn((Name::new("leaf"), Visible(true)));
        graph.attach(anchor, mid);
        graph.attach(mid, leaf);

        let chain: Vec<_> = graph.ancestors(leaf).collect();
        assert_eq!(chain, vec![leaf, mid, anchor]);
    }

    #[test]
    fn despawn_subtree_removes_descendants_and_parent_link() {
        let mut graph = SceneGraph::new();
        let anchor = graph.spawn_anchor("anchor-0");
        let mid = graph.world.spawn((Name::new("mid"),));
        let leaf = graph.world.spawn((Name::new("leaf"),));
        graph.attach(anchor, mid);
        graph.attach(mid, leaf);

        graph.despawn_subtree(mid);
        assert!(!graph.world.contains(mid));
        assert!(!graph.world.contains(leaf));
        assert!(graph.children(anchor).is_empty());
    }

    #[test]
    fn invisible_ancestor_hides_the_subtree() {
        let mut graph = SceneGraph::new();
        let anchor = graph.spawn_anchor("anchor-0");
        let child = graph.world.spawn((Name::new("child"), Visible(true)));
        graph.attach(anchor, child);

        assert!(graph.subtree_visible(child));
        graph.set_visible(anchor, false);
        assert!(!graph.subtree_visible(child));
    }
}
