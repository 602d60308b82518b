//! Render surface capability and the batch attacher.

use tracing::debug;

use foodfacts_shared::Result;

use crate::node::RenderNode;

/// Handle to a resolved container on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub usize);

/// Anything the pipeline can render into.
///
/// Surfaces own their containers; the pipeline never creates them.
pub trait RenderSurface {
    /// Create a node for this surface. Builders go through here so a surface
    /// can decorate or restyle what the pipeline produces.
    fn create_node(
        &self,
        tag: &str,
        class: Option<&str>,
        text: Option<String>,
        children: Vec<RenderNode>,
    ) -> RenderNode {
        RenderNode::build(tag, class, text, children)
    }

    /// Resolve a selector to exactly one existing container.
    ///
    /// Fails with `ContainerNotFound` when nothing matches.
    fn find_container(&self, selector: &str) -> Result<ContainerId>;

    /// Append `node` to the end of `container`. Existing children are kept.
    fn attach(&mut self, container: ContainerId, node: RenderNode);
}

/// Append every node to the container `selector` resolves to, in order.
///
/// The selector is resolved before anything is attached, so a missing
/// container leaves the surface untouched. Returns the number attached.
pub fn attach_all<S>(surface: &mut S, nodes: Vec<RenderNode>, selector: &str) -> Result<usize>
where
    S: RenderSurface + ?Sized,
{
    let container = surface.find_container(selector)?;
    let count = nodes.len();

    for node in nodes {
        surface.attach(container, node);
    }

    debug!(selector, count, "attached nodes");
    Ok(count)
}
