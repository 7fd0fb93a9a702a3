//! Arena-backed context tree.
//!
//! Nodes live in a flat arena owned by the tree. A parent owns its
//! children; the child's link back to the parent is a plain [`NodeId`], so
//! there is no reference cycle. Removing a child tombstones its whole
//! subtree. Ids are never reused, so a stale id reports
//! [`ContextError::DetachedNode`] instead of aliasing a newer node.

use std::fmt;

use crate::error::ContextError;

use super::subcontext::{ContextData, ContextKind, Subcontext};

/// Handle to a node in a [`ContextTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Node {
    data: ContextData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Tree of typed subcontexts hanging off a single root.
#[derive(Debug)]
pub struct ContextTree {
    nodes: Vec<Option<Node>>,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    /// Creates a tree holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                data: ContextData::Root,
                parent: None,
                children: Vec::new(),
            })],
        }
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the number of attached nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// A tree is never empty; the root cannot be removed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `id` refers to a node still in the tree.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    fn node(&self, id: NodeId) -> Result<&Node, ContextError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ContextError::DetachedNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ContextError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ContextError::DetachedNode(id.0))
    }

    /// Returns the kind of the node.
    ///
    /// ## Errors
    ///
    /// Fails if the node was removed.
    pub fn kind(&self, id: NodeId) -> Result<ContextKind, ContextError> {
        Ok(self.node(id)?.data.kind())
    }

    /// Returns the parent of the node; `None` for the root.
    ///
    /// ## Errors
    ///
    /// Fails if the node was removed.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, ContextError> {
        Ok(self.node(id)?.parent)
    }

    /// Returns the children of the node in creation order.
    ///
    /// ## Errors
    ///
    /// Fails if the node was removed.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], ContextError> {
        Ok(&self.node(id)?.children)
    }

    /// Finds the child of kind `T` without creating it.
    ///
    /// ## Errors
    ///
    /// Fails if `parent` was removed.
    pub fn find_child<T: Subcontext>(&self, parent: NodeId) -> Result<Option<NodeId>, ContextError> {
        let node = self.node(parent)?;
        Ok(node.children.iter().copied().find(|child| {
            self.nodes
                .get(child.0)
                .and_then(Option::as_ref)
                .is_some_and(|n| n.data.kind() == T::KIND)
        }))
    }

    /// Returns the child of kind `T`, creating a default one when absent
    /// and `create_if_absent` is set.
    ///
    /// An existing child is never replaced. Absent and not creating yields
    /// `Ok(None)`.
    ///
    /// ## Errors
    ///
    /// Fails if `parent` was removed.
    pub fn get_or_create_child<T: Subcontext>(
        &mut self,
        parent: NodeId,
        create_if_absent: bool,
    ) -> Result<Option<NodeId>, ContextError> {
        if let Some(existing) = self.find_child::<T>(parent)? {
            return Ok(Some(existing));
        }
        if !create_if_absent {
            return Ok(None);
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            data: T::default().into_data(),
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.node_mut(parent)?.children.push(id);

        tracing::trace!(parent = %parent, child = %id, kind = %T::KIND, "Created subcontext");
        Ok(Some(id))
    }

    /// Returns the child of kind `T`, creating it when absent.
    ///
    /// ## Errors
    ///
    /// Fails if `parent` was removed.
    pub fn ensure_child<T: Subcontext>(&mut self, parent: NodeId) -> Result<NodeId, ContextError> {
        self.get_or_create_child::<T>(parent, true)?
            .ok_or(ContextError::DetachedNode(parent.0))
    }

    /// Borrows the node's data as `T`.
    ///
    /// ## Errors
    ///
    /// Fails if the node was removed or holds another kind.
    pub fn get<T: Subcontext>(&self, id: NodeId) -> Result<&T, ContextError> {
        T::from_data(&self.node(id)?.data).ok_or(ContextError::KindMismatch(id.0))
    }

    /// Mutably borrows the node's data as `T`.
    ///
    /// ## Errors
    ///
    /// Fails if the node was removed or holds another kind.
    pub fn get_mut<T: Subcontext>(&mut self, id: NodeId) -> Result<&mut T, ContextError> {
        T::from_data_mut(&mut self.node_mut(id)?.data).ok_or(ContextError::KindMismatch(id.0))
    }

    /// Removes the child of kind `T` together with its subtree.
    ///
    /// Returns whether a child was removed.
    ///
    /// ## Errors
    ///
    /// Fails if `parent` was removed.
    pub fn remove_child<T: Subcontext>(&mut self, parent: NodeId) -> Result<bool, ContextError> {
        let Some(child) = self.find_child::<T>(parent)? else {
            return Ok(false);
        };
        self.node_mut(parent)?.children.retain(|c| *c != child);

        let mut pending = vec![child];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                pending.extend(node.children);
            }
        }
        Ok(true)
    }
}
